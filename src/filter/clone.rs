//! The default staging filters.
//!
//! [`TypeCloneFilter`] builds the shape of a staged type, [`MemberCloneFilter`] populates its
//! member signatures. Every type they mention is routed through
//! [`crate::Context::resolve_type`], which stages it (shape only) and redirects the reference
//! into the staging module.

use crate::{
    context::Context,
    filter::Filter,
    metadata::{
        members::{
            CustomAttribute, FieldDefinition, MethodDefinition, Parameter, PropertyDefinition,
        },
        typesystem::TypeDefinition,
    },
    Result,
};

fn clone_attributes(attributes: &[CustomAttribute], ctx: &Context) -> Result<Vec<CustomAttribute>> {
    attributes
        .iter()
        .map(|attribute| {
            Ok(CustomAttribute {
                attribute_type: ctx.resolve_type(&attribute.attribute_type)?,
                arguments: attribute.arguments.clone(),
            })
        })
        .collect()
}

/// Creates a fresh shell: name, attributes, generic parameters, resolved base type and
/// interfaces. Members are left to the member chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeCloneFilter;

impl Filter<TypeDefinition> for TypeCloneFilter {
    fn check(&self, _subject: &TypeDefinition) -> bool {
        true
    }

    fn process(
        &self,
        _stage: TypeDefinition,
        original: &TypeDefinition,
        ctx: &Context,
    ) -> Result<TypeDefinition> {
        let mut shell = original.shell();
        shell.base = original
            .base
            .as_ref()
            .map(|base| ctx.resolve_type(base))
            .transpose()?;
        shell.interfaces = shell
            .interfaces
            .iter()
            .map(|interface| ctx.resolve_type(interface))
            .collect::<Result<_>>()?;
        shell.custom_attributes = clone_attributes(&original.custom_attributes, ctx)?;
        Ok(shell)
    }
}

/// Appends the signatures of all fields, properties and methods of the original to the
/// stage. Bodies are not copied.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemberCloneFilter;

impl MemberCloneFilter {
    fn clone_signature(method: &MethodDefinition, ctx: &Context) -> Result<MethodDefinition> {
        let mut signature = MethodDefinition::new(
            method.name.clone(),
            method.attributes,
            ctx.resolve_type(&method.return_type)?,
        );
        signature.generic_parameters.clone_from(&method.generic_parameters);
        signature.parameters = method
            .parameters
            .iter()
            .map(|parameter| {
                Ok(Parameter::new(
                    parameter.name.clone(),
                    ctx.resolve_type(&parameter.parameter_type)?,
                ))
            })
            .collect::<Result<_>>()?;
        signature.custom_attributes = clone_attributes(&method.custom_attributes, ctx)?;
        Ok(signature)
    }
}

impl Filter<TypeDefinition> for MemberCloneFilter {
    fn check(&self, _subject: &TypeDefinition) -> bool {
        true
    }

    fn process(
        &self,
        mut stage: TypeDefinition,
        original: &TypeDefinition,
        ctx: &Context,
    ) -> Result<TypeDefinition> {
        for field in &original.fields {
            let mut clone = FieldDefinition::new(
                field.name.clone(),
                ctx.resolve_type(&field.field_type)?,
                field.attributes,
            );
            clone.custom_attributes = clone_attributes(&field.custom_attributes, ctx)?;
            stage.fields.push(clone);
        }

        for property in &original.properties {
            let mut clone = PropertyDefinition::new(
                property.name.clone(),
                ctx.resolve_type(&property.property_type)?,
            );
            clone.getter = property
                .getter
                .as_ref()
                .map(|getter| Self::clone_signature(getter, ctx))
                .transpose()?;
            clone.setter = property
                .setter
                .as_ref()
                .map(|setter| Self::clone_signature(setter, ctx))
                .transpose()?;
            clone.custom_attributes = clone_attributes(&property.custom_attributes, ctx)?;
            stage.properties.push(clone);
        }

        for method in &original.methods {
            stage.methods.push(Self::clone_signature(method, ctx)?);
        }

        Ok(stage)
    }
}
