//! Template based member synthesis.
//!
//! A template is a canonical implementation of a property, written once against placeholder
//! types: the declaring type, the member type and the identifier type. Its backing fields are
//! declared on the placeholder declaring type. [`TemplateSynthesizer::synthesize`] specializes
//! it for one target property:
//!
//! 1. every template field is recreated on the target type as `{field}{Property}`, with its
//!    placeholder types substituted
//! 2. getter and setter are cloned independently through
//!    [`crate::rewrite::duplicate_body`], with a resolver mapping the placeholders to the
//!    target's types and the template field names to the created fields
//! 3. custom attributes of the template property and its accessors are copied over
//!
//! Everything else the template references (runtime types, library calls) passes through.

use std::{collections::HashMap, sync::Arc};

use log::debug;

use crate::{
    config::WeaveConfig,
    metadata::{
        cache::AssemblyCache,
        members::{
            CustomAttribute, FieldDefinition, MethodDefinition, Parameter, PropertyDefinition,
        },
        method::{Instruction, Literal, Operand},
        module::Module,
        typesystem::{ImportTable, Resolver, TypeDefinition, TypeReference},
    },
    rewrite::duplicate_body,
    Error::{MemberNotFound, SymbolNotFound},
    Result,
};

/// A canonical property implementation and its placeholders
#[derive(Debug, Clone)]
pub struct Template {
    /// Module defining the template and its placeholder types
    pub module: Arc<Module>,
    /// Placeholder for the type declaring the synthesized property; also declares the
    /// template property and the template fields
    pub declaring_type: TypeReference,
    /// Name of the template property on `declaring_type`
    pub property: String,
    /// Placeholder for the type of the synthesized property
    pub member_type: TypeReference,
    /// Placeholder for the identifier type exposed by the member type
    pub identifier_type: TypeReference,
}

/// The outcome of one synthesis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Synthesis {
    /// Names of the created backing fields
    pub fields: Vec<String>,
    /// Names of the synthesized accessors
    pub accessors: Vec<String>,
}

/// The types a template is specialized for
struct Bindings {
    declaring_type: TypeReference,
    member_type: TypeReference,
    identifier_type: TypeReference,
}

/// Specializes a [`Template`] for target properties
#[derive(Debug, Clone)]
pub struct TemplateSynthesizer {
    template: Template,
}

impl TemplateSynthesizer {
    /// Create a synthesizer for `template`
    #[must_use]
    pub fn new(template: Template) -> Self {
        TemplateSynthesizer { template }
    }

    /// The template this synthesizer specializes
    #[must_use]
    pub fn template(&self) -> &Template {
        &self.template
    }

    fn template_type(&self) -> Result<&TypeDefinition> {
        let name = self.template.declaring_type.full_name();
        self.template
            .module
            .find_type(&name)
            .ok_or(SymbolNotFound(name))
    }

    fn template_property(&self) -> Result<&PropertyDefinition> {
        let template = self.template_type()?;
        template
            .property(&self.template.property)
            .ok_or_else(|| MemberNotFound {
                type_name: template.full_name(),
                member: self.template.property.clone(),
            })
    }

    /// Returns the placeholder substitute for `ty`, leaving other types unchanged
    fn bind(&self, ty: &TypeReference, bindings: &Bindings) -> TypeReference {
        match ty {
            TypeReference::GenericInstance { element, arguments } => self
                .bind(element, bindings)
                .instantiate(arguments.iter().map(|a| self.bind(a, bindings)).collect()),
            _ if ty.same_type(&self.template.declaring_type) => bindings.declaring_type.clone(),
            _ if ty.same_type(&self.template.member_type) => bindings.member_type.clone(),
            _ if ty.same_type(&self.template.identifier_type) => bindings.identifier_type.clone(),
            _ => ty.clone(),
        }
    }

    /// Re-implement the property `property` of the type at `path` in `module` from the
    /// template.
    ///
    /// The identifier type is the type of the member named
    /// [`WeaveConfig::identifier_member`] on the property type, looked up through the base
    /// chain. `module` is left untouched if anything fails.
    ///
    /// # Errors
    /// - [`crate::Error::MemberNotFound`] if the property or the identifier member is missing
    /// - [`crate::Error::SymbolNotFound`] if the type at `path` does not exist or a symbol of
    ///   the clone cannot be imported
    /// - any error of the instruction cloner
    pub fn synthesize(
        &self,
        module: &mut Module,
        path: &[usize],
        property: &str,
        cache: &dyn AssemblyCache,
        config: &WeaveConfig,
    ) -> Result<Synthesis> {
        let template_property = self.template_property()?;
        let template_fields = &self.template_type()?.fields;

        // Plan against an immutable view of the module
        let (fields, accessors, imports, substitutions) = {
            let mut symbols =
                Resolver::new(module, cache, config)?.with_module(self.template.module.clone());
            if let Some(runtime) = cache.get_module(&config.runtime_module) {
                symbols = symbols.with_module(runtime);
            }

            let definition = module
                .type_at(path)
                .ok_or_else(|| SymbolNotFound(format!("{}@{:?}", module.name, path)))?;
            let target = definition
                .property(property)
                .ok_or_else(|| MemberNotFound {
                    type_name: definition.full_name(),
                    member: property.to_string(),
                })?;

            let identifier =
                symbols.find_member(&target.property_type, &config.identifier_member)?;
            let bindings = Bindings {
                declaring_type: definition.reference(&module.name),
                member_type: target.property_type.clone(),
                identifier_type: identifier
                    .member
                    .member_type()
                    .substitute(identifier.declaring_type.generic_arguments()),
            };

            let mut imports = ImportTable::new();
            let mut names: HashMap<String, String> = HashMap::new();
            let mut fields = Vec::new();
            for field in template_fields {
                let name = format!("{}{}", field.name, target.name);
                let mut created = FieldDefinition::new(
                    name.clone(),
                    self.bind(&field.field_type, &bindings),
                    field.attributes,
                );
                created.custom_attributes = field.custom_attributes.clone();
                imports.import_type(&symbols, &created.field_type)?;
                names.insert(field.name.clone(), name);
                fields.push(created);
            }

            let mut resolve = |operand: Operand,
                               _: Option<&Instruction>,
                               _: &MethodDefinition|
             -> Result<Operand> {
                Ok(match operand {
                    Operand::Type(ty) => Operand::Type(self.bind(&ty, &bindings)),
                    Operand::Literal(Literal::String(name)) => Operand::Literal(Literal::String(
                        names.get(&name).cloned().unwrap_or(name),
                    )),
                    other => other,
                })
            };

            let mut accessors = Vec::new();
            let template_accessors = [
                (template_property.getter.as_ref(), target.getter.as_ref(), target.getter_name()),
                (template_property.setter.as_ref(), target.setter.as_ref(), target.setter_name()),
            ];
            for (template_accessor, existing, name) in template_accessors {
                let Some(template_accessor) = template_accessor else {
                    accessors.push(None);
                    continue;
                };

                let mut synthesized = self.specialize_signature(
                    template_accessor,
                    existing,
                    name,
                    &bindings,
                    &mut imports,
                    &symbols,
                )?;
                duplicate_body(
                    template_accessor,
                    &mut synthesized,
                    &mut resolve,
                    &symbols,
                    &mut imports,
                )?;
                accessors.push(Some(synthesized));
            }

            if imports.contains(&self.template.module.name) {
                return Err(malformed_error!(
                    "Synthesis of {}::{} references the template module",
                    bindings.declaring_type.full_name(),
                    property
                ));
            }

            (fields, accessors, imports, names.len())
        };

        // Flush into the module
        let mut synthesis = Synthesis::default();
        let definition = module
            .type_at_mut(path)
            .ok_or_else(|| SymbolNotFound(format!("{path:?}")))?;
        for field in fields {
            synthesis.fields.push(field.name.clone());
            definition.fields.retain(|existing| existing.name != field.name);
            definition.fields.push(field);
        }

        let type_name = definition.full_name();
        let target = definition
            .property_mut(property)
            .ok_or_else(|| MemberNotFound {
                type_name,
                member: property.to_string(),
            })?;
        let mut accessors = accessors.into_iter();
        if let Some(Some(getter)) = accessors.next() {
            synthesis.accessors.push(getter.name.clone());
            target.getter = Some(getter);
        }
        if let Some(Some(setter)) = accessors.next() {
            synthesis.accessors.push(setter.name.clone());
            target.setter = Some(setter);
        }
        merge_attributes(&mut target.custom_attributes, &template_property.custom_attributes);

        imports.apply(module);
        debug!(
            "synthesized {} ({} fields, {} accessors, {} substitutions)",
            property,
            synthesis.fields.len(),
            synthesis.accessors.len(),
            substitutions
        );
        Ok(synthesis)
    }

    /// A detached accessor with the target's name and attributes (when it has one) and the
    /// template's signature specialized
    fn specialize_signature(
        &self,
        template: &MethodDefinition,
        existing: Option<&MethodDefinition>,
        name: String,
        bindings: &Bindings,
        imports: &mut ImportTable,
        symbols: &Resolver<'_>,
    ) -> Result<MethodDefinition> {
        let attributes = existing.map_or(template.attributes, |method| method.attributes);
        let mut synthesized =
            MethodDefinition::new(name, attributes, self.bind(&template.return_type, bindings));
        synthesized.parameters = template
            .parameters
            .iter()
            .map(|parameter| {
                Parameter::new(
                    parameter.name.clone(),
                    self.bind(&parameter.parameter_type, bindings),
                )
            })
            .collect();
        synthesized.custom_attributes = existing
            .map(|method| method.custom_attributes.clone())
            .unwrap_or_default();
        merge_attributes(&mut synthesized.custom_attributes, &template.custom_attributes);

        imports.import_type(symbols, &synthesized.return_type)?;
        for parameter in &synthesized.parameters {
            imports.import_type(symbols, &parameter.parameter_type)?;
        }
        Ok(synthesized)
    }
}

fn merge_attributes(target: &mut Vec<CustomAttribute>, source: &[CustomAttribute]) {
    for attribute in source {
        let present = target
            .iter()
            .any(|existing| existing.attribute_type.same_type(&attribute.attribute_type));
        if !present {
            target.push(attribute.clone());
        }
    }
}
