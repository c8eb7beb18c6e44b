//! Member definitions and member references.
//!
//! Definitions (fields, properties, methods) are owned by their declaring
//! [`crate::metadata::typesystem::TypeDefinition`]. References ([`MethodReference`],
//! [`FieldReference`]) are symbolic and appear as instruction operands; they name their
//! declaring type through a [`TypeReference`] and are resolved on demand.
//!
//! # Key Types
//! - [`FieldDefinition`], [`PropertyDefinition`], [`MethodDefinition`] - owned members
//! - [`MethodReference`], [`FieldReference`] - symbolic member references
//! - [`MemberRef`] - a borrowed view on any member, as returned by member lookups
//! - [`CustomAttribute`] - attribute applications used for filtering and exclusion

use std::fmt;

use bitflags::bitflags;

use crate::metadata::{
    method::{Literal, MethodBody},
    typesystem::TypeReference,
};

/// Name of instance constructors
pub const CONSTRUCTOR_NAME: &str = ".ctor";
/// Name of type initializers
pub const TYPE_INITIALIZER_NAME: &str = ".cctor";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method attributes (ECMA-335 §II.23.1.10)
    pub struct MethodAttributes: u32 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessibly by anyone in the Assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessibly by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method may not be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special (property accessors, operators)
        const SPECIAL_NAME = 0x0800;
        /// Runtime should check name encoding (constructors)
        const RT_SPECIAL_NAME = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Field attributes (ECMA-335 §II.23.1.5)
    pub struct FieldAttributes: u32 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessibly by anyone in the Assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessibly by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is compile time constant
        const LITERAL = 0x0040;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
    }
}

/// An applied custom attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomAttribute {
    /// The attribute class
    pub attribute_type: TypeReference,
    /// Fixed constructor arguments
    pub arguments: Vec<Literal>,
}

impl CustomAttribute {
    /// Create an attribute application without arguments
    #[must_use]
    pub fn new(attribute_type: TypeReference) -> Self {
        CustomAttribute {
            attribute_type,
            arguments: Vec::new(),
        }
    }
}

/// Returns `true` if any attribute in `attributes` is of the type `full_name`
#[must_use]
pub fn has_attribute(attributes: &[CustomAttribute], full_name: &str) -> bool {
    attributes
        .iter()
        .any(|attribute| attribute.attribute_type.full_name() == full_name)
}

/// A field owned by a type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: TypeReference,
    /// Field attributes
    pub attributes: FieldAttributes,
    /// Applied custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

impl FieldDefinition {
    /// Create a new field
    pub fn new(
        name: impl Into<String>,
        field_type: TypeReference,
        attributes: FieldAttributes,
    ) -> Self {
        FieldDefinition {
            name: name.into(),
            field_type,
            attributes,
            custom_attributes: Vec::new(),
        }
    }

    /// Returns `true` for static fields
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.attributes.contains(FieldAttributes::STATIC)
    }

    /// Build a reference to this field as declared by `declaring_type`
    #[must_use]
    pub fn reference(&self, declaring_type: &TypeReference) -> FieldReference {
        FieldReference {
            declaring_type: declaring_type.clone(),
            name: self.name.clone(),
            field_type: self.field_type.clone(),
        }
    }
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter type
    pub parameter_type: TypeReference,
}

impl Parameter {
    /// Create a new parameter
    pub fn new(name: impl Into<String>, parameter_type: TypeReference) -> Self {
        Parameter {
            name: name.into(),
            parameter_type,
        }
    }
}

/// A method owned by a type, or an accessor owned by a property.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDefinition {
    /// Method name
    pub name: String,
    /// Method attributes
    pub attributes: MethodAttributes,
    /// Return type
    pub return_type: TypeReference,
    /// Parameters, excluding the implicit `this`
    pub parameters: Vec<Parameter>,
    /// Names of the method's own generic parameters
    pub generic_parameters: Vec<String>,
    /// Implementation, absent for abstract and runtime provided methods
    pub body: Option<MethodBody>,
    /// Applied custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

impl MethodDefinition {
    /// Create a new method without body
    pub fn new(
        name: impl Into<String>,
        attributes: MethodAttributes,
        return_type: TypeReference,
    ) -> Self {
        MethodDefinition {
            name: name.into(),
            attributes,
            return_type,
            parameters: Vec::new(),
            generic_parameters: Vec::new(),
            body: None,
            custom_attributes: Vec::new(),
        }
    }

    /// Returns `true` for static methods
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.attributes.contains(MethodAttributes::STATIC)
    }

    /// Returns `true` for abstract methods
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.attributes.contains(MethodAttributes::ABSTRACT)
    }

    /// Returns `true` for instance constructors
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    /// Parameter types in declaration order
    #[must_use]
    pub fn parameter_types(&self) -> Vec<TypeReference> {
        self.parameters
            .iter()
            .map(|parameter| parameter.parameter_type.clone())
            .collect()
    }

    /// Build a reference to this method as declared by `declaring_type`
    #[must_use]
    pub fn reference(&self, declaring_type: &TypeReference) -> MethodReference {
        MethodReference {
            declaring_type: declaring_type.clone(),
            name: self.name.clone(),
            return_type: self.return_type.clone(),
            parameters: self.parameter_types(),
            has_this: !self.is_static(),
            generic_arguments: Vec::new(),
        }
    }
}

/// A property with its accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDefinition {
    /// Property name
    pub name: String,
    /// Property type
    pub property_type: TypeReference,
    /// Getter accessor
    pub getter: Option<MethodDefinition>,
    /// Setter accessor
    pub setter: Option<MethodDefinition>,
    /// Applied custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

impl PropertyDefinition {
    /// Create a new property without accessors
    pub fn new(name: impl Into<String>, property_type: TypeReference) -> Self {
        PropertyDefinition {
            name: name.into(),
            property_type,
            getter: None,
            setter: None,
            custom_attributes: Vec::new(),
        }
    }

    /// The conventional getter name (`get_Name`)
    #[must_use]
    pub fn getter_name(&self) -> String {
        format!("get_{}", self.name)
    }

    /// The conventional setter name (`set_Name`)
    #[must_use]
    pub fn setter_name(&self) -> String {
        format!("set_{}", self.name)
    }

    /// Iterate over the present accessors, getter first
    pub fn accessors(&self) -> impl Iterator<Item = &MethodDefinition> {
        self.getter.iter().chain(self.setter.iter())
    }

    /// Iterate mutably over the present accessors, getter first
    pub fn accessors_mut(&mut self) -> impl Iterator<Item = &mut MethodDefinition> {
        self.getter.iter_mut().chain(self.setter.iter_mut())
    }
}

/// A symbolic reference to a method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodReference {
    /// The type declaring the method, possibly a generic instance
    pub declaring_type: TypeReference,
    /// Method name
    pub name: String,
    /// Return type
    pub return_type: TypeReference,
    /// Parameter types, excluding the implicit `this`
    pub parameters: Vec<TypeReference>,
    /// Instance method
    pub has_this: bool,
    /// Generic arguments of a generic method instance, empty otherwise
    pub generic_arguments: Vec<TypeReference>,
}

impl MethodReference {
    /// Returns `true` if this references an instantiated generic method
    #[must_use]
    pub fn is_generic_instance(&self) -> bool {
        !self.generic_arguments.is_empty()
    }

    /// Invoke `visit` for every type the reference mentions
    pub fn walk_types<F: FnMut(&TypeReference)>(&self, visit: &mut F) {
        self.declaring_type.walk(visit);
        self.return_type.walk(visit);
        for parameter in &self.parameters {
            parameter.walk(visit);
        }
        for argument in &self.generic_arguments {
            argument.walk(visit);
        }
    }
}

impl fmt::Display for MethodReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}::{}",
            self.return_type.full_name(),
            self.declaring_type.full_name(),
            self.name
        )?;
        if self.is_generic_instance() {
            let arguments = self
                .generic_arguments
                .iter()
                .map(TypeReference::full_name)
                .collect::<Vec<_>>()
                .join(",");
            write!(f, "<{arguments}>")?;
        }
        let parameters = self
            .parameters
            .iter()
            .map(TypeReference::full_name)
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "({parameters})")
    }
}

/// A symbolic reference to a field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldReference {
    /// The type declaring the field
    pub declaring_type: TypeReference,
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: TypeReference,
}

impl fmt::Display for FieldReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}::{}",
            self.field_type.full_name(),
            self.declaring_type.full_name(),
            self.name
        )
    }
}

/// A borrowed view on a member, as returned by member lookups.
#[derive(Debug, Clone, Copy)]
pub enum MemberRef<'a> {
    /// A field
    Field(&'a FieldDefinition),
    /// A property
    Property(&'a PropertyDefinition),
    /// A method
    Method(&'a MethodDefinition),
}

impl<'a> MemberRef<'a> {
    /// Name of the member
    #[must_use]
    pub fn name(&self) -> &'a str {
        match self {
            MemberRef::Field(field) => &field.name,
            MemberRef::Property(property) => &property.name,
            MemberRef::Method(method) => &method.name,
        }
    }

    /// Type of the member: field type, property type or method return type
    #[must_use]
    pub fn member_type(&self) -> &'a TypeReference {
        match self {
            MemberRef::Field(field) => &field.field_type,
            MemberRef::Property(property) => &property.property_type,
            MemberRef::Method(method) => &method.return_type,
        }
    }

    /// Access the property, if this member is one
    #[must_use]
    pub fn as_property(&self) -> Option<&'a PropertyDefinition> {
        match self {
            MemberRef::Property(property) => Some(property),
            _ => None,
        }
    }

    /// Access the method, if this member is one
    #[must_use]
    pub fn as_method(&self) -> Option<&'a MethodDefinition> {
        match self {
            MemberRef::Method(method) => Some(method),
            _ => None,
        }
    }

    /// Access the field, if this member is one
    #[must_use]
    pub fn as_field(&self) -> Option<&'a FieldDefinition> {
        match self {
            MemberRef::Field(field) => Some(field),
            _ => None,
        }
    }
}
