//! Type definitions owned by a [`crate::metadata::module::Module`].

use bitflags::bitflags;

use crate::metadata::{
    members::{
        has_attribute, CustomAttribute, FieldDefinition, MethodDefinition, PropertyDefinition,
    },
    typesystem::TypeReference,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Type attributes (ECMA-335 §II.23.1.15)
    pub struct TypeAttributes: u32 {
        /// Class is public scope
        const PUBLIC = 0x0000_0001;
        /// Class is nested with public visibility
        const NESTED_PUBLIC = 0x0000_0002;
        /// Class is nested with private visibility
        const NESTED_PRIVATE = 0x0000_0003;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Class is abstract
        const ABSTRACT = 0x0000_0080;
        /// Class cannot be extended
        const SEALED = 0x0000_0100;
        /// Class name is special
        const SPECIAL_NAME = 0x0000_0400;
        /// Class is serializable
        const SERIALIZABLE = 0x0000_2000;
        /// Initialize the class before first static field access
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

/// A type defined in a module, owning its members and nested types.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    /// Namespace, shared with the outermost enclosing type for nested types
    pub namespace: String,
    /// Name, `Outer/Inner` for nested types
    pub name: String,
    /// Type attributes
    pub attributes: TypeAttributes,
    /// Base type, `None` for interfaces and `System.Object`
    pub base: Option<TypeReference>,
    /// Directly implemented interfaces
    pub interfaces: Vec<TypeReference>,
    /// Names of the generic parameters, in declaration order
    pub generic_parameters: Vec<String>,
    /// Fields
    pub fields: Vec<FieldDefinition>,
    /// Properties, owning their accessors
    pub properties: Vec<PropertyDefinition>,
    /// Methods other than property accessors
    pub methods: Vec<MethodDefinition>,
    /// Nested types
    pub nested_types: Vec<TypeDefinition>,
    /// Applied custom attributes
    pub custom_attributes: Vec<CustomAttribute>,
}

impl TypeDefinition {
    /// Create an empty type
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        attributes: TypeAttributes,
    ) -> Self {
        TypeDefinition {
            namespace: namespace.into(),
            name: name.into(),
            attributes,
            base: None,
            interfaces: Vec::new(),
            generic_parameters: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            nested_types: Vec::new(),
            custom_attributes: Vec::new(),
        }
    }

    /// Create an empty shell carrying only the shape of `self`: name, attributes, interfaces
    /// and generic parameters. The base type is left for the caller to resolve, and so are
    /// the interface references.
    #[must_use]
    pub fn shell(&self) -> Self {
        TypeDefinition {
            interfaces: self.interfaces.clone(),
            generic_parameters: self.generic_parameters.clone(),
            ..TypeDefinition::new(self.namespace.clone(), self.name.clone(), self.attributes)
        }
    }

    /// Returns the full name (Namespace.Name) of the type
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// A reference to this type as defined in the module `scope`
    #[must_use]
    pub fn reference(&self, scope: &str) -> TypeReference {
        TypeReference::named(scope, self.namespace.clone(), self.name.clone())
    }

    /// Returns `true` for interfaces
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.attributes.contains(TypeAttributes::INTERFACE)
    }

    /// Returns `true` if the type carries a custom attribute of the type `full_name`
    #[must_use]
    pub fn has_custom_attribute(&self, full_name: &str) -> bool {
        has_attribute(&self.custom_attributes, full_name)
    }

    /// Add `inner` as nested type, renaming it to `Outer/Inner` in the namespace of `self`
    pub fn add_nested(&mut self, mut inner: TypeDefinition) {
        inner.name = format!("{}/{}", self.name, inner.name);
        inner.namespace.clone_from(&self.namespace);
        self.nested_types.push(inner);
    }

    /// Look up a field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Look up a property by name
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties.iter().find(|property| property.name == name)
    }

    /// Look up a property by name, mutably
    pub fn property_mut(&mut self, name: &str) -> Option<&mut PropertyDefinition> {
        self.properties
            .iter_mut()
            .find(|property| property.name == name)
    }

    /// Look up a method by name, including property accessors
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodDefinition> {
        self.methods
            .iter()
            .chain(self.properties.iter().flat_map(PropertyDefinition::accessors))
            .find(|method| method.name == name)
    }

    /// Iterate over all methods, property accessors included
    pub fn all_methods(&self) -> impl Iterator<Item = &MethodDefinition> {
        self.methods
            .iter()
            .chain(self.properties.iter().flat_map(PropertyDefinition::accessors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::members::MethodAttributes;

    #[test]
    fn test_nested_naming() {
        let mut outer = TypeDefinition::new("App", "Outer", TypeAttributes::PUBLIC);
        outer.add_nested(TypeDefinition::new(
            "",
            "Inner",
            TypeAttributes::NESTED_PUBLIC,
        ));

        let inner = &outer.nested_types[0];
        assert_eq!(inner.full_name(), "App.Outer/Inner");
        assert_eq!(inner.reference("App").full_name(), "App.Outer/Inner");
    }

    #[test]
    fn test_shell_keeps_shape_only() {
        let mut ty = TypeDefinition::new("App", "Foo", TypeAttributes::PUBLIC);
        ty.base = Some(TypeReference::named("mscorlib", "System", "Object"));
        ty.interfaces
            .push(TypeReference::named("App", "App", "IDirty"));
        ty.methods.push(MethodDefinition::new(
            "Run",
            MethodAttributes::PUBLIC,
            TypeReference::named("mscorlib", "System", "Void"),
        ));

        let shell = ty.shell();
        assert_eq!(shell.full_name(), "App.Foo");
        assert!(shell.base.is_none());
        assert_eq!(shell.interfaces.len(), 1);
        assert!(shell.methods.is_empty());
    }

    #[test]
    fn test_method_lookup_includes_accessors() {
        let void = TypeReference::named("mscorlib", "System", "Void");
        let mut ty = TypeDefinition::new("App", "Foo", TypeAttributes::PUBLIC);
        let mut property = PropertyDefinition::new("Dirty", void.clone());
        property.setter = Some(MethodDefinition::new(
            "set_Dirty",
            MethodAttributes::PUBLIC | MethodAttributes::SPECIAL_NAME,
            void,
        ));
        ty.properties.push(property);

        assert!(ty.method("set_Dirty").is_some());
        assert!(ty.method("get_Dirty").is_none());
        assert_eq!(ty.all_methods().count(), 1);
    }
}
