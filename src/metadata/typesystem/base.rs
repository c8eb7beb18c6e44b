//! Symbolic type references.
//!
//! A [`TypeReference`] never owns the type it points to. It names the type by scope (the
//! module that defines it), namespace and name, and is resolved on demand through the
//! [`crate::metadata::typesystem::Resolver`]. This is what allows reference cycles between
//! types (A has a property of type B, B has a property of type A) without structural
//! recursion.
//!
//! # Naming
//!
//! Names follow CLI conventions:
//! - generic type definitions carry their arity as a backtick suffix (``WeakRef`1``)
//! - nested types are named `Outer/Inner` and share the namespace of the outermost type
//! - generic instances render their arguments in angle brackets (``WeakRef`1<App.Bar>``)

use std::fmt;

/// Scope, namespace and name of a named type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName {
    /// Name of the module defining the type
    pub scope: String,
    /// Namespace, may be empty
    pub namespace: String,
    /// Type name, including the arity suffix for generic definitions and the enclosing type
    /// names for nested types
    pub name: String,
}

impl TypeName {
    /// Create a new `TypeName`
    pub fn new(
        scope: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        TypeName {
            scope: scope.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns the full name (Namespace.Name) of the type, or just the name for types in the
    /// global namespace
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Number of generic parameters, derived from the backtick suffix of the name
    #[must_use]
    pub fn generic_arity(&self) -> usize {
        let simple = self.name.rsplit('/').next().unwrap_or(&self.name);
        simple
            .rsplit_once('`')
            .and_then(|(_, arity)| arity.parse().ok())
            .unwrap_or(0)
    }
}

/// A symbolic pointer to a type.
///
/// # Examples
///
/// ```rust
/// use cilweave::metadata::typesystem::TypeReference;
///
/// let bar = TypeReference::named("App", "App", "Bar");
/// let weak = TypeReference::named("Cilweave.Runtime", "Cilweave.Runtime", "WeakRef`1");
/// let instance = weak.instantiate(vec![bar]);
///
/// assert_eq!(instance.full_name(), "Cilweave.Runtime.WeakRef`1<App.Bar>");
/// assert!(instance.is_generic_instance());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeReference {
    /// A named type: a plain type or an open generic type definition
    Named(TypeName),
    /// A generic type instantiated with an ordered list of type arguments
    GenericInstance {
        /// The unbound generic definition
        element: Box<TypeReference>,
        /// The type arguments, in declaration order of the generic parameters
        arguments: Vec<TypeReference>,
    },
    /// A generic parameter of the enclosing type or method
    GenericParameter {
        /// Declared name of the parameter (e.g. `T`)
        name: String,
        /// Zero based position in the owner's generic parameter list
        position: usize,
    },
}

impl TypeReference {
    /// Create a reference to a named type
    pub fn named(
        scope: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        TypeReference::Named(TypeName::new(scope, namespace, name))
    }

    /// Create a reference to a generic parameter
    pub fn generic_parameter(name: impl Into<String>, position: usize) -> Self {
        TypeReference::GenericParameter {
            name: name.into(),
            position,
        }
    }

    /// Instantiate this (unbound) generic type with the provided arguments
    #[must_use]
    pub fn instantiate(&self, arguments: Vec<TypeReference>) -> TypeReference {
        TypeReference::GenericInstance {
            element: Box::new(self.element().clone()),
            arguments,
        }
    }

    /// The canonical name of the referenced type
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            TypeReference::Named(name) => name.full_name(),
            TypeReference::GenericInstance { element, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(TypeReference::full_name)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}<{arguments}>", element.full_name())
            }
            TypeReference::GenericParameter { name, .. } => name.clone(),
        }
    }

    /// The scope (defining module) of the reference, `None` for generic parameters
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        match self {
            TypeReference::Named(name) => Some(&name.scope),
            TypeReference::GenericInstance { element, .. } => element.scope(),
            TypeReference::GenericParameter { .. } => None,
        }
    }

    /// Access the [`TypeName`] of named types and generic instances
    #[must_use]
    pub fn type_name(&self) -> Option<&TypeName> {
        match self {
            TypeReference::Named(name) => Some(name),
            TypeReference::GenericInstance { element, .. } => element.type_name(),
            TypeReference::GenericParameter { .. } => None,
        }
    }

    /// The unbound element of a generic instance, or `self` for any other reference
    #[must_use]
    pub fn element(&self) -> &TypeReference {
        match self {
            TypeReference::GenericInstance { element, .. } => element.element(),
            _ => self,
        }
    }

    /// The type arguments of a generic instance, empty for any other reference
    #[must_use]
    pub fn generic_arguments(&self) -> &[TypeReference] {
        match self {
            TypeReference::GenericInstance { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// Returns `true` for instantiated generic types
    #[must_use]
    pub fn is_generic_instance(&self) -> bool {
        matches!(self, TypeReference::GenericInstance { .. })
    }

    /// Returns `true` for generic parameters
    #[must_use]
    pub fn is_generic_parameter(&self) -> bool {
        matches!(self, TypeReference::GenericParameter { .. })
    }

    /// Returns `true` for a generic type definition referenced without arguments, e.g. a
    /// capability such as ``IResolvable`1``
    #[must_use]
    pub fn is_open_generic(&self) -> bool {
        match self {
            TypeReference::Named(name) => name.generic_arity() > 0,
            _ => false,
        }
    }

    /// Compare two references by canonical name, ignoring the scope.
    ///
    /// Imports and staging change the scope of a reference but never the identity of the type
    /// it denotes.
    #[must_use]
    pub fn same_type(&self, other: &TypeReference) -> bool {
        match (self, other) {
            (TypeReference::Named(a), TypeReference::Named(b)) => {
                a.namespace == b.namespace && a.name == b.name
            }
            (
                TypeReference::GenericInstance {
                    element: a,
                    arguments: args_a,
                },
                TypeReference::GenericInstance {
                    element: b,
                    arguments: args_b,
                },
            ) => {
                a.same_type(b)
                    && args_a.len() == args_b.len()
                    && args_a.iter().zip(args_b).all(|(a, b)| a.same_type(b))
            }
            (
                TypeReference::GenericParameter { position: a, .. },
                TypeReference::GenericParameter { position: b, .. },
            ) => a == b,
            _ => false,
        }
    }

    /// Return a copy of this reference with every named part moved into `scope`
    #[must_use]
    pub fn with_scope(&self, scope: &str) -> TypeReference {
        match self {
            TypeReference::Named(name) => TypeReference::Named(TypeName {
                scope: scope.to_string(),
                ..name.clone()
            }),
            TypeReference::GenericInstance { element, arguments } => {
                TypeReference::GenericInstance {
                    element: Box::new(element.with_scope(scope)),
                    arguments: arguments.clone(),
                }
            }
            TypeReference::GenericParameter { .. } => self.clone(),
        }
    }

    /// Replace every generic parameter by the entry of `arguments` at its position.
    /// Parameters without a matching argument are kept.
    #[must_use]
    pub fn substitute(&self, arguments: &[TypeReference]) -> TypeReference {
        match self {
            TypeReference::GenericParameter { position, .. } => arguments
                .get(*position)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeReference::GenericInstance {
                element,
                arguments: own,
            } => element.instantiate(own.iter().map(|a| a.substitute(arguments)).collect()),
            TypeReference::Named(_) => self.clone(),
        }
    }

    /// Invoke `visit` for this reference and every type argument, depth first
    pub fn walk<F: FnMut(&TypeReference)>(&self, visit: &mut F) {
        visit(self);
        if let TypeReference::GenericInstance { element, arguments } = self {
            element.walk(visit);
            for argument in arguments {
                argument.walk(visit);
            }
        }
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope() {
            Some(scope) => write!(f, "[{scope}]{}", self.full_name()),
            None => write!(f, "{}", self.full_name()),
        }
    }
}
