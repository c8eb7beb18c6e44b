//! Modules: the unit of loading, transformation and writing.
//!
//! A [`Module`] owns its top-level types (which own their nested types) and records the
//! names of the modules it references, its import table. A body that mentions a type of a
//! scope absent from the import table would produce an invalid image; [`Module::verify_imports`]
//! detects this before anything is handed to the image writer.

use crate::{
    metadata::{
        members::MethodDefinition,
        typesystem::{TypeDefinition, TypeReference},
    },
    Error, Result,
};

/// A position of a type inside a module: index of the top-level type, followed by the indices
/// of the nested types down to the addressed one.
pub type TypePath = Vec<usize>;

/// A named collection of types.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    /// Module name, also the scope of every type it defines
    pub name: String,
    /// Top-level types
    pub types: Vec<TypeDefinition>,
    /// Names of referenced modules
    pub references: Vec<String>,
}

impl Module {
    /// Create an empty module
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            types: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Append a top-level type
    pub fn add_type(&mut self, definition: TypeDefinition) {
        self.types.push(definition);
    }

    /// Add `scope` to the import table. Returns `true` if it was not present before; local
    /// scope is never recorded.
    pub fn add_reference(&mut self, scope: &str) -> bool {
        if scope == self.name || self.references.iter().any(|r| r == scope) {
            return false;
        }
        self.references.push(scope.to_string());
        true
    }

    /// Returns `true` if symbols of `scope` may be used by this module's code
    #[must_use]
    pub fn can_reference(&self, scope: &str) -> bool {
        scope == self.name || self.references.iter().any(|r| r == scope)
    }

    /// Find a type, nested types included, by its full name
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<&TypeDefinition> {
        self.type_path(full_name)
            .and_then(|path| self.type_at(&path))
    }

    /// The path of the type named `full_name`
    #[must_use]
    pub fn type_path(&self, full_name: &str) -> Option<TypePath> {
        self.type_paths()
            .into_iter()
            .find(|path| {
                self.type_at(path)
                    .is_some_and(|definition| definition.full_name() == full_name)
            })
    }

    /// Paths of all types, each type directly followed by its nested types
    #[must_use]
    pub fn type_paths(&self) -> Vec<TypePath> {
        fn collect(types: &[TypeDefinition], prefix: &[usize], paths: &mut Vec<TypePath>) {
            for (index, definition) in types.iter().enumerate() {
                let mut path = prefix.to_vec();
                path.push(index);
                paths.push(path.clone());
                collect(&definition.nested_types, &path, paths);
            }
        }

        let mut paths = Vec::new();
        collect(&self.types, &[], &mut paths);
        paths
    }

    /// Access the type at `path`
    #[must_use]
    pub fn type_at(&self, path: &[usize]) -> Option<&TypeDefinition> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.types.get(*first)?, |current, index| {
                current.nested_types.get(*index)
            })
    }

    /// Access the type at `path`, mutably
    pub fn type_at_mut(&mut self, path: &[usize]) -> Option<&mut TypeDefinition> {
        let (first, rest) = path.split_first()?;
        let mut current = self.types.get_mut(*first)?;
        for index in rest {
            current = current.nested_types.get_mut(*index)?;
        }
        Some(current)
    }

    /// Check that every type mentioned by a signature or a method body of this module belongs
    /// to this module or to a referenced one.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnimportedSymbol`] for the first type of a foreign scope that was
    /// never imported
    pub fn verify_imports(&self) -> Result<()> {
        for path in self.type_paths() {
            let Some(definition) = self.type_at(&path) else {
                continue;
            };

            let mut signature_types: Vec<&TypeReference> = Vec::new();
            signature_types.extend(definition.base.iter());
            signature_types.extend(definition.interfaces.iter());
            signature_types.extend(definition.fields.iter().map(|f| &f.field_type));
            signature_types.extend(definition.properties.iter().map(|p| &p.property_type));
            for reference in signature_types {
                self.verify_reference(reference)?;
            }

            for method in definition.all_methods() {
                self.verify_method(method)?;
            }
        }
        Ok(())
    }

    fn verify_method(&self, method: &MethodDefinition) -> Result<()> {
        self.verify_reference(&method.return_type)?;
        for parameter in &method.parameters {
            self.verify_reference(&parameter.parameter_type)?;
        }

        let Some(body) = &method.body else {
            return Ok(());
        };
        for variable in &body.variables {
            self.verify_reference(&variable.variable_type)?;
        }

        let mut failure = None;
        for instruction in &body.instructions {
            instruction.operand.walk_types(&mut |reference: &TypeReference| {
                if failure.is_none() {
                    failure = self.unimported(reference);
                }
            });
            if let Some(error) = failure {
                return Err(error);
            }
        }
        Ok(())
    }

    fn verify_reference(&self, reference: &TypeReference) -> Result<()> {
        let mut failure = None;
        reference.walk(&mut |part: &TypeReference| {
            if failure.is_none() {
                failure = self.unimported(part);
            }
        });
        failure.map_or(Ok(()), Err)
    }

    fn unimported(&self, reference: &TypeReference) -> Option<Error> {
        match reference.scope() {
            Some(scope) if !self.can_reference(scope) => Some(Error::UnimportedSymbol {
                module: self.name.clone(),
                scope: scope.to_string(),
                symbol: reference.full_name(),
            }),
            _ => None,
        }
    }
}
