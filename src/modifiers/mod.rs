//! Modifiers: visitors that weave behavior into the types of a module.
//!
//! A [`Modifier`] walks every type of a module, nested types included. Types rejected by the
//! modifier's acceptance filters are skipped, and so is any type carrying the exclusion
//! attribute ([`crate::WeaveConfig::exclusion_attribute`]) together with its nested types.
//! Accepted types are handed to [`Modifier::visit_type`].
//!
//! Implementations plan against an immutable view of the module first and apply their edits
//! afterwards, so that nothing they synthesize is visited by the walk that produced it.
//!
//! # Key Components
//!
//! - [`Modifier`]: The visitor trait and its default walk
//! - [`ModifierFilters`]: Module and type acceptance of a modifier
//! - [`MethodSlot`]: Addresses a method or accessor inside a type
//! - [`DirtyModifier`]: Dirty-flag change tracking
//! - [`LazyCompositionModifier`]: Lazily resolved composed references

pub mod dirty;
pub mod lazy;

pub use dirty::DirtyModifier;
pub use lazy::LazyCompositionModifier;

use crate::{
    context::Context,
    filter::AcceptanceFilter,
    metadata::{
        members::{has_attribute, MethodDefinition},
        module::Module,
        typesystem::TypeDefinition,
    },
    Result,
};

/// Module and type acceptance of a modifier
#[derive(Debug, Clone, Default)]
pub struct ModifierFilters {
    /// Decides which modules are visited
    pub modules: AcceptanceFilter<Module>,
    /// Decides which types are visited
    pub types: AcceptanceFilter<TypeDefinition>,
}

/// A visitor weaving one behavior into modules
pub trait Modifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// The acceptance filters of this modifier
    fn filters(&self) -> &ModifierFilters;

    /// Mutable access to the acceptance filters of this modifier
    fn filters_mut(&mut self) -> &mut ModifierFilters;

    /// Visit every accepted, non-excluded type of `module` and return the number of changes
    ///
    /// # Errors
    /// Propagates the first failing [`Modifier::visit_type`]
    fn visit_module(&self, module: &mut Module, ctx: &Context) -> Result<usize> {
        if !self.filters().modules.accepts(module) {
            return Ok(0);
        }

        let exclusion = &ctx.config().exclusion_attribute;
        let mut changes = 0;
        for path in module.type_paths() {
            if is_excluded(module, &path, exclusion) {
                continue;
            }
            let accepted = module
                .type_at(&path)
                .is_some_and(|definition| self.filters().types.accepts(definition));
            if accepted {
                changes += self.visit_type(module, &path, ctx)?;
            }
        }
        Ok(changes)
    }

    /// Apply the modifier to the type at `path` and return the number of changes
    ///
    /// # Errors
    /// Implementations propagate resolution and cloning failures
    fn visit_type(&self, module: &mut Module, path: &[usize], ctx: &Context) -> Result<usize>;
}

/// Returns `true` if the type at `path` or any type enclosing it carries `attribute`
#[must_use]
pub fn is_excluded(module: &Module, path: &[usize], attribute: &str) -> bool {
    (1..=path.len()).any(|depth| {
        module
            .type_at(&path[..depth])
            .is_some_and(|definition| definition.has_custom_attribute(attribute))
    })
}

/// Addresses a method inside a type: a plain method or a property accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodSlot {
    /// Index into [`TypeDefinition::methods`]
    Method(usize),
    /// Getter of the property at the index
    Getter(usize),
    /// Setter of the property at the index
    Setter(usize),
}

impl MethodSlot {
    /// All slots of `definition` holding a method, plain methods first
    #[must_use]
    pub fn all(definition: &TypeDefinition) -> Vec<MethodSlot> {
        let methods = (0..definition.methods.len()).map(MethodSlot::Method);
        let accessors = definition
            .properties
            .iter()
            .enumerate()
            .flat_map(|(index, property)| {
                property
                    .getter
                    .as_ref()
                    .map(|_| MethodSlot::Getter(index))
                    .into_iter()
                    .chain(property.setter.as_ref().map(|_| MethodSlot::Setter(index)))
            });
        methods.chain(accessors).collect()
    }

    /// Access the addressed method
    #[must_use]
    pub fn get(self, definition: &TypeDefinition) -> Option<&MethodDefinition> {
        match self {
            MethodSlot::Method(index) => definition.methods.get(index),
            MethodSlot::Getter(index) => definition.properties.get(index)?.getter.as_ref(),
            MethodSlot::Setter(index) => definition.properties.get(index)?.setter.as_ref(),
        }
    }

    /// Access the addressed method, mutably
    pub fn get_mut(self, definition: &mut TypeDefinition) -> Option<&mut MethodDefinition> {
        match self {
            MethodSlot::Method(index) => definition.methods.get_mut(index),
            MethodSlot::Getter(index) => definition.properties.get_mut(index)?.getter.as_mut(),
            MethodSlot::Setter(index) => definition.properties.get_mut(index)?.setter.as_mut(),
        }
    }

    /// Returns `true` if the method, or the property owning the accessor, carries `attribute`
    #[must_use]
    pub fn is_excluded(self, definition: &TypeDefinition, attribute: &str) -> bool {
        let owner_excluded = match self {
            MethodSlot::Method(_) => false,
            MethodSlot::Getter(index) | MethodSlot::Setter(index) => definition
                .properties
                .get(index)
                .is_some_and(|property| has_attribute(&property.custom_attributes, attribute)),
        };
        owner_excluded
            || self
                .get(definition)
                .is_some_and(|method| has_attribute(&method.custom_attributes, attribute))
    }
}
