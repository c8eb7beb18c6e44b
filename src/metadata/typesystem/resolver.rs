//! Cross-module symbol lookup and import planning.
//!
//! A [`Resolver`] answers lookups against an immutable view of a module and the modules it
//! can reach. Imports needed by a rewrite are collected in an [`ImportTable`] and applied to
//! the target module once planning succeeded.

use std::{collections::BTreeSet, sync::Arc};

use log::{debug, warn};

use crate::{
    config::WeaveConfig,
    metadata::{
        cache::AssemblyCache,
        members::{FieldDefinition, FieldReference, MemberRef, MethodDefinition, MethodReference},
        method::Operand,
        module::Module,
        typesystem::{TypeDefinition, TypeReference},
    },
    Error::{MemberNotFound, ModuleNotFound, RecursionLimit, SymbolNotFound},
    Result,
};

/// A member found by a base-chain walk, together with the type that declares it
#[derive(Debug, Clone)]
pub struct ResolvedMember<T> {
    /// The reference through which the declaring type was reached, e.g. a generic instance
    /// of a base type
    pub declaring_type: TypeReference,
    /// The member
    pub member: T,
}

/// Cross-module symbol lookup for one origin module.
///
/// The reachable set is the origin module plus every module it references, transitively,
/// as provided by the [`AssemblyCache`]. Lookups never leave the reachable set: a type
/// defined in a module the origin does not reference is unresolvable from it.
pub struct Resolver<'a> {
    /// The module lookups start from
    local: &'a Module,
    /// Reachable foreign modules, in discovery order
    externals: Vec<Arc<Module>>,
    /// Scopes referenced as-is, never required to resolve
    passthrough: Vec<String>,
    /// Bound of base-type and interface walks
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    /// Create a resolver for `local`, loading every referenced module from `cache`
    ///
    /// ## Arguments
    /// * 'local'  - The origin module
    /// * 'cache'  - Provides the referenced modules
    /// * 'config' - Pass-through scopes, recursion bound and reference strictness
    ///
    /// # Errors
    /// Returns [`crate::Error::ModuleNotFound`] for an unloadable reference if
    /// [`WeaveConfig::require_references`] is set; otherwise such references are logged and
    /// skipped. Unloaded pass-through scopes are never an error.
    pub fn new(local: &'a Module, cache: &dyn AssemblyCache, config: &WeaveConfig) -> Result<Self> {
        let mut resolver = Resolver {
            local,
            externals: Vec::new(),
            passthrough: config.passthrough_scopes.clone(),
            max_depth: config.max_recursion_depth,
        };
        resolver.passthrough.push(config.runtime_module.clone());

        let mut pending: Vec<String> = local.references.iter().rev().cloned().collect();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        seen.insert(local.name.clone());

        while let Some(name) = pending.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }

            match cache.get_module(&name) {
                Some(module) => {
                    debug!("{}: loaded reference '{}'", local.name, name);
                    pending.extend(module.references.iter().rev().cloned());
                    resolver.externals.push(module);
                }
                None if resolver.is_passthrough(&name) => {
                    debug!("{}: runtime library '{}' not loaded", local.name, name);
                }
                None if config.require_references => return Err(ModuleNotFound(name)),
                None => warn!("{}: skipping unloadable reference '{}'", local.name, name),
            }
        }

        Ok(resolver)
    }

    /// Add `module` to the reachable set, e.g. a template or runtime support module
    #[must_use]
    pub fn with_module(mut self, module: Arc<Module>) -> Self {
        if module.name != self.local.name && self.find_module(&module.name).is_none() {
            self.externals.push(module);
        }
        self
    }

    /// The origin module
    #[must_use]
    pub fn local(&self) -> &'a Module {
        self.local
    }

    /// Returns `true` if `scope` is the origin module
    #[must_use]
    pub fn is_local(&self, scope: &str) -> bool {
        self.local.name == scope
    }

    /// Returns `true` if `scope` is referenced as-is, without having to resolve
    #[must_use]
    pub fn is_passthrough(&self, scope: &str) -> bool {
        self.passthrough.iter().any(|s| s == scope)
    }

    /// Names of all reachable modules, the origin first
    #[must_use]
    pub fn module_names(&self) -> Vec<&str> {
        std::iter::once(self.local.name.as_str())
            .chain(self.externals.iter().map(|m| m.name.as_str()))
            .collect()
    }

    /// Find a reachable module by name
    #[must_use]
    pub fn find_module(&self, name: &str) -> Option<&Module> {
        if self.local.name == name {
            return Some(self.local);
        }
        self.externals
            .iter()
            .find(|module| module.name == name)
            .map(AsRef::as_ref)
    }

    /// Resolve `reference` to its definition. Generic instances resolve to the definition of
    /// their unbound element.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] if no reachable module defines a type with the
    /// reference's scope and name, and for generic parameters
    pub fn resolve(&self, reference: &TypeReference) -> Result<&TypeDefinition> {
        self.try_resolve(reference)
            .ok_or_else(|| SymbolNotFound(reference.full_name()))
    }

    fn try_resolve(&self, reference: &TypeReference) -> Option<&TypeDefinition> {
        let name = reference.element().type_name()?;
        self.find_module(&name.scope)?.find_type(&name.full_name())
    }

    /// Check whether `ty` implements `capability` through its interfaces, its base chain or
    /// the interfaces of any base type, recursively.
    ///
    /// An open generic capability (``IResolvable`1`` without arguments) matches any
    /// implemented instance of it.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] if `ty` itself does not resolve, and
    /// [`crate::Error::RecursionLimit`] for hierarchies deeper than the configured bound
    pub fn has_capability(&self, ty: &TypeReference, capability: &TypeReference) -> Result<bool> {
        let definition = self.resolve(ty)?;
        self.implements(definition, capability)
    }

    /// Same as [`Resolver::has_capability`], starting from a definition
    ///
    /// # Errors
    /// Returns [`crate::Error::RecursionLimit`] for hierarchies deeper than the configured bound
    pub fn implements(
        &self,
        definition: &TypeDefinition,
        capability: &TypeReference,
    ) -> Result<bool> {
        self.capability_walk(definition, capability, 0)
    }

    fn capability_walk(
        &self,
        definition: &TypeDefinition,
        capability: &TypeReference,
        depth: usize,
    ) -> Result<bool> {
        if depth > self.max_depth {
            return Err(RecursionLimit(self.max_depth));
        }

        let supertypes = definition.interfaces.iter().chain(definition.base.iter());
        for supertype in supertypes {
            if Self::matches_capability(supertype, capability) {
                return Ok(true);
            }
            // Runtime library types are leaves unless their module was loaded
            if let Some(parent) = self.try_resolve(supertype) {
                if self.capability_walk(parent, capability, depth + 1)? {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    fn matches_capability(candidate: &TypeReference, capability: &TypeReference) -> bool {
        if capability.is_open_generic() {
            candidate.element().same_type(capability)
        } else {
            candidate.same_type(capability)
        }
    }

    /// Walk the base chain of `ty` upward until `pick` selects something
    fn walk_chain<'s, T>(
        &'s self,
        ty: &TypeReference,
        member: &str,
        mut pick: impl FnMut(&'s TypeDefinition) -> Option<T>,
    ) -> Result<ResolvedMember<T>> {
        let mut current = ty.clone();
        let mut definition = self.resolve(ty)?;

        for _ in 0..=self.max_depth {
            if let Some(found) = pick(definition) {
                return Ok(ResolvedMember {
                    declaring_type: current,
                    member: found,
                });
            }

            let parent = definition
                .base
                .as_ref()
                .and_then(|base| self.try_resolve(base).map(|parent| (base, parent)));
            match parent {
                Some((base, parent)) => {
                    current = base.substitute(current.generic_arguments());
                    definition = parent;
                }
                None => {
                    return Err(MemberNotFound {
                        type_name: ty.full_name(),
                        member: member.to_string(),
                    })
                }
            }
        }

        Err(RecursionLimit(self.max_depth))
    }

    /// Find a field, property or method called `name` on `ty` or its base types
    ///
    /// # Errors
    /// Returns [`crate::Error::MemberNotFound`] if the base chain is exhausted,
    /// [`crate::Error::SymbolNotFound`] if `ty` does not resolve
    pub fn find_member<'s>(
        &'s self,
        ty: &TypeReference,
        name: &str,
    ) -> Result<ResolvedMember<MemberRef<'s>>> {
        self.walk_chain(ty, name, |definition| {
            if let Some(field) = definition.field(name) {
                return Some(MemberRef::Field(field));
            }
            if let Some(property) = definition.property(name) {
                return Some(MemberRef::Property(property));
            }
            definition.method(name).map(MemberRef::Method)
        })
    }

    /// Find a method called `name` on `ty` or its base types, optionally matching the
    /// parameter count
    ///
    /// # Errors
    /// Returns [`crate::Error::MemberNotFound`] if the base chain is exhausted,
    /// [`crate::Error::SymbolNotFound`] if `ty` does not resolve
    pub fn find_method<'s>(
        &'s self,
        ty: &TypeReference,
        name: &str,
        parameter_count: Option<usize>,
    ) -> Result<ResolvedMember<&'s MethodDefinition>> {
        self.walk_chain(ty, name, |definition| {
            definition.all_methods().find(|method| {
                method.name == name
                    && parameter_count.map_or(true, |count| method.parameters.len() == count)
            })
        })
    }

    /// Find a field called `name` on `ty` or its base types
    ///
    /// # Errors
    /// Returns [`crate::Error::MemberNotFound`] if the base chain is exhausted,
    /// [`crate::Error::SymbolNotFound`] if `ty` does not resolve
    pub fn find_field<'s>(
        &'s self,
        ty: &TypeReference,
        name: &str,
    ) -> Result<ResolvedMember<&'s FieldDefinition>> {
        self.walk_chain(ty, name, |definition| definition.field(name))
    }

    /// Import `symbol` into `target`, returning the reference to use inside `target`.
    ///
    /// Every foreign scope the symbol mentions (generic arguments included) is added to the
    /// import table of `target`; local symbols are returned unchanged without touching it.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] if a part of the symbol belongs to neither a
    /// pass-through scope nor a reachable module
    pub fn import_into(
        &self,
        target: &mut Module,
        symbol: &TypeReference,
    ) -> Result<TypeReference> {
        let mut imports = ImportTable::new();
        imports.import_type(self, symbol)?;
        imports.apply(target);
        Ok(symbol.clone())
    }
}

/// Scopes collected while cloning, applied to the target module once the clone is complete.
///
/// Bodies are cloned while the target module is borrowed by the [`Resolver`]; the imports
/// they need are recorded here and written back afterwards.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportTable {
    scopes: BTreeSet<String>,
}

impl ImportTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every foreign scope mentioned by `symbol`
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolNotFound`] for a part that belongs to neither a
    /// pass-through scope nor a reachable module
    pub fn import_type(&mut self, symbols: &Resolver<'_>, symbol: &TypeReference) -> Result<()> {
        let mut parts = Vec::new();
        symbol.walk(&mut |part: &TypeReference| {
            if let TypeReference::Named(_) = part {
                parts.push(part.clone());
            }
        });

        for part in parts {
            let Some(scope) = part.scope() else {
                continue;
            };
            if symbols.is_local(scope) {
                continue;
            }
            if !symbols.is_passthrough(scope) {
                symbols.resolve(&part)?;
            }
            self.scopes.insert(scope.to_string());
        }
        Ok(())
    }

    /// Record every foreign scope mentioned by `method`
    ///
    /// # Errors
    /// See [`ImportTable::import_type`]
    pub fn import_method(
        &mut self,
        symbols: &Resolver<'_>,
        method: &MethodReference,
    ) -> Result<()> {
        let mut types = Vec::new();
        method.walk_types(&mut |ty: &TypeReference| types.push(ty.clone()));
        types
            .iter()
            .try_for_each(|ty| self.import_type(symbols, ty))
    }

    /// Record every foreign scope mentioned by `field`
    ///
    /// # Errors
    /// See [`ImportTable::import_type`]
    pub fn import_field(&mut self, symbols: &Resolver<'_>, field: &FieldReference) -> Result<()> {
        self.import_type(symbols, &field.declaring_type)?;
        self.import_type(symbols, &field.field_type)
    }

    /// Record every foreign scope mentioned by `operand`
    ///
    /// # Errors
    /// See [`ImportTable::import_type`]
    pub fn import_operand(&mut self, symbols: &Resolver<'_>, operand: &Operand) -> Result<()> {
        match operand {
            Operand::Type(ty) => self.import_type(symbols, ty),
            Operand::Method(method) => self.import_method(symbols, method),
            Operand::Field(field) => self.import_field(symbols, field),
            _ => Ok(()),
        }
    }

    /// Returns `true` if `scope` was recorded
    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// Number of recorded scopes
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Returns `true` if nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Add all recorded scopes to the import table of `module` and return how many were new
    pub fn apply(&self, module: &mut Module) -> usize {
        self.scopes
            .iter()
            .filter(|scope| module.add_reference(scope))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            cache::MemoryAssemblyCache,
            members::{
                FieldAttributes, MethodAttributes, MethodDefinition, Parameter, PropertyDefinition,
            },
            typesystem::TypeAttributes,
        },
        Error,
    };

    fn library() -> Module {
        let mut lib = Module::new("Lib");
        let mut resolvable = TypeDefinition::new("Lib", "IResolvable`1", TypeAttributes::INTERFACE);
        resolvable.generic_parameters.push("T".into());
        lib.add_type(resolvable);

        let mut entity = TypeDefinition::new("Lib", "Entity", TypeAttributes::PUBLIC);
        entity.properties.push(PropertyDefinition::new(
            "UniqueIdentifier",
            TypeReference::named("mscorlib", "System", "String"),
        ));
        lib.add_type(entity);

        let mut tracked = TypeDefinition::new("Lib", "ITracked", TypeAttributes::INTERFACE);
        tracked
            .interfaces
            .push(TypeReference::named("Lib", "Lib", "IDirty"));
        lib.add_type(tracked);
        lib.add_type(TypeDefinition::new("Lib", "IDirty", TypeAttributes::INTERFACE));
        lib
    }

    fn app() -> Module {
        let mut app = Module::new("App");
        app.add_reference("Lib");
        app.add_reference("mscorlib");

        let mut bar = TypeDefinition::new("App", "Bar", TypeAttributes::PUBLIC);
        bar.base = Some(TypeReference::named("Lib", "Lib", "Entity"));
        bar.interfaces.push(
            TypeReference::named("Lib", "Lib", "IResolvable`1")
                .instantiate(vec![TypeReference::named("App", "App", "Bar")]),
        );
        app.add_type(bar);

        let mut derived = TypeDefinition::new("App", "Derived", TypeAttributes::PUBLIC);
        derived.base = Some(TypeReference::named("App", "App", "Bar"));
        derived.fields.push(FieldDefinition::new(
            "_count",
            TypeReference::named("mscorlib", "System", "Int32"),
            FieldAttributes::PRIVATE,
        ));
        let mut touch = MethodDefinition::new(
            "Touch",
            MethodAttributes::PUBLIC,
            TypeReference::named("mscorlib", "System", "Void"),
        );
        touch.parameters.push(Parameter::new(
            "count",
            TypeReference::named("mscorlib", "System", "Int32"),
        ));
        derived.methods.push(touch);
        app.add_type(derived);

        let mut tracked = TypeDefinition::new("App", "Tracked", TypeAttributes::PUBLIC);
        tracked
            .interfaces
            .push(TypeReference::named("Lib", "Lib", "ITracked"));
        app.add_type(tracked);
        app
    }

    fn cache() -> MemoryAssemblyCache {
        let cache = MemoryAssemblyCache::new();
        cache.insert(library());
        cache
    }

    #[test]
    fn test_reachable_set() {
        let app = app();
        let resolver = Resolver::new(&app, &cache(), &WeaveConfig::default()).unwrap();
        assert_eq!(resolver.module_names(), vec!["App", "Lib"]);
    }

    #[test]
    fn test_strict_requires_references() {
        let mut app = app();
        app.add_reference("Missing");
        let cache = cache();

        assert!(Resolver::new(&app, &cache, &WeaveConfig::default()).is_ok());
        assert!(matches!(
            Resolver::new(&app, &cache, &WeaveConfig::strict()),
            Err(Error::ModuleNotFound(name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_resolve() {
        let app = app();
        let resolver = Resolver::new(&app, &cache(), &WeaveConfig::default()).unwrap();

        let entity = resolver
            .resolve(&TypeReference::named("Lib", "Lib", "Entity"))
            .unwrap();
        assert_eq!(entity.full_name(), "Lib.Entity");

        // Right name, wrong scope
        assert!(matches!(
            resolver.resolve(&TypeReference::named("App", "Lib", "Entity")),
            Err(Error::SymbolNotFound(_))
        ));
        assert!(resolver
            .resolve(&TypeReference::generic_parameter("T", 0))
            .is_err());
    }

    #[test]
    fn test_has_capability() {
        let app = app();
        let resolver = Resolver::new(&app, &cache(), &WeaveConfig::default()).unwrap();
        let open = TypeReference::named("Lib", "Lib", "IResolvable`1");
        let derived = TypeReference::named("App", "App", "Derived");

        // Through the base chain, open generic against an instance
        assert!(resolver.has_capability(&derived, &open).unwrap());
        // Through the interfaces of an interface
        assert!(resolver
            .has_capability(
                &TypeReference::named("App", "App", "Tracked"),
                &TypeReference::named("Lib", "Lib", "IDirty")
            )
            .unwrap());
        assert!(!resolver
            .has_capability(&derived, &TypeReference::named("Lib", "Lib", "IDirty"))
            .unwrap());
        // A closed capability must match its arguments
        let closed = open.instantiate(vec![TypeReference::named("App", "App", "Derived")]);
        assert!(!resolver.has_capability(&derived, &closed).unwrap());
    }

    #[test]
    fn test_recursion_limit() {
        let mut looped = Module::new("Loop");
        let mut a = TypeDefinition::new("Loop", "A", TypeAttributes::PUBLIC);
        a.base = Some(TypeReference::named("Loop", "Loop", "B"));
        let mut b = TypeDefinition::new("Loop", "B", TypeAttributes::PUBLIC);
        b.base = Some(TypeReference::named("Loop", "Loop", "A"));
        looped.add_type(a);
        looped.add_type(b);

        let resolver =
            Resolver::new(&looped, &MemoryAssemblyCache::new(), &WeaveConfig::default()).unwrap();
        let a = TypeReference::named("Loop", "Loop", "A");
        assert!(matches!(
            resolver.has_capability(&a, &TypeReference::named("Lib", "Lib", "IDirty")),
            Err(Error::RecursionLimit(_))
        ));
        assert!(matches!(
            resolver.find_member(&a, "Missing"),
            Err(Error::RecursionLimit(_))
        ));
    }

    #[test]
    fn test_find_member_walks_base_chain() {
        let app = app();
        let resolver = Resolver::new(&app, &cache(), &WeaveConfig::default()).unwrap();
        let derived = TypeReference::named("App", "App", "Derived");

        let found = resolver.find_member(&derived, "UniqueIdentifier").unwrap();
        assert_eq!(found.declaring_type.full_name(), "Lib.Entity");
        assert!(found.member.as_property().is_some());

        let field = resolver.find_field(&derived, "_count").unwrap();
        assert_eq!(field.declaring_type, derived);

        let touch = resolver.find_method(&derived, "Touch", Some(1)).unwrap();
        assert_eq!(touch.member.parameters.len(), 1);
        assert!(matches!(
            resolver.find_method(&derived, "Touch", Some(0)),
            Err(Error::MemberNotFound { .. })
        ));

        assert!(matches!(
            resolver.find_member(&derived, "Nope"),
            Err(Error::MemberNotFound { member, .. }) if member == "Nope"
        ));
    }

    #[test]
    fn test_import_into() {
        let app = app();
        let resolver = Resolver::new(&app, &cache(), &WeaveConfig::default()).unwrap();
        let mut target = Module::new("App");

        let weak = TypeReference::named("Cilweave.Runtime", "Cilweave.Runtime", "WeakRef`1")
            .instantiate(vec![TypeReference::named("Lib", "Lib", "Entity")]);
        let imported = resolver.import_into(&mut target, &weak).unwrap();
        assert_eq!(imported, weak);
        assert_eq!(
            target.references,
            vec!["Cilweave.Runtime".to_string(), "Lib".to_string()]
        );

        // Local symbols leave the import table alone
        let mut untouched = Module::new("App");
        resolver
            .import_into(&mut untouched, &TypeReference::named("App", "App", "Bar"))
            .unwrap();
        assert!(untouched.references.is_empty());

        // Unknown symbols of a reachable scope are rejected
        assert!(resolver
            .import_into(&mut target, &TypeReference::named("Lib", "Lib", "Missing"))
            .is_err());
    }
}
