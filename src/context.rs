//! Orchestration of a weaving run.
//!
//! A [`Context`] owns everything a run needs: the [`WeaveConfig`], the [`AssemblyCache`]
//! holding every loaded module, the [`StagedRegistry`], the [`FilterHost`] building staged
//! types, the acceptance filter deciding which images are rewritten, and the ordered list of
//! [`Modifier`]s. There is no global state; independent contexts never share records.
//!
//! # Transformation
//!
//! [`Context::transform_module`] is fail-closed: it rewrites a copy of the module, runs every
//! modifier in order (lazy composition before dirty-flag tracking, so that synthesized
//! accessors are tracked as well) and verifies the import table. Any failure returns an error
//! and leaves the original untouched.
//!
//! # Running
//!
//! Images are read and written through an [`ImageStore`] and executed through an
//! [`ExecutionHost`]; both are provided by the embedding application. [`Context::run`] loads
//! the image, transforms every accepted module reachable from it, writes all of them once
//! every transformation succeeded, and hands the rewritten root image to the host.
//!
//! # Examples
//!
//! ```rust
//! use cilweave::{
//!     metadata::{module::Module, typesystem::{TypeAttributes, TypeDefinition}},
//!     Context,
//! };
//!
//! let context = Context::default();
//! let mut app = Module::new("App");
//! app.add_reference("mscorlib");
//! app.add_type(TypeDefinition::new("App", "Program", TypeAttributes::PUBLIC));
//! context.load(app);
//!
//! let woven = context.transform("App")?;
//! assert_eq!(woven.types.len(), 1);
//! # Ok::<(), cilweave::Error>(())
//! ```

use std::{collections::BTreeSet, sync::Arc};

use dashmap::DashMap;
use log::{debug, info};

use crate::{
    config::WeaveConfig,
    filter::{AcceptanceFilter, FilterHost},
    metadata::{
        cache::{AssemblyCache, MemoryAssemblyCache},
        module::Module,
        typesystem::{StagedRegistry, TypeDefinition, TypeReference},
    },
    modifiers::{lazy::runtime_module, DirtyModifier, LazyCompositionModifier, Modifier},
    Error::ModuleNotFound,
    Result,
};

/// Reads and writes program images.
///
/// The on-disk format is up to the implementation; the pipeline only sees [`Module`]s.
pub trait ImageStore: Send + Sync {
    /// Load the image found at `locator`
    ///
    /// # Errors
    /// Implementations report unreadable or malformed images
    fn load_image(&self, locator: &str) -> Result<Module>;

    /// Persist `module` and return the locator of the written image
    ///
    /// # Errors
    /// Implementations report write failures
    fn write_image(&self, module: &Module) -> Result<String>;
}

/// Executes a rewritten image, e.g. in an isolated process
pub trait ExecutionHost: Send + Sync {
    /// Run `entry` of the image at `location` with `parameters`, returning its exit code
    ///
    /// # Errors
    /// Implementations report launch failures
    fn execute(&self, location: &str, entry: &EntryPoint, parameters: &[String]) -> Result<i32>;
}

/// The member an [`ExecutionHost`] starts execution at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Name of the module declaring the entry point
    pub module: String,
    /// Full name of the declaring type
    pub type_name: String,
    /// Name of the method
    pub member: String,
}

impl EntryPoint {
    /// Create a new `EntryPoint`
    pub fn new(
        module: impl Into<String>,
        type_name: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        EntryPoint {
            module: module.into(),
            type_name: type_name.into(),
            member: member.into(),
        }
    }
}

/// An [`ImageStore`] keeping images in memory, keyed by locator.
///
/// Written images are stored under `memory://{module}`.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    images: DashMap<String, Module>,
}

impl MemoryImageStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `module` available at `locator`
    pub fn add(&self, locator: impl Into<String>, module: Module) {
        self.images.insert(locator.into(), module);
    }

    /// A copy of the image stored at `locator`
    #[must_use]
    pub fn get(&self, locator: &str) -> Option<Module> {
        self.images.get(locator).map(|entry| entry.value().clone())
    }

    /// Number of stored images
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns `true` if no image is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ImageStore for MemoryImageStore {
    fn load_image(&self, locator: &str) -> Result<Module> {
        self.get(locator)
            .ok_or_else(|| ModuleNotFound(locator.to_string()))
    }

    fn write_image(&self, module: &Module) -> Result<String> {
        let locator = format!("memory://{}", module.name);
        self.images.insert(locator.clone(), module.clone());
        Ok(locator)
    }
}

/// The state of one weaving run
pub struct Context {
    config: WeaveConfig,
    cache: Arc<dyn AssemblyCache>,
    registry: StagedRegistry,
    filters: FilterHost,
    images: AcceptanceFilter<Module>,
    modifiers: Vec<Box<dyn Modifier>>,
}

impl Default for Context {
    fn default() -> Self {
        Context::new(WeaveConfig::default())
    }
}

impl Context {
    /// Create a context with an in-memory cache holding the runtime support module
    #[must_use]
    pub fn new(config: WeaveConfig) -> Self {
        Context::with_cache(config, Arc::new(MemoryAssemblyCache::new()))
    }

    /// Create a context sharing `cache`. The runtime support module is added to it unless
    /// the cache provides one already.
    ///
    /// Runtime and pass-through modules are never rewritten; lazy composition runs before
    /// dirty-flag tracking.
    #[must_use]
    pub fn with_cache(config: WeaveConfig, cache: Arc<dyn AssemblyCache>) -> Self {
        if cache.get_module(&config.runtime_module).is_none() {
            cache.insert(runtime_module(&config));
        }

        let mut images = AcceptanceFilter::new();
        let reserved = config.clone();
        images
            .blacklist
            .add_predicate(move |module: &Module| reserved.is_passthrough(&module.name));

        let modifiers: Vec<Box<dyn Modifier>> = vec![
            Box::new(LazyCompositionModifier::new(&config)),
            Box::new(DirtyModifier::new()),
        ];

        Context {
            config,
            cache,
            registry: StagedRegistry::new(),
            filters: FilterHost::new(),
            images,
            modifiers,
        }
    }

    /// The configuration
    #[must_use]
    pub fn config(&self) -> &WeaveConfig {
        &self.config
    }

    /// The assembly cache
    #[must_use]
    pub fn cache(&self) -> &dyn AssemblyCache {
        self.cache.as_ref()
    }

    /// The staged type registry
    #[must_use]
    pub fn registry(&self) -> &StagedRegistry {
        &self.registry
    }

    /// The filter host building staged types
    #[must_use]
    pub fn filters(&self) -> &FilterHost {
        &self.filters
    }

    /// Mutable access to the filter host
    pub fn filters_mut(&mut self) -> &mut FilterHost {
        &mut self.filters
    }

    /// The acceptance filter deciding which modules [`Context::run`] rewrites
    #[must_use]
    pub fn images(&self) -> &AcceptanceFilter<Module> {
        &self.images
    }

    /// Mutable access to the image acceptance filter
    pub fn images_mut(&mut self) -> &mut AcceptanceFilter<Module> {
        &mut self.images
    }

    /// The modifiers, in execution order
    #[must_use]
    pub fn modifiers(&self) -> &[Box<dyn Modifier>] {
        &self.modifiers
    }

    /// Mutable access to the modifiers, e.g. to adjust their acceptance filters
    pub fn modifiers_mut(&mut self) -> &mut Vec<Box<dyn Modifier>> {
        &mut self.modifiers
    }

    /// Append `modifier`, running after all present ones
    pub fn add_modifier(&mut self, modifier: impl Modifier + 'static) {
        self.modifiers.push(Box::new(modifier));
    }

    /// Register `module` in the assembly cache
    pub fn load(&self, module: Module) -> Arc<Module> {
        debug!("loaded module {}", module.name);
        self.cache.insert(module)
    }

    /// Map a type reference of an original module to the reference a staged type must use.
    ///
    /// - generic parameters are returned unchanged
    /// - generic instances are re-instantiated from their independently resolved parts
    /// - types of pass-through scopes and of the staging module are returned unchanged
    /// - any other named type is staged (shape only) and redirected into the staging module
    ///
    /// A generic argument naming a type whose staging is in progress (`Bar : IEquatable<Bar>`)
    /// is only redirected; its record is inserted once the outer staging completes.
    ///
    /// # Errors
    /// Propagates the errors of [`StagedRegistry::stage`], e.g.
    /// [`crate::Error::SymbolNotFound`] for a type no loaded module defines
    pub fn resolve_type(&self, reference: &TypeReference) -> Result<TypeReference> {
        self.redirect(reference, false)
    }

    fn redirect(&self, reference: &TypeReference, argument: bool) -> Result<TypeReference> {
        match reference {
            TypeReference::GenericParameter { .. } => Ok(reference.clone()),
            TypeReference::GenericInstance { element, arguments } => {
                let element = self.redirect(element, argument)?;
                let arguments = arguments
                    .iter()
                    .map(|argument| self.redirect(argument, true))
                    .collect::<Result<Vec<_>>>()?;
                Ok(element.instantiate(arguments))
            }
            TypeReference::Named(name) => {
                if self.config.is_passthrough(&name.scope)
                    || name.scope == self.config.staging_module
                {
                    return Ok(reference.clone());
                }
                if !(argument && self.registry.is_staging(&name.full_name())?) {
                    self.registry.stage(reference, self)?;
                }
                Ok(reference.with_scope(&self.config.staging_module))
            }
        }
    }

    /// Stage and materialize every type of the module `root` and everything those types
    /// reference, and return the staging module holding the result.
    ///
    /// Types are materialized until no staged record is left unbuilt. Nested types are placed
    /// inside their staged enclosing type.
    ///
    /// # Errors
    /// - [`crate::Error::ModuleNotFound`] if `root` is not loaded
    /// - any error of [`StagedRegistry::materialize`]
    pub fn stage_module(&self, root: &str) -> Result<Module> {
        let module = self
            .cache
            .get_module(root)
            .ok_or_else(|| ModuleNotFound(root.to_string()))?;

        for path in module.type_paths() {
            if let Some(definition) = module.type_at(&path) {
                self.registry.materialize(&definition.reference(root), self)?;
            }
        }

        loop {
            let pending = self.registry.unbuilt()?;
            if pending.is_empty() {
                break;
            }
            for record in pending {
                let reference = record.original.reference(&record.source_scope);
                self.registry.materialize(&reference, self)?;
            }
        }

        let mut definitions = self
            .registry
            .records()?
            .iter()
            .map(|record| record.staged())
            .collect::<Result<Vec<TypeDefinition>>>()?;
        // Enclosing types first
        definitions.sort_by_key(|definition| definition.name.matches('/').count());

        let mut staged = Module::new(self.config.staging_module.clone());
        for definition in definitions {
            let parent = definition
                .name
                .rsplit_once('/')
                .map(|(outer, _)| {
                    TypeDefinition::new(definition.namespace.clone(), outer, definition.attributes)
                        .full_name()
                })
                .and_then(|outer| staged.type_path(&outer));
            match parent.and_then(|path| staged.type_at_mut(&path)) {
                Some(outer) => outer.nested_types.push(definition),
                None => staged.add_type(definition),
            }
        }

        for scope in referenced_scopes(&staged) {
            staged.add_reference(&scope);
        }
        debug!("staged {} types into {}", staged.type_paths().len(), staged.name);
        Ok(staged)
    }

    /// Transform the loaded module `name`
    ///
    /// # Errors
    /// - [`crate::Error::ModuleNotFound`] if `name` is not loaded
    /// - any error of [`Context::transform_module`]
    pub fn transform(&self, name: &str) -> Result<Module> {
        let module = self
            .cache
            .get_module(name)
            .ok_or_else(|| ModuleNotFound(name.to_string()))?;
        self.transform_module(&module)
    }

    /// Run every modifier over a copy of `original` and return the rewritten copy.
    ///
    /// # Errors
    /// Returns the first error of a modifier, or [`crate::Error::UnimportedSymbol`] if the
    /// result references a scope missing from its import table and
    /// [`WeaveConfig::verify_imports`] is set. `original` is never modified.
    pub fn transform_module(&self, original: &Module) -> Result<Module> {
        let mut module = original.clone();

        let mut changes = 0;
        for modifier in &self.modifiers {
            let applied = modifier.visit_module(&mut module, self)?;
            debug!("{}: modifier {} applied {} changes", module.name, modifier.name(), applied);
            changes += applied;
        }

        if self.config.verify_imports {
            module.verify_imports()?;
        }

        info!("{}: transformed, {} changes", module.name, changes);
        Ok(module)
    }

    /// Load the image at `locator`, rewrite it and hand it to `host`.
    ///
    /// Every module reachable from the image and accepted by [`Context::images`] is
    /// transformed; nothing is written unless all transformations succeed. Returns the exit
    /// code reported by the host.
    ///
    /// ## Arguments
    /// * 'locator'    - Where `store` finds the image
    /// * 'store'      - Reads the image, writes the rewritten modules
    /// * 'host'       - Executes the rewritten image
    /// * 'entry'      - Where execution starts
    /// * 'parameters' - Passed through to the entry point
    ///
    /// # Errors
    /// Returns the first error of the store, a transformation or the host
    pub fn run(
        &self,
        locator: &str,
        store: &dyn ImageStore,
        host: &dyn ExecutionHost,
        entry: &EntryPoint,
        parameters: &[String],
    ) -> Result<i32> {
        let root = self.load(store.load_image(locator)?);

        let mut transformed = Vec::new();
        for name in self.reachable(&root) {
            let Some(module) = self.cache.get_module(&name) else {
                continue;
            };
            if !self.images.accepts(&module) {
                debug!("{}: not accepted, left as is", name);
                continue;
            }
            transformed.push(self.transform_module(&module)?);
        }

        let mut location = locator.to_string();
        for module in &transformed {
            let written = store.write_image(module)?;
            if module.name == root.name {
                location = written;
            }
        }

        info!("{}: {} modules rewritten, executing {}", root.name, transformed.len(), location);
        host.execute(&location, entry, parameters)
    }

    /// Names of `root` and every loaded module it references, transitively
    fn reachable(&self, root: &Module) -> Vec<String> {
        let mut order = vec![root.name.clone()];
        let mut seen: BTreeSet<String> = order.iter().cloned().collect();
        let mut index = 0;
        while let Some(name) = order.get(index).cloned() {
            index += 1;
            let Some(module) = self.cache.get_module(&name) else {
                continue;
            };
            for reference in &module.references {
                if seen.insert(reference.clone()) {
                    order.push(reference.clone());
                }
            }
        }
        order
    }
}

/// Foreign scopes mentioned by the signatures of `module`
fn referenced_scopes(module: &Module) -> BTreeSet<String> {
    let mut scopes = BTreeSet::new();
    let mut record = |reference: &TypeReference| {
        if let Some(scope) = reference.scope() {
            if scope != module.name {
                scopes.insert(scope.to_string());
            }
        }
    };

    for path in module.type_paths() {
        let Some(definition) = module.type_at(&path) else {
            continue;
        };
        for reference in definition.base.iter().chain(&definition.interfaces) {
            reference.walk(&mut record);
        }
        for field in &definition.fields {
            field.field_type.walk(&mut record);
        }
        for property in &definition.properties {
            property.property_type.walk(&mut record);
        }
        for method in definition.all_methods() {
            method.return_type.walk(&mut record);
            for parameter in &method.parameters {
                parameter.parameter_type.walk(&mut record);
            }
        }
        for attribute in &definition.custom_attributes {
            attribute.attribute_type.walk(&mut record);
        }
    }
    scopes
}
