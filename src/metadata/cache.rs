//! Module cache shared by the resolver, the staged registry and the orchestration context.
//!
//! Locating and loading images is the job of an external collaborator; the pipeline only
//! needs "give me the module named X". [`AssemblyCache`] is that seam, and
//! [`MemoryAssemblyCache`] is the in-process implementation backed by a concurrent map.

use std::sync::Arc;

use dashmap::DashMap;

use crate::metadata::module::Module;

/// Name-keyed access to loaded modules.
///
/// Implementations must return modules with stable symbol identities for the same name:
/// the staged registry caches records by canonical type name and relies on it.
pub trait AssemblyCache: Send + Sync {
    /// Return the module called `name`, if it is known
    fn get_module(&self, name: &str) -> Option<Arc<Module>>;

    /// Register `module` under its own name, replacing any previous entry, and return the
    /// shared handle
    fn insert(&self, module: Module) -> Arc<Module>;
}

/// An [`AssemblyCache`] holding every module in memory.
///
/// # Examples
///
/// ```rust
/// use cilweave::metadata::{cache::{AssemblyCache, MemoryAssemblyCache}, module::Module};
///
/// let cache = MemoryAssemblyCache::new();
/// cache.insert(Module::new("App"));
/// assert!(cache.get_module("App").is_some());
/// assert!(cache.get_module("Other").is_none());
/// ```
#[derive(Debug, Default)]
pub struct MemoryAssemblyCache {
    modules: DashMap<String, Arc<Module>>,
}

impl MemoryAssemblyCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached modules
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if no module is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Returns `true` if a module called `name` is cached
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Names of all cached modules, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl AssemblyCache for MemoryAssemblyCache {
    fn get_module(&self, name: &str) -> Option<Arc<Module>> {
        self.modules.get(name).map(|entry| entry.value().clone())
    }

    fn insert(&self, module: Module) -> Arc<Module> {
        let module = Arc::new(module);
        self.modules.insert(module.name.clone(), module.clone());
        module
    }
}
