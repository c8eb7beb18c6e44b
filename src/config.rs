//! Weaving configuration.
//!
//! [`WeaveConfig`] names the symbols the pipeline keys on (capability interfaces, the
//! exclusion attribute, the dirty-flag property, ...) and bounds its walks. The defaults match
//! the runtime support module built by [`crate::modifiers::lazy::runtime_module`].

use crate::metadata::typesystem::TypeReference;

/// Configuration shared by every stage of the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaveConfig {
    /// Name of the module that receives staged types
    pub staging_module: String,

    /// Scopes whose types are never staged, only referenced (runtime libraries)
    pub passthrough_scopes: Vec<String>,

    /// Name of the runtime support module (weak references, capability interfaces)
    pub runtime_module: String,

    /// Full name of the attribute excluding a type or member from every modifier
    pub exclusion_attribute: String,

    /// Full name of the capability interface enabling dirty-flag tracking
    pub dirty_capability: String,

    /// Name of the boolean property set by dirty-flag tracking
    pub dirty_property: String,

    /// Full name of the capability interface enabling lazy composition on a declaring type
    pub type_resolver_capability: String,

    /// Full name of the open generic capability a composed property type must implement
    pub resolvable_capability: String,

    /// Name of the member exposing the stable identifier of a resolvable type
    pub identifier_member: String,

    /// Maximum depth of base-type and interface walks (default: 64)
    pub max_recursion_depth: usize,

    /// Reject transformed modules referencing scopes missing from their import table
    pub verify_imports: bool,

    /// Fail instead of warn when a referenced module cannot be loaded
    pub require_references: bool,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            staging_module: "Cilweave.Staged".to_string(),
            passthrough_scopes: vec![
                "mscorlib".to_string(),
                "netstandard".to_string(),
                "System.Runtime".to_string(),
                "System.Private.CoreLib".to_string(),
            ],
            runtime_module: "Cilweave.Runtime".to_string(),
            exclusion_attribute: "Cilweave.Runtime.NoWeaveAttribute".to_string(),
            dirty_capability: "Cilweave.Runtime.IDirty".to_string(),
            dirty_property: "Dirty".to_string(),
            type_resolver_capability: "Cilweave.Runtime.ITypeResolver".to_string(),
            resolvable_capability: "Cilweave.Runtime.IResolvable`1".to_string(),
            identifier_member: "UniqueIdentifier".to_string(),
            max_recursion_depth: 64,
            verify_imports: true,
            require_references: false,
        }
    }
}

impl WeaveConfig {
    /// Creates a configuration that fails on every incomplete input
    ///
    /// Unloadable module references abort resolution instead of being skipped, and walks are
    /// bounded tighter.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_recursion_depth: 32,
            verify_imports: true,
            require_references: true,
            ..Self::default()
        }
    }

    /// Returns `true` if types of `scope` are referenced as they are, never staged
    #[must_use]
    pub fn is_passthrough(&self, scope: &str) -> bool {
        scope == self.runtime_module || self.passthrough_scopes.iter().any(|s| s == scope)
    }

    /// A reference to the runtime support type called `full_name`
    #[must_use]
    pub fn runtime_type(&self, full_name: &str) -> TypeReference {
        let (namespace, name) = full_name.rsplit_once('.').unwrap_or(("", full_name));
        TypeReference::named(self.runtime_module.clone(), namespace, name)
    }
}
