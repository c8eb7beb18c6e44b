use crate::{
    context::Context,
    filter::{FilterChain, MemberCloneFilter, TypeCloneFilter},
    metadata::typesystem::TypeDefinition,
    Result,
};

/// Owner of the chains the staged registry builds types with.
///
/// The default host clones shapes with [`TypeCloneFilter`] and member signatures with
/// [`MemberCloneFilter`]. Additional filters appended to either chain run after them, in
/// insertion order, and may add members to the stage.
#[derive(Debug, Clone)]
pub struct FilterHost {
    /// Builds the shape of a staged type
    pub type_filters: FilterChain<TypeDefinition>,
    /// Populates the members of a staged type
    pub member_filters: FilterChain<TypeDefinition>,
}

impl Default for FilterHost {
    fn default() -> Self {
        let mut host = FilterHost::empty();
        host.type_filters.add_filter(TypeCloneFilter);
        host.member_filters.add_filter(MemberCloneFilter);
        host
    }
}

impl FilterHost {
    /// Create a host with the default clone filters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a host without any filter; staged types keep only their name and attributes
    #[must_use]
    pub fn empty() -> Self {
        FilterHost {
            type_filters: FilterChain::new(),
            member_filters: FilterChain::new(),
        }
    }

    /// Build the staged shape of `original`, defined in `scope`.
    ///
    /// Types of pass-through scopes are returned as they are.
    ///
    /// # Errors
    /// Propagates the first failing type filter
    pub fn create_type(
        &self,
        original: &TypeDefinition,
        scope: &str,
        ctx: &Context,
    ) -> Result<TypeDefinition> {
        if ctx.config().is_passthrough(scope) {
            return Ok(original.clone());
        }

        let stage = TypeDefinition::new(
            original.namespace.clone(),
            original.name.clone(),
            original.attributes,
        );
        self.type_filters.process(stage, original, ctx)
    }

    /// Populate the members of `stage` from `original`
    ///
    /// # Errors
    /// Propagates the first failing member filter
    pub fn create_members(
        &self,
        stage: TypeDefinition,
        original: &TypeDefinition,
        ctx: &Context,
    ) -> Result<TypeDefinition> {
        self.member_filters.process(stage, original, ctx)
    }
}
