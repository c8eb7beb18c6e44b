use crate::{
    filter::{Filter, FilterChain},
    metadata::typesystem::TypeDefinition,
};

/// Whitelist and blacklist over subjects of type `T`.
///
/// A subject matched by the blacklist is rejected. Otherwise an empty whitelist accepts
/// everything, a populated one accepts what it matches.
///
/// # Examples
///
/// ```rust
/// use cilweave::filter::AcceptanceFilter;
///
/// let mut modules: AcceptanceFilter<String> = AcceptanceFilter::new();
/// assert!(modules.accepts(&"App".to_string()));
///
/// modules.blacklist.add_predicate(|name: &String| name.starts_with("System"));
/// assert!(!modules.accepts(&"System.Runtime".to_string()));
///
/// modules.whitelist.add_predicate(|name: &String| name == "App");
/// assert!(modules.accepts(&"App".to_string()));
/// assert!(!modules.accepts(&"Lib".to_string()));
/// ```
pub struct AcceptanceFilter<T> {
    /// Entries of which at least one must accept, unless empty
    pub whitelist: FilterChain<T>,
    /// Entries of which none may accept
    pub blacklist: FilterChain<T>,
}

impl<T> Default for AcceptanceFilter<T> {
    fn default() -> Self {
        AcceptanceFilter {
            whitelist: FilterChain::new(),
            blacklist: FilterChain::new(),
        }
    }
}

impl<T> Clone for AcceptanceFilter<T> {
    fn clone(&self) -> Self {
        AcceptanceFilter {
            whitelist: self.whitelist.clone(),
            blacklist: self.blacklist.clone(),
        }
    }
}

impl<T> std::fmt::Debug for AcceptanceFilter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceptanceFilter")
            .field("whitelist", &self.whitelist)
            .field("blacklist", &self.blacklist)
            .finish()
    }
}

impl<T> AcceptanceFilter<T> {
    /// Create a filter accepting everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `subject` passes the blacklist and the whitelist
    pub fn accepts(&self, subject: &T) -> bool {
        if self.blacklist.check(subject) {
            return false;
        }
        self.whitelist.is_empty() || self.whitelist.check(subject)
    }
}

impl<T> Filter<T> for AcceptanceFilter<T> {
    fn check(&self, subject: &T) -> bool {
        self.accepts(subject)
    }
}

/// Accepts types carrying any of the configured custom attributes
#[derive(Debug, Clone, Default)]
pub struct AttributeFilter {
    attributes: Vec<String>,
}

impl AttributeFilter {
    /// Create a filter accepting types carrying one of `attributes` (full names)
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AttributeFilter {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    /// The attribute names this filter accepts
    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }
}

impl Filter<TypeDefinition> for AttributeFilter {
    fn check(&self, subject: &TypeDefinition) -> bool {
        self.attributes
            .iter()
            .any(|attribute| subject.has_custom_attribute(attribute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        members::CustomAttribute,
        typesystem::{TypeAttributes, TypeReference},
    };

    #[test]
    fn test_blacklist_wins() {
        let mut filter: AcceptanceFilter<String> = AcceptanceFilter::new();
        filter.whitelist.add_predicate(|s: &String| s.starts_with("App"));
        filter.blacklist.add_predicate(|s: &String| s.ends_with("Tests"));

        assert!(filter.accepts(&"App.Core".to_string()));
        assert!(!filter.accepts(&"App.Tests".to_string()));
        assert!(!filter.accepts(&"Lib.Core".to_string()));
    }

    #[test]
    fn test_attribute_filter() {
        let filter = AttributeFilter::new(["App.WeaveAttribute"]);
        let mut ty = TypeDefinition::new("App", "Foo", TypeAttributes::PUBLIC);
        assert!(!filter.check(&ty));

        ty.custom_attributes.push(CustomAttribute::new(TypeReference::named(
            "App",
            "App",
            "WeaveAttribute",
        )));
        assert!(filter.check(&ty));

        let mut acceptor: AcceptanceFilter<TypeDefinition> = AcceptanceFilter::new();
        acceptor.whitelist.add_filter(filter);
        assert!(acceptor.accepts(&ty));
    }
}
