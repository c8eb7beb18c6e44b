//! Composable filter chains.
//!
//! A [`FilterChain`] is a set of entries over a subject type `T`: nested filters (chains
//! included) and plain predicates. [`FilterChain::check`] accepts a subject if any entry
//! accepts it. [`FilterChain::process`] threads a staged value through every nested filter
//! that accepts the original, in insertion order; the staged registry builds types this way.
//!
//! # Key Components
//!
//! - [`Filter`]: The trait implemented by filters and chains
//! - [`FilterChain`] / [`FilterEntry`]: OR-composition over entries
//! - [`AcceptanceFilter`]: Whitelist and blacklist
//! - [`AttributeFilter`]: Custom attribute based type selection
//! - [`TypeCloneFilter`] / [`MemberCloneFilter`]: The default staging filters
//! - [`FilterHost`]: Owner of the type and member chains used by the registry
//!
//! # Examples
//!
//! ```rust
//! use cilweave::filter::FilterChain;
//!
//! let mut chain: FilterChain<String> = FilterChain::new();
//! let short = chain.add_predicate(|name: &String| name.len() < 4);
//! chain.add_predicate(|name: &String| name.starts_with("App"));
//!
//! assert!(chain.check(&"Foo".to_string()));
//! assert!(chain.check(&"AppDomain".to_string()));
//! assert!(!chain.check(&"System".to_string()));
//!
//! assert!(chain.remove(&short));
//! assert!(!chain.check(&"Foo".to_string()));
//! ```

mod acceptance;
mod clone;
mod host;

use std::sync::Arc;

pub use acceptance::{AcceptanceFilter, AttributeFilter};
pub use clone::{MemberCloneFilter, TypeCloneFilter};
pub use host::FilterHost;

use crate::{context::Context, Result};

/// A filter over subjects of type `T`.
///
/// `check` decides whether the filter applies; `process` transforms a staged value given the
/// original it was derived from. Filters must never mutate the original.
pub trait Filter<T>: Send + Sync {
    /// Returns `true` if the filter accepts `subject`
    fn check(&self, subject: &T) -> bool;

    /// Transform `stage`, derived from `original`. The default returns `stage` unchanged.
    ///
    /// # Errors
    /// Implementations propagate resolution failures of the context
    fn process(&self, stage: T, original: &T, ctx: &Context) -> Result<T> {
        let _ = (original, ctx);
        Ok(stage)
    }
}

/// A predicate entry of a [`FilterChain`]
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// An entry of a [`FilterChain`], compared by identity
pub enum FilterEntry<T> {
    /// A nested filter or chain
    Filter(Arc<dyn Filter<T>>),
    /// A plain predicate
    Predicate(Predicate<T>),
}

impl<T> FilterEntry<T> {
    /// Returns `true` if the entry accepts `subject`
    pub fn check(&self, subject: &T) -> bool {
        match self {
            FilterEntry::Filter(filter) => filter.check(subject),
            FilterEntry::Predicate(predicate) => predicate(subject),
        }
    }
}

impl<T> Clone for FilterEntry<T> {
    fn clone(&self) -> Self {
        match self {
            FilterEntry::Filter(filter) => FilterEntry::Filter(filter.clone()),
            FilterEntry::Predicate(predicate) => FilterEntry::Predicate(predicate.clone()),
        }
    }
}

impl<T> PartialEq for FilterEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FilterEntry::Filter(a), FilterEntry::Filter(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (FilterEntry::Predicate(a), FilterEntry::Predicate(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl<T> std::fmt::Debug for FilterEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterEntry::Filter(filter) => write!(f, "Filter({:p})", Arc::as_ptr(filter)),
            FilterEntry::Predicate(predicate) => {
                write!(f, "Predicate({:p})", Arc::as_ptr(predicate))
            }
        }
    }
}

/// An ordered set of filter entries without duplicates
pub struct FilterChain<T> {
    entries: Vec<FilterEntry<T>>,
}

impl<T> Default for FilterChain<T> {
    fn default() -> Self {
        FilterChain {
            entries: Vec::new(),
        }
    }
}

impl<T> Clone for FilterChain<T> {
    fn clone(&self) -> Self {
        FilterChain {
            entries: self.entries.clone(),
        }
    }
}

impl<T> std::fmt::Debug for FilterChain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl<T> FilterChain<T> {
    /// Create an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `entry`. Returns `false` if the same entry is already present.
    pub fn add(&mut self, entry: FilterEntry<T>) -> bool {
        if self.contains(&entry) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Add a nested filter and return the entry handle for later removal
    pub fn add_filter(&mut self, filter: impl Filter<T> + 'static) -> FilterEntry<T> {
        let entry = FilterEntry::Filter(Arc::new(filter));
        self.entries.push(entry.clone());
        entry
    }

    /// Add a predicate and return the entry handle for later removal
    pub fn add_predicate(
        &mut self,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> FilterEntry<T> {
        let entry = FilterEntry::Predicate(Arc::new(predicate));
        self.entries.push(entry.clone());
        entry
    }

    /// Remove `entry`. Returns `false` if it was not present.
    pub fn remove(&mut self, entry: &FilterEntry<T>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|candidate| candidate != entry);
        self.entries.len() != before
    }

    /// Returns `true` if `entry` is present
    pub fn contains(&self, entry: &FilterEntry<T>) -> bool {
        self.entries.iter().any(|candidate| candidate == entry)
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the chain has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, FilterEntry<T>> {
        self.entries.iter()
    }

    /// Returns `true` if any entry accepts `subject`
    pub fn check(&self, subject: &T) -> bool {
        self.entries.iter().any(|entry| entry.check(subject))
    }

    /// Thread `stage` through every nested filter accepting `original`, in insertion order.
    /// Predicates only take part in [`FilterChain::check`].
    ///
    /// # Errors
    /// Propagates the first failing filter
    pub fn process(&self, stage: T, original: &T, ctx: &Context) -> Result<T> {
        self.entries
            .iter()
            .try_fold(stage, |stage, entry| match entry {
                FilterEntry::Filter(filter) if filter.check(original) => {
                    filter.process(stage, original, ctx)
                }
                _ => Ok(stage),
            })
    }
}

impl<'c, T> IntoIterator for &'c FilterChain<T> {
    type Item = &'c FilterEntry<T>;
    type IntoIter = std::slice::Iter<'c, FilterEntry<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<T> Filter<T> for FilterChain<T> {
    fn check(&self, subject: &T) -> bool {
        FilterChain::check(self, subject)
    }

    fn process(&self, stage: T, original: &T, ctx: &Context) -> Result<T> {
        FilterChain::process(self, stage, original, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Prefix(&'static str);

    impl Filter<String> for Prefix {
        fn check(&self, subject: &String) -> bool {
            subject.starts_with(self.0)
        }

        fn process(&self, stage: String, _original: &String, _ctx: &Context) -> Result<String> {
            Ok(format!("{stage}+{}", self.0))
        }
    }

    #[test]
    fn test_set_semantics() {
        let mut chain: FilterChain<String> = FilterChain::new();
        assert!(chain.is_empty());

        let filter = chain.add_filter(Prefix("App"));
        let predicate = chain.add_predicate(|s: &String| s.is_empty());
        assert!(chain.contains(&filter));
        assert!(chain.contains(&predicate));
        assert_eq!(chain.len(), 2);

        // No duplicates
        assert!(!chain.add(filter.clone()));
        assert_eq!(chain.len(), 2);

        assert!(chain.remove(&filter));
        assert!(!chain.contains(&filter));
        assert!(!chain.remove(&filter));

        let entries: Vec<_> = chain.iter().cloned().collect();
        assert_eq!(entries, vec![predicate.clone()]);

        chain.clear();
        assert!(chain.is_empty());
        assert!(!chain.contains(&predicate));
    }

    #[test]
    fn test_check_is_or() {
        let mut chain: FilterChain<String> = FilterChain::new();
        assert!(!chain.check(&"App".to_string()));

        chain.add_filter(Prefix("App"));
        chain.add_predicate(|s: &String| s.ends_with("Tests"));
        assert!(chain.check(&"App.Core".to_string()));
        assert!(chain.check(&"Lib.Tests".to_string()));
        assert!(!chain.check(&"Lib.Core".to_string()));
    }

    #[test]
    fn test_nested_chain() {
        let mut inner: FilterChain<String> = FilterChain::new();
        inner.add_filter(Prefix("Lib"));

        let mut outer: FilterChain<String> = FilterChain::new();
        outer.add_filter(inner);
        assert!(outer.check(&"Lib.Core".to_string()));
        assert!(!outer.check(&"App.Core".to_string()));
    }

    #[test]
    fn test_process_folds_applicable_filters() {
        let ctx = Context::default();
        let mut chain: FilterChain<String> = FilterChain::new();
        chain.add_filter(Prefix("A"));
        chain.add_filter(Prefix("App"));
        chain.add_filter(Prefix("Lib"));
        chain.add_predicate(|_: &String| true);

        let original = "App.Core".to_string();
        let staged = chain.process("x".to_string(), &original, &ctx).unwrap();
        assert_eq!(staged, "x+A+App");
        assert_eq!(original, "App.Core");

        let untouched = chain
            .process("x".to_string(), &"Other".to_string(), &ctx)
            .unwrap();
        assert_eq!(untouched, "x");
    }
}
