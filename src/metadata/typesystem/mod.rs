//! Type system of the transformation engine.
//!
//! Types are referenced symbolically through [`TypeReference`] and defined by
//! [`TypeDefinition`]s owned by modules. References are resolved on demand by a [`Resolver`],
//! and staged across module boundaries by the [`StagedRegistry`].
//!
//! # Key Components
//!
//! - [`TypeReference`]: Named type, generic instance or generic parameter
//! - [`TypeDefinition`]: A type with its members and nested types
//! - [`Resolver`]: Cross-module lookup, capability walks, member lookup and imports
//! - [`ImportTable`]: Scopes recorded while cloning, applied to the target afterwards
//! - [`StagedRegistry`]: Memoized two-phase staging of types
//!
//! # Examples
//!
//! ```rust
//! use cilweave::metadata::typesystem::{TypeAttributes, TypeDefinition};
//!
//! let mut foo = TypeDefinition::new("App", "Foo", TypeAttributes::PUBLIC);
//! foo.add_nested(TypeDefinition::new("", "Cache", TypeAttributes::NESTED_PRIVATE));
//!
//! assert_eq!(foo.nested_types[0].full_name(), "App.Foo/Cache");
//! assert_eq!(foo.reference("App").to_string(), "[App]App.Foo");
//! ```

mod base;
mod definition;
mod registry;
mod resolver;

pub use base::{TypeName, TypeReference};
pub use definition::{TypeAttributes, TypeDefinition};
pub use registry::{StagedRegistry, TypeInformation, TypeInformationRc};
pub use resolver::{ImportTable, ResolvedMember, Resolver};
