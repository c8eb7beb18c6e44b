// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # cilweave
//!
//! A transformation engine for compiled CIL programs. `cilweave` takes the modules of a
//! program image (types, members, and method bodies as instruction streams over symbolic
//! operands) and produces a modified image in which selected members are rewritten or
//! synthesized, while everything else keeps behaving identically. It weaves cross-cutting
//! behavior into programs whose source is not available:
//!
//! - **Dirty-flag tracking** - every state mutation of a tracked type raises a flag property
//! - **Lazy composition** - references to resolvable objects are held weakly and resolved
//!   again by identifier when the object was collected
//!
//! ## Architecture
//!
//! - **Symbol model** ([`metadata`]) - Modules, types, members and bodies. Types reference
//!   each other symbolically through [`metadata::typesystem::TypeReference`], which makes
//!   cyclic type graphs cheap to represent.
//! - **Resolver / importer** ([`metadata::typesystem::Resolver`]) - Cross-module lookups,
//!   capability checks through interface and base chains, import tables.
//! - **Staged registry** ([`metadata::typesystem::StagedRegistry`]) - Memoized, two-phase,
//!   cycle-safe copies of types into a staging module.
//! - **Filters** ([`filter`]) - Composable OR-chains deciding what is staged and how.
//! - **Rewriting** ([`rewrite`]) - The instruction cloner with operand substitution and jump
//!   remapping, and the template synthesizer built on it.
//! - **Modifiers** ([`modifiers`]) - Visitors applying the weaving behaviors.
//! - **Orchestration** ([`Context`]) - Owns all of the above for one run.
//!
//! ## Quick Start
//!
//! ```rust
//! use cilweave::prelude::*;
//!
//! let context = Context::default();
//! let mut app = Module::new("App");
//! app.add_reference("mscorlib");
//! app.add_type(TypeDefinition::new("App", "Program", TypeAttributes::PUBLIC));
//! context.load(app);
//!
//! let woven = context.transform("App")?;
//! assert!(woven.find_type("App.Program").is_some());
//! # Ok::<(), cilweave::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result`]. Nothing is retried internally: errors
//! propagate to the [`Context`], which leaves the affected module untouched.
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger itself.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use cilweave::prelude::*;
///
/// let config = WeaveConfig::strict();
/// let context = Context::new(config);
/// assert!(context.registry().is_empty()?);
/// # Ok::<(), cilweave::Error>(())
/// ```
pub mod prelude;

/// Weaving configuration: symbol names the pipeline keys on and the bounds of its walks
pub mod config;

/// Orchestration: the [`Context`] of a run and the interfaces to image storage and execution
pub mod context;

/// Filter chains and the filters used for staging
///
/// # Key Types
///
/// - [`filter::FilterChain`] - OR-composition of nested filters and predicates
/// - [`filter::AcceptanceFilter`] - Whitelist and blacklist
/// - [`filter::FilterHost`] - The type and member chains of the staged registry
pub mod filter;

/// The symbol model: modules, types, members, method bodies
///
/// This module also hosts the resolver and the staged type registry, both operating on the
/// type system.
pub mod metadata;

/// Modifiers weaving behavior into modules
///
/// # Key Types
///
/// - [`modifiers::Modifier`] - The visitor trait
/// - [`modifiers::DirtyModifier`] - Dirty-flag change tracking
/// - [`modifiers::LazyCompositionModifier`] - Lazily resolved composed references
pub mod modifiers;

/// Method body cloning and template based member synthesis
pub mod rewrite;

pub use config::WeaveConfig;
pub use context::Context;

/// `cilweave` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`]. This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `cilweave` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;
