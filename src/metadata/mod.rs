//! The symbol model: modules, types, members and method bodies.
//!
//! Modules own their types, types own their members and nested types, methods own their
//! bodies. Everything else, base types, operand targets and member types included, is a
//! symbolic reference resolved through [`typesystem::Resolver`]. This is what allows type A
//! to hold a property of type B while B holds one of type A.
//!
//! # Modules
//!
//! - [`token`]: Instruction identities
//! - [`typesystem`]: Type references and definitions, resolver, staged registry
//! - [`members`]: Fields, properties, methods and member references
//! - [`method`]: Method bodies, instructions, operands and opcodes
//! - [`module`]: Modules and their import tables
//! - [`cache`]: The assembly cache seam

pub mod cache;
pub mod members;
pub mod method;
pub mod module;
pub mod token;
pub mod typesystem;
