//! # cilweave Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! of the cilweave library. Import it to get quick access to the symbol model and the
//! weaving pipeline.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilweave operations
pub use crate::Error;

/// The result type used throughout cilweave
pub use crate::Result;

/// Configuration of the weaving pipeline
pub use crate::WeaveConfig;

// ================================================================================================
// Orchestration
// ================================================================================================

/// The state of one weaving run and its external interfaces
pub use crate::context::{Context, EntryPoint, ExecutionHost, ImageStore, MemoryImageStore};

/// Module cache shared by resolution and staging
pub use crate::metadata::cache::{AssemblyCache, MemoryAssemblyCache};

// ================================================================================================
// Symbol Model
// ================================================================================================

/// Modules
pub use crate::metadata::module::Module;

/// Type system
pub use crate::metadata::typesystem::{
    ImportTable, Resolver, StagedRegistry, TypeAttributes, TypeDefinition, TypeName,
    TypeReference,
};

/// Members
pub use crate::metadata::members::{
    CustomAttribute, FieldAttributes, FieldDefinition, FieldReference, MethodAttributes,
    MethodDefinition, MethodReference, Parameter, PropertyDefinition,
};

/// Method bodies
pub use crate::metadata::method::{Instruction, Literal, MethodBody, OpCode, Operand, Variable};

/// Instruction identities
pub use crate::metadata::token::InstructionId;

// ================================================================================================
// Pipeline
// ================================================================================================

/// Filters
pub use crate::filter::{AcceptanceFilter, Filter, FilterChain, FilterEntry, FilterHost};

/// Body cloning and template synthesis
pub use crate::rewrite::{duplicate_body, OperandResolver, Template, TemplateSynthesizer};

/// Modifiers
pub use crate::modifiers::{DirtyModifier, LazyCompositionModifier, Modifier};
