//! Code generation: body cloning and template synthesis.
//!
//! [`duplicate_body`] is the primitive: a deep copy of a method body with every symbolic
//! operand routed through an [`OperandResolver`] and control flow remapped.
//! [`TemplateSynthesizer`] builds on it to specialize a canonical property implementation for
//! a concrete target.

mod cloner;
mod template;

pub use cloner::{duplicate_body, OperandResolver, Verbatim};
pub use template::{Synthesis, Template, TemplateSynthesizer};
