//! Shared functionality for unit tests: symbol builders and a small instruction interpreter.

pub(crate) mod interpreter;
