//! Method implementations: bodies, instructions, operands and opcodes.
//!
//! # Key Types
//! - [`MethodBody`] - Local variables and the instruction list of a method
//! - [`Instruction`] - An opcode with its symbolic [`Operand`]
//! - [`OpCode`] - The CIL operations understood by the rewriting engine
//! - [`Variable`] - A named, typed local variable

mod body;
mod instruction;
mod opcodes;

pub use body::{MethodBody, Variable};
pub use instruction::{Instruction, Literal, Operand};
pub use opcodes::OpCode;
