//! Instruction and operand representation.
//!
//! Operands are symbolic: members and types are referenced by name through
//! [`crate::metadata::members::MethodReference`], [`crate::metadata::members::FieldReference`]
//! and [`crate::metadata::typesystem::TypeReference`], jump targets by
//! [`crate::metadata::token::InstructionId`]. Nothing in an instruction depends on byte
//! offsets, which is what allows bodies to be spliced and cloned freely.

use std::fmt;

use crate::metadata::{
    members::{FieldReference, MethodReference},
    method::OpCode,
    token::InstructionId,
    typesystem::TypeReference,
};

/// A constant embedded in the instruction stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// 32-bit integer (`ldc.i4` and friends)
    Int32(i32),
    /// 64-bit integer (`ldc.i8`)
    Int64(i64),
    /// 32-bit floating point (`ldc.r4`)
    Float32(f32),
    /// 64-bit floating point (`ldc.r8`)
    Float64(f64),
    /// User string (`ldstr`), also the carrier of member names handed to an
    /// [`crate::rewrite::OperandResolver`]
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int32(value) => write!(f, "{value}"),
            Literal::Int64(value) => write!(f, "{value}"),
            Literal::Float32(value) => write!(f, "{value}"),
            Literal::Float64(value) => write!(f, "{value}"),
            Literal::String(value) => write!(f, "\"{value}\""),
        }
    }
}

/// The operand of an instruction.
///
/// Dispatching on the operand kind is exhaustive everywhere in the crate; there is no open
/// ended "object" operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand present
    None,
    /// Constant value
    Literal(Literal),
    /// Type reference (`newarr`, `box`, `castclass`, `ldtoken`, ...)
    Type(TypeReference),
    /// Method reference (`call`, `callvirt`, `newobj`, ...)
    Method(MethodReference),
    /// Field reference (`ldfld`, `stfld`, ...)
    Field(FieldReference),
    /// Local variable index
    Variable(u16),
    /// Method argument index
    Argument(u16),
    /// Jump target, identity based
    Target(InstructionId),
    /// Jump table of a `switch`
    Switch(Vec<InstructionId>),
}

impl Operand {
    /// Short name of the operand kind, used in diagnostics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Operand::None => "none",
            Operand::Literal(_) => "literal",
            Operand::Type(_) => "type",
            Operand::Method(_) => "method",
            Operand::Field(_) => "field",
            Operand::Variable(_) => "variable",
            Operand::Argument(_) => "argument",
            Operand::Target(_) => "target",
            Operand::Switch(_) => "switch",
        }
    }

    /// Returns `true` if the operand refers to other instructions of the same body
    #[must_use]
    pub fn is_jump_target(&self) -> bool {
        matches!(self, Operand::Target(_) | Operand::Switch(_))
    }

    /// Invoke `visit` for every type reference the operand mentions, including declaring,
    /// parameter, return and generic argument types
    pub fn walk_types<F: FnMut(&TypeReference)>(&self, visit: &mut F) {
        match self {
            Operand::Type(ty) => ty.walk(visit),
            Operand::Method(method) => method.walk_types(visit),
            Operand::Field(field) => {
                field.declaring_type.walk(visit);
                field.field_type.walk(visit);
            }
            _ => {}
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Literal(literal) => write!(f, "{literal}"),
            Operand::Type(ty) => write!(f, "{}", ty.full_name()),
            Operand::Method(method) => write!(f, "{method}"),
            Operand::Field(field) => write!(f, "{field}"),
            Operand::Variable(index) => write!(f, "V_{index}"),
            Operand::Argument(index) => write!(f, "A_{index}"),
            Operand::Target(id) => write!(f, "{id}"),
            Operand::Switch(targets) => {
                let targets = targets
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "({targets})")
            }
        }
    }
}

/// A single instruction of a method body.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Identity within the owning body, the anchor for jump targets
    pub id: InstructionId,
    /// The operation
    pub opcode: OpCode,
    /// The operand
    pub operand: Operand,
}

impl Instruction {
    /// Returns `true` if this instruction transfers control to other instructions of the body
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.operand.is_jump_target()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::None => write!(f, "{}: {}", self.id, self.opcode),
            _ => write!(f, "{}: {} {}", self.id, self.opcode, self.operand),
        }
    }
}
