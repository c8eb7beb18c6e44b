//! Instruction identities.

use std::fmt;

/// Identity of an instruction within its method body.
///
/// Jump targets reference instructions by identity instead of by offset, so inserting or
/// removing instructions never invalidates a branch. Identities are allocated by the owning
/// [`crate::metadata::method::MethodBody`] and are unique within that body only; a cloned body
/// receives fresh identities.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstructionId(pub u32);

impl InstructionId {
    /// Creates a new identity from a raw value
    #[must_use]
    pub fn new(value: u32) -> Self {
        InstructionId(value)
    }

    /// Returns the raw identity value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for InstructionId {
    fn from(value: u32) -> Self {
        InstructionId(value)
    }
}

impl fmt::Debug for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}", self.0)
    }
}

impl fmt::Display for InstructionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}", self.0)
    }
}
