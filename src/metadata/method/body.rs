//! Method bodies: local variables and the instruction list.
//!
//! A [`MethodBody`] allocates the identities of its instructions. Instructions can be
//! appended, inserted after an existing instruction or replaced in place; jump targets stay
//! valid across all of these edits since they reference identities, not positions.

use crate::{
    metadata::{
        method::{Instruction, OpCode, Operand},
        token::InstructionId,
        typesystem::TypeReference,
    },
    Result,
};

/// A local variable of a method body.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Name of the variable (`V_n` when the image carries no debug names)
    pub name: String,
    /// Declared type
    pub variable_type: TypeReference,
}

impl Variable {
    /// Create a new variable
    pub fn new(name: impl Into<String>, variable_type: TypeReference) -> Self {
        Variable {
            name: name.into(),
            variable_type,
        }
    }
}

/// The implementation of a method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    /// Initialize locals to zero
    pub init_locals: bool,
    /// Local variables, indexed by [`Operand::Variable`]
    pub variables: Vec<Variable>,
    /// Instructions in execution layout order
    pub instructions: Vec<Instruction>,
    /// Next identity to hand out
    next_id: u32,
}

impl Default for MethodBody {
    fn default() -> Self {
        MethodBody {
            init_locals: true,
            variables: Vec::new(),
            instructions: Vec::new(),
            next_id: 0,
        }
    }
}

impl MethodBody {
    /// Create an empty body
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh instruction identity
    pub fn allocate_id(&mut self) -> InstructionId {
        let id = InstructionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Create a detached instruction carrying a fresh identity of this body
    pub fn create(&mut self, opcode: OpCode, operand: Operand) -> Instruction {
        Instruction {
            id: self.allocate_id(),
            opcode,
            operand,
        }
    }

    /// Append a new instruction and return its identity
    pub fn emit(&mut self, opcode: OpCode, operand: Operand) -> InstructionId {
        let instruction = self.create(opcode, operand);
        let id = instruction.id;
        self.instructions.push(instruction);
        id
    }

    /// Append a new instruction without operand and return its identity
    pub fn emit_op(&mut self, opcode: OpCode) -> InstructionId {
        self.emit(opcode, Operand::None)
    }

    /// Append a new variable and return its index
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the body already holds the maximum number of
    /// locals addressable by an instruction
    pub fn add_variable(&mut self, variable: Variable) -> Result<u16> {
        let index = u16::try_from(self.variables.len())
            .map_err(|_| malformed_error!("Too many local variables"))?;
        self.variables.push(variable);
        Ok(index)
    }

    /// Position of the instruction with the given identity
    #[must_use]
    pub fn position_of(&self, id: InstructionId) -> Option<usize> {
        self.instructions.iter().position(|instr| instr.id == id)
    }

    /// Access the instruction with the given identity
    #[must_use]
    pub fn get(&self, id: InstructionId) -> Option<&Instruction> {
        self.instructions.iter().find(|instr| instr.id == id)
    }

    /// Insert detached instructions immediately after the instruction `anchor`, in order.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `anchor` is not part of this body
    pub fn insert_after(
        &mut self,
        anchor: InstructionId,
        instructions: Vec<Instruction>,
    ) -> Result<()> {
        let position = self
            .position_of(anchor)
            .ok_or_else(|| malformed_error!("Instruction {} is not part of this body", anchor))?;

        let tail = self.instructions.split_off(position + 1);
        self.instructions.extend(instructions);
        self.instructions.extend(tail);
        Ok(())
    }

    /// Replace the opcode and operand of the instruction at `index`, keeping its identity.
    ///
    /// Keeping the identity matters: other jumps may already target this instruction.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `index` is out of range
    pub fn replace(&mut self, index: usize, opcode: OpCode, operand: Operand) -> Result<()> {
        let instruction = self
            .instructions
            .get_mut(index)
            .ok_or_else(|| malformed_error!("Instruction index {} out of range", index))?;
        instruction.opcode = opcode;
        instruction.operand = operand;
        Ok(())
    }

    /// Remove all instructions and variables, keeping the identity counter
    pub fn clear(&mut self) {
        self.instructions.clear();
        self.variables.clear();
    }

    /// Number of instructions
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the body has no instructions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// The opcode sequence of the body
    #[must_use]
    pub fn opcodes(&self) -> Vec<OpCode> {
        self.instructions.iter().map(|instr| instr.opcode).collect()
    }

    /// Check that every jump target and variable index refers to something inside the body
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] describing the first dangling reference
    pub fn verify(&self) -> Result<()> {
        for instruction in &self.instructions {
            match &instruction.operand {
                Operand::Target(target) => {
                    if self.position_of(*target).is_none() {
                        return Err(malformed_error!(
                            "{} jumps to {} outside of the body",
                            instruction,
                            target
                        ));
                    }
                }
                Operand::Switch(targets) => {
                    if let Some(target) = targets.iter().find(|t| self.position_of(**t).is_none()) {
                        return Err(malformed_error!(
                            "{} jumps to {} outside of the body",
                            instruction,
                            target
                        ));
                    }
                }
                Operand::Variable(index) => {
                    if usize::from(*index) >= self.variables.len() {
                        return Err(malformed_error!(
                            "{} uses undeclared local {}",
                            instruction,
                            index
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_allocates_unique_ids() {
        let mut body = MethodBody::new();
        let a = body.emit_op(OpCode::Nop);
        let b = body.emit_op(OpCode::Ret);
        assert_ne!(a, b);
        assert_eq!(body.len(), 2);
        assert_eq!(body.position_of(b), Some(1));
    }

    #[test]
    fn test_insert_after_keeps_targets() {
        let mut body = MethodBody::new();
        let ret = body.create(OpCode::Ret, Operand::None);
        let ret_id = ret.id;
        let branch = body.emit(OpCode::Br, Operand::Target(ret_id));
        body.instructions.push(ret);

        let extra = vec![
            body.create(OpCode::Nop, Operand::None),
            body.create(OpCode::Nop, Operand::None),
        ];
        body.insert_after(branch, extra).unwrap();

        assert_eq!(
            body.opcodes(),
            vec![OpCode::Br, OpCode::Nop, OpCode::Nop, OpCode::Ret]
        );
        assert_eq!(body.instructions[0].operand, Operand::Target(ret_id));
        assert!(body.verify().is_ok());
    }

    #[test]
    fn test_insert_after_unknown_anchor() {
        let mut body = MethodBody::new();
        body.emit_op(OpCode::Ret);
        assert!(body.insert_after(InstructionId(99), Vec::new()).is_err());
    }

    #[test]
    fn test_replace_keeps_identity() {
        let mut body = MethodBody::new();
        let id = body.emit_op(OpCode::Nop);
        body.replace(0, OpCode::Br, Operand::Target(id)).unwrap();
        assert_eq!(body.instructions[0].id, id);
        assert_eq!(body.instructions[0].opcode, OpCode::Br);
        assert!(body.replace(3, OpCode::Nop, Operand::None).is_err());
    }

    #[test]
    fn test_verify_detects_dangling_references() {
        let mut body = MethodBody::new();
        body.emit(OpCode::Br, Operand::Target(InstructionId(42)));
        assert!(body.verify().is_err());

        let mut body = MethodBody::new();
        body.emit(OpCode::Ldloc, Operand::Variable(0));
        assert!(body.verify().is_err());
        body.add_variable(Variable::new(
            "V_0",
            TypeReference::named("mscorlib", "System", "Int32"),
        ))
        .unwrap();
        assert!(body.verify().is_ok());
    }
}
