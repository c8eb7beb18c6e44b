//! CIL opcodes (ECMA-335 Partition III) understood by the rewriting engine.
//!
//! Each variant renders as its mnemonic (`ldarg.0`, `stfld`, ...). Opcodes are grouped by the
//! properties the pipeline cares about: whether they branch (their operand is a jump target),
//! and whether they mutate state observable outside the evaluation stack.

use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

/// The operation performed by an [`crate::metadata::method::Instruction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount, IntoStaticStr)]
#[allow(missing_docs)]
pub enum OpCode {
    #[strum(serialize = "nop")]
    Nop,
    #[strum(serialize = "break")]
    Break,

    #[strum(serialize = "ldarg.0")]
    Ldarg0,
    #[strum(serialize = "ldarg.1")]
    Ldarg1,
    #[strum(serialize = "ldarg.2")]
    Ldarg2,
    #[strum(serialize = "ldarg.3")]
    Ldarg3,
    #[strum(serialize = "ldarg.s")]
    LdargS,
    #[strum(serialize = "ldarg")]
    Ldarg,
    #[strum(serialize = "ldarga")]
    Ldarga,
    #[strum(serialize = "starg.s")]
    StargS,
    #[strum(serialize = "starg")]
    Starg,

    #[strum(serialize = "ldloc.0")]
    Ldloc0,
    #[strum(serialize = "ldloc.1")]
    Ldloc1,
    #[strum(serialize = "ldloc.2")]
    Ldloc2,
    #[strum(serialize = "ldloc.3")]
    Ldloc3,
    #[strum(serialize = "ldloc.s")]
    LdlocS,
    #[strum(serialize = "ldloc")]
    Ldloc,
    #[strum(serialize = "ldloca")]
    Ldloca,
    #[strum(serialize = "stloc.0")]
    Stloc0,
    #[strum(serialize = "stloc.1")]
    Stloc1,
    #[strum(serialize = "stloc.2")]
    Stloc2,
    #[strum(serialize = "stloc.3")]
    Stloc3,
    #[strum(serialize = "stloc.s")]
    StlocS,
    #[strum(serialize = "stloc")]
    Stloc,

    #[strum(serialize = "ldnull")]
    Ldnull,
    #[strum(serialize = "ldc.i4.m1")]
    LdcI4M1,
    #[strum(serialize = "ldc.i4.0")]
    LdcI40,
    #[strum(serialize = "ldc.i4.1")]
    LdcI41,
    #[strum(serialize = "ldc.i4.s")]
    LdcI4S,
    #[strum(serialize = "ldc.i4")]
    LdcI4,
    #[strum(serialize = "ldc.i8")]
    LdcI8,
    #[strum(serialize = "ldc.r4")]
    LdcR4,
    #[strum(serialize = "ldc.r8")]
    LdcR8,
    #[strum(serialize = "ldstr")]
    Ldstr,

    #[strum(serialize = "dup")]
    Dup,
    #[strum(serialize = "pop")]
    Pop,

    #[strum(serialize = "jmp")]
    Jmp,
    #[strum(serialize = "call")]
    Call,
    #[strum(serialize = "callvirt")]
    Callvirt,
    #[strum(serialize = "newobj")]
    Newobj,
    #[strum(serialize = "ret")]
    Ret,

    #[strum(serialize = "br.s")]
    BrS,
    #[strum(serialize = "br")]
    Br,
    #[strum(serialize = "brfalse.s")]
    BrfalseS,
    #[strum(serialize = "brfalse")]
    Brfalse,
    #[strum(serialize = "brtrue.s")]
    BrtrueS,
    #[strum(serialize = "brtrue")]
    Brtrue,
    #[strum(serialize = "beq")]
    Beq,
    #[strum(serialize = "bne.un")]
    BneUn,
    #[strum(serialize = "bge")]
    Bge,
    #[strum(serialize = "bgt")]
    Bgt,
    #[strum(serialize = "ble")]
    Ble,
    #[strum(serialize = "blt")]
    Blt,
    #[strum(serialize = "switch")]
    Switch,
    #[strum(serialize = "leave.s")]
    LeaveS,
    #[strum(serialize = "leave")]
    Leave,
    #[strum(serialize = "endfinally")]
    Endfinally,
    #[strum(serialize = "throw")]
    Throw,

    #[strum(serialize = "ldfld")]
    Ldfld,
    #[strum(serialize = "ldflda")]
    Ldflda,
    #[strum(serialize = "stfld")]
    Stfld,
    #[strum(serialize = "ldsfld")]
    Ldsfld,
    #[strum(serialize = "ldsflda")]
    Ldsflda,
    #[strum(serialize = "stsfld")]
    Stsfld,

    #[strum(serialize = "ldind.i4")]
    LdindI4,
    #[strum(serialize = "ldind.ref")]
    LdindRef,
    #[strum(serialize = "stind.i")]
    StindI,
    #[strum(serialize = "stind.i1")]
    StindI1,
    #[strum(serialize = "stind.i2")]
    StindI2,
    #[strum(serialize = "stind.i4")]
    StindI4,
    #[strum(serialize = "stind.i8")]
    StindI8,
    #[strum(serialize = "stind.r4")]
    StindR4,
    #[strum(serialize = "stind.r8")]
    StindR8,
    #[strum(serialize = "stind.ref")]
    StindRef,
    #[strum(serialize = "ldobj")]
    Ldobj,
    #[strum(serialize = "stobj")]
    Stobj,

    #[strum(serialize = "newarr")]
    Newarr,
    #[strum(serialize = "ldlen")]
    Ldlen,
    #[strum(serialize = "ldelem")]
    Ldelem,
    #[strum(serialize = "ldelem.i4")]
    LdelemI4,
    #[strum(serialize = "ldelem.ref")]
    LdelemRef,
    #[strum(serialize = "stelem")]
    Stelem,
    #[strum(serialize = "stelem.i")]
    StelemI,
    #[strum(serialize = "stelem.i1")]
    StelemI1,
    #[strum(serialize = "stelem.i2")]
    StelemI2,
    #[strum(serialize = "stelem.i4")]
    StelemI4,
    #[strum(serialize = "stelem.i8")]
    StelemI8,
    #[strum(serialize = "stelem.r4")]
    StelemR4,
    #[strum(serialize = "stelem.r8")]
    StelemR8,
    #[strum(serialize = "stelem.ref")]
    StelemRef,

    #[strum(serialize = "ldtoken")]
    Ldtoken,
    #[strum(serialize = "castclass")]
    Castclass,
    #[strum(serialize = "isinst")]
    Isinst,
    #[strum(serialize = "box")]
    Box,
    #[strum(serialize = "unbox.any")]
    UnboxAny,
    #[strum(serialize = "initobj")]
    Initobj,

    #[strum(serialize = "add")]
    Add,
    #[strum(serialize = "sub")]
    Sub,
    #[strum(serialize = "mul")]
    Mul,
    #[strum(serialize = "div")]
    Div,
    #[strum(serialize = "ceq")]
    Ceq,
    #[strum(serialize = "cgt")]
    Cgt,
    #[strum(serialize = "clt")]
    Clt,
    #[strum(serialize = "conv.i4")]
    ConvI4,
}

impl OpCode {
    /// Returns the mnemonic of this opcode
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }

    /// Returns `true` if the operand of this opcode is a single jump target.
    ///
    /// `switch` is not included, it carries a table of targets.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            OpCode::BrS
                | OpCode::Br
                | OpCode::BrfalseS
                | OpCode::Brfalse
                | OpCode::BrtrueS
                | OpCode::Brtrue
                | OpCode::Beq
                | OpCode::BneUn
                | OpCode::Bge
                | OpCode::Bgt
                | OpCode::Ble
                | OpCode::Blt
                | OpCode::LeaveS
                | OpCode::Leave
        )
    }

    /// Returns `true` for opcodes that store into an argument, array element, field, static
    /// field or address, i.e. every store that is observable outside of the evaluation stack
    /// and the method's own locals.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            OpCode::Starg
                | OpCode::StargS
                | OpCode::Stelem
                | OpCode::StelemI
                | OpCode::StelemI1
                | OpCode::StelemI2
                | OpCode::StelemI4
                | OpCode::StelemI8
                | OpCode::StelemR4
                | OpCode::StelemR8
                | OpCode::StelemRef
                | OpCode::Stfld
                | OpCode::StindI
                | OpCode::StindI1
                | OpCode::StindI2
                | OpCode::StindI4
                | OpCode::StindI8
                | OpCode::StindR4
                | OpCode::StindR8
                | OpCode::StindRef
                | OpCode::Stobj
                | OpCode::Stsfld
        )
    }

    /// Returns `true` for opcodes after which execution never falls through
    #[must_use]
    pub fn ends_flow(&self) -> bool {
        matches!(
            self,
            OpCode::Ret
                | OpCode::Throw
                | OpCode::Br
                | OpCode::BrS
                | OpCode::Leave
                | OpCode::LeaveS
                | OpCode::Endfinally
                | OpCode::Jmp
        )
    }

    /// For `ldloc.N` and `stloc.N`, the long form and the implicit local index `N`
    #[must_use]
    pub fn implicit_local(&self) -> Option<(OpCode, u16)> {
        match self {
            OpCode::Ldloc0 => Some((OpCode::Ldloc, 0)),
            OpCode::Ldloc1 => Some((OpCode::Ldloc, 1)),
            OpCode::Ldloc2 => Some((OpCode::Ldloc, 2)),
            OpCode::Ldloc3 => Some((OpCode::Ldloc, 3)),
            OpCode::Stloc0 => Some((OpCode::Stloc, 0)),
            OpCode::Stloc1 => Some((OpCode::Stloc, 1)),
            OpCode::Stloc2 => Some((OpCode::Stloc, 2)),
            OpCode::Stloc3 => Some((OpCode::Stloc, 3)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_mnemonics() {
        assert_eq!(OpCode::Ldarg0.mnemonic(), "ldarg.0");
        assert_eq!(OpCode::Stfld.to_string(), "stfld");
        assert_eq!(OpCode::UnboxAny.mnemonic(), "unbox.any");
    }

    #[test]
    fn test_mnemonics_unique() {
        let mut seen = std::collections::HashSet::new();
        for opcode in OpCode::iter() {
            assert!(seen.insert(opcode.mnemonic()), "duplicate {opcode}");
        }
        assert_eq!(seen.len(), OpCode::COUNT);
    }

    #[test]
    fn test_classification() {
        assert!(OpCode::Brtrue.is_branch());
        assert!(OpCode::LeaveS.is_branch());
        assert!(!OpCode::Switch.is_branch());
        assert!(!OpCode::Call.is_branch());

        assert!(OpCode::Stfld.is_mutating());
        assert!(OpCode::Stsfld.is_mutating());
        assert!(OpCode::StargS.is_mutating());
        assert!(!OpCode::Stloc0.is_mutating());
        assert!(!OpCode::Ldfld.is_mutating());

        assert!(OpCode::Ret.ends_flow());
        assert!(!OpCode::Brtrue.ends_flow());

        assert_eq!(OpCode::Ldloc2.implicit_local(), Some((OpCode::Ldloc, 2)));
        assert_eq!(OpCode::Stloc0.implicit_local(), Some((OpCode::Stloc, 0)));
        assert_eq!(OpCode::LdlocS.implicit_local(), None);
    }
}
