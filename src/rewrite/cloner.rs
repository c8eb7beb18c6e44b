//! Deep copy of method bodies with operand substitution.
//!
//! [`duplicate_body`] copies the locals and instructions of a source method into a target
//! method. Every symbolic operand is routed through an [`OperandResolver`], decomposed into
//! its parts: a method reference is rebuilt from its resolved declaring type, name, return
//! type, parameter types and generic arguments; a generic instance from its resolved element
//! and arguments. Jump targets are structural and never reach the resolver: they are emitted
//! as `nop` placeholders first and patched once every instruction exists, since a forward
//! jump targets an instruction that is not emitted yet.
//!
//! Every symbol the clone ends up referencing is recorded in an [`ImportTable`], to be applied
//! to the target module once the clone is complete.

use crate::{
    metadata::{
        members::{FieldReference, MethodDefinition, MethodReference},
        method::{Instruction, Literal, MethodBody, OpCode, Operand, Variable},
        token::InstructionId,
        typesystem::{ImportTable, Resolver, TypeReference},
    },
    Error::UnsupportedOperand,
    Result,
};

/// Substitutes operands while a body is cloned.
///
/// `resolve` receives one operand at a time: a [`Operand::Type`] for every named type or
/// generic parameter, a [`Operand::Literal`] for constants and for member names
/// ([`Literal::String`]), together with the instruction being cloned (`None` for local
/// variable types) and the target method. It must return an operand of the same kind.
///
/// Closures of the matching shape implement this trait.
pub trait OperandResolver {
    /// Return the substitute for `operand`
    ///
    /// # Errors
    /// Implementations may fail, e.g. with [`crate::Error::MemberNotFound`]; the error
    /// aborts the clone
    fn resolve(
        &mut self,
        operand: Operand,
        instruction: Option<&Instruction>,
        target: &MethodDefinition,
    ) -> Result<Operand>;
}

impl<F> OperandResolver for F
where
    F: FnMut(Operand, Option<&Instruction>, &MethodDefinition) -> Result<Operand>,
{
    fn resolve(
        &mut self,
        operand: Operand,
        instruction: Option<&Instruction>,
        target: &MethodDefinition,
    ) -> Result<Operand> {
        self(operand, instruction, target)
    }
}

/// An [`OperandResolver`] returning every operand unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct Verbatim;

impl OperandResolver for Verbatim {
    fn resolve(
        &mut self,
        operand: Operand,
        _instruction: Option<&Instruction>,
        _target: &MethodDefinition,
    ) -> Result<Operand> {
        Ok(operand)
    }
}

/// Clone the body of `source` into `target`.
///
/// `init_locals` is copied, locals are appended with resolved types, instructions are
/// appended with resolved operands. If `target` already has locals, local accesses of the
/// clone are shifted past them and `ldloc.N` / `stloc.N` become `ldloc` / `stloc`. A source
/// without body leaves `target` untouched.
///
/// ## Arguments
/// * 'source'  - The method to clone from, never modified
/// * 'target'  - The method receiving the clone, detached from its module
/// * 'resolve' - Substitutes every symbolic operand part
/// * 'symbols' - Resolves the scopes of the produced symbols for import
/// * 'imports' - Receives every foreign scope the clone references
///
/// # Errors
/// - errors of `resolve` are propagated
/// - [`crate::Error::UnsupportedOperand`] if `resolve` returns an operand of another kind, a
///   variable index is out of range, or a jump leaves the source body
/// - [`crate::Error::SymbolNotFound`] if a produced symbol cannot be imported
pub fn duplicate_body<R: OperandResolver + ?Sized>(
    source: &MethodDefinition,
    target: &mut MethodDefinition,
    resolve: &mut R,
    symbols: &Resolver<'_>,
    imports: &mut ImportTable,
) -> Result<()> {
    let Some(source_body) = &source.body else {
        return Ok(());
    };

    let mut body = target.body.clone().unwrap_or_default();
    body.init_locals = source_body.init_locals;

    let mut substitution = Substitution {
        method: &source.name,
        resolve,
        symbols,
        imports,
        target: &*target,
    };

    let variable_base = body.variables.len();
    for (index, variable) in source_body.variables.iter().enumerate() {
        let variable_type = substitution.resolve_type(&variable.variable_type, None, index)?;
        substitution.imports.import_type(symbols, &variable_type)?;
        body.add_variable(Variable::new(variable.name.clone(), variable_type))?;
    }

    // First pass: emit, jump targets become placeholders
    let offset = body.len();
    for (index, instruction) in source_body.instructions.iter().enumerate() {
        let emitted = match &instruction.operand {
            Operand::None => match instruction.opcode.implicit_local() {
                // Appended locals are no longer addressable through the short forms
                Some((opcode, local)) if variable_base > 0 => {
                    let remapped = u16::try_from(variable_base + usize::from(local))
                        .map_err(|_| substitution.unsupported(index, &instruction.operand))?;
                    body.create(opcode, Operand::Variable(remapped))
                }
                _ => body.create(instruction.opcode, Operand::None),
            },
            Operand::Target(_) | Operand::Switch(_) => body.create(OpCode::Nop, Operand::None),
            Operand::Argument(argument) => {
                body.create(instruction.opcode, Operand::Argument(*argument))
            }
            Operand::Variable(variable) => {
                if usize::from(*variable) >= source_body.variables.len() {
                    return Err(substitution.unsupported(index, &instruction.operand));
                }
                let remapped = u16::try_from(variable_base + usize::from(*variable))
                    .map_err(|_| substitution.unsupported(index, &instruction.operand))?;
                body.create(instruction.opcode, Operand::Variable(remapped))
            }
            operand => {
                let resolved = substitution.resolve_operand(operand, instruction, index)?;
                substitution.imports.import_operand(symbols, &resolved)?;
                body.create(instruction.opcode, resolved)
            }
        };
        body.instructions.push(emitted);
    }

    // Second pass: patch placeholders, keeping their identity
    let emitted_id = |body: &MethodBody, target: InstructionId| -> Option<InstructionId> {
        source_body
            .position_of(target)
            .and_then(|position| body.instructions.get(offset + position))
            .map(|instruction| instruction.id)
    };

    for (index, instruction) in source_body.instructions.iter().enumerate() {
        let patched = match &instruction.operand {
            Operand::Target(target) => Operand::Target(
                emitted_id(&body, *target)
                    .ok_or_else(|| substitution.unsupported(index, &instruction.operand))?,
            ),
            Operand::Switch(targets) => Operand::Switch(
                targets
                    .iter()
                    .map(|target| {
                        emitted_id(&body, *target)
                            .ok_or_else(|| substitution.unsupported(index, &instruction.operand))
                    })
                    .collect::<Result<_>>()?,
            ),
            _ => continue,
        };
        body.replace(offset + index, instruction.opcode, patched)?;
    }

    target.body = Some(body);
    Ok(())
}

/// State shared by the operand decomposition of one clone
struct Substitution<'s, 'r, 'a, R: ?Sized> {
    method: &'s str,
    resolve: &'s mut R,
    symbols: &'s Resolver<'a>,
    imports: &'s mut ImportTable,
    target: &'r MethodDefinition,
}

impl<R: OperandResolver + ?Sized> Substitution<'_, '_, '_, R> {
    fn unsupported(&self, index: usize, operand: &Operand) -> crate::Error {
        UnsupportedOperand {
            method: self.method.to_string(),
            index,
            operand: format!("{} '{}'", operand.kind(), operand),
        }
    }

    fn mismatch(&self, index: usize, expected: &Operand, found: &Operand) -> crate::Error {
        UnsupportedOperand {
            method: self.method.to_string(),
            index,
            operand: format!("{} '{}' resolved to {}", expected.kind(), expected, found.kind()),
        }
    }

    fn resolve_operand(
        &mut self,
        operand: &Operand,
        instruction: &Instruction,
        index: usize,
    ) -> Result<Operand> {
        match operand {
            Operand::Literal(literal) => {
                let resolved = self.resolve.resolve(
                    Operand::Literal(literal.clone()),
                    Some(instruction),
                    self.target,
                )?;
                match resolved {
                    Operand::Literal(_) => Ok(resolved),
                    other => Err(self.mismatch(index, operand, &other)),
                }
            }
            Operand::Type(ty) => Ok(Operand::Type(self.resolve_type(
                ty,
                Some(instruction),
                index,
            )?)),
            Operand::Method(method) => Ok(Operand::Method(self.resolve_method(
                method,
                instruction,
                index,
            )?)),
            Operand::Field(field) => Ok(Operand::Field(self.resolve_field(
                field,
                instruction,
                index,
            )?)),
            other => Err(self.unsupported(index, other)),
        }
    }

    fn resolve_type(
        &mut self,
        ty: &TypeReference,
        instruction: Option<&Instruction>,
        index: usize,
    ) -> Result<TypeReference> {
        if let TypeReference::GenericInstance { element, arguments } = ty {
            let element = self.resolve_type(element, instruction, index)?;
            let arguments = arguments
                .iter()
                .map(|argument| self.resolve_type(argument, instruction, index))
                .collect::<Result<Vec<_>>>()?;
            return Ok(element.instantiate(arguments));
        }

        let original = Operand::Type(ty.clone());
        match self
            .resolve
            .resolve(original.clone(), instruction, self.target)?
        {
            Operand::Type(resolved) => Ok(resolved),
            other => Err(self.mismatch(index, &original, &other)),
        }
    }

    fn resolve_name(
        &mut self,
        name: &str,
        instruction: &Instruction,
        index: usize,
    ) -> Result<String> {
        let original = Operand::Literal(Literal::String(name.to_string()));
        match self
            .resolve
            .resolve(original.clone(), Some(instruction), self.target)?
        {
            Operand::Literal(Literal::String(resolved)) => Ok(resolved),
            other => Err(self.mismatch(index, &original, &other)),
        }
    }

    fn resolve_method(
        &mut self,
        method: &MethodReference,
        instruction: &Instruction,
        index: usize,
    ) -> Result<MethodReference> {
        let declaring_type = self.resolve_type(&method.declaring_type, Some(instruction), index)?;
        let name = self.resolve_name(&method.name, instruction, index)?;
        let return_type = self.resolve_type(&method.return_type, Some(instruction), index)?;
        let parameters = method
            .parameters
            .iter()
            .map(|parameter| self.resolve_type(parameter, Some(instruction), index))
            .collect::<Result<_>>()?;
        let generic_arguments = method
            .generic_arguments
            .iter()
            .map(|argument| self.resolve_type(argument, Some(instruction), index))
            .collect::<Result<_>>()?;

        let resolved = MethodReference {
            declaring_type,
            name,
            return_type,
            parameters,
            has_this: method.has_this,
            generic_arguments,
        };
        self.imports.import_method(self.symbols, &resolved)?;
        Ok(resolved)
    }

    fn resolve_field(
        &mut self,
        field: &FieldReference,
        instruction: &Instruction,
        index: usize,
    ) -> Result<FieldReference> {
        let resolved = FieldReference {
            declaring_type: self.resolve_type(&field.declaring_type, Some(instruction), index)?,
            name: self.resolve_name(&field.name, instruction, index)?,
            field_type: self.resolve_type(&field.field_type, Some(instruction), index)?,
        };
        self.imports.import_field(self.symbols, &resolved)?;
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::WeaveConfig,
        metadata::{
            cache::{AssemblyCache, MemoryAssemblyCache},
            members::MethodAttributes,
            module::Module,
            typesystem::{TypeAttributes, TypeDefinition},
        },
        Error,
    };

    fn int32() -> TypeReference {
        TypeReference::named("mscorlib", "System", "Int32")
    }

    fn method(name: &str) -> MethodDefinition {
        MethodDefinition::new(name, MethodAttributes::PUBLIC, int32())
    }

    /// `for (i = 0; i < 10; i++) {} if (i == 0) goto end; ... end: return i;`
    fn looping() -> MethodDefinition {
        let mut source = method("Loop");
        let mut body = MethodBody::new();
        body.add_variable(Variable::new("i", int32())).unwrap();

        let condition = body.create(OpCode::Ldloc0, Operand::None);
        let end = body.create(OpCode::Ldloc0, Operand::None);

        body.emit(OpCode::LdcI40, Operand::None);
        body.emit(OpCode::Stloc0, Operand::None);
        body.emit(OpCode::Br, Operand::Target(condition.id));
        let increment = body.emit(OpCode::Ldloc, Operand::Variable(0));
        body.emit(OpCode::LdcI41, Operand::None);
        body.emit(OpCode::Add, Operand::None);
        body.emit(OpCode::Stloc, Operand::Variable(0));
        let condition_id = condition.id;
        body.instructions.push(condition);
        body.emit(OpCode::LdcI4S, Operand::Literal(Literal::Int32(10)));
        body.emit(OpCode::Blt, Operand::Target(increment));
        body.emit(OpCode::Br, Operand::Target(end.id));
        body.instructions.push(end);
        body.emit(OpCode::Ret, Operand::None);

        assert!(body.position_of(condition_id).is_some());
        source.body = Some(body);
        source
    }

    fn with_resolver<T>(f: impl FnOnce(&Resolver<'_>) -> T) -> T {
        let module = Module::new("App");
        let resolver =
            Resolver::new(&module, &MemoryAssemblyCache::new(), &WeaveConfig::default()).unwrap();
        f(&resolver)
    }

    #[test]
    fn test_forward_and_backward_jumps() {
        let source = looping();
        let mut target = method("LoopCopy");
        let mut imports = ImportTable::new();

        with_resolver(|symbols| {
            duplicate_body(&source, &mut target, &mut Verbatim, symbols, &mut imports).unwrap();
        });

        let source_body = source.body.as_ref().unwrap();
        let cloned = target.body.as_ref().unwrap();
        assert_eq!(cloned.len(), source_body.len());
        assert_eq!(cloned.opcodes(), source_body.opcodes());
        assert!(cloned.verify().is_ok());

        for (index, instruction) in source_body.instructions.iter().enumerate() {
            if let Operand::Target(target_id) = instruction.operand {
                let source_target = source_body.position_of(target_id).unwrap();
                let Operand::Target(cloned_target) = cloned.instructions[index].operand else {
                    panic!("jump at {index} lost its target");
                };
                assert_eq!(cloned.position_of(cloned_target), Some(source_target));
            }
        }
        assert!(imports.contains("mscorlib"));
    }

    #[test]
    fn test_jump_to_jump_keeps_placeholder_identity() {
        let mut source = method("Chain");
        let mut body = MethodBody::new();
        let ret = body.create(OpCode::Ret, Operand::None);
        let second = body.create(OpCode::Br, Operand::Target(ret.id));
        body.emit(OpCode::Br, Operand::Target(second.id));
        body.instructions.push(second);
        body.instructions.push(ret);
        source.body = Some(body);

        let mut target = method("ChainCopy");
        with_resolver(|symbols| {
            duplicate_body(
                &source,
                &mut target,
                &mut Verbatim,
                symbols,
                &mut ImportTable::new(),
            )
            .unwrap();
        });

        let cloned = target.body.unwrap();
        assert_eq!(cloned.opcodes(), vec![OpCode::Br, OpCode::Br, OpCode::Ret]);
        assert_eq!(
            cloned.instructions[0].operand,
            Operand::Target(cloned.instructions[1].id)
        );
        assert_eq!(
            cloned.instructions[1].operand,
            Operand::Target(cloned.instructions[2].id)
        );
    }

    #[test]
    fn test_switch_targets() {
        let mut source = method("Dispatch");
        let mut body = MethodBody::new();
        let first = body.create(OpCode::LdcI40, Operand::None);
        let second = body.create(OpCode::LdcI41, Operand::None);
        body.emit(OpCode::Ldarg1, Operand::None);
        body.emit(OpCode::Switch, Operand::Switch(vec![second.id, first.id]));
        body.instructions.push(first);
        body.instructions.push(second);
        body.emit(OpCode::Ret, Operand::None);
        source.body = Some(body);

        let mut target = method("DispatchCopy");
        with_resolver(|symbols| {
            duplicate_body(&source, &mut target, &mut Verbatim, symbols, &mut ImportTable::new())
                .unwrap();
        });

        let cloned = target.body.unwrap();
        assert_eq!(
            cloned.instructions[1].operand,
            Operand::Switch(vec![cloned.instructions[3].id, cloned.instructions[2].id])
        );
    }

    #[test]
    fn test_locals_are_appended_after_existing_ones() {
        let string = TypeReference::named("mscorlib", "System", "String");
        let mut source = method("Read");
        let mut body = MethodBody::new();
        body.add_variable(Variable::new("i", int32())).unwrap();
        body.emit(OpCode::LdcI41, Operand::None);
        body.emit(OpCode::Stloc0, Operand::None);
        body.emit(OpCode::Ldloc0, Operand::None);
        body.emit(OpCode::Ret, Operand::None);
        source.body = Some(body);

        let mut target = method("Combined");
        let mut existing = MethodBody::new();
        existing.add_variable(Variable::new("s", string)).unwrap();
        target.body = Some(existing);

        with_resolver(|symbols| {
            duplicate_body(&source, &mut target, &mut Verbatim, symbols, &mut ImportTable::new())
                .unwrap();
        });

        let cloned = target.body.unwrap();
        assert_eq!(cloned.variables.len(), 2);
        assert_eq!(cloned.variables[1].variable_type, int32());
        assert_eq!(
            cloned.opcodes(),
            vec![OpCode::LdcI41, OpCode::Stloc, OpCode::Ldloc, OpCode::Ret]
        );
        assert_eq!(cloned.instructions[1].operand, Operand::Variable(1));
        assert_eq!(cloned.instructions[2].operand, Operand::Variable(1));
    }

    #[test]
    fn test_generic_instances_are_rebuilt_from_parts() {
        let mut lib = Module::new("Lib");
        lib.add_type(TypeDefinition::new("Lib", "Old", TypeAttributes::PUBLIC));
        lib.add_type(TypeDefinition::new("Lib", "New", TypeAttributes::PUBLIC));
        let cache = MemoryAssemblyCache::new();
        cache.insert(lib);
        let mut module = Module::new("App");
        module.add_reference("Lib");

        let list = TypeReference::named("mscorlib", "System.Collections.Generic", "List`1");
        let old = TypeReference::named("Lib", "Lib", "Old");
        let new = TypeReference::named("Lib", "Lib", "New");

        let mut source = method("Make");
        let mut body = MethodBody::new();
        body.emit(
            OpCode::Newobj,
            Operand::Method(MethodReference {
                declaring_type: list.instantiate(vec![old.clone()]),
                name: ".ctor".into(),
                return_type: TypeReference::named("mscorlib", "System", "Void"),
                parameters: Vec::new(),
                has_this: true,
                generic_arguments: Vec::new(),
            }),
        );
        body.emit(OpCode::Ret, Operand::None);
        source.body = Some(body);

        let resolver = Resolver::new(&module, &cache, &WeaveConfig::default()).unwrap();
        let mut seen = Vec::new();
        let mut substitute = |operand: Operand,
                              _: Option<&Instruction>,
                              _: &MethodDefinition|
         -> Result<Operand> {
            seen.push(operand.kind());
            Ok(match operand {
                Operand::Type(ty) if ty.same_type(&old) => Operand::Type(new.clone()),
                other => other,
            })
        };
        let mut imports = ImportTable::new();
        let mut target = method("MakeCopy");
        duplicate_body(&source, &mut target, &mut substitute, &resolver, &mut imports).unwrap();

        let Operand::Method(ctor) = &target.body.as_ref().unwrap().instructions[0].operand else {
            panic!("constructor operand lost");
        };
        assert_eq!(ctor.declaring_type, list.instantiate(vec![new]));
        assert!(seen.contains(&"literal"));
        assert!(imports.contains("Lib"));
        assert!(imports.contains("mscorlib"));
    }

    #[test]
    fn test_kind_mismatch_is_unsupported() {
        let mut source = method("Text");
        let mut body = MethodBody::new();
        body.emit(OpCode::Ldstr, Operand::Literal(Literal::String("x".into())));
        body.emit(OpCode::Ret, Operand::None);
        source.body = Some(body);

        let mut wrong =
            |_: Operand, _: Option<&Instruction>, _: &MethodDefinition| -> Result<Operand> {
                Ok(Operand::Type(int32()))
            };
        let mut target = method("TextCopy");
        let result = with_resolver(|symbols| {
            duplicate_body(&source, &mut target, &mut wrong, symbols, &mut ImportTable::new())
        });
        assert!(matches!(result, Err(Error::UnsupportedOperand { index: 0, .. })));
        assert!(target.body.is_none());
    }

    #[test]
    fn test_dangling_references_are_unsupported() {
        let mut source = method("Broken");
        let mut body = MethodBody::new();
        body.emit(OpCode::Br, Operand::Target(InstructionId(77)));
        source.body = Some(body);

        let mut target = method("BrokenCopy");
        let result = with_resolver(|symbols| {
            duplicate_body(&source, &mut target, &mut Verbatim, symbols, &mut ImportTable::new())
        });
        assert!(matches!(result, Err(Error::UnsupportedOperand { .. })));

        let mut source = method("Local");
        let mut body = MethodBody::new();
        body.emit(OpCode::Ldloc, Operand::Variable(3));
        source.body = Some(body);
        let result = with_resolver(|symbols| {
            duplicate_body(&source, &mut target, &mut Verbatim, symbols, &mut ImportTable::new())
        });
        assert!(matches!(result, Err(Error::UnsupportedOperand { .. })));
    }

    #[test]
    fn test_resolver_errors_propagate() {
        let source = looping();
        let mut failing =
            |operand: Operand, _: Option<&Instruction>, _: &MethodDefinition| -> Result<Operand> {
                Err(Error::MemberNotFound {
                    type_name: "App.Foo".into(),
                    member: operand.to_string(),
                })
            };
        let mut target = method("Copy");
        let result = with_resolver(|symbols| {
            duplicate_body(&source, &mut target, &mut failing, symbols, &mut ImportTable::new())
        });
        assert!(matches!(result, Err(Error::MemberNotFound { .. })));
    }
}
