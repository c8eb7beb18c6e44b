//! A minimal stack machine for the instructions synthesized bodies use.
//!
//! Calls are not executed but emulated by name: property accessors read and write the
//! conventional backing fields, `WeakRef` accessors the `Target` slot, and
//! `ITypeResolver::ResolveType` is answered by a callback whose invocations are counted.

use std::collections::HashMap;

use crate::metadata::{
    members::{MethodDefinition, MethodReference},
    method::{Literal, OpCode, Operand},
    token::InstructionId,
};

const STEP_LIMIT: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Str(String),
    Object(usize),
}

impl Value {
    fn is_true(&self) -> bool {
        !matches!(self, Value::Null | Value::Int(0))
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeapObject {
    pub type_name: String,
    pub fields: HashMap<String, Value>,
}

impl HeapObject {
    pub fn insert(&mut self, name: String, value: Value) {
        self.fields.insert(name, value);
    }
}

type ResolveCallback = Box<dyn FnMut(&Value) -> Option<HeapObject>>;

pub struct Interpreter {
    heap: Vec<HeapObject>,
    resolve: ResolveCallback,
    resolutions: usize,
}

impl Interpreter {
    pub fn new(resolve: impl FnMut(&Value) -> Option<HeapObject> + 'static) -> Self {
        Interpreter {
            heap: Vec::new(),
            resolve: Box::new(resolve),
            resolutions: 0,
        }
    }

    pub fn object(type_name: &str) -> HeapObject {
        HeapObject {
            type_name: type_name.to_string(),
            fields: HashMap::new(),
        }
    }

    pub fn allocate(&mut self, type_name: &str) -> usize {
        self.heap.push(Self::object(type_name));
        self.heap.len() - 1
    }

    pub fn field(&self, object: usize, name: &str) -> Value {
        self.heap
            .get(object)
            .and_then(|object| object.fields.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    }

    pub fn set_field(&mut self, object: usize, name: &str, value: Value) {
        if let Some(object) = self.heap.get_mut(object) {
            object.fields.insert(name.to_string(), value);
        }
    }

    /// Type name of the object `value` refers to
    pub fn type_of(&self, value: &Value) -> Option<&str> {
        match value {
            Value::Object(object) => self
                .heap
                .get(*object)
                .map(|object| object.type_name.as_str()),
            _ => None,
        }
    }

    /// Number of `ResolveType` calls so far
    pub fn resolutions(&self) -> usize {
        self.resolutions
    }

    /// Execute `method` on the object `this`
    pub fn invoke(
        &mut self,
        method: &MethodDefinition,
        this: usize,
        arguments: &[Value],
    ) -> Result<Value, String> {
        let body = method
            .body
            .as_ref()
            .ok_or_else(|| format!("{} has no body", method.name))?;

        let mut args = vec![Value::Object(this)];
        args.extend_from_slice(arguments);
        let mut locals = vec![Value::Null; body.variables.len()];
        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;

        let jump = |target: InstructionId| {
            body.position_of(target)
                .ok_or_else(|| format!("jump to {target} outside of {}", method.name))
        };

        for _ in 0..STEP_LIMIT {
            let instruction = body
                .instructions
                .get(pc)
                .ok_or_else(|| format!("{} fell off its end", method.name))?;
            pc += 1;

            match (instruction.opcode, &instruction.operand) {
                (OpCode::Nop, _) => {}
                (OpCode::Ldarg0, _) => stack.push(argument(&args, 0)?),
                (OpCode::Ldarg1, _) => stack.push(argument(&args, 1)?),
                (OpCode::Ldarg2, _) => stack.push(argument(&args, 2)?),
                (OpCode::Ldarg3, _) => stack.push(argument(&args, 3)?),
                (OpCode::Ldarg | OpCode::LdargS, Operand::Argument(index)) => {
                    stack.push(argument(&args, usize::from(*index))?);
                }
                (OpCode::Ldnull, _) => stack.push(Value::Null),
                (OpCode::LdcI4M1, _) => stack.push(Value::Int(-1)),
                (OpCode::LdcI40, _) => stack.push(Value::Int(0)),
                (OpCode::LdcI41, _) => stack.push(Value::Int(1)),
                (OpCode::LdcI4 | OpCode::LdcI4S, Operand::Literal(Literal::Int32(value))) => {
                    stack.push(Value::Int(i64::from(*value)));
                }
                (OpCode::Ldstr, Operand::Literal(Literal::String(value))) => {
                    stack.push(Value::Str(value.clone()));
                }
                (OpCode::Ldloc0, _) => stack.push(locals[0].clone()),
                (OpCode::Ldloc1, _) => stack.push(locals[1].clone()),
                (OpCode::Ldloc | OpCode::LdlocS, Operand::Variable(index)) => {
                    stack.push(locals[usize::from(*index)].clone());
                }
                (OpCode::Stloc0, _) => locals[0] = pop(&mut stack)?,
                (OpCode::Stloc1, _) => locals[1] = pop(&mut stack)?,
                (OpCode::Stloc | OpCode::StlocS, Operand::Variable(index)) => {
                    locals[usize::from(*index)] = pop(&mut stack)?;
                }
                (OpCode::Dup, _) => {
                    let top = pop(&mut stack)?;
                    stack.push(top.clone());
                    stack.push(top);
                }
                (OpCode::Pop, _) => {
                    pop(&mut stack)?;
                }
                (OpCode::Ldfld, Operand::Field(field)) => {
                    let object = reference(&pop(&mut stack)?)?;
                    stack.push(self.field(object, &field.name));
                }
                (OpCode::Stfld, Operand::Field(field)) => {
                    let value = pop(&mut stack)?;
                    let object = reference(&pop(&mut stack)?)?;
                    self.set_field(object, &field.name, value);
                }
                (OpCode::Br | OpCode::BrS, Operand::Target(target)) => pc = jump(*target)?,
                (OpCode::Brtrue | OpCode::BrtrueS, Operand::Target(target)) => {
                    if pop(&mut stack)?.is_true() {
                        pc = jump(*target)?;
                    }
                }
                (OpCode::Brfalse | OpCode::BrfalseS, Operand::Target(target)) => {
                    if !pop(&mut stack)?.is_true() {
                        pc = jump(*target)?;
                    }
                }
                (OpCode::Newobj, Operand::Method(constructor)) => {
                    let parameters = pop_many(&mut stack, constructor.parameters.len())?;
                    let object = self.allocate(&constructor.declaring_type.element().full_name());
                    if let Some(target) = parameters.into_iter().next() {
                        self.set_field(object, "Target", target);
                    }
                    stack.push(Value::Object(object));
                }
                (OpCode::Call | OpCode::Callvirt, Operand::Method(callee)) => {
                    let parameters = pop_many(&mut stack, callee.parameters.len())?;
                    let receiver = if callee.has_this { Some(pop(&mut stack)?) } else { None };
                    if let Some(result) = self.dispatch(callee, receiver, parameters)? {
                        stack.push(result);
                    }
                }
                (OpCode::Ret, _) => return Ok(stack.pop().unwrap_or(Value::Null)),
                _ => return Err(format!("unsupported instruction {instruction}")),
            }
        }

        Err(format!("{} exceeded {STEP_LIMIT} steps", method.name))
    }

    fn dispatch(
        &mut self,
        callee: &MethodReference,
        receiver: Option<Value>,
        mut parameters: Vec<Value>,
    ) -> Result<Option<Value>, String> {
        let returns = callee.return_type.full_name() != "System.Void";

        if callee.name == "ResolveType" {
            self.resolutions += 1;
            let identifier = parameters.pop().unwrap_or(Value::Null);
            let resolved = (self.resolve)(&identifier).map_or(Value::Null, |object| {
                self.heap.push(object);
                Value::Object(self.heap.len() - 1)
            });
            return Ok(Some(resolved));
        }

        let object = reference(&receiver.unwrap_or(Value::Null))?;
        let slot = |property: &str| {
            if property == "Target" {
                property.to_string()
            } else {
                format!("<{property}>k__BackingField")
            }
        };

        if let Some(property) = callee.name.strip_prefix("get_") {
            return Ok(Some(self.field(object, &slot(property))));
        }
        if let Some(property) = callee.name.strip_prefix("set_") {
            let value = parameters.pop().unwrap_or(Value::Null);
            self.set_field(object, &slot(property), value);
            return Ok(returns.then_some(Value::Null));
        }

        Err(format!("cannot emulate call to {callee}"))
    }
}

fn argument(args: &[Value], index: usize) -> Result<Value, String> {
    args.get(index)
        .cloned()
        .ok_or_else(|| format!("missing argument {index}"))
}

fn reference(value: &Value) -> Result<usize, String> {
    match value {
        Value::Object(object) => Ok(*object),
        other => Err(format!("null reference: {other:?}")),
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, String> {
    stack.pop().ok_or_else(|| "stack underflow".to_string())
}

fn pop_many(stack: &mut Vec<Value>, count: usize) -> Result<Vec<Value>, String> {
    if stack.len() < count {
        return Err(format!("stack underflow, {count} values expected"));
    }
    Ok(stack.split_off(stack.len() - count))
}
