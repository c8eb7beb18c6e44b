//! Dirty-flag change tracking.
//!
//! Types implementing the dirty capability ([`crate::WeaveConfig::dirty_capability`]),
//! directly or through their base chain, get every state mutation of their instance methods
//! instrumented: immediately after each mutating instruction (see
//! [`crate::metadata::method::OpCode::is_mutating`]) the sequence
//!
//! ```text
//! ldarg.0
//! ldc.i4 1
//! call instance void Declaring::set_Dirty(bool)
//! ```
//!
//! is inserted, raising the flag property ([`crate::WeaveConfig::dirty_property`]). Static and
//! abstract methods, methods without body, excluded members and the flag setter itself are
//! left alone.

use log::{debug, trace};

use crate::{
    context::Context,
    metadata::{
        members::MethodReference,
        method::{Literal, OpCode, Operand},
        module::Module,
        token::InstructionId,
        typesystem::{ImportTable, Resolver, TypeReference},
    },
    modifiers::{MethodSlot, Modifier, ModifierFilters},
    Error::{MemberNotFound, SymbolNotFound},
    Result,
};

/// Injects dirty-flag updates after every mutating instruction
#[derive(Debug, Clone, Default)]
pub struct DirtyModifier {
    filters: ModifierFilters,
}

impl DirtyModifier {
    /// Create a modifier accepting every module and type
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The setter of the flag property, as seen from `ty`
    fn flag_setter(
        symbols: &Resolver<'_>,
        ty: &TypeReference,
        property: &str,
    ) -> Result<MethodReference> {
        let found = symbols.find_member(ty, property)?;
        let not_found = || MemberNotFound {
            type_name: ty.full_name(),
            member: format!("set_{property}"),
        };

        let setter = found
            .member
            .as_property()
            .and_then(|property| property.setter.as_ref())
            .ok_or_else(not_found)?;
        Ok(setter.reference(&found.declaring_type))
    }
}

impl Modifier for DirtyModifier {
    fn name(&self) -> &'static str {
        "dirty"
    }

    fn filters(&self) -> &ModifierFilters {
        &self.filters
    }

    fn filters_mut(&mut self) -> &mut ModifierFilters {
        &mut self.filters
    }

    fn visit_type(&self, module: &mut Module, path: &[usize], ctx: &Context) -> Result<usize> {
        let config = ctx.config();

        let (setter, sites, imports) = {
            let symbols = Resolver::new(module, ctx.cache(), config)?;
            let definition = module
                .type_at(path)
                .ok_or_else(|| SymbolNotFound(format!("{}@{:?}", module.name, path)))?;

            let capability = config.runtime_type(&config.dirty_capability);
            if !symbols.implements(definition, &capability)? {
                return Ok(0);
            }

            let this = definition.reference(&module.name);
            let setter = Self::flag_setter(&symbols, &this, &config.dirty_property)?;
            let mut imports = ImportTable::new();
            imports.import_method(&symbols, &setter)?;

            let mut sites: Vec<(MethodSlot, Vec<InstructionId>)> = Vec::new();
            for slot in MethodSlot::all(definition) {
                let Some(method) = slot.get(definition) else {
                    continue;
                };
                if method.is_static() || method.is_abstract() {
                    continue;
                }
                if slot.is_excluded(definition, &config.exclusion_attribute) {
                    trace!("{}::{} is excluded", this.full_name(), method.name);
                    continue;
                }
                if method.name == setter.name && setter.declaring_type.same_type(&this) {
                    continue;
                }
                let Some(body) = &method.body else {
                    continue;
                };

                let anchors: Vec<InstructionId> = body
                    .instructions
                    .iter()
                    .filter(|instruction| instruction.opcode.is_mutating())
                    .map(|instruction| instruction.id)
                    .collect();
                if !anchors.is_empty() {
                    sites.push((slot, anchors));
                }
            }

            (setter, sites, imports)
        };

        let definition = module
            .type_at_mut(path)
            .ok_or_else(|| SymbolNotFound(format!("{path:?}")))?;
        let type_name = definition.full_name();

        let mut injected = 0;
        for (slot, anchors) in sites {
            let Some(body) = slot
                .get_mut(definition)
                .and_then(|method| method.body.as_mut())
            else {
                continue;
            };

            for anchor in anchors {
                let sequence = vec![
                    body.create(OpCode::Ldarg0, Operand::None),
                    body.create(OpCode::LdcI4, Operand::Literal(Literal::Int32(1))),
                    body.create(OpCode::Call, Operand::Method(setter.clone())),
                ];
                body.insert_after(anchor, sequence)?;
                injected += 1;
            }
        }

        if injected > 0 {
            imports.apply(module);
            debug!("{}: {} dirty-flag updates injected", type_name, injected);
        }
        Ok(injected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::{
            members::{CustomAttribute, MethodAttributes},
            typesystem::{TypeAttributes, TypeDefinition},
        },
        test::builders::{boolean, dirty_type, store_method},
        WeaveConfig,
    };

    fn module_with(definition: TypeDefinition) -> Module {
        let mut module = Module::new("App");
        module.add_type(definition);
        module
    }

    fn body_len(module: &Module, method: &str) -> usize {
        module.types[0]
            .method(method)
            .and_then(|method| method.body.as_ref())
            .map_or(0, |body| body.len())
    }

    #[test]
    fn test_injects_after_each_store() {
        let ctx = Context::default();
        let mut module = module_with(dirty_type(ctx.config(), "App", "App", "Entity"));
        let before_set = body_len(&module, "SetValue");
        let before_get = body_len(&module, "GetValue");

        let changes = DirtyModifier::new().visit_module(&mut module, &ctx).unwrap();
        assert_eq!(changes, 1);
        assert_eq!(body_len(&module, "SetValue"), before_set + 3);
        assert_eq!(body_len(&module, "GetValue"), before_get);

        let body = module.types[0].method("SetValue").unwrap().body.as_ref().unwrap();
        let store = body
            .instructions
            .iter()
            .position(|instruction| instruction.opcode == OpCode::Stfld)
            .unwrap();
        assert_eq!(
            body.opcodes()[store + 1..store + 4],
            [OpCode::Ldarg0, OpCode::LdcI4, OpCode::Call]
        );
        let Operand::Method(call) = &body.instructions[store + 3].operand else {
            panic!("expected a call");
        };
        assert_eq!(call.name, "set_Dirty");
        assert_eq!(call.declaring_type.full_name(), "App.Entity");
        assert!(call.has_this);

        // The flag setter stores too, but is never instrumented
        let setter = module.types[0].property("Dirty").unwrap().setter.as_ref().unwrap();
        assert_eq!(setter.body.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_every_mutation_is_tracked() {
        let ctx = Context::default();
        let mut definition = dirty_type(ctx.config(), "App", "App", "Entity");
        let this = definition.reference("App");
        let field = definition.field("value").unwrap().clone();
        let mut twice = store_method(&this, &field, "SetTwice");
        if let Some(body) = twice.body.as_mut() {
            let again = vec![
                body.create(OpCode::Ldarg0, Operand::None),
                body.create(OpCode::Ldarg1, Operand::None),
                body.create(OpCode::Stfld, Operand::Field(field.reference(&this))),
            ];
            let first = body.instructions[2].id;
            body.insert_after(first, again).unwrap();
        }
        let before = twice.body.as_ref().unwrap().len();
        definition.methods.push(twice);
        let mut module = module_with(definition);

        DirtyModifier::new().visit_module(&mut module, &ctx).unwrap();
        assert_eq!(body_len(&module, "SetTwice"), before + 6);
        assert!(module.types[0]
            .method("SetTwice")
            .unwrap()
            .body
            .as_ref()
            .unwrap()
            .verify()
            .is_ok());
    }

    #[test]
    fn test_static_excluded_and_foreign_types_are_skipped() {
        let ctx = Context::default();
        let config = ctx.config();
        let mut definition = dirty_type(config, "App", "App", "Entity");
        definition.methods[0].attributes |= MethodAttributes::STATIC;
        definition.methods[0].name = "Reset".into();
        let excluded = CustomAttribute::new(config.runtime_type(&config.exclusion_attribute));
        let field = definition.field("value").unwrap().clone();
        let this = definition.reference("App");
        let mut skipped = store_method(&this, &field, "Skipped");
        skipped.custom_attributes.push(excluded);
        definition.methods.push(skipped);

        let mut plain = TypeDefinition::new("App", "Plain", TypeAttributes::PUBLIC);
        plain.fields.push(field.clone());
        plain.methods.push(store_method(&plain.reference("App"), &field, "SetValue"));

        let mut module = module_with(definition);
        module.add_type(plain);
        let before: Vec<usize> = ["Reset", "Skipped"]
            .iter()
            .map(|m| body_len(&module, m))
            .collect();

        let changes = DirtyModifier::new().visit_module(&mut module, &ctx).unwrap();
        assert_eq!(changes, 0);
        assert_eq!(body_len(&module, "Reset"), before[0]);
        assert_eq!(body_len(&module, "Skipped"), before[1]);
    }

    #[test]
    fn test_capability_through_base_type() {
        let ctx = Context::default();
        let base = dirty_type(ctx.config(), "App", "App", "Entity");
        let field = base.field("value").unwrap().clone();
        let mut derived = TypeDefinition::new("App", "Derived", TypeAttributes::PUBLIC);
        derived.base = Some(base.reference("App"));
        derived.methods.push(store_method(&base.reference("App"), &field, "Touch"));
        let mut module = module_with(base);
        module.add_type(derived);

        let changes = DirtyModifier::new().visit_module(&mut module, &ctx).unwrap();
        assert_eq!(changes, 2);

        let touch = module.types[1].method("Touch").unwrap().body.as_ref().unwrap();
        let Some(Operand::Method(call)) = touch.instructions.iter().find_map(|instruction| {
            (instruction.opcode == OpCode::Call).then_some(&instruction.operand)
        }) else {
            panic!("expected an injected call");
        };
        assert_eq!(call.declaring_type.full_name(), "App.Entity");
        assert_eq!(call.parameters, vec![boolean()]);
    }

    #[test]
    fn test_missing_flag_property() {
        let mut module = module_with(dirty_type(&WeaveConfig::default(), "App", "App", "Entity"));
        let ctx = Context::new(WeaveConfig {
            dirty_property: "Modified".into(),
            ..WeaveConfig::default()
        });
        let error = DirtyModifier::new().visit_module(&mut module, &ctx).unwrap_err();
        assert!(matches!(error, crate::Error::MemberNotFound { .. }));
    }
}
