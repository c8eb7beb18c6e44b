//! Lazy composition.
//!
//! A type implementing the type-resolver capability
//! ([`crate::WeaveConfig::type_resolver_capability`]) may expose properties whose type is
//! resolvable: it implements the open generic capability
//! ([`crate::WeaveConfig::resolvable_capability`]) and exposes a stable identifier
//! ([`crate::WeaveConfig::identifier_member`]). Every such property is re-implemented from
//! the lazy composition template:
//!
//! - the identifier of the referenced object is kept in `_uniqueIdentifier{Property}`
//! - the object itself is only weakly held, in `_weakReference{Property}`
//! - the getter returns the weakly held object while it is alive, and otherwise resolves it
//!   again from the identifier through `ITypeResolver::ResolveType`
//! - the setter updates both
//!
//! The symbols the synthesized code relies on live in the runtime support module built by
//! [`runtime_module`]; the template itself lives in [`template_module`] and is never
//! referenced by transformed code.

use std::sync::Arc;

use log::{debug, warn};

use crate::{
    config::WeaveConfig,
    context::Context,
    metadata::{
        members::{
            has_attribute, FieldAttributes, FieldDefinition, MethodAttributes, MethodDefinition,
            MethodReference, Parameter, PropertyDefinition, CONSTRUCTOR_NAME,
        },
        method::{MethodBody, OpCode, Operand, Variable},
        module::Module,
        typesystem::{Resolver, TypeAttributes, TypeDefinition, TypeReference},
    },
    modifiers::{Modifier, ModifierFilters},
    rewrite::{Template, TemplateSynthesizer},
    Error::{MemberNotFound, SymbolNotFound},
    Result,
};

/// Name of the module holding the lazy composition template
pub const TEMPLATE_MODULE: &str = "Cilweave.Templates";

const TEMPLATE_PROPERTY: &str = "Reference";
const IDENTIFIER_FIELD: &str = "_uniqueIdentifier";
const WEAK_REFERENCE_FIELD: &str = "_weakReference";

fn system(name: &str) -> TypeReference {
    TypeReference::named("mscorlib", "System", name)
}

fn define(reference: &TypeReference, attributes: TypeAttributes) -> TypeDefinition {
    let (namespace, name) = reference
        .type_name()
        .map(|name| (name.namespace.clone(), name.name.clone()))
        .unwrap_or_default();
    TypeDefinition::new(namespace, name, attributes)
}

/// The runtime weak reference type, ``WeakRef`1``
#[must_use]
pub fn weak_reference(config: &WeaveConfig) -> TypeReference {
    TypeReference::named(
        config.runtime_module.clone(),
        config.runtime_module.clone(),
        "WeakRef`1",
    )
}

fn accessor_attributes() -> MethodAttributes {
    MethodAttributes::PUBLIC | MethodAttributes::HIDE_BY_SIG | MethodAttributes::SPECIAL_NAME
}

fn abstract_attributes() -> MethodAttributes {
    accessor_attributes()
        | MethodAttributes::VIRTUAL
        | MethodAttributes::ABSTRACT
        | MethodAttributes::NEW_SLOT
}

fn weak_methods(weak: &TypeReference) -> (MethodReference, MethodReference, MethodReference) {
    let target = TypeReference::generic_parameter("T", 0);
    let constructor = MethodReference {
        declaring_type: weak.clone(),
        name: CONSTRUCTOR_NAME.to_string(),
        return_type: system("Void"),
        parameters: vec![target.clone()],
        has_this: true,
        generic_arguments: Vec::new(),
    };
    let get_target = MethodReference {
        declaring_type: weak.clone(),
        name: "get_Target".to_string(),
        return_type: target.clone(),
        parameters: Vec::new(),
        has_this: true,
        generic_arguments: Vec::new(),
    };
    let set_target = MethodReference {
        declaring_type: weak.clone(),
        name: "set_Target".to_string(),
        return_type: system("Void"),
        parameters: vec![target],
        has_this: true,
        generic_arguments: Vec::new(),
    };
    (constructor, get_target, set_target)
}

/// Build the runtime support module: the weak reference type, the capability interfaces and
/// the exclusion attribute.
///
/// Implementations are provided by the runtime; only signatures are declared.
#[must_use]
pub fn runtime_module(config: &WeaveConfig) -> Module {
    let mut module = Module::new(config.runtime_module.clone());
    module.add_reference("mscorlib");

    let generic = TypeReference::generic_parameter("T", 0);
    let mut weak = define(&weak_reference(config), TypeAttributes::PUBLIC | TypeAttributes::SEALED);
    weak.generic_parameters.push("T".into());
    weak.base = Some(system("Object"));
    let mut constructor = MethodDefinition::new(
        CONSTRUCTOR_NAME,
        MethodAttributes::PUBLIC
            | MethodAttributes::SPECIAL_NAME
            | MethodAttributes::RT_SPECIAL_NAME,
        system("Void"),
    );
    constructor.parameters.push(Parameter::new("target", generic.clone()));
    weak.methods.push(constructor);
    let mut target = PropertyDefinition::new("Target", generic.clone());
    target.getter = Some(MethodDefinition::new(
        "get_Target",
        accessor_attributes(),
        generic.clone(),
    ));
    let mut setter = MethodDefinition::new("set_Target", accessor_attributes(), system("Void"));
    setter.parameters.push(Parameter::new("value", generic));
    target.setter = Some(setter);
    weak.properties.push(target);
    module.add_type(weak);

    let interface = TypeAttributes::PUBLIC | TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT;

    let mut dirty = define(&config.runtime_type(&config.dirty_capability), interface);
    let mut flag = PropertyDefinition::new(config.dirty_property.clone(), system("Boolean"));
    flag.getter = Some(MethodDefinition::new(
        flag.getter_name(),
        abstract_attributes(),
        system("Boolean"),
    ));
    let mut flag_setter =
        MethodDefinition::new(flag.setter_name(), abstract_attributes(), system("Void"));
    flag_setter.parameters.push(Parameter::new("value", system("Boolean")));
    flag.setter = Some(flag_setter);
    dirty.properties.push(flag);
    module.add_type(dirty);

    let mut resolver = define(&config.runtime_type(&config.type_resolver_capability), interface);
    let mut resolve = MethodDefinition::new(
        "ResolveType",
        abstract_attributes().difference(MethodAttributes::SPECIAL_NAME),
        TypeReference::generic_parameter("TT", 0),
    );
    resolve.generic_parameters = vec!["TT".into(), "TI".into()];
    resolve
        .parameters
        .push(Parameter::new("identifier", TypeReference::generic_parameter("TI", 1)));
    resolver.methods.push(resolve);
    module.add_type(resolver);

    let mut resolvable = define(&config.runtime_type(&config.resolvable_capability), interface);
    resolvable.generic_parameters.push("TI".into());
    let identifier_type = TypeReference::generic_parameter("TI", 0);
    let mut identifier =
        PropertyDefinition::new(config.identifier_member.clone(), identifier_type.clone());
    identifier.getter = Some(MethodDefinition::new(
        identifier.getter_name(),
        abstract_attributes(),
        identifier_type,
    ));
    resolvable.properties.push(identifier);
    module.add_type(resolvable);

    let mut exclusion = define(
        &config.runtime_type(&config.exclusion_attribute),
        TypeAttributes::PUBLIC | TypeAttributes::SEALED,
    );
    exclusion.base = Some(system("Attribute"));
    module.add_type(exclusion);

    module
}

/// Build the module holding the lazy composition template and its placeholder types
#[must_use]
pub fn template_module(config: &WeaveConfig) -> Module {
    let mut module = Module::new(TEMPLATE_MODULE);
    module.add_reference("mscorlib");
    module.add_reference(&config.runtime_module);

    let placeholder = |name: &str| TypeReference::named(TEMPLATE_MODULE, TEMPLATE_MODULE, name);
    let declaring = placeholder("LazyCompositionTemplate");
    let resolvable = placeholder("ResolvableTypeTemplate");
    let identifier = placeholder("ReferenceIdentifierTemplate");

    let weak = weak_reference(config).instantiate(vec![resolvable.clone()]);
    let (constructor, get_target, set_target) = weak_methods(&weak);
    let identifier_field =
        FieldDefinition::new(IDENTIFIER_FIELD, identifier.clone(), FieldAttributes::PRIVATE);
    let weak_field =
        FieldDefinition::new(WEAK_REFERENCE_FIELD, weak.clone(), FieldAttributes::PRIVATE);
    let identifier_ref = identifier_field.reference(&declaring);
    let weak_ref = weak_field.reference(&declaring);

    let resolve_type = MethodReference {
        declaring_type: config.runtime_type(&config.type_resolver_capability),
        name: "ResolveType".to_string(),
        return_type: TypeReference::generic_parameter("TT", 0),
        parameters: vec![TypeReference::generic_parameter("TI", 1)],
        has_this: true,
        generic_arguments: vec![resolvable.clone(), identifier.clone()],
    };
    let get_identifier = MethodReference {
        declaring_type: resolvable.clone(),
        name: format!("get_{}", config.identifier_member),
        return_type: identifier.clone(),
        parameters: Vec::new(),
        has_this: true,
        generic_arguments: Vec::new(),
    };

    // if (_weakReference == null) _weakReference = new WeakRef<T>(null);
    // var obj = _weakReference.Target;
    // if (obj == null) {
    //     obj = ResolveType<T, I>(_uniqueIdentifier);
    //     if (obj != null) _uniqueIdentifier = obj.Identifier;
    //     _weakReference.Target = obj;
    // }
    // return obj;
    let mut getter_body = MethodBody::new();
    getter_body.variables.push(Variable::new("obj", resolvable.clone()));
    let load = getter_body.create(OpCode::Ldarg0, Operand::None);
    let store = getter_body.create(OpCode::Ldarg0, Operand::None);
    let done = getter_body.create(OpCode::Ldloc0, Operand::None);
    let (load_id, store_id, done_id) = (load.id, store.id, done.id);
    getter_body.emit_op(OpCode::Ldarg0);
    getter_body.emit(OpCode::Ldfld, Operand::Field(weak_ref.clone()));
    getter_body.emit(OpCode::Brtrue, Operand::Target(load_id));
    getter_body.emit_op(OpCode::Ldarg0);
    getter_body.emit_op(OpCode::Ldnull);
    getter_body.emit(OpCode::Newobj, Operand::Method(constructor.clone()));
    getter_body.emit(OpCode::Stfld, Operand::Field(weak_ref.clone()));
    getter_body.instructions.push(load);
    getter_body.emit(OpCode::Ldfld, Operand::Field(weak_ref.clone()));
    getter_body.emit(OpCode::Callvirt, Operand::Method(get_target));
    getter_body.emit_op(OpCode::Stloc0);
    getter_body.emit_op(OpCode::Ldloc0);
    getter_body.emit(OpCode::Brtrue, Operand::Target(done_id));
    getter_body.emit_op(OpCode::Ldarg0);
    getter_body.emit_op(OpCode::Ldarg0);
    getter_body.emit(OpCode::Ldfld, Operand::Field(identifier_ref.clone()));
    getter_body.emit(OpCode::Callvirt, Operand::Method(resolve_type));
    getter_body.emit_op(OpCode::Stloc0);
    getter_body.emit_op(OpCode::Ldloc0);
    getter_body.emit(OpCode::Brfalse, Operand::Target(store_id));
    getter_body.emit_op(OpCode::Ldarg0);
    getter_body.emit_op(OpCode::Ldloc0);
    getter_body.emit(OpCode::Callvirt, Operand::Method(get_identifier.clone()));
    getter_body.emit(OpCode::Stfld, Operand::Field(identifier_ref.clone()));
    getter_body.instructions.push(store);
    getter_body.emit(OpCode::Ldfld, Operand::Field(weak_ref.clone()));
    getter_body.emit_op(OpCode::Ldloc0);
    getter_body.emit(OpCode::Callvirt, Operand::Method(set_target.clone()));
    getter_body.instructions.push(done);
    getter_body.emit_op(OpCode::Ret);

    // if (_weakReference == null) _weakReference = new WeakRef<T>(value);
    // else _weakReference.Target = value;
    // _uniqueIdentifier = value != null ? value.Identifier : null;
    let mut setter_body = MethodBody::new();
    let assign = setter_body.create(OpCode::Ldarg0, Operand::None);
    let identify = setter_body.create(OpCode::Ldarg1, Operand::None);
    let clear = setter_body.create(OpCode::Ldarg0, Operand::None);
    let (assign_id, identify_id, clear_id) = (assign.id, identify.id, clear.id);
    setter_body.emit_op(OpCode::Ldarg0);
    setter_body.emit(OpCode::Ldfld, Operand::Field(weak_ref.clone()));
    setter_body.emit(OpCode::Brtrue, Operand::Target(assign_id));
    setter_body.emit_op(OpCode::Ldarg0);
    setter_body.emit_op(OpCode::Ldarg1);
    setter_body.emit(OpCode::Newobj, Operand::Method(constructor));
    setter_body.emit(OpCode::Stfld, Operand::Field(weak_ref.clone()));
    setter_body.emit(OpCode::Br, Operand::Target(identify_id));
    setter_body.instructions.push(assign);
    setter_body.emit(OpCode::Ldfld, Operand::Field(weak_ref));
    setter_body.emit_op(OpCode::Ldarg1);
    setter_body.emit(OpCode::Callvirt, Operand::Method(set_target));
    setter_body.instructions.push(identify);
    setter_body.emit(OpCode::Brfalse, Operand::Target(clear_id));
    setter_body.emit_op(OpCode::Ldarg0);
    setter_body.emit_op(OpCode::Ldarg1);
    setter_body.emit(OpCode::Callvirt, Operand::Method(get_identifier));
    setter_body.emit(OpCode::Stfld, Operand::Field(identifier_ref.clone()));
    setter_body.emit_op(OpCode::Ret);
    setter_body.instructions.push(clear);
    setter_body.emit_op(OpCode::Ldnull);
    setter_body.emit(OpCode::Stfld, Operand::Field(identifier_ref));
    setter_body.emit_op(OpCode::Ret);

    let mut property = PropertyDefinition::new(TEMPLATE_PROPERTY, resolvable.clone());
    let mut getter = MethodDefinition::new(
        property.getter_name(),
        accessor_attributes(),
        resolvable.clone(),
    );
    getter.body = Some(getter_body);
    let mut setter =
        MethodDefinition::new(property.setter_name(), accessor_attributes(), system("Void"));
    setter.parameters.push(Parameter::new("value", resolvable.clone()));
    setter.body = Some(setter_body);
    property.getter = Some(getter);
    property.setter = Some(setter);

    let mut template = define(&declaring, TypeAttributes::empty());
    template.base = Some(system("Object"));
    template
        .interfaces
        .push(config.runtime_type(&config.type_resolver_capability));
    template.fields.push(identifier_field);
    template.fields.push(weak_field);
    template.properties.push(property);
    module.add_type(template);

    let mut resolvable_template = define(&resolvable, TypeAttributes::empty());
    resolvable_template.base = Some(system("Object"));
    resolvable_template.interfaces.push(
        config
            .runtime_type(&config.resolvable_capability)
            .instantiate(vec![identifier.clone()]),
    );
    let mut exposed = PropertyDefinition::new(config.identifier_member.clone(), identifier.clone());
    exposed.getter = Some(MethodDefinition::new(
        exposed.getter_name(),
        accessor_attributes() | MethodAttributes::VIRTUAL | MethodAttributes::FINAL,
        identifier.clone(),
    ));
    resolvable_template.properties.push(exposed);
    module.add_type(resolvable_template);

    let mut identifier_template = define(&identifier, TypeAttributes::empty());
    identifier_template.base = Some(system("Object"));
    module.add_type(identifier_template);

    module
}

/// The lazy composition template of `config`
#[must_use]
pub fn lazy_template(config: &WeaveConfig) -> Template {
    let placeholder = |name: &str| TypeReference::named(TEMPLATE_MODULE, TEMPLATE_MODULE, name);
    Template {
        module: Arc::new(template_module(config)),
        declaring_type: placeholder("LazyCompositionTemplate"),
        property: TEMPLATE_PROPERTY.to_string(),
        member_type: placeholder("ResolvableTypeTemplate"),
        identifier_type: placeholder("ReferenceIdentifierTemplate"),
    }
}

/// Re-implements resolvable properties of type resolvers as lazily resolved weak references
#[derive(Debug, Clone)]
pub struct LazyCompositionModifier {
    filters: ModifierFilters,
    synthesizer: TemplateSynthesizer,
}

impl LazyCompositionModifier {
    /// Create a modifier using the lazy composition template for `config`
    #[must_use]
    pub fn new(config: &WeaveConfig) -> Self {
        LazyCompositionModifier {
            filters: ModifierFilters::default(),
            synthesizer: TemplateSynthesizer::new(lazy_template(config)),
        }
    }

    /// The synthesizer specializing the template
    #[must_use]
    pub fn synthesizer(&self) -> &TemplateSynthesizer {
        &self.synthesizer
    }

    /// Names of the properties of `definition` to re-implement
    fn candidates(
        symbols: &Resolver<'_>,
        definition: &TypeDefinition,
        config: &WeaveConfig,
    ) -> Result<Vec<String>> {
        let resolvable = config.runtime_type(&config.resolvable_capability);
        let mut candidates = Vec::new();

        for property in &definition.properties {
            if has_attribute(&property.custom_attributes, &config.exclusion_attribute) {
                continue;
            }
            match symbols.has_capability(&property.property_type, &resolvable) {
                Ok(true) => {}
                Ok(false) | Err(SymbolNotFound(_)) => continue,
                Err(error) => return Err(error),
            }

            match symbols.find_member(&property.property_type, &config.identifier_member) {
                Ok(found) if found.member.as_property().is_some() => {
                    candidates.push(property.name.clone());
                }
                Ok(_) => warn!(
                    "{}::{}: identifier {} of {} is not a property, skipped",
                    definition.full_name(),
                    property.name,
                    config.identifier_member,
                    property.property_type.full_name()
                ),
                Err(MemberNotFound { .. }) => warn!(
                    "{}::{}: {} exposes no {}, skipped",
                    definition.full_name(),
                    property.name,
                    property.property_type.full_name(),
                    config.identifier_member
                ),
                Err(error) => return Err(error),
            }
        }
        Ok(candidates)
    }
}

impl Modifier for LazyCompositionModifier {
    fn name(&self) -> &'static str {
        "lazy-composition"
    }

    fn filters(&self) -> &ModifierFilters {
        &self.filters
    }

    fn filters_mut(&mut self) -> &mut ModifierFilters {
        &mut self.filters
    }

    fn visit_type(&self, module: &mut Module, path: &[usize], ctx: &Context) -> Result<usize> {
        let config = ctx.config();

        let candidates = {
            let symbols = Resolver::new(module, ctx.cache(), config)?;
            let definition = module
                .type_at(path)
                .ok_or_else(|| SymbolNotFound(format!("{}@{:?}", module.name, path)))?;

            let capability = config.runtime_type(&config.type_resolver_capability);
            if !symbols.implements(definition, &capability)? {
                return Ok(0);
            }
            Self::candidates(&symbols, definition, config)?
        };

        for property in &candidates {
            let synthesis = self
                .synthesizer
                .synthesize(module, path, property, ctx.cache(), config)?;
            debug!("{}: {:?}", property, synthesis.fields);
        }
        Ok(candidates.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::members::CustomAttribute,
        test::{
            builders::{app_module, composing_type, int32, resolvable_type, string},
            interpreter::{Interpreter, Value},
        },
    };

    fn config() -> WeaveConfig {
        WeaveConfig {
            identifier_member: "Id".into(),
            ..WeaveConfig::default()
        }
    }

    fn bar() -> TypeReference {
        TypeReference::named("App", "App", "Bar")
    }

    fn scenario(config: &WeaveConfig) -> Module {
        let mut module = app_module("App", config);
        module.add_type(resolvable_type(config, "App", "App", "Bar", string()));
        module.add_type(composing_type(config, "App", "App", "Holder", "Foo", bar()));
        module
    }

    #[test]
    fn test_template_module_is_consistent() {
        let config = WeaveConfig::default();
        let template = template_module(&config);
        let declaring = template.find_type("Cilweave.Templates.LazyCompositionTemplate").unwrap();
        let property = declaring.property(TEMPLATE_PROPERTY).unwrap();
        for accessor in property.accessors() {
            assert!(accessor.body.as_ref().unwrap().verify().is_ok());
        }
        assert_eq!(property.getter.as_ref().unwrap().body.as_ref().unwrap().variables.len(), 1);
        assert!(template.verify_imports().is_ok());
        assert!(runtime_module(&config).verify_imports().is_ok());
    }

    #[test]
    fn test_synthesizes_backing_fields_and_accessors() {
        let config = config();
        let ctx = Context::new(config.clone());
        let mut module = scenario(&config);

        let changes = LazyCompositionModifier::new(&config)
            .visit_module(&mut module, &ctx)
            .unwrap();
        assert_eq!(changes, 1);

        let holder = module.find_type("App.Holder").unwrap();
        let id = holder.field("_uniqueIdentifierFoo").unwrap();
        assert_eq!(id.field_type, string());
        let weak = holder.field("_weakReferenceFoo").unwrap();
        assert_eq!(weak.field_type.full_name(), "Cilweave.Runtime.WeakRef`1<App.Bar>");

        let property = holder.property("Foo").unwrap();
        let getter = property.getter.as_ref().unwrap();
        assert_eq!(getter.name, "get_Foo");
        let body = getter.body.as_ref().unwrap();
        assert!(body.verify().is_ok());
        assert_eq!(body.variables[0].variable_type.full_name(), "App.Bar");
        for instruction in &body.instructions {
            let mut foreign = Vec::new();
            instruction
                .operand
                .walk_types(&mut |ty: &TypeReference| {
                    foreign.extend(ty.scope().map(str::to_string));
                });
            assert!(!foreign.iter().any(|scope| scope == TEMPLATE_MODULE));
        }
        assert!(module.verify_imports().is_ok());
    }

    #[test]
    fn test_getter_resolves_once_then_caches() {
        let config = config();
        let ctx = Context::new(config.clone());
        let mut module = scenario(&config);
        LazyCompositionModifier::new(&config)
            .visit_module(&mut module, &ctx)
            .unwrap();

        let holder = module.find_type("App.Holder").unwrap();
        let property = holder.property("Foo").unwrap();
        let mut interpreter = Interpreter::new(|identifier| {
            let mut bar = Interpreter::object("App.Bar");
            bar.insert("<Id>k__BackingField".into(), identifier.clone());
            Some(bar)
        });
        let this = interpreter.allocate("App.Holder");
        interpreter.set_field(this, "_uniqueIdentifierFoo", Value::Str("bar-1".into()));

        let getter = property.getter.as_ref().unwrap();
        let first = interpreter.invoke(getter, this, &[]).unwrap();
        let second = interpreter.invoke(getter, this, &[]).unwrap();
        assert_eq!(interpreter.type_of(&first), Some("App.Bar"));
        assert_eq!(first, second);
        assert_eq!(interpreter.resolutions(), 1);
        let weak = interpreter.field(this, "_weakReferenceFoo");
        assert_eq!(
            interpreter.type_of(&weak),
            Some("Cilweave.Runtime.WeakRef`1")
        );

        // Assigning replaces the target and its identifier
        let setter = property.setter.as_ref().unwrap();
        let other = interpreter.allocate("App.Bar");
        interpreter.set_field(other, "<Id>k__BackingField", Value::Str("bar-2".into()));
        interpreter.invoke(setter, this, &[Value::Object(other)]).unwrap();
        assert_eq!(interpreter.field(this, "_uniqueIdentifierFoo"), Value::Str("bar-2".into()));
        assert_eq!(interpreter.invoke(getter, this, &[]).unwrap(), Value::Object(other));
        assert_eq!(interpreter.resolutions(), 1);

        interpreter.invoke(setter, this, &[Value::Null]).unwrap();
        assert_eq!(interpreter.field(this, "_uniqueIdentifierFoo"), Value::Null);
    }

    #[test]
    fn test_unsupported_properties_are_skipped() {
        let config = config();
        let ctx = Context::new(config.clone());
        let mut module = app_module("App", &config);
        module.add_type(resolvable_type(&config, "App", "App", "Bar", string()));
        let mut holder = composing_type(&config, "App", "App", "Holder", "Foo", bar());
        holder.properties[0]
            .custom_attributes
            .push(CustomAttribute::new(config.runtime_type(&config.exclusion_attribute)));
        let mut count = PropertyDefinition::new("Count", int32());
        count.getter = Some(MethodDefinition::new("get_Count", accessor_attributes(), int32()));
        holder.properties.push(count);
        module.add_type(holder);

        let changes = LazyCompositionModifier::new(&config)
            .visit_module(&mut module, &ctx)
            .unwrap();
        assert_eq!(changes, 0);
        assert!(module.find_type("App.Holder").unwrap().field("_weakReferenceFoo").is_none());
    }

    #[test]
    fn test_missing_identifier_is_skipped() {
        let config = WeaveConfig {
            identifier_member: "Key".into(),
            ..WeaveConfig::default()
        };
        let ctx = Context::new(config.clone());
        let mut module = scenario(&self::config());

        let changes = LazyCompositionModifier::new(&config)
            .visit_module(&mut module, &ctx)
            .unwrap();
        assert_eq!(changes, 0);
    }

    #[test]
    fn test_types_without_resolver_capability_are_ignored() {
        let config = config();
        let ctx = Context::new(config.clone());
        let mut module = scenario(&config);
        module.types[1].interfaces.clear();

        let changes = LazyCompositionModifier::new(&config)
            .visit_module(&mut module, &ctx)
            .unwrap();
        assert_eq!(changes, 0);
    }
}
