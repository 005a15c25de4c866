//! AVM2 interpreter
//!
//! Each method call gets its own [`Activation`]: a local register file
//! (register 0 holds `this`), an operand stack and a scope stack layered on
//! top of the scope captured when the closure or class was created.
//!
//! Names are resolved by local name. `findpropstrict` and friends search the
//! local scope stack innermost first, then the captured scope, then the
//! globals of loaded scripts (running a script's initializer the first time
//! one of its names is needed), then the player's global object.
//!
//! Script exceptions, reference errors and type errors unwind through the
//! exception ranges of each method body. Malformed code and unimplemented
//! opcodes are logged and abort only the method that contains them.

use std::sync::Arc;

use bytecode_system::{
    AbcFile, ConstantKind, ConstantValue, Condition, ExceptionInfo, MethodBody, MethodFlags,
    Multiname, Op, OpError, Trait, TraitKind, MAX_FRAME_SLOTS, MAX_SLOT_ID,
};
use core_types::{
    to_int32, to_uint32, CodeLocation, ErrorKind, ObjectId, PropertyAccessor, ScriptError,
    ScriptResult, Value,
};
use indexmap::IndexMap;
use memory_manager::{Callable, ClassObject, ObjectKind, PropFlags, ScriptObject};
use tracing::{debug, error, trace, warn};

use crate::call_frame::{CallFrame, FrameKind};
use crate::runtime::Runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptState {
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone)]
struct ScriptEntry {
    abc: Arc<AbcFile>,
    index: usize,
    global: ObjectId,
    state: ScriptState,
}

/// Loaded scripts and the classes they defined.
#[derive(Debug, Default)]
pub struct Domain {
    scripts: Vec<ScriptEntry>,
    classes: IndexMap<String, ObjectId>,
}

impl Domain {
    /// Class object registered under `name` by `newclass`.
    pub fn class(&self, name: &str) -> Option<ObjectId> {
        self.classes.get(name).copied()
    }

    /// Number of scripts loaded so far.
    pub fn script_count(&self) -> usize {
        self.scripts.len()
    }

    pub(crate) fn roots(&self, out: &mut Vec<ObjectId>) {
        out.extend(self.scripts.iter().map(|s| s.global));
        out.extend(self.classes.values().copied());
    }
}

/// Registers every script of `abc` and runs the entry script, the last one
/// in the file. Other scripts initialize lazily.
pub fn load_abc(rt: &mut Runtime, abc: Arc<AbcFile>) -> ScriptResult<()> {
    let first = rt.avm2.scripts.len();
    let player_global = rt.global();
    for (index, script) in abc.scripts.iter().enumerate() {
        let global = rt
            .heap_mut()
            .register(ScriptObject::with_proto(ObjectKind::Plain, Some(player_global)));
        apply_traits(rt, &abc, global, &script.traits, &[global], None, TraitSet::All);
        rt.avm2.scripts.push(ScriptEntry {
            abc: abc.clone(),
            index,
            global,
            state: ScriptState::Pending,
        });
    }
    debug!(
        scripts = abc.scripts.len(),
        methods = abc.methods.len(),
        classes = abc.classes.len(),
        "abc loaded"
    );
    match rt.avm2.scripts.len().checked_sub(1) {
        Some(entry) if entry >= first => run_script(rt, entry),
        _ => Ok(()),
    }
}

fn run_script(rt: &mut Runtime, entry: usize) -> ScriptResult<()> {
    let Some(script) = rt.avm2.scripts.get_mut(entry) else {
        return Ok(());
    };
    if script.state != ScriptState::Pending {
        return Ok(());
    }
    script.state = ScriptState::Running;
    let (abc, index, global) = (script.abc.clone(), script.index, script.global);
    let init = abc.scripts[index].init_method;
    debug!(script = index, method = abc.method_name(init), "script init");
    let result = call_method(rt, &abc, init, &[], Value::Object(global), &[], None);
    if let Some(script) = rt.avm2.scripts.get_mut(entry) {
        script.state = ScriptState::Done;
    }
    result.map(|_| ())
}

/// Global of the first script declaring `name`, initializing it if needed.
fn find_in_scripts(rt: &mut Runtime, name: &str) -> ScriptResult<Option<ObjectId>> {
    let found = rt
        .avm2
        .scripts
        .iter()
        .position(|s| rt.heap().get(s.global).is_some_and(|o| o.has_own(name)));
    let Some(entry) = found else {
        return Ok(None);
    };
    run_script(rt, entry)?;
    Ok(Some(rt.avm2.scripts[entry].global))
}

// ----------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraitSet {
    All,
    /// Instance slots, applied to each new instance
    Slots,
    /// Instance methods and accessors, applied to the prototype
    Methods,
}

fn constant_value(abc: &AbcFile, constant: &ConstantValue) -> Value {
    let pool = &abc.constant_pool;
    let index = constant.index as usize;
    match constant.kind {
        ConstantKind::Undefined => Value::Undefined,
        ConstantKind::Utf8 => pool
            .strings
            .get(index)
            .cloned()
            .map(Value::String)
            .unwrap_or_default(),
        ConstantKind::Int => Value::Number(pool.ints.get(index).map_or(0.0, |n| f64::from(*n))),
        ConstantKind::UInt => Value::Number(pool.uints.get(index).map_or(0.0, |n| f64::from(*n))),
        ConstantKind::Double => Value::Number(pool.doubles.get(index).copied().unwrap_or(f64::NAN)),
        ConstantKind::False => Value::Boolean(false),
        ConstantKind::True => Value::Boolean(true),
        ConstantKind::Null => Value::Null,
        ConstantKind::Namespace(_) => abc
            .namespace_name(constant.index)
            .map(Value::from)
            .unwrap_or_default(),
    }
}

/// Default for a slot without an explicit value, by declared type.
fn slot_default(abc: &AbcFile, type_name: u32) -> Value {
    match abc.multiname_local_name(type_name) {
        Some("int") | Some("uint") => Value::Number(0.0),
        Some("Number") => Value::Number(f64::NAN),
        Some("Boolean") => Value::Boolean(false),
        Some(_) if type_name != 0 => Value::Null,
        _ => Value::Undefined,
    }
}

fn method_closure(
    rt: &mut Runtime,
    abc: &Arc<AbcFile>,
    method: u32,
    scope: &[ObjectId],
    class: Option<ObjectId>,
) -> ObjectId {
    rt.new_function(Callable::Abc {
        abc: abc.clone(),
        method,
        scope: scope.to_vec(),
        bound_this: None,
        class,
    })
}

/// Installs `traits` on `target`. Slot ids map to member names through the
/// object's slot name table.
fn apply_traits(
    rt: &mut Runtime,
    abc: &Arc<AbcFile>,
    target: ObjectId,
    traits: &[Trait],
    scope: &[ObjectId],
    class: Option<ObjectId>,
    set: TraitSet,
) {
    let mut slot_names = rt
        .heap()
        .get(target)
        .map(|o| o.slot_names.clone())
        .unwrap_or_default();
    let mut next_slot = slot_names.len() as u32 + 1;
    let mut record_slot = |slot_id: u32, name: &str| {
        let id = if slot_id == 0 { next_slot } else { slot_id };
        if id > MAX_SLOT_ID {
            warn!(slot = id, name, "slot id out of range, slot not recorded");
            return;
        }
        next_slot = next_slot.max(id + 1);
        let index = (id - 1) as usize;
        if slot_names.len() <= index {
            slot_names.resize(index + 1, String::new());
        }
        slot_names[index] = name.to_string();
    };

    for tr in traits {
        let Some(name) = abc.multiname_local_name(tr.name).map(str::to_string) else {
            warn!(name = %abc.display_multiname(tr.name), "trait with a runtime name skipped");
            continue;
        };
        let slots = matches!(set, TraitSet::All | TraitSet::Slots);
        let methods = matches!(set, TraitSet::All | TraitSet::Methods);
        match &tr.kind {
            TraitKind::Slot {
                slot_id,
                type_name,
                value,
            }
            | TraitKind::Const {
                slot_id,
                type_name,
                value,
            } if slots => {
                let initial = match value {
                    Some(constant) => constant_value(abc, constant),
                    None => slot_default(abc, *type_name),
                };
                let flags = if matches!(tr.kind, TraitKind::Const { .. }) {
                    PropFlags::DONT_DELETE
                } else {
                    PropFlags::NONE
                };
                rt.heap_mut().define_member(target, &name, initial, flags);
                record_slot(*slot_id, &name);
            }
            TraitKind::Class { slot_id, .. } if slots => {
                rt.heap_mut()
                    .define_member(target, &name, Value::Null, PropFlags::DONT_DELETE);
                record_slot(*slot_id, &name);
            }
            TraitKind::Function { slot_id, method } if slots => {
                let func = method_closure(rt, abc, *method, scope, None);
                rt.heap_mut()
                    .define_member(target, &name, Value::Object(func), PropFlags::NONE);
                record_slot(*slot_id, &name);
            }
            TraitKind::Method { method, .. } if methods => {
                let func = method_closure(rt, abc, *method, scope, class);
                rt.heap_mut()
                    .define_member(target, &name, Value::Object(func), PropFlags::DONT_ENUM);
            }
            TraitKind::Getter { method, .. } | TraitKind::Setter { method, .. } if methods => {
                let func = method_closure(rt, abc, *method, scope, class);
                let mut accessor = match rt.heap().get(target).and_then(|o| o.own(&name)) {
                    Some(member) => match &member.value {
                        Value::Property(existing) => *existing,
                        _ => PropertyAccessor::default(),
                    },
                    None => PropertyAccessor::default(),
                };
                if matches!(tr.kind, TraitKind::Getter { .. }) {
                    accessor.getter = Some(func);
                } else {
                    accessor.setter = Some(func);
                }
                rt.heap_mut().define_member(
                    target,
                    &name,
                    Value::Property(accessor),
                    PropFlags::DONT_ENUM,
                );
            }
            _ => {}
        }
    }
    rt.heap_mut().set_slot_names(target, slot_names);
}

// ----------------------------------------------------------------------
// Classes
// ----------------------------------------------------------------------

fn class_payload(rt: &Runtime, class: ObjectId) -> Option<ClassObject> {
    match rt.heap().get(class).map(|o| &o.kind) {
        Some(ObjectKind::Class(payload)) => Some(payload.clone()),
        _ => None,
    }
}

fn prototype_of(rt: &Runtime, ctor: ObjectId) -> Option<ObjectId> {
    rt.heap().get_own(ctor, "prototype").and_then(|v| v.as_object())
}

/// Scope that methods of `class` run in: the scope at `newclass` time plus
/// the class object itself.
fn class_scope(payload: &ClassObject, class: ObjectId) -> Vec<ObjectId> {
    let mut scope = payload.scope.clone();
    scope.push(class);
    scope
}

/// `newclass`: builds the class object, its prototype and static traits,
/// then runs the class initializer.
fn new_class(
    rt: &mut Runtime,
    abc: &Arc<AbcFile>,
    class_index: usize,
    base: &Value,
    scope: Vec<ObjectId>,
) -> ScriptResult<ObjectId> {
    let (Some(instance), Some(class_info)) =
        (abc.instances.get(class_index), abc.classes.get(class_index))
    else {
        return Err(ScriptError::malformed(format!("no class {}", class_index)));
    };
    let base_id = base.as_object();
    let super_class = base_id.filter(|id| class_payload(rt, *id).is_some());
    let super_proto = base_id
        .and_then(|id| prototype_of(rt, id))
        .unwrap_or(rt.protos().object);

    let payload = ClassObject {
        abc: abc.clone(),
        class_index,
        super_class,
        scope,
    };
    let function_proto = rt.protos().function;
    let heap = rt.heap_mut();
    let class = heap.register(ScriptObject::with_proto(
        ObjectKind::Class(payload.clone()),
        Some(function_proto),
    ));
    let prototype = heap.register(ScriptObject::with_proto(ObjectKind::Plain, Some(super_proto)));
    heap.define_member(class, "prototype", Value::Object(prototype), PropFlags::DONT_ENUM);
    heap.define_member(prototype, "constructor", Value::Object(class), PropFlags::DONT_ENUM);

    let method_scope = class_scope(&payload, class);
    apply_traits(
        rt,
        abc,
        prototype,
        &instance.traits,
        &method_scope,
        Some(class),
        TraitSet::Methods,
    );
    apply_traits(
        rt,
        abc,
        class,
        &class_info.traits,
        &method_scope,
        Some(class),
        TraitSet::All,
    );

    let name = abc
        .multiname_local_name(instance.name)
        .unwrap_or("<anonymous>")
        .to_string();
    debug!(class = %name, "class defined");
    rt.avm2.classes.insert(name.clone(), class);

    rt.enter_frame(CallFrame::new(
        class,
        FrameKind::Abc,
        format!("{}$cinit", name),
        CodeLocation::method(class_info.init_method, 0),
    ))?;
    let result = call_method(
        rt,
        abc,
        class_info.init_method,
        &method_scope,
        Value::Object(class),
        &[],
        Some(class),
    );
    rt.leave_frame();
    result?;
    Ok(class)
}

/// Classes from `class` up to its root, derived first.
fn class_chain(rt: &Runtime, class: ObjectId) -> Vec<(ObjectId, ClassObject)> {
    let mut chain = Vec::new();
    let mut next = Some(class);
    while let Some(id) = next {
        let Some(payload) = class_payload(rt, id) else {
            break;
        };
        if chain.iter().any(|(seen, _)| *seen == id) {
            break;
        }
        next = payload.super_class;
        chain.push((id, payload));
    }
    chain
}

/// Runs the instance initializer of `class` with `this` as receiver.
fn run_instance_init(
    rt: &mut Runtime,
    class: ObjectId,
    payload: &ClassObject,
    this: Value,
    args: &[Value],
) -> ScriptResult<Value> {
    let abc = &payload.abc;
    let Some(instance) = abc.instances.get(payload.class_index) else {
        return Err(ScriptError::malformed("class without instance info"));
    };
    let scope = class_scope(payload, class);
    rt.enter_frame(CallFrame::new(
        class,
        FrameKind::Abc,
        abc.method_name(instance.init_method),
        CodeLocation::method(instance.init_method, 0),
    ))?;
    let result = call_method(rt, abc, instance.init_method, &scope, this, args, Some(class));
    rt.leave_frame();
    result
}

/// `new C(args)` for a class object: a fresh instance inheriting from
/// `C.prototype`, instance slots of the whole hierarchy installed, then the
/// instance initializer.
pub fn construct_class(rt: &mut Runtime, class: ObjectId, args: &[Value]) -> ScriptResult<ObjectId> {
    let Some(payload) = class_payload(rt, class) else {
        return Err(ScriptError::new(
            ErrorKind::TypeError,
            format!("object {} is not a class", class),
        ));
    };
    let proto = prototype_of(rt, class).unwrap_or(rt.protos().object);
    let instance = rt
        .heap_mut()
        .register(ScriptObject::with_proto(ObjectKind::Plain, Some(proto)));
    for (id, link) in class_chain(rt, class).into_iter().rev() {
        if let Some(info) = link.abc.instances.get(link.class_index) {
            let scope = class_scope(&link, id);
            apply_traits(rt, &link.abc, instance, &info.traits, &scope, Some(id), TraitSet::Slots);
        }
    }
    run_instance_init(rt, class, &payload, Value::Object(instance), args)?;
    Ok(instance)
}

// ----------------------------------------------------------------------
// Activation
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct ScopeEntry {
    object: ObjectId,
    with: bool,
}

/// State of one running method body.
struct Activation<'a> {
    abc: &'a Arc<AbcFile>,
    method: u32,
    locals: Vec<Value>,
    stack: Vec<Value>,
    scope: Vec<ScopeEntry>,
    captured: &'a [ObjectId],
    class: Option<ObjectId>,
}

impl Activation<'_> {
    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> ScriptResult<Value> {
        self.stack.pop().ok_or_else(ScriptError::stack_underflow)
    }

    /// Pops `n` values, returned in push order.
    fn pop_args(&mut self, n: u32) -> ScriptResult<Vec<Value>> {
        let n = n as usize;
        if n > self.stack.len() {
            return Err(ScriptError::stack_underflow());
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    fn local(&self, index: u32) -> ScriptResult<Value> {
        self.locals
            .get(index as usize)
            .cloned()
            .ok_or_else(|| ScriptError::malformed(format!("local {} out of range", index)))
    }

    fn set_local(&mut self, index: u32, value: Value) -> ScriptResult<()> {
        match self.locals.get_mut(index as usize) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ScriptError::malformed(format!("local {} out of range", index))),
        }
    }

    /// Captured scope plus the local scope stack, outermost first.
    fn full_scope(&self) -> Vec<ObjectId> {
        self.captured
            .iter()
            .copied()
            .chain(self.scope.iter().map(|e| e.object))
            .collect()
    }

    fn global_scope(&self, rt: &Runtime) -> ObjectId {
        self.captured
            .first()
            .copied()
            .or_else(|| self.scope.first().map(|e| e.object))
            .unwrap_or_else(|| rt.global())
    }
}

/// Calls ABC method `method` with `this` and `args`.
///
/// `scope` is the captured scope stack, outermost first. `class` is the
/// class whose trait defined the method; `constructsuper` and `callsuper`
/// start from its superclass.
pub fn call_method(
    rt: &mut Runtime,
    abc: &Arc<AbcFile>,
    method: u32,
    scope: &[ObjectId],
    this: Value,
    args: &[Value],
    class: Option<ObjectId>,
) -> ScriptResult<Value> {
    let Some(info) = abc.methods.get(method as usize) else {
        return Err(ScriptError::malformed(format!("no method {}", method)));
    };
    let Some(body) = abc.body_of(method) else {
        warn!(method = abc.method_name(method), "call to a method without a body");
        return Ok(Value::Undefined);
    };

    let param_count = info.param_types.len();
    let register_count = body.local_count.min(MAX_FRAME_SLOTS) as usize;
    let mut locals = vec![Value::Undefined; register_count.max(param_count + 2)];
    locals[0] = this;
    let first_optional = param_count - info.optional.len().min(param_count);
    for (index, local) in locals[1..=param_count].iter_mut().enumerate() {
        *local = match args.get(index) {
            Some(arg) => arg.clone(),
            None if index >= first_optional => info
                .optional
                .get(index - first_optional)
                .map(|c| constant_value(abc, c))
                .unwrap_or_default(),
            None => Value::Undefined,
        };
    }
    if info.flags.has(MethodFlags::NEED_REST) {
        let rest = args.get(param_count..).unwrap_or_default().to_vec();
        locals[param_count + 1] = Value::Object(rt.new_array(rest));
    } else if info.flags.has(MethodFlags::NEED_ARGUMENTS) {
        locals[param_count + 1] = Value::Object(rt.new_array(args.to_vec()));
    }

    let mut act = Activation {
        abc,
        method,
        locals,
        stack: Vec::new(),
        scope: Vec::new(),
        captured: scope,
        class,
    };
    match run_body(rt, &mut act, body) {
        Ok(value) => Ok(value),
        Err(err) if is_catchable(&err.kind) || err.kind == ErrorKind::CallDepthExceeded => Err(err),
        Err(err) => {
            error!(method = abc.method_name(method), error = %err, "method aborted");
            Ok(Value::Undefined)
        }
    }
}

fn is_catchable(kind: &ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Thrown(_)
            | ErrorKind::ReferenceError
            | ErrorKind::TypeError
            | ErrorKind::NotAFunction
            | ErrorKind::InvalidTarget
    )
}

/// The script-visible value of a catchable error.
fn exception_value(rt: &mut Runtime, err: &ScriptError) -> Value {
    let name = match &err.kind {
        ErrorKind::Thrown(value) => return value.clone(),
        ErrorKind::ReferenceError => "ReferenceError",
        ErrorKind::TypeError | ErrorKind::NotAFunction => "TypeError",
        _ => "Error",
    };
    Value::Object(rt.new_error(name, &err.message))
}

fn handler_matches(rt: &mut Runtime, abc: &AbcFile, handler: &ExceptionInfo, value: &Value) -> bool {
    if handler.exception_type == 0 {
        return true;
    }
    match type_name(abc, handler.exception_type) {
        Some(name) => is_type(rt, value, name),
        None => true,
    }
}

/// Runs a body, routing catchable errors to its exception handlers.
fn run_body(rt: &mut Runtime, act: &mut Activation<'_>, body: &MethodBody) -> ScriptResult<Value> {
    let mut pc = 0;
    loop {
        let err = match interpret(rt, act, body, &mut pc) {
            Ok(value) => return Ok(value),
            Err(err) if is_catchable(&err.kind) => err,
            Err(err) => return Err(err),
        };
        let value = exception_value(rt, &err);
        let handler = body.exceptions.iter().find(|h| {
            (h.from as usize) <= pc
                && pc < h.to as usize
                && handler_matches(rt, act.abc, h, &value)
        });
        let Some(handler) = handler else {
            return Err(err);
        };
        debug!(method = act.abc.method_name(act.method), target = handler.target, "exception caught");
        act.stack.clear();
        act.scope.clear();
        act.push(value);
        pc = handler.target as usize;
    }
}

enum Step {
    Next,
    Jump(usize),
    Return(Value),
}

fn interpret(
    rt: &mut Runtime,
    act: &mut Activation<'_>,
    body: &MethodBody,
    pc: &mut usize,
) -> ScriptResult<Value> {
    let code = &body.code;
    loop {
        if *pc >= code.len() {
            return Ok(Value::Undefined);
        }
        let location = CodeLocation::method(act.method, *pc);
        let (op, next) = Op::decode(code, *pc).map_err(|e| {
            let err = match e {
                OpError::UnknownOpcode { opcode, .. } => {
                    ScriptError::new(ErrorKind::UnimplementedOpcode(opcode), e.to_string())
                }
                OpError::Operands { .. } => ScriptError::malformed(e.to_string()),
            };
            err.at(location)
        })?;
        if rt.verbose() {
            trace!(target: "tessera::avm2", method = act.method, pc = *pc, "{:?}", op);
        }
        match execute(rt, act, body, op, *pc, next).map_err(|e| e.at(location))? {
            Step::Next => *pc = next,
            Step::Jump(target) => *pc = target,
            Step::Return(value) => return Ok(value),
        }
    }
}

// ----------------------------------------------------------------------
// Names and types
// ----------------------------------------------------------------------

fn type_name(abc: &AbcFile, index: u32) -> Option<&str> {
    match abc.multiname(index)? {
        Multiname::TypeName { base, .. } => abc.multiname_local_name(*base),
        _ => abc.multiname_local_name(index),
    }
}

/// Local name of multiname `index`, popping runtime parts from the stack:
/// the name first, then the namespace.
fn resolve_name(rt: &mut Runtime, act: &mut Activation<'_>, index: u32) -> ScriptResult<String> {
    let Some(multiname) = act.abc.multiname(index).cloned() else {
        return Err(ScriptError::malformed(format!("no multiname {}", index)));
    };
    let name = if multiname.has_runtime_name() {
        let value = act.pop()?;
        Some(rt.to_string_value(&value)?)
    } else {
        None
    };
    if multiname.has_runtime_namespace() {
        act.pop()?;
    }
    Ok(match (name, &multiname) {
        (Some(name), _) => name,
        (None, Multiname::Any) => "*".to_string(),
        (None, Multiname::TypeName { base, .. }) => act
            .abc
            .multiname_local_name(*base)
            .unwrap_or("*")
            .to_string(),
        (None, other) => other
            .name_index()
            .and_then(|n| act.abc.string(n))
            .unwrap_or("*")
            .to_string(),
    })
}

/// Activations and catch scopes only answer for their own members.
fn scope_has(rt: &Runtime, entry: ScopeEntry, name: &str) -> bool {
    match rt.heap().get(entry.object) {
        Some(object) if matches!(object.kind, ObjectKind::Activation) && !entry.with => {
            object.has_own(name)
        }
        Some(_) => rt.has_member(entry.object, name),
        None => false,
    }
}

fn find_property(
    rt: &mut Runtime,
    act: &Activation<'_>,
    name: &str,
) -> ScriptResult<Option<ObjectId>> {
    for entry in act.scope.iter().rev() {
        if scope_has(rt, *entry, name) {
            return Ok(Some(entry.object));
        }
    }
    for object in act.captured.iter().rev() {
        let entry = ScopeEntry {
            object: *object,
            with: false,
        };
        if scope_has(rt, entry, name) {
            return Ok(Some(*object));
        }
    }
    if let Some(global) = find_in_scripts(rt, name)? {
        return Ok(Some(global));
    }
    let global = rt.global();
    Ok(rt.has_member(global, name).then_some(global))
}

fn find_strict(rt: &mut Runtime, act: &Activation<'_>, name: &str) -> ScriptResult<ObjectId> {
    match find_property(rt, act, name)? {
        Some(object) => Ok(object),
        None => {
            warn!(name, "reference to an undefined name");
            Err(ScriptError::new(
                ErrorKind::ReferenceError,
                format!("{} is not defined", name),
            ))
        }
    }
}

/// `value is T` for a type named by its local name.
fn is_type(rt: &mut Runtime, value: &Value, name: &str) -> bool {
    match (name, value) {
        ("*", _) => true,
        ("Object", v) => !v.is_nullish(),
        ("Number", Value::Number(_)) => true,
        ("int", Value::Number(n)) => n.fract() == 0.0 && f64::from(to_int32(*n)) == *n,
        ("uint", Value::Number(n)) => n.fract() == 0.0 && f64::from(to_uint32(*n)) == *n,
        ("String", Value::String(_)) | ("Boolean", Value::Boolean(_)) => true,
        ("Function", v) => rt.is_callable(v),
        (_, Value::Object(_)) => {
            let ctor = match rt.avm2.class(name) {
                Some(class) => Some(class),
                None => rt.heap().get_own(rt.global(), name).and_then(|v| v.as_object()),
            };
            ctor.is_some_and(|c| rt.is_instance_of(value, c))
        }
        _ => false,
    }
}

/// `value is ctor` for a type given as a value.
fn is_type_late(rt: &mut Runtime, value: &Value, ctor: &Value) -> bool {
    let Some(id) = ctor.as_object() else {
        return false;
    };
    match value {
        Value::Object(_) => rt.is_instance_of(value, id),
        primitive => {
            let proto = prototype_of(rt, id);
            let protos = rt.protos();
            let expected = match primitive {
                Value::Number(_) => protos.number,
                Value::String(_) => protos.string,
                Value::Boolean(_) => protos.boolean,
                _ => return false,
            };
            proto == Some(expected) || proto == Some(protos.object)
        }
    }
}

// ----------------------------------------------------------------------
// Dispatch
// ----------------------------------------------------------------------

fn pop_number(rt: &mut Runtime, act: &mut Activation<'_>) -> ScriptResult<f64> {
    let value = act.pop()?;
    rt.to_number_value(&value)
}

fn binary_number(
    rt: &mut Runtime,
    act: &mut Activation<'_>,
    f: impl FnOnce(f64, f64) -> f64,
) -> ScriptResult<()> {
    let b = pop_number(rt, act)?;
    let a = pop_number(rt, act)?;
    act.push(Value::Number(f(a, b)));
    Ok(())
}

fn binary_int(
    rt: &mut Runtime,
    act: &mut Activation<'_>,
    f: impl FnOnce(i32, i32) -> f64,
) -> ScriptResult<()> {
    let b = to_int32(pop_number(rt, act)?);
    let a = to_int32(pop_number(rt, act)?);
    act.push(Value::Number(f(a, b)));
    Ok(())
}

/// `a < b` with undefined (NaN involved) reported as `None`.
fn less(rt: &mut Runtime, a: &Value, b: &Value) -> ScriptResult<Option<bool>> {
    Ok(match rt.less_than(a, b)? {
        Value::Boolean(result) => Some(result),
        _ => None,
    })
}

fn compare(rt: &mut Runtime, cond: Condition, a: &Value, b: &Value) -> ScriptResult<bool> {
    Ok(match cond {
        Condition::Always => true,
        Condition::True => rt.to_bool(a),
        Condition::False => !rt.to_bool(a),
        Condition::Equal => rt.loose_equals(a, b)?,
        Condition::NotEqual => !rt.loose_equals(a, b)?,
        Condition::StrictEqual => a.strict_equals(b),
        Condition::StrictNotEqual => !a.strict_equals(b),
        Condition::Less => less(rt, a, b)? == Some(true),
        Condition::NotLess => less(rt, a, b)? != Some(true),
        Condition::Greater => less(rt, b, a)? == Some(true),
        Condition::NotGreater => less(rt, b, a)? != Some(true),
        Condition::LessEqual => less(rt, b, a)? == Some(false),
        Condition::NotLessEqual => less(rt, b, a)? != Some(false),
        Condition::GreaterEqual => less(rt, a, b)? == Some(false),
        Condition::NotGreaterEqual => less(rt, a, b)? != Some(false),
    })
}

fn branch_target(base: usize, offset: i32, len: usize) -> ScriptResult<usize> {
    let target = base as i64 + i64::from(offset);
    if target < 0 || target > len as i64 {
        return Err(ScriptError::malformed(format!(
            "branch to {} outside body of {} bytes",
            target, len
        )));
    }
    Ok(target as usize)
}

fn pool_entry<T: Copy>(pool: &[T], index: u32, what: &str) -> ScriptResult<T> {
    pool.get(index as usize)
        .copied()
        .ok_or_else(|| ScriptError::malformed(format!("{} pool index {} out of range", what, index)))
}

/// Calls `func` on `receiver`, reporting a type error when it cannot be
/// called.
fn call_value(
    rt: &mut Runtime,
    func: &Value,
    receiver: Value,
    args: &[Value],
    name: &str,
) -> ScriptResult<Value> {
    if !rt.is_callable(func) {
        warn!(name, "call on a non-function");
        return Err(ScriptError::new(
            ErrorKind::NotAFunction,
            format!("{} is not a function", name),
        ));
    }
    rt.call_function(func, receiver, args, None)
}

/// Prototype where `super` lookups of the running method start.
fn super_prototype(rt: &Runtime, act: &Activation<'_>) -> ObjectId {
    act.class
        .and_then(|class| class_payload(rt, class))
        .and_then(|payload| payload.super_class)
        .and_then(|sup| prototype_of(rt, sup))
        .unwrap_or(rt.protos().object)
}

/// Enumerable names of a value, for the `hasnext`/`nextname` family.
fn names_of(rt: &Runtime, value: &Value) -> Vec<String> {
    value.as_object().map(|id| rt.enumerate(id)).unwrap_or_default()
}

fn next_index(rt: &Runtime, object: &Value, index: f64) -> f64 {
    let count = names_of(rt, object).len() as f64;
    if index.is_finite() && index >= 0.0 && index < count {
        index + 1.0
    } else {
        0.0
    }
}

fn nth_name(rt: &Runtime, object: &Value, index: f64) -> Option<String> {
    if !(index.is_finite() && index >= 1.0) {
        return None;
    }
    names_of(rt, object).into_iter().nth(index as usize - 1)
}

fn execute(
    rt: &mut Runtime,
    act: &mut Activation<'_>,
    body: &MethodBody,
    op: Op,
    pc: usize,
    next: usize,
) -> ScriptResult<Step> {
    let len = body.code.len();
    let abc = act.abc;
    let pool = &abc.constant_pool;
    match op {
        Op::Nop | Op::Label | Op::Debug | Op::DebugLine(_) | Op::DebugFile(_) => {}

        // Control flow
        Op::Branch(cond, offset) => {
            let (a, b) = match cond.operand_count() {
                0 => (Value::Undefined, Value::Undefined),
                1 => (act.pop()?, Value::Undefined),
                _ => {
                    let b = act.pop()?;
                    (act.pop()?, b)
                }
            };
            if compare(rt, cond, &a, &b)? {
                return Ok(Step::Jump(branch_target(next, offset, len)?));
            }
        }
        Op::LookupSwitch { default, cases } => {
            let index = pop_number(rt, act)?;
            let offset = if index.is_finite() && index >= 0.0 {
                cases.get(index as usize).copied().unwrap_or(default)
            } else {
                default
            };
            return Ok(Step::Jump(branch_target(pc, offset, len)?));
        }
        Op::ReturnVoid => return Ok(Step::Return(Value::Undefined)),
        Op::ReturnValue => return Ok(Step::Return(act.pop()?)),
        Op::Throw => {
            let value = act.pop()?;
            return Err(ScriptError::thrown(value));
        }

        // Stack
        Op::PushNull => act.push(Value::Null),
        Op::PushUndefined => act.push(Value::Undefined),
        Op::PushTrue => act.push(Value::Boolean(true)),
        Op::PushFalse => act.push(Value::Boolean(false)),
        Op::PushNaN => act.push(Value::Number(f64::NAN)),
        Op::PushByte(n) => act.push(Value::Number(f64::from(n))),
        Op::PushShort(n) => act.push(Value::Number(f64::from(n))),
        Op::PushInt(index) => {
            let n = pool_entry(&pool.ints, index, "int")?;
            act.push(Value::Number(f64::from(n)));
        }
        Op::PushUint(index) => {
            let n = pool_entry(&pool.uints, index, "uint")?;
            act.push(Value::Number(f64::from(n)));
        }
        Op::PushDouble(index) => {
            let n = pool_entry(&pool.doubles, index, "double")?;
            act.push(Value::Number(n));
        }
        Op::PushString(index) => {
            let s = abc
                .string(index)
                .ok_or_else(|| ScriptError::malformed(format!("string pool index {}", index)))?;
            act.push(Value::from(s));
        }
        Op::PushNamespace(index) => {
            act.push(abc.namespace_name(index).map(Value::from).unwrap_or_default());
        }
        Op::Pop => {
            act.pop()?;
        }
        Op::Dup => {
            let top = act.stack.last().cloned().ok_or_else(ScriptError::stack_underflow)?;
            act.push(top);
        }
        Op::Swap => {
            let b = act.pop()?;
            let a = act.pop()?;
            act.push(b);
            act.push(a);
        }

        // Locals
        Op::GetLocal(index) => {
            let value = act.local(index)?;
            act.push(value);
        }
        Op::SetLocal(index) => {
            let value = act.pop()?;
            act.set_local(index, value)?;
        }
        Op::Kill(index) => act.set_local(index, Value::Undefined)?,
        Op::IncLocal(index) | Op::DecLocal(index) => {
            let current = act.local(index)?;
            let n = rt.to_number_value(&current)?;
            let delta = if matches!(op, Op::IncLocal(_)) { 1.0 } else { -1.0 };
            act.set_local(index, Value::Number(n + delta))?;
        }
        Op::IncLocalInt(index) | Op::DecLocalInt(index) => {
            let current = act.local(index)?;
            let n = to_int32(rt.to_number_value(&current)?);
            let delta = if matches!(op, Op::IncLocalInt(_)) { 1 } else { -1 };
            act.set_local(index, Value::Number(f64::from(n.wrapping_add(delta))))?;
        }

        // Scope
        Op::PushScope | Op::PushWith => {
            let value = act.pop()?;
            let Some(object) = rt.to_object(&value) else {
                return Err(ScriptError::new(
                    ErrorKind::TypeError,
                    "cannot push null or undefined onto the scope stack",
                ));
            };
            act.scope.push(ScopeEntry {
                object,
                with: matches!(op, Op::PushWith),
            });
        }
        Op::PopScope => {
            act.scope.pop().ok_or_else(ScriptError::stack_underflow)?;
        }
        Op::GetGlobalScope => {
            let global = act.global_scope(rt);
            act.push(Value::Object(global));
        }
        Op::GetScopeObject(index) => {
            let entry = act
                .scope
                .get(usize::from(index))
                .ok_or_else(|| ScriptError::malformed(format!("scope {} out of range", index)))?;
            act.push(Value::Object(entry.object));
        }

        // Names
        Op::FindPropStrict(index) | Op::FindProperty(index) => {
            let name = resolve_name(rt, act, index)?;
            let object = if matches!(op, Op::FindPropStrict(_)) {
                find_strict(rt, act, &name)?
            } else {
                find_property(rt, act, &name)?.unwrap_or_else(|| act.global_scope(rt))
            };
            act.push(Value::Object(object));
        }
        Op::GetLex(index) => {
            let name = resolve_name(rt, act, index)?;
            let object = find_strict(rt, act, &name)?;
            let value = rt.get_object_member(object, &name)?;
            act.push(value);
        }
        Op::GetProperty(index) => {
            let name = resolve_name(rt, act, index)?;
            let object = act.pop()?;
            if object.is_nullish() {
                return Err(ScriptError::new(
                    ErrorKind::TypeError,
                    format!("cannot read {} of {}", name, object.type_name()),
                ));
            }
            let value = rt.get_member(&object, &name)?;
            act.push(value);
        }
        Op::SetProperty(index) | Op::InitProperty(index) => {
            let value = act.pop()?;
            let name = resolve_name(rt, act, index)?;
            let object = act.pop()?;
            if object.is_nullish() {
                return Err(ScriptError::new(
                    ErrorKind::TypeError,
                    format!("cannot write {} of {}", name, object.type_name()),
                ));
            }
            rt.set_member(&object, &name, value)?;
        }
        Op::DeleteProperty(index) => {
            let name = resolve_name(rt, act, index)?;
            let object = act.pop()?;
            let deleted = object
                .as_object()
                .is_some_and(|id| rt.heap_mut().delete_member(id, &name));
            act.push(Value::Boolean(deleted));
        }
        Op::GetSlot(slot) | Op::SetSlot(slot) | Op::GetGlobalSlot(slot) | Op::SetGlobalSlot(slot) => {
            let set = matches!(op, Op::SetSlot(_) | Op::SetGlobalSlot(_));
            let value = if set { Some(act.pop()?) } else { None };
            let object = match op {
                Op::GetGlobalSlot(_) | Op::SetGlobalSlot(_) => act.global_scope(rt),
                _ => act.pop()?.as_object().ok_or_else(|| {
                    ScriptError::new(ErrorKind::TypeError, "slot access on a non-object")
                })?,
            };
            let name = rt
                .heap()
                .get(object)
                .and_then(|o| o.slot_names.get((slot as usize).wrapping_sub(1)).cloned())
                .filter(|n| !n.is_empty())
                .ok_or_else(|| ScriptError::malformed(format!("no slot {} on {}", slot, object)))?;
            match value {
                Some(value) => {
                    rt.set_member(&Value::Object(object), &name, value)?;
                }
                None => {
                    let value = rt.get_object_member(object, &name)?;
                    act.push(value);
                }
            }
        }
        Op::GetSuper(index) => {
            let name = resolve_name(rt, act, index)?;
            let receiver = act.pop()?;
            let proto = super_prototype(rt, act);
            let value = match rt.heap().lookup(proto, &name) {
                Some(Value::Property(accessor)) => match accessor.getter {
                    Some(getter) => rt.call_function(&Value::Object(getter), receiver, &[], None)?,
                    None => Value::Undefined,
                },
                Some(value) => value,
                None => Value::Undefined,
            };
            act.push(value);
        }
        Op::SetSuper(index) => {
            let value = act.pop()?;
            let name = resolve_name(rt, act, index)?;
            let receiver = act.pop()?;
            let proto = super_prototype(rt, act);
            match rt.heap().lookup(proto, &name) {
                Some(Value::Property(PropertyAccessor {
                    setter: Some(setter),
                    ..
                })) => {
                    rt.call_function(&Value::Object(setter), receiver, &[value], None)?;
                }
                _ => {
                    rt.set_member(&receiver, &name, value)?;
                }
            }
        }

        // Calls
        Op::Call { arg_count } => {
            let args = act.pop_args(arg_count)?;
            let receiver = act.pop()?;
            let func = act.pop()?;
            let result = call_value(rt, &func, receiver, &args, "function")?;
            act.push(result);
        }
        Op::Construct { arg_count } => {
            let args = act.pop_args(arg_count)?;
            let ctor = act.pop()?;
            if !rt.is_callable(&ctor) {
                return Err(ScriptError::new(ErrorKind::TypeError, "construct on a non-constructor"));
            }
            let instance = rt.construct(&ctor, &args, None)?;
            act.push(instance);
        }
        Op::CallProperty {
            name,
            arg_count,
            lex,
            void,
        } => {
            let args = act.pop_args(arg_count)?;
            let name = resolve_name(rt, act, name)?;
            let object = act.pop()?;
            if object.is_nullish() {
                return Err(ScriptError::new(
                    ErrorKind::TypeError,
                    format!("cannot call {} on {}", name, object.type_name()),
                ));
            }
            let func = rt.get_member(&object, &name)?;
            let receiver = if lex { Value::Null } else { rt.receiver_this(&object) };
            let result = call_value(rt, &func, receiver, &args, &name)?;
            if !void {
                act.push(result);
            }
        }
        Op::CallSuper {
            name,
            arg_count,
            void,
        } => {
            let args = act.pop_args(arg_count)?;
            let name = resolve_name(rt, act, name)?;
            let receiver = act.pop()?;
            let proto = super_prototype(rt, act);
            let func = rt.heap().lookup(proto, &name).unwrap_or_default();
            let result = call_value(rt, &func, receiver, &args, &name)?;
            if !void {
                act.push(result);
            }
        }
        Op::CallStatic { method, arg_count } => {
            let args = act.pop_args(arg_count)?;
            let receiver = act.pop()?;
            let scope = act.full_scope();
            let result = call_method(rt, abc, method, &scope, receiver, &args, act.class)?;
            act.push(result);
        }
        Op::CallMethod { .. } => {
            return Err(ScriptError::new(
                ErrorKind::UnimplementedOpcode(0x43),
                "callmethod by dispatch id",
            ));
        }
        Op::ConstructProp { name, arg_count } => {
            let args = act.pop_args(arg_count)?;
            let name = resolve_name(rt, act, name)?;
            let object = act.pop()?;
            let ctor = rt.get_member(&object, &name)?;
            if !rt.is_callable(&ctor) {
                warn!(name = %name, "new on a non-constructor");
                return Err(ScriptError::new(
                    ErrorKind::TypeError,
                    format!("{} is not a constructor", name),
                ));
            }
            let instance = rt.construct(&ctor, &args, None)?;
            act.push(instance);
        }
        Op::ConstructSuper { arg_count } => {
            let args = act.pop_args(arg_count)?;
            let receiver = act.pop()?;
            let super_class = act
                .class
                .and_then(|class| class_payload(rt, class))
                .and_then(|payload| payload.super_class);
            if let Some(super_class) = super_class {
                if let Some(payload) = class_payload(rt, super_class) {
                    run_instance_init(rt, super_class, &payload, receiver, &args)?;
                }
            }
        }
        Op::NewFunction(method) => {
            let scope = act.full_scope();
            let func = method_closure(rt, abc, method, &scope, None);
            act.push(Value::Object(func));
        }
        Op::NewClass(index) => {
            let base = act.pop()?;
            let scope = act.full_scope();
            let class = new_class(rt, abc, index as usize, &base, scope)?;
            act.push(Value::Object(class));
        }
        Op::NewObject { arg_count } => {
            let pairs = act.pop_args(arg_count.saturating_mul(2))?;
            let object = rt.new_object();
            for pair in pairs.chunks(2) {
                let name = rt.to_string_value(&pair[0])?;
                rt.set_member(&Value::Object(object), &name, pair[1].clone())?;
            }
            act.push(Value::Object(object));
        }
        Op::NewArray { arg_count } => {
            let elements = act.pop_args(arg_count)?;
            let array = rt.new_array(elements);
            act.push(Value::Object(array));
        }
        Op::NewActivation => {
            let activation = rt
                .heap_mut()
                .register(ScriptObject::new(ObjectKind::Activation));
            let scope = act.full_scope();
            apply_traits(rt, abc, activation, &body.traits, &scope, None, TraitSet::All);
            act.push(Value::Object(activation));
        }
        Op::NewCatch(index) => {
            let info = body
                .exceptions
                .get(index as usize)
                .ok_or_else(|| ScriptError::malformed(format!("no exception entry {}", index)))?;
            let scope = rt
                .heap_mut()
                .register(ScriptObject::new(ObjectKind::Activation));
            if let Some(name) = abc.multiname_local_name(info.var_name) {
                rt.heap_mut()
                    .define_member(scope, name, Value::Undefined, PropFlags::NONE);
                rt.heap_mut().set_slot_names(scope, vec![name.to_string()]);
            }
            act.push(Value::Object(scope));
        }
        Op::GetDescendants(_) => {
            return Err(ScriptError::new(
                ErrorKind::UnimplementedOpcode(0x59),
                "getdescendants",
            ));
        }

        // Enumeration
        Op::HasNext => {
            let index = pop_number(rt, act)?;
            let object = act.pop()?;
            act.push(Value::Number(next_index(rt, &object, index)));
        }
        Op::HasNext2 {
            object_reg,
            index_reg,
        } => {
            let object = act.local(object_reg)?;
            let current = act.local(index_reg)?;
            let index = rt.to_number_value(&current)?;
            let next_index = next_index(rt, &object, index);
            act.set_local(index_reg, Value::Number(next_index))?;
            if next_index == 0.0 {
                act.set_local(object_reg, Value::Null)?;
            }
            act.push(Value::Boolean(next_index != 0.0));
        }
        Op::NextName | Op::NextValue => {
            let index = pop_number(rt, act)?;
            let object = act.pop()?;
            let value = match nth_name(rt, &object, index) {
                Some(name) if matches!(op, Op::NextValue) => rt.get_member(&object, &name)?,
                Some(name) => Value::String(name),
                None => Value::Undefined,
            };
            act.push(value);
        }

        // Conversion
        Op::ConvertString | Op::CoerceString => {
            let value = act.pop()?;
            let converted = if matches!(op, Op::CoerceString) && value.is_nullish() {
                Value::Null
            } else {
                Value::String(rt.to_string_value(&value)?)
            };
            act.push(converted);
        }
        Op::ConvertInt | Op::CoerceInt => {
            let n = pop_number(rt, act)?;
            act.push(Value::Number(f64::from(to_int32(n))));
        }
        Op::ConvertUint | Op::CoerceUint => {
            let n = pop_number(rt, act)?;
            act.push(Value::Number(f64::from(to_uint32(n))));
        }
        Op::ConvertDouble | Op::CoerceDouble => {
            let n = pop_number(rt, act)?;
            act.push(Value::Number(n));
        }
        Op::ConvertBool | Op::CoerceBool => {
            let value = act.pop()?;
            act.push(Value::Boolean(rt.to_bool(&value)));
        }
        Op::ConvertObject => {
            let value = act.pop()?;
            if value.is_nullish() {
                return Err(ScriptError::new(
                    ErrorKind::TypeError,
                    "cannot convert null or undefined to an object",
                ));
            }
            act.push(value);
        }
        Op::CoerceAny | Op::CoerceObject | Op::Coerce(_) => {}
        Op::AsType(index) | Op::IsType(index) => {
            let value = act.pop()?;
            let matches = type_name(abc, index).is_some_and(|name| is_type(rt, &value, name));
            act.push(match op {
                Op::IsType(_) => Value::Boolean(matches),
                _ if matches => value,
                _ => Value::Null,
            });
        }
        Op::AsTypeLate | Op::IsTypeLate => {
            let ctor = act.pop()?;
            let value = act.pop()?;
            let matches = is_type_late(rt, &value, &ctor);
            act.push(match op {
                Op::IsTypeLate => Value::Boolean(matches),
                _ if matches => value,
                _ => Value::Null,
            });
        }

        // Arithmetic
        Op::Add => {
            let b = act.pop()?;
            let a = act.pop()?;
            let sum = rt.add(&a, &b)?;
            act.push(sum);
        }
        Op::Subtract => binary_number(rt, act, |a, b| a - b)?,
        Op::Multiply => binary_number(rt, act, |a, b| a * b)?,
        Op::Divide => binary_number(rt, act, |a, b| a / b)?,
        Op::Modulo => binary_number(rt, act, |a, b| a % b)?,
        Op::AddInt => binary_int(rt, act, |a, b| f64::from(a.wrapping_add(b)))?,
        Op::SubtractInt => binary_int(rt, act, |a, b| f64::from(a.wrapping_sub(b)))?,
        Op::MultiplyInt => binary_int(rt, act, |a, b| f64::from(a.wrapping_mul(b)))?,
        Op::LShift => binary_int(rt, act, |a, b| f64::from(a.wrapping_shl(b as u32 & 31)))?,
        Op::RShift => binary_int(rt, act, |a, b| f64::from(a.wrapping_shr(b as u32 & 31)))?,
        Op::URShift => {
            binary_int(rt, act, |a, b| f64::from((a as u32).wrapping_shr(b as u32 & 31)))?
        }
        Op::BitAnd => binary_int(rt, act, |a, b| f64::from(a & b))?,
        Op::BitOr => binary_int(rt, act, |a, b| f64::from(a | b))?,
        Op::BitXor => binary_int(rt, act, |a, b| f64::from(a ^ b))?,
        Op::BitNot => {
            let n = to_int32(pop_number(rt, act)?);
            act.push(Value::Number(f64::from(!n)));
        }
        Op::Negate => {
            let n = pop_number(rt, act)?;
            act.push(Value::Number(-n));
        }
        Op::NegateInt => {
            let n = to_int32(pop_number(rt, act)?);
            act.push(Value::Number(f64::from(n.wrapping_neg())));
        }
        Op::Increment | Op::Decrement => {
            let n = pop_number(rt, act)?;
            let delta = if matches!(op, Op::Increment) { 1.0 } else { -1.0 };
            act.push(Value::Number(n + delta));
        }
        Op::IncrementInt | Op::DecrementInt => {
            let n = to_int32(pop_number(rt, act)?);
            let delta = if matches!(op, Op::IncrementInt) { 1 } else { -1 };
            act.push(Value::Number(f64::from(n.wrapping_add(delta))));
        }
        Op::Not => {
            let value = act.pop()?;
            act.push(Value::Boolean(!rt.to_bool(&value)));
        }

        // Comparison
        Op::Equals
        | Op::StrictEquals
        | Op::LessThan
        | Op::LessEquals
        | Op::GreaterThan
        | Op::GreaterEquals => {
            let b = act.pop()?;
            let a = act.pop()?;
            let cond = match op {
                Op::Equals => Condition::Equal,
                Op::StrictEquals => Condition::StrictEqual,
                Op::LessThan => Condition::Less,
                Op::LessEquals => Condition::LessEqual,
                Op::GreaterThan => Condition::Greater,
                _ => Condition::GreaterEqual,
            };
            let result = compare(rt, cond, &a, &b)?;
            act.push(Value::Boolean(result));
        }
        Op::TypeOf => {
            let value = act.pop()?;
            let name = match rt.type_of(&value) {
                "movieclip" => "object",
                other => other,
            };
            act.push(Value::from(name));
        }
        Op::InstanceOf => {
            let ctor = act.pop()?;
            let value = act.pop()?;
            let is = ctor.as_object().is_some_and(|c| rt.is_instance_of(&value, c));
            act.push(Value::Boolean(is));
        }
        Op::In => {
            let object = act.pop()?;
            let name = act.pop()?;
            let name = rt.to_string_value(&name)?;
            let found = object.as_object().is_some_and(|id| rt.has_member(id, &name));
            act.push(Value::Boolean(found));
        }
    }
    Ok(Step::Next)
}
