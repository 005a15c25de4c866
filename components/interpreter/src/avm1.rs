//! AVM1 interpreter
//!
//! Executes tag-encoded action buffers one record at a time. There is no
//! separate call stack: calling a script function recurses into
//! [`call_function`] with a fresh [`Environment`], and `return` unwinds it.
//! A fault aborts the buffer that raised it and is reported to the caller,
//! which logs it.

use std::sync::Arc;

use bytecode_system::{Action, ActionBuffer, FunctionFlags, PushValue};
use core_types::{
    CodeLocation, ErrorKind, ObjectId, ScriptError, ScriptResult, ScriptVersion, Value,
};
use memory_manager::{ActionFunction, Callable, ObjectKind, PropFlags, ScriptObject};
use tracing::{debug, trace, warn};

use crate::context::Environment;
use crate::display::StandardProperty;
use crate::natives;
use crate::runtime::Runtime;

/// What the loop does after a record.
#[derive(Debug)]
enum Flow {
    Next,
    Jump(usize),
    Return(Value),
    End,
}

/// A frame named by a script: zero-based number or label.
#[derive(Debug)]
enum FrameRef {
    Number(u32),
    Label(String),
}

/// Runs a whole buffer in `env`. Returns the value of a top-level
/// `return`, undefined otherwise.
pub fn run_buffer(
    rt: &mut Runtime,
    env: &mut Environment,
    buffer: &ActionBuffer,
) -> ScriptResult<Value> {
    Ok(execute(rt, env, buffer, 0, buffer.len())?.unwrap_or_default())
}

/// Calls a function defined by `DefineFunction`/`DefineFunction2`.
///
/// Builds the activation object holding declared locals, preloads the
/// `function2` registers in their fixed order (`this`, `arguments`,
/// `super`, `_root`, `_parent`, `_global`) and binds parameters.
pub fn call_function(
    rt: &mut Runtime,
    callee: ObjectId,
    code: &Arc<ActionFunction>,
    scope: Vec<ObjectId>,
    target: Option<ObjectId>,
    this: Value,
    args: &[Value],
) -> ScriptResult<Value> {
    let base = rt.super_base.take();
    let this = if this.is_nullish() {
        target.map(Value::Object).unwrap_or_default()
    } else {
        this
    };
    let def = &code.def;
    let mut env = Environment::new(target, ScriptVersion::new(code.version));
    env.set_scope(scope);
    env.set_constants(code.constants.clone());
    env.set_super_base(base.or_else(|| {
        this.as_object()
            .and_then(|t| rt.heap().get(t))
            .and_then(|o| o.proto)
    }));
    env.set_this(this.clone());
    let activation = rt
        .heap_mut()
        .register(ScriptObject::new(ObjectKind::Activation));
    env.set_activation(Some(activation));

    let flags = def.flags;
    if def.is_function2 {
        let mut preload = Vec::new();
        if flags.has(FunctionFlags::PRELOAD_THIS) {
            preload.push(this);
        }
        if flags.has(FunctionFlags::PRELOAD_ARGUMENTS) {
            preload.push(Value::Object(arguments_object(rt, callee, args)));
        } else if !flags.has(FunctionFlags::SUPPRESS_ARGUMENTS) {
            let arguments = arguments_object(rt, callee, args);
            env.declare_local(rt, "arguments", Value::Object(arguments))?;
        }
        if flags.has(FunctionFlags::PRELOAD_SUPER) {
            preload.push(super_object(rt, &mut env));
        }
        if flags.has(FunctionFlags::PRELOAD_ROOT) {
            preload.push(rt.root().map(Value::Object).unwrap_or_default());
        }
        if flags.has(FunctionFlags::PRELOAD_PARENT) {
            let parent = target.and_then(|t| rt.display().parent(t));
            preload.push(parent.map(Value::Object).unwrap_or_default());
        }
        if flags.has(FunctionFlags::PRELOAD_GLOBAL) {
            preload.push(Value::Object(rt.global()));
        }

        let highest_param = def.params.iter().map(|p| usize::from(p.register)).max();
        let bank = usize::from(def.register_count)
            .max(preload.len() + 1)
            .max(highest_param.map_or(0, |r| r + 1));
        env.set_local_registers(bank);
        for (index, value) in preload.into_iter().enumerate() {
            env.set_register(index + 1, value);
        }
    } else {
        let arguments = arguments_object(rt, callee, args);
        env.declare_local(rt, "arguments", Value::Object(arguments))?;
    }

    for (index, param) in def.params.iter().enumerate() {
        let value = args.get(index).cloned().unwrap_or_default();
        if def.is_function2 && param.register != 0 {
            env.set_register(usize::from(param.register), value);
            env.bind_register_name(&param.name, param.register);
        } else {
            env.declare_local(rt, &param.name, value)?;
        }
    }

    let end = code.start + usize::from(def.body_len);
    if end > code.buffer.len() {
        warn!(
            function = %def.name,
            end,
            buffer = code.buffer.len(),
            "function body runs past its buffer"
        );
        return Ok(Value::Undefined);
    }
    match execute(rt, &mut env, &code.buffer, code.start, end) {
        Ok(value) => Ok(value.unwrap_or_default()),
        Err(err) if matches!(err.kind, ErrorKind::Thrown(_) | ErrorKind::CallDepthExceeded) => {
            Err(err)
        }
        // A broken body ends only this call; the caller keeps running.
        Err(err) => {
            warn!(function = %def.name, error = %err, "function body aborted");
            Ok(Value::Undefined)
        }
    }
}

fn arguments_object(rt: &mut Runtime, callee: ObjectId, args: &[Value]) -> ObjectId {
    let arguments = rt.new_array(args.to_vec());
    rt.heap_mut()
        .define_member(arguments, "callee", Value::Object(callee), PropFlags::DONT_ENUM);
    arguments
}

/// The `super` object of the running function, built on first use.
///
/// It inherits from the prototype above the one the method was found on,
/// carries the superclass constructor as `__constructor__`, and redirects
/// `this` back to the real receiver.
fn super_object(rt: &mut Runtime, env: &mut Environment) -> Value {
    if let Some(existing) = env.super_object() {
        return Value::Object(existing);
    }
    let (Some(this), Some(base)) = (env.this().as_object(), env.super_base()) else {
        return Value::Undefined;
    };
    let proto = rt.heap().get(base).and_then(|o| o.proto);
    let ctor = rt.heap().get_own(base, "__constructor__");
    let heap = rt.heap_mut();
    let object = heap.register(ScriptObject::with_proto(ObjectKind::Plain, proto));
    heap.set_this_override(object, Some(this));
    if let Some(ctor) = ctor {
        heap.define_member(object, "__constructor__", ctor, PropFlags::DONT_ENUM);
    }
    env.set_super_object(Some(object));
    Value::Object(object)
}

fn is_super_object(rt: &Runtime, id: ObjectId) -> bool {
    rt.heap()
        .get(id)
        .is_some_and(|o| o.this_override.is_some())
}

/// Calls `func` through a `super` object so the callee's own `super`
/// starts one prototype further up.
fn call_through_super(
    rt: &mut Runtime,
    env: &mut Environment,
    object: ObjectId,
    func: &Value,
    args: &[Value],
) -> ScriptResult<Value> {
    let this = rt.receiver_this(&Value::Object(object));
    rt.super_base = rt.heap().get(object).and_then(|o| o.proto);
    let result = rt.call_function(func, this, args, Some(env));
    rt.super_base = None;
    result
}

/// Calls `func`, or logs and yields undefined when it is not callable.
fn call_value(
    rt: &mut Runtime,
    env: &mut Environment,
    func: &Value,
    this: Value,
    args: &[Value],
    name: &str,
) -> ScriptResult<Value> {
    if !rt.is_callable(func) {
        warn!(name, "call on a non-function");
        return Ok(Value::Undefined);
    }
    rt.call_function(func, this, args, Some(env))
}

// ----------------------------------------------------------------------
// Variables
// ----------------------------------------------------------------------

fn owns(rt: &Runtime, id: ObjectId, name: &str) -> bool {
    rt.heap().get(id).is_some_and(|o| o.has_own(name))
}

/// Names every scope answers the same way.
fn special_name(rt: &mut Runtime, env: &mut Environment, name: &str) -> Option<Value> {
    let value = if name.eq_ignore_ascii_case("this") {
        env.this().clone()
    } else if name.eq_ignore_ascii_case("_global") {
        Value::Object(rt.global())
    } else if name.eq_ignore_ascii_case("_root") || name.eq_ignore_ascii_case("_level0") {
        rt.root().map(Value::Object).unwrap_or_default()
    } else if name.eq_ignore_ascii_case("_parent") {
        env.target()
            .and_then(|t| rt.display().parent(t))
            .map(Value::Object)
            .unwrap_or_default()
    } else if name.eq_ignore_ascii_case("super") {
        super_object(rt, env)
    } else {
        return None;
    };
    Some(value)
}

/// Splits `path:name` and `a.b.name` into the holder and the member name.
fn split_path(
    rt: &mut Runtime,
    env: &mut Environment,
    name: &str,
) -> ScriptResult<Option<(Value, String)>> {
    if let Some(colon) = name.rfind(':') {
        let holder = env
            .resolve_target(rt, &name[..colon])
            .map(Value::Object)
            .unwrap_or_default();
        return Ok(Some((holder, name[colon + 1..].to_string())));
    }
    match name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < name.len() => {
            let holder = get_variable(rt, env, &name[..dot])?;
            Ok(Some((holder, name[dot + 1..].to_string())))
        }
        _ => Ok(None),
    }
}

/// Reads a variable.
///
/// Plain names search register bindings, `with` objects innermost first,
/// the function's locals, the captured scopes innermost first, the target
/// and finally `_global`. Slash paths name clips; `path:name` and dotted
/// names read a member of the object they lead to.
pub fn get_variable(rt: &mut Runtime, env: &mut Environment, name: &str) -> ScriptResult<Value> {
    if name.contains('/') && !name.contains(':') {
        return Ok(env
            .resolve_target(rt, name)
            .map(Value::Object)
            .unwrap_or_default());
    }
    if let Some((holder, member)) = split_path(rt, env, name)? {
        return rt.get_member(&holder, &member);
    }
    if let Some(value) = special_name(rt, env, name) {
        return Ok(value);
    }
    if let Some(register) = env.register_for_name(name) {
        return Ok(env.get_register(usize::from(register)));
    }
    let with: Vec<ObjectId> = env.with_objects().collect();
    for object in with {
        if rt.has_member(object, name) {
            return rt.get_object_member(object, name);
        }
    }
    if let Some(activation) = env.activation().filter(|a| owns(rt, *a, name)) {
        return rt.get_object_member(activation, name);
    }
    let scope: Vec<ObjectId> = env.scope().iter().rev().copied().collect();
    for object in scope {
        if owns(rt, object, name) {
            return rt.get_object_member(object, name);
        }
    }
    if let Some(target) = env.target().filter(|t| rt.has_member(*t, name)) {
        return rt.get_object_member(target, name);
    }
    let global = rt.global();
    if rt.has_member(global, name) {
        return rt.get_object_member(global, name);
    }
    Ok(Value::Undefined)
}

/// Writes a variable where [`get_variable`] would find it; names found
/// nowhere become members of the target.
pub fn set_variable(
    rt: &mut Runtime,
    env: &mut Environment,
    name: &str,
    value: Value,
) -> ScriptResult<()> {
    if let Some((holder, member)) = split_path(rt, env, name)? {
        rt.set_member(&holder, &member, value)?;
        return Ok(());
    }
    if let Some(register) = env.register_for_name(name) {
        env.set_register(usize::from(register), value);
        return Ok(());
    }
    let with: Vec<ObjectId> = env.with_objects().collect();
    for object in with {
        if rt.has_member(object, name) {
            rt.set_member(&Value::Object(object), name, value)?;
            return Ok(());
        }
    }
    if env.set_local(rt, name, value.clone()) {
        return Ok(());
    }
    let scope: Vec<ObjectId> = env.scope().iter().rev().copied().collect();
    for object in scope {
        if owns(rt, object, name) {
            rt.set_member(&Value::Object(object), name, value)?;
            return Ok(());
        }
    }
    let holder = env.target().unwrap_or_else(|| rt.global());
    rt.set_member(&Value::Object(holder), name, value)?;
    Ok(())
}

fn delete_variable(rt: &mut Runtime, env: &Environment, name: &str) -> bool {
    let holder = env
        .with_objects()
        .find(|id| owns(rt, *id, name))
        .or_else(|| env.activation().filter(|id| owns(rt, *id, name)))
        .or_else(|| env.scope().iter().rev().copied().find(|id| owns(rt, *id, name)))
        .or_else(|| env.target().filter(|id| owns(rt, *id, name)))
        .or_else(|| Some(rt.global()).filter(|id| owns(rt, *id, name)));
    holder.is_some_and(|id| rt.heap_mut().delete_member(id, name))
}

// ----------------------------------------------------------------------
// Operand helpers
// ----------------------------------------------------------------------

fn pop_number(rt: &mut Runtime, env: &mut Environment) -> ScriptResult<f64> {
    let value = env.pop()?;
    rt.to_number_value(&value)
}

fn pop_string(rt: &mut Runtime, env: &mut Environment) -> ScriptResult<String> {
    let value = env.pop()?;
    rt.to_string_value(&value)
}

/// Pops a count, then that many values in pop order.
fn pop_args(env: &mut Environment) -> ScriptResult<Vec<Value>> {
    let count = env.pop()?.to_number();
    let count = if count.is_finite() && count > 0.0 {
        count as usize
    } else {
        0
    };
    if count > env.stack_len() {
        return Err(ScriptError::stack_underflow());
    }
    (0..count).map(|_| env.pop()).collect()
}

/// Comparison results are numbers in version 4 documents.
fn push_bool(env: &mut Environment, b: bool) {
    if env.version().get() < 5 {
        env.push(Value::Number(if b { 1.0 } else { 0.0 }));
    } else {
        env.push(Value::Boolean(b));
    }
}

fn binary_number(
    rt: &mut Runtime,
    env: &mut Environment,
    f: impl FnOnce(f64, f64) -> f64,
) -> ScriptResult<()> {
    let b = pop_number(rt, env)?;
    let a = pop_number(rt, env)?;
    env.push(Value::Number(f(a, b)));
    Ok(())
}

fn binary_int(
    rt: &mut Runtime,
    env: &mut Environment,
    f: impl FnOnce(i32, i32) -> f64,
) -> ScriptResult<()> {
    let b = core_types::to_int32(pop_number(rt, env)?);
    let a = core_types::to_int32(pop_number(rt, env)?);
    env.push(Value::Number(f(a, b)));
    Ok(())
}

fn compare_strings(
    rt: &mut Runtime,
    env: &mut Environment,
    f: impl FnOnce(&str, &str) -> bool,
) -> ScriptResult<()> {
    let b = pop_string(rt, env)?;
    let a = pop_string(rt, env)?;
    push_bool(env, f(&a, &b));
    Ok(())
}

fn push_value(env: &mut Environment, value: PushValue) {
    let value = match value {
        PushValue::Str(s) => Value::String(s),
        PushValue::Float(f) => Value::Number(f64::from(f)),
        PushValue::Null => Value::Null,
        PushValue::Undefined => Value::Undefined,
        PushValue::Register(r) => env.get_register(usize::from(r)),
        PushValue::Bool(b) => Value::Boolean(b),
        PushValue::Double(d) => Value::Number(d),
        PushValue::Int(i) => Value::Number(f64::from(i)),
        PushValue::Constant8(i) => constant(env, usize::from(i)),
        PushValue::Constant16(i) => constant(env, usize::from(i)),
    };
    env.push(value);
}

fn constant(env: &Environment, index: usize) -> Value {
    env.constants()
        .get(index)
        .cloned()
        .map(Value::String)
        .unwrap_or_default()
}

/// An object, a target path, or the current target for undefined.
fn target_of(rt: &Runtime, env: &Environment, value: &Value) -> Option<ObjectId> {
    match value {
        Value::Object(id) => Some(*id),
        Value::Undefined => env.target(),
        Value::String(path) => env.resolve_target(rt, path),
        other => env.resolve_target(rt, &other.to_string()),
    }
}

fn clip_target(rt: &Runtime, env: &Environment) -> Option<ObjectId> {
    env.target().filter(|t| rt.display().contains(*t))
}

/// `frame`, `label` or `path:frame`.
fn resolve_frame(rt: &Runtime, env: &Environment, value: &Value) -> Option<(ObjectId, FrameRef)> {
    let (clip, spec) = match value {
        Value::String(s) => match s.rfind(':') {
            Some(colon) => (env.resolve_target(rt, &s[..colon])?, s[colon + 1..].to_string()),
            None => (env.target()?, s.clone()),
        },
        other => (env.target()?, other.to_string()),
    };
    match spec.trim().parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 1.0 => Some((clip, FrameRef::Number(n as u32 - 1))),
        Ok(_) => None,
        Err(_) => Some((clip, FrameRef::Label(spec))),
    }
}

fn push_enumeration(rt: &Runtime, env: &mut Environment, object: &Value) {
    env.push(Value::Null);
    if let Some(id) = object.as_object() {
        for name in rt.enumerate(id).into_iter().rev() {
            env.push(Value::String(name));
        }
    }
}

fn fs_command_or_url(rt: &mut Runtime, url: &str, target: &str) {
    const PREFIX: &str = "fscommand:";
    match url.get(..PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(PREFIX) => {
            rt.fs_command(&url[PREFIX.len()..], target);
        }
        _ => debug!(url, target, "url load ignored"),
    }
}

fn branch(next: usize, offset: i16, start: usize, end: usize) -> ScriptResult<usize> {
    let target = next as i64 + i64::from(offset);
    if target < start as i64 || target > end as i64 {
        return Err(ScriptError::malformed(format!(
            "branch to {} outside {}..{}",
            target, start, end
        )));
    }
    Ok(target as usize)
}

// ----------------------------------------------------------------------
// Dispatch
// ----------------------------------------------------------------------

/// Runs `buffer[start..end]`. Returns the value of `return`, if reached.
fn execute(
    rt: &mut Runtime,
    env: &mut Environment,
    buffer: &ActionBuffer,
    start: usize,
    end: usize,
) -> ScriptResult<Option<Value>> {
    let mut pc = start;
    loop {
        if pc >= end {
            return Ok(None);
        }
        env.unwind_with(pc);
        let (action, next) = buffer
            .decode_at(pc)
            .map_err(|e| ScriptError::malformed(e.to_string()).at(CodeLocation::action(pc)))?;
        if next > end {
            return Err(ScriptError::malformed("record crosses the end of its block")
                .at(CodeLocation::action(pc)));
        }
        if rt.verbose() {
            trace!(target: "tessera::avm1", pc, "{}", action);
        }
        let flow = step(rt, env, buffer, action, next, start, end)
            .map_err(|e| e.at(CodeLocation::action(pc)))?;
        match flow {
            Flow::Next => pc = next,
            Flow::Jump(target) => pc = target,
            Flow::Return(value) => return Ok(Some(value)),
            Flow::End => return Ok(None),
        }
    }
}

fn step(
    rt: &mut Runtime,
    env: &mut Environment,
    buffer: &ActionBuffer,
    action: Action,
    next: usize,
    start: usize,
    end: usize,
) -> ScriptResult<Flow> {
    match action {
        Action::End => return Ok(Flow::End),

        // Timeline control
        Action::NextFrame | Action::PrevFrame => {
            if let Some(clip) = clip_target(rt, env) {
                if let Some(current) = rt.display().current_frame(clip) {
                    let frame = if matches!(action, Action::NextFrame) {
                        current + 1
                    } else {
                        current.saturating_sub(1)
                    };
                    rt.goto_frame(clip, frame, false);
                }
            }
        }
        Action::Play | Action::Stop => {
            if let Some(clip) = clip_target(rt, env) {
                rt.display_mut()
                    .set_playing(clip, matches!(action, Action::Play));
            }
        }
        Action::GotoFrame(frame) => {
            if let Some(clip) = clip_target(rt, env) {
                rt.goto_frame(clip, u32::from(frame), false);
            }
        }
        Action::GotoLabel(label) => {
            if let Some(clip) = clip_target(rt, env) {
                if !rt.goto_label(clip, &label, false) {
                    warn!(label = %label, "goto unknown frame label");
                }
            }
        }
        Action::GotoFrame2 { play, scene_bias } => {
            let frame = env.pop()?;
            match resolve_frame(rt, env, &frame) {
                Some((clip, FrameRef::Number(n))) => {
                    rt.goto_frame(clip, n + u32::from(scene_bias), play);
                }
                Some((clip, FrameRef::Label(label))) => {
                    rt.goto_label(clip, &label, play);
                }
                None => {}
            }
        }
        Action::Call => {
            let frame = env.pop()?;
            match resolve_frame(rt, env, &frame) {
                Some((clip, FrameRef::Number(n))) => {
                    rt.run_frame_actions(clip, n);
                }
                Some((_, FrameRef::Label(label))) => {
                    warn!(label = %label, "call by frame label is not supported");
                }
                None => {}
            }
        }
        Action::WaitForFrame { .. } => {}
        Action::WaitForFrame2 { .. } => {
            env.pop()?;
        }
        Action::ToggleQuality | Action::StopSounds => {
            debug!(action = %action, "display-only action ignored");
        }
        Action::SetTarget(path) => {
            if path.is_empty() {
                env.restore_target();
            } else {
                match env.resolve_target(rt, &path) {
                    Some(target) => env.set_target(Some(target)),
                    None => warn!(path = %path, "settarget to a missing clip"),
                }
            }
        }
        Action::SetTarget2 => {
            let target = env.pop()?;
            match target {
                Value::String(ref path) if path.is_empty() => env.restore_target(),
                other => match target_of(rt, env, &other) {
                    Some(target) => env.set_target(Some(target)),
                    None => warn!(target = %other, "settarget to a missing clip"),
                },
            }
        }
        Action::GetUrl { url, target } => fs_command_or_url(rt, &url, &target),
        Action::GetUrl2 { .. } => {
            let target = pop_string(rt, env)?;
            let url = pop_string(rt, env)?;
            fs_command_or_url(rt, &url, &target);
        }

        // Arithmetic and logic
        Action::Add => binary_number(rt, env, |a, b| a + b)?,
        Action::Subtract => binary_number(rt, env, |a, b| a - b)?,
        Action::Multiply => binary_number(rt, env, |a, b| a * b)?,
        Action::Divide => binary_number(rt, env, |a, b| a / b)?,
        Action::Modulo => binary_number(rt, env, |a, b| a % b)?,
        Action::Equals => {
            let b = pop_number(rt, env)?;
            let a = pop_number(rt, env)?;
            push_bool(env, a == b);
        }
        Action::Less => {
            let b = pop_number(rt, env)?;
            let a = pop_number(rt, env)?;
            push_bool(env, a < b);
        }
        Action::And | Action::Or => {
            let b = env.pop()?;
            let a = env.pop()?;
            let (a, b) = (rt.to_bool(&a), rt.to_bool(&b));
            push_bool(
                env,
                if matches!(action, Action::And) {
                    a && b
                } else {
                    a || b
                },
            );
        }
        Action::Not => {
            let v = env.pop()?;
            let b = rt.to_bool(&v);
            push_bool(env, !b);
        }
        Action::Add2 => {
            let b = env.pop()?;
            let a = env.pop()?;
            let sum = rt.add(&a, &b)?;
            env.push(sum);
        }
        Action::Less2 | Action::Greater => {
            let b = env.pop()?;
            let a = env.pop()?;
            let result = if matches!(action, Action::Less2) {
                rt.less_than(&a, &b)?
            } else {
                rt.less_than(&b, &a)?
            };
            env.push(result);
        }
        Action::Equals2 => {
            let b = env.pop()?;
            let a = env.pop()?;
            let equal = rt.loose_equals(&a, &b)?;
            env.push(Value::Boolean(equal));
        }
        Action::StrictEquals => {
            let b = env.pop()?;
            let a = env.pop()?;
            env.push(Value::Boolean(a.strict_equals(&b)));
        }
        Action::Increment | Action::Decrement => {
            let n = pop_number(rt, env)?;
            let delta = if matches!(action, Action::Increment) {
                1.0
            } else {
                -1.0
            };
            env.push(Value::Number(n + delta));
        }
        Action::ToInteger => {
            let n = pop_number(rt, env)?;
            env.push(Value::Number(if n.is_nan() { 0.0 } else { n.trunc() }));
        }
        Action::ToNumber => {
            let n = pop_number(rt, env)?;
            env.push(Value::Number(n));
        }
        Action::ToString => {
            let s = pop_string(rt, env)?;
            env.push(Value::String(s));
        }
        Action::BitAnd => binary_int(rt, env, |a, b| f64::from(a & b))?,
        Action::BitOr => binary_int(rt, env, |a, b| f64::from(a | b))?,
        Action::BitXor => binary_int(rt, env, |a, b| f64::from(a ^ b))?,
        Action::BitLShift => binary_int(rt, env, |a, b| f64::from(a.wrapping_shl(b as u32 & 31)))?,
        Action::BitRShift => binary_int(rt, env, |a, b| f64::from(a.wrapping_shr(b as u32 & 31)))?,
        Action::BitURShift => {
            binary_int(rt, env, |a, b| f64::from((a as u32).wrapping_shr(b as u32 & 31)))?
        }

        // Strings
        Action::StringEquals => compare_strings(rt, env, |a, b| a == b)?,
        Action::StringLess => compare_strings(rt, env, |a, b| a < b)?,
        Action::StringGreater => compare_strings(rt, env, |a, b| a > b)?,
        Action::StringAdd => {
            let b = pop_string(rt, env)?;
            let mut a = pop_string(rt, env)?;
            a.push_str(&b);
            env.push(Value::String(a));
        }
        Action::StringLength => {
            let s = pop_string(rt, env)?;
            env.push(Value::Number(s.encode_utf16().count() as f64));
        }
        Action::MbStringLength => {
            let s = pop_string(rt, env)?;
            env.push(Value::Number(s.chars().count() as f64));
        }
        Action::StringExtract => {
            let count = pop_number(rt, env)?;
            let index = pop_number(rt, env)?;
            let units: Vec<u16> = pop_string(rt, env)?.encode_utf16().collect();
            let (from, to) = extract_range(units.len(), index, count);
            env.push(Value::String(String::from_utf16_lossy(&units[from..to])));
        }
        Action::MbStringExtract => {
            let count = pop_number(rt, env)?;
            let index = pop_number(rt, env)?;
            let chars: Vec<char> = pop_string(rt, env)?.chars().collect();
            let (from, to) = extract_range(chars.len(), index, count);
            env.push(Value::String(chars[from..to].iter().collect()));
        }
        Action::CharToAscii => {
            let s = pop_string(rt, env)?;
            let code = s.encode_utf16().next().map_or(0.0, f64::from);
            env.push(Value::Number(code));
        }
        Action::MbCharToAscii => {
            let s = pop_string(rt, env)?;
            let code = s.chars().next().map_or(0.0, |c| f64::from(u32::from(c)));
            env.push(Value::Number(code));
        }
        Action::AsciiToChar => {
            let code = pop_number(rt, env)?;
            let unit = core_types::to_uint32(code) as u16;
            env.push(Value::String(String::from_utf16_lossy(&[unit])));
        }
        Action::MbAsciiToChar => {
            let code = core_types::to_uint32(pop_number(rt, env)?);
            let text = char::from_u32(code).map(String::from).unwrap_or_default();
            env.push(Value::String(text));
        }

        // Stack
        Action::Push(values) => {
            for value in values {
                push_value(env, value);
            }
        }
        Action::Pop => {
            env.pop()?;
        }
        Action::PushDuplicate => {
            let top = env.peek()?.clone();
            env.push(top);
        }
        Action::StackSwap => env.swap_top()?,
        Action::StoreRegister(register) => {
            let top = env.peek()?.clone();
            if !env.set_register(usize::from(register), top) {
                warn!(register, "store to a register outside the bank");
            }
        }
        Action::ConstantPool(constants) => env.set_constants(Arc::from(constants)),

        // Variables and members
        Action::GetVariable => {
            let name = pop_string(rt, env)?;
            let value = get_variable(rt, env, &name)?;
            env.push(value);
        }
        Action::SetVariable => {
            let value = env.pop()?;
            let name = pop_string(rt, env)?;
            set_variable(rt, env, &name, value)?;
        }
        Action::DefineLocal => {
            let value = env.pop()?;
            let name = pop_string(rt, env)?;
            env.declare_local(rt, &name, value)?;
        }
        Action::DefineLocal2 => {
            let name = pop_string(rt, env)?;
            let holder = env.activation().or(env.target());
            if !holder.is_some_and(|h| owns(rt, h, &name)) {
                env.declare_local(rt, &name, Value::Undefined)?;
            }
        }
        Action::Delete => {
            let name = pop_string(rt, env)?;
            let object = env.pop()?;
            let deleted = object
                .as_object()
                .is_some_and(|id| rt.heap_mut().delete_member(id, &name));
            push_bool(env, deleted);
        }
        Action::Delete2 => {
            let name = pop_string(rt, env)?;
            let deleted = delete_variable(rt, env, &name);
            push_bool(env, deleted);
        }
        Action::GetMember => {
            let name = pop_string(rt, env)?;
            let object = env.pop()?;
            let value = rt.get_member(&object, &name)?;
            env.push(value);
        }
        Action::SetMember => {
            let value = env.pop()?;
            let name = pop_string(rt, env)?;
            let object = env.pop()?;
            rt.set_member(&object, &name, value)?;
        }
        Action::GetProperty => {
            let index = pop_number(rt, env)?;
            let target = env.pop()?;
            let prop = (index >= 0.0)
                .then(|| StandardProperty::from_index(index as usize))
                .flatten();
            let value = match (target_of(rt, env, &target), prop) {
                (Some(clip), Some(prop)) => rt.get_object_member(clip, prop.name())?,
                _ => Value::Undefined,
            };
            env.push(value);
        }
        Action::SetProperty => {
            let value = env.pop()?;
            let index = pop_number(rt, env)?;
            let target = env.pop()?;
            let prop = (index >= 0.0)
                .then(|| StandardProperty::from_index(index as usize))
                .flatten();
            if let (Some(clip), Some(prop)) = (target_of(rt, env, &target), prop) {
                rt.set_member(&Value::Object(clip), prop.name(), value)?;
            }
        }
        Action::TypeOf => {
            let value = env.pop()?;
            env.push(Value::from(rt.type_of(&value)));
        }
        Action::TargetPath => {
            let value = env.pop()?;
            let path = value
                .as_object()
                .filter(|id| rt.display().contains(*id))
                .map(|id| Value::String(rt.display().target_path(id)))
                .unwrap_or_default();
            env.push(path);
        }
        Action::InstanceOf => {
            let ctor = env.pop()?;
            let object = env.pop()?;
            let is = ctor.as_object().is_some_and(|c| rt.is_instance_of(&object, c));
            env.push(Value::Boolean(is));
        }
        Action::Enumerate => {
            let name = pop_string(rt, env)?;
            let object = get_variable(rt, env, &name)?;
            push_enumeration(rt, env, &object);
        }
        Action::Enumerate2 => {
            let object = env.pop()?;
            push_enumeration(rt, env, &object);
        }
        Action::Extends => {
            let superclass = env.pop()?;
            let subclass = env.pop()?;
            if let (Some(_), Some(sup)) = (subclass.as_object(), superclass.as_object()) {
                let super_proto = rt.get_object_member(sup, "prototype")?.as_object();
                let heap = rt.heap_mut();
                let proto = heap.register(ScriptObject::with_proto(ObjectKind::Plain, super_proto));
                heap.define_member(proto, "__constructor__", superclass, PropFlags::DONT_ENUM);
                rt.set_member(&subclass, "prototype", Value::Object(proto))?;
            }
        }

        // Objects and calls
        Action::InitArray => {
            let elements = pop_args(env)?;
            let array = rt.new_array(elements);
            env.push(Value::Object(array));
        }
        Action::InitObject => {
            let count = pop_number(rt, env)?;
            let count = if count.is_finite() && count > 0.0 {
                count as usize
            } else {
                0
            };
            if count.saturating_mul(2) > env.stack_len() {
                return Err(ScriptError::stack_underflow());
            }
            let mut pairs = Vec::with_capacity(count);
            for _ in 0..count {
                let value = env.pop()?;
                let name = pop_string(rt, env)?;
                pairs.push((name, value));
            }
            let object = rt.new_object();
            for (name, value) in pairs.into_iter().rev() {
                rt.set_member(&Value::Object(object), &name, value)?;
            }
            env.push(Value::Object(object));
        }
        Action::CallFunction => {
            let name = pop_string(rt, env)?;
            let args = pop_args(env)?;
            let func = get_variable(rt, env, &name)?;
            let result = call_value(rt, env, &func, Value::Undefined, &args, &name)?;
            env.push(result);
        }
        Action::CallMethod => {
            let name = env.pop()?;
            let object = env.pop()?;
            let args = pop_args(env)?;
            let name = match name {
                Value::Undefined => String::new(),
                other => rt.to_string_value(&other)?,
            };
            let result = call_method(rt, env, &object, &name, &args)?;
            env.push(result);
        }
        Action::NewObject => {
            let name = pop_string(rt, env)?;
            let args = pop_args(env)?;
            let ctor = get_variable(rt, env, &name)?;
            let instance = construct_value(rt, env, &ctor, &args, &name)?;
            env.push(instance);
        }
        Action::NewMethod => {
            let name = env.pop()?;
            let object = env.pop()?;
            let args = pop_args(env)?;
            let (ctor, name) = match name {
                Value::Undefined => (object, String::new()),
                Value::String(ref s) if s.is_empty() => (object, String::new()),
                other => {
                    let name = rt.to_string_value(&other)?;
                    (rt.get_member(&object, &name)?, name)
                }
            };
            let instance = construct_value(rt, env, &ctor, &args, &name)?;
            env.push(instance);
        }
        Action::DefineFunction(def) => {
            let body_end = next + usize::from(def.body_len);
            if body_end > end {
                return Err(ScriptError::malformed(format!(
                    "function body ends at {} past block end {}",
                    body_end, end
                )));
            }
            let name = def.name.clone();
            let code = Arc::new(ActionFunction {
                buffer: buffer.clone(),
                start: next,
                def,
                constants: env.constants().clone(),
                version: env.version().get(),
            });
            let func = rt.new_function(Callable::Action {
                code,
                scope: env.closure_scope(),
                target: env.target(),
            });
            if name.is_empty() {
                env.push(Value::Object(func));
            } else {
                env.declare_local(rt, &name, Value::Object(func))?;
            }
            return Ok(Flow::Jump(body_end));
        }
        Action::Return => return Ok(Flow::Return(env.pop()?)),
        Action::Throw => {
            let value = env.pop()?;
            return Err(ScriptError::thrown(value));
        }
        Action::With { block_len } => {
            let object = env.pop()?;
            let block_end = next + usize::from(block_len);
            if block_end > end {
                return Err(ScriptError::malformed("with block past block end"));
            }
            match rt.to_object(&object) {
                Some(id) => {
                    if !env.with_push(id, block_end) {
                        warn!("with nesting too deep; block runs without its scope");
                    }
                }
                None => warn!(value = %object, "with on a non-object"),
            }
        }

        // Control flow
        Action::Jump(offset) => return Ok(Flow::Jump(branch(next, offset, start, end)?)),
        Action::If(offset) => {
            let condition = env.pop()?;
            if rt.to_bool(&condition) {
                return Ok(Flow::Jump(branch(next, offset, start, end)?));
            }
        }

        // Clips
        Action::CloneSprite => {
            let depth = pop_number(rt, env)?;
            let name = pop_string(rt, env)?;
            let source = env.pop()?;
            let depth = if depth.is_finite() { depth as i32 } else { 0 };
            match target_of(rt, env, &source) {
                Some(source) if rt.display().contains(source) => {
                    natives::duplicate_clip(rt, source, &name, depth);
                }
                _ => warn!(name = %name, "duplicate of a missing clip"),
            }
        }
        Action::RemoveSprite => {
            let target = env.pop()?;
            if let Some(clip) = target_of(rt, env, &target) {
                if rt.display().parent(clip).is_some() {
                    natives::remove_clip(rt, clip);
                }
            }
        }
        Action::StartDrag => {
            let target = env.pop()?;
            let lock = env.pop()?;
            let constrain = env.pop()?;
            if rt.to_bool(&constrain) {
                env.pop_n(4)?;
            }
            let lock_center = rt.to_bool(&lock);
            if let Some(clip) = target_of(rt, env, &target) {
                rt.display_mut().start_drag(clip, lock_center);
            }
        }
        Action::EndDrag => rt.display_mut().stop_drag(),

        // Host services
        Action::Trace => {
            let value = env.pop()?;
            let line = rt.to_string_value(&value)?;
            rt.trace(&line);
        }
        Action::RandomNumber => {
            let max = pop_number(rt, env)?;
            let n = if max >= 1.0 {
                (rt.rng.next_f64() * max.floor()).floor()
            } else {
                0.0
            };
            env.push(Value::Number(n));
        }
        Action::GetTime => env.push(Value::Number(rt.time_ms().floor())),

        Action::Unknown(opcode) => {
            return Err(ScriptError::new(
                ErrorKind::UnimplementedOpcode(opcode),
                format!("action 0x{:02X}", opcode),
            ));
        }
    }
    Ok(Flow::Next)
}

fn call_method(
    rt: &mut Runtime,
    env: &mut Environment,
    object: &Value,
    name: &str,
    args: &[Value],
) -> ScriptResult<Value> {
    let super_id = object.as_object().filter(|id| is_super_object(rt, *id));
    if name.is_empty() {
        return match super_id {
            Some(id) => {
                let ctor = rt.heap().get_own(id, "__constructor__").unwrap_or_default();
                if rt.is_callable(&ctor) {
                    call_through_super(rt, env, id, &ctor, args)
                } else {
                    Ok(Value::Undefined)
                }
            }
            None => call_value(rt, env, object, Value::Undefined, args, "(anonymous)"),
        };
    }
    let func = rt.get_member(object, name)?;
    match super_id {
        Some(id) if rt.is_callable(&func) => call_through_super(rt, env, id, &func, args),
        _ => {
            let this = rt.receiver_this(object);
            call_value(rt, env, &func, this, args, name)
        }
    }
}

fn construct_value(
    rt: &mut Runtime,
    env: &mut Environment,
    ctor: &Value,
    args: &[Value],
    name: &str,
) -> ScriptResult<Value> {
    if !rt.is_callable(ctor) {
        warn!(name, "new on a non-function");
        return Ok(Value::Undefined);
    }
    rt.construct(ctor, args, Some(env))
}

/// 1-based `index` and `count` of the legacy substring actions, clamped.
fn extract_range(len: usize, index: f64, count: f64) -> (usize, usize) {
    let from = if index.is_nan() || index < 1.0 {
        0
    } else {
        (index as usize - 1).min(len)
    };
    let count = if count.is_nan() || count < 0.0 {
        len - from
    } else {
        (count as usize).min(len - from)
    };
    (from, from + count)
}
