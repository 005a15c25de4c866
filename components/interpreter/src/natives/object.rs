//! `Object` and `Error`.

use core_types::{ErrorKind, PropertyAccessor, ScriptError, ScriptResult, Value};
use memory_manager::{PropFlags, Watch};

use super::{builtin, constructor, method, NativeCall};
use crate::runtime::Runtime;

pub(super) fn install(rt: &mut Runtime) {
    let proto = rt.protos().object;
    constructor(rt, "Object", object_ctor, proto);
    builtin(rt, "Object", "addProperty", add_property);
    builtin(rt, "Object", "hasOwnProperty", has_own_property);
    builtin(rt, "Object", "isPropertyEnumerable", is_property_enumerable);
    builtin(rt, "Object", "watch", watch);
    builtin(rt, "Object", "unwatch", unwatch);
    builtin(rt, "Object", "toString", to_string);
    builtin(rt, "Object", "valueOf", value_of);

    let error = rt.protos().error;
    constructor(rt, "Error", error_ctor, error);
    rt.heap_mut()
        .define_member(error, "name", Value::from("Error"), PropFlags::DONT_ENUM);
    rt.heap_mut()
        .define_member(error, "message", Value::from("Error"), PropFlags::DONT_ENUM);
    method(rt, error, "toString", error_to_string);
}

fn object_ctor(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    if call.construct {
        return Ok(Value::Undefined);
    }
    let object = match call.arg(0) {
        Value::Undefined | Value::Null => Some(rt.new_object()),
        value => rt.to_object(&value),
    };
    Ok(object.map(Value::Object).unwrap_or_default())
}

fn add_property(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(this) = call.this_object() else {
        return Ok(Value::Boolean(false));
    };
    let name = rt.to_string_value(&call.arg(0))?;
    let getter = call.arg(1);
    let setter = call.arg(2);
    if name.is_empty() || !rt.is_callable(&getter) {
        return Ok(Value::Boolean(false));
    }
    let setter = if rt.is_callable(&setter) {
        setter.as_object()
    } else if setter.is_nullish() {
        None
    } else {
        return Ok(Value::Boolean(false));
    };
    let accessor = PropertyAccessor {
        getter: getter.as_object(),
        setter,
        target: None,
    };
    rt.heap_mut()
        .define_member(this, &name, Value::Property(accessor), PropFlags::NONE);
    Ok(Value::Boolean(true))
}

fn has_own_property(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(this) = call.this_object() else {
        return Ok(Value::Boolean(false));
    };
    let name = rt.to_string_value(&call.arg(0))?;
    let own = rt.heap().get(this).is_some_and(|o| o.has_own(&name));
    Ok(Value::Boolean(own))
}

fn is_property_enumerable(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(this) = call.this_object() else {
        return Ok(Value::Boolean(false));
    };
    let name = rt.to_string_value(&call.arg(0))?;
    let enumerable = rt
        .heap()
        .get(this)
        .and_then(|o| o.own(&name))
        .is_some_and(|m| m.flags.is_enumerable());
    Ok(Value::Boolean(enumerable))
}

fn watch(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(this) = call.this_object() else {
        return Ok(Value::Boolean(false));
    };
    let name = rt.to_string_value(&call.arg(0))?;
    let callback = call.arg(1);
    let Some(callback) = callback.as_object().filter(|_| rt.is_callable(&callback)) else {
        return Ok(Value::Boolean(false));
    };
    rt.heap_mut().set_watch(
        this,
        &name,
        Watch {
            callback,
            user_data: call.arg(2),
        },
    );
    Ok(Value::Boolean(true))
}

fn unwatch(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(this) = call.this_object() else {
        return Ok(Value::Boolean(false));
    };
    let name = rt.to_string_value(&call.arg(0))?;
    Ok(Value::Boolean(rt.heap_mut().remove_watch(this, &name)))
}

fn to_string(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    match call.this {
        Value::Object(id) => Ok(Value::from(rt.default_object_string(id))),
        other => Ok(Value::from(rt.to_string_value(&other)?)),
    }
}

fn value_of(_rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(call.this)
}

fn error_ctor(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let message = call.arg(0);
    let target = match (call.construct, call.this_object()) {
        (true, Some(this)) => this,
        _ => {
            let text = rt.to_string_value(&message)?;
            return Ok(Value::Object(rt.new_error("Error", &text)));
        }
    };
    if !message.is_undefined() {
        let text = rt.to_string_value(&message)?;
        rt.heap_mut()
            .define_member(target, "message", Value::from(text), PropFlags::NONE);
    }
    Ok(Value::Undefined)
}

fn error_to_string(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let message = rt.get_member(&call.this, "message")?;
    if message.is_undefined() {
        return Err(ScriptError::new(ErrorKind::TypeError, "error without message"));
    }
    Ok(Value::from(rt.to_string_value(&message)?))
}
