//! `Array`.

use core_types::{ObjectId, ScriptResult, Value};
use memory_manager::MAX_ARRAY_LENGTH;

use super::{builtin, constructor, NativeCall};
use crate::runtime::Runtime;

pub(super) fn install(rt: &mut Runtime) {
    let proto = rt.protos().array;
    constructor(rt, "Array", array_ctor, proto);
    builtin(rt, "Array", "push", push);
    builtin(rt, "Array", "pop", pop);
    builtin(rt, "Array", "shift", shift);
    builtin(rt, "Array", "unshift", unshift);
    builtin(rt, "Array", "reverse", reverse);
    builtin(rt, "Array", "join", join);
    builtin(rt, "Array", "toString", to_string);
    builtin(rt, "Array", "concat", concat);
    builtin(rt, "Array", "slice", slice);
}

fn array_ctor(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let elements = match call.args {
        [Value::Number(n)] if *n >= 0.0 && n.fract() == 0.0 && *n <= f64::from(u32::MAX) => {
            vec![Value::Undefined; (*n as usize).min(MAX_ARRAY_LENGTH)]
        }
        args => args.to_vec(),
    };
    Ok(Value::Object(rt.new_array(elements)))
}

fn this_array(rt: &Runtime, call: &NativeCall<'_>) -> Option<ObjectId> {
    call.this_object()
        .filter(|id| rt.heap().array_elements(*id).is_some())
}

fn elements(rt: &Runtime, array: ObjectId) -> Vec<Value> {
    rt.heap()
        .array_elements(array)
        .map(<[Value]>::to_vec)
        .unwrap_or_default()
}

fn push(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(array) = this_array(rt, &call) else {
        return Ok(Value::Undefined);
    };
    let heap = rt.heap_mut();
    let mut len = heap.array_elements(array).map_or(0, <[Value]>::len);
    for arg in call.args {
        len = heap.array_push(array, arg.clone()).unwrap_or(len);
    }
    Ok(Value::Number(len as f64))
}

fn pop(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(array) = this_array(rt, &call) else {
        return Ok(Value::Undefined);
    };
    let heap = rt.heap_mut();
    let Some(last) = heap.array_elements(array).and_then(|e| e.last().cloned()) else {
        return Ok(Value::Undefined);
    };
    let len = heap.array_elements(array).map_or(0, <[Value]>::len);
    heap.array_set_length(array, len - 1);
    Ok(last)
}

fn shift(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(array) = this_array(rt, &call) else {
        return Ok(Value::Undefined);
    };
    Ok(rt
        .heap_mut()
        .array_update(array, |elements| {
            if elements.is_empty() {
                None
            } else {
                Some(elements.remove(0))
            }
        })
        .flatten()
        .unwrap_or_default())
}

fn unshift(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(array) = this_array(rt, &call) else {
        return Ok(Value::Undefined);
    };
    let len = rt
        .heap_mut()
        .array_update(array, |elements| {
            elements.splice(0..0, call.args.iter().cloned());
            elements.len()
        })
        .unwrap_or(0);
    Ok(Value::Number(len as f64))
}

fn reverse(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    if let Some(array) = this_array(rt, &call) {
        rt.heap_mut().array_update(array, |elements| elements.reverse());
    }
    Ok(call.this)
}

fn join_with(rt: &mut Runtime, array: ObjectId, separator: &str) -> ScriptResult<String> {
    let mut parts = Vec::new();
    for element in elements(rt, array) {
        parts.push(match element {
            Value::Undefined | Value::Null => String::new(),
            other => rt.to_string_value(&other)?,
        });
    }
    Ok(parts.join(separator))
}

fn join(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(array) = this_array(rt, &call) else {
        return Ok(Value::Undefined);
    };
    let separator = match call.arg(0) {
        Value::Undefined => ",".to_string(),
        other => rt.to_string_value(&other)?,
    };
    Ok(Value::from(join_with(rt, array, &separator)?))
}

fn to_string(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(array) = this_array(rt, &call) else {
        return Ok(Value::from("[object Object]"));
    };
    Ok(Value::from(join_with(rt, array, ",")?))
}

fn concat(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let mut out = match this_array(rt, &call) {
        Some(array) => elements(rt, array),
        None => vec![call.this.clone()],
    };
    for arg in call.args {
        match arg.as_object().and_then(|id| rt.heap().array_elements(id)) {
            Some(items) => out.extend_from_slice(items),
            None => out.push(arg.clone()),
        }
    }
    Ok(Value::Object(rt.new_array(out)))
}

/// Clamps a relative index the way `slice` does.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_undefined() {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn slice(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(array) = this_array(rt, &call) else {
        return Ok(Value::Undefined);
    };
    let items = elements(rt, array);
    let start = relative_index(&call.arg(0), items.len(), 0);
    let end = relative_index(&call.arg(1), items.len(), items.len());
    let out = if start < end {
        items[start..end].to_vec()
    } else {
        Vec::new()
    };
    Ok(Value::Object(rt.new_array(out)))
}
