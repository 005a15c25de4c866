//! `Key`: keyboard state and key listeners.

use core_types::{ObjectId, ScriptResult, Value};
use memory_manager::PropFlags;

use super::{constant, method, namespace, NativeCall};
use crate::runtime::Runtime;

const LISTENERS: &str = "_listeners";

const KEY_CODES: [(&str, u32); 18] = [
    ("BACKSPACE", 8),
    ("CAPSLOCK", 20),
    ("CONTROL", 17),
    ("DELETEKEY", 46),
    ("DOWN", 40),
    ("END", 35),
    ("ENTER", 13),
    ("ESCAPE", 27),
    ("HOME", 36),
    ("INSERT", 45),
    ("LEFT", 37),
    ("PGDN", 34),
    ("PGUP", 33),
    ("RIGHT", 39),
    ("SHIFT", 16),
    ("SPACE", 32),
    ("TAB", 9),
    ("UP", 38),
];

pub(super) fn install(rt: &mut Runtime) {
    let key = namespace(rt, "Key");
    for (name, code) in KEY_CODES {
        constant(rt, key, name, Value::Number(f64::from(code)));
    }
    method(rt, key, "isDown", is_down);
    method(rt, key, "getCode", get_code);
    method(rt, key, "getAscii", get_ascii);
    method(rt, key, "addListener", add_listener);
    method(rt, key, "removeListener", remove_listener);
    let listeners = rt.new_array(Vec::new());
    rt.heap_mut()
        .define_member(key, LISTENERS, Value::Object(listeners), PropFlags::DONT_ENUM);
}

fn listener_array(rt: &Runtime) -> Option<ObjectId> {
    let Some(Value::Object(key)) = rt.heap().get_own(rt.global(), "Key") else {
        return None;
    };
    rt.heap().get_own(key, LISTENERS)?.as_object()
}

/// Objects registered with `Key.addListener`, in registration order.
pub(crate) fn listeners(rt: &Runtime) -> Vec<Value> {
    listener_array(rt)
        .and_then(|list| rt.heap().array_elements(list))
        .map(<[Value]>::to_vec)
        .unwrap_or_default()
}

fn is_down(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let code = rt.to_number_value(&call.arg(0))?;
    let down = code >= 0.0
        && code < 256.0
        && rt.keys.down.get(code as usize).copied().unwrap_or(false);
    Ok(Value::Boolean(down))
}

fn get_code(rt: &mut Runtime, _call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(Value::Number(f64::from(rt.keys.last_code)))
}

fn get_ascii(rt: &mut Runtime, _call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(Value::Number(f64::from(rt.keys.last_ascii)))
}

fn add_listener(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let listener = call.arg(0);
    let (Some(_), Some(list)) = (listener.as_object(), listener_array(rt)) else {
        return Ok(Value::Undefined);
    };
    if !listeners(rt).contains(&listener) {
        rt.heap_mut().array_push(list, listener);
    }
    Ok(Value::Undefined)
}

fn remove_listener(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let listener = call.arg(0);
    let Some(list) = listener_array(rt) else {
        return Ok(Value::Boolean(false));
    };
    let removed = rt
        .heap_mut()
        .array_update(list, |elements| {
            let before = elements.len();
            elements.retain(|e| *e != listener);
            elements.len() != before
        })
        .unwrap_or(false);
    Ok(Value::Boolean(removed))
}
