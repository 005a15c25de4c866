//! `String`. Indices count UTF-16 code units, like `length`.

use core_types::{ScriptResult, Value};
use memory_manager::ObjectKind;

use super::{builtin, constructor, NativeCall};
use crate::runtime::Runtime;

pub(super) fn install(rt: &mut Runtime) {
    let proto = rt.protos().string;
    constructor(rt, "String", string_ctor, proto);
    builtin(rt, "String", "charAt", char_at);
    builtin(rt, "String", "charCodeAt", char_code_at);
    builtin(rt, "String", "indexOf", index_of);
    builtin(rt, "String", "lastIndexOf", last_index_of);
    builtin(rt, "String", "substr", substr);
    builtin(rt, "String", "substring", substring);
    builtin(rt, "String", "toUpperCase", to_upper_case);
    builtin(rt, "String", "toLowerCase", to_lower_case);
    builtin(rt, "String", "split", split);
    builtin(rt, "String", "concat", concat);
    builtin(rt, "String", "toString", value_of);
    builtin(rt, "String", "valueOf", value_of);
    let ctor = rt.heap().lookup(rt.global(), "String");
    if let Some(Value::Object(ctor)) = ctor {
        super::method(rt, ctor, "fromCharCode", from_char_code);
    }
}

fn string_ctor(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let text = match call.args.first() {
        Some(v) => rt.to_string_value(v)?,
        None => String::new(),
    };
    if call.construct {
        return Ok(rt
            .to_object(&Value::String(text))
            .map(Value::Object)
            .unwrap_or_default());
    }
    Ok(Value::String(text))
}

fn this_units(rt: &mut Runtime, call: &NativeCall<'_>) -> ScriptResult<Vec<u16>> {
    let text = match &call.this {
        Value::String(s) => s.clone(),
        Value::Object(id) => match rt.heap().get(*id).map(|o| &o.kind) {
            Some(ObjectKind::Boxed(Value::String(s))) => s.clone(),
            _ => rt.to_string_value(&call.this)?,
        },
        other => rt.to_string_value(other)?,
    };
    Ok(text.encode_utf16().collect())
}

fn from_units(units: &[u16]) -> Value {
    Value::String(String::from_utf16_lossy(units))
}

fn index_arg(value: &Value, default: f64) -> f64 {
    if value.is_undefined() {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

fn char_at(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let units = this_units(rt, &call)?;
    let index = index_arg(&call.arg(0), 0.0);
    if index < 0.0 || index >= units.len() as f64 {
        return Ok(Value::from(""));
    }
    let i = index as usize;
    Ok(from_units(&units[i..=i]))
}

fn char_code_at(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let units = this_units(rt, &call)?;
    let index = index_arg(&call.arg(0), 0.0);
    if index < 0.0 || index >= units.len() as f64 {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(f64::from(units[index as usize])))
}

fn find(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    (from..haystack.len())
        .take_while(|i| i + needle.len() <= haystack.len())
        .find(|&i| haystack[i..i + needle.len()] == *needle)
}

fn index_of(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let units = this_units(rt, &call)?;
    let needle: Vec<u16> = rt.to_string_value(&call.arg(0))?.encode_utf16().collect();
    let from = index_arg(&call.arg(1), 0.0).max(0.0) as usize;
    Ok(Value::Number(
        find(&units, &needle, from).map(|i| i as f64).unwrap_or(-1.0),
    ))
}

fn last_index_of(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let units = this_units(rt, &call)?;
    let needle: Vec<u16> = rt.to_string_value(&call.arg(0))?.encode_utf16().collect();
    let from = index_arg(&call.arg(1), units.len() as f64);
    if from < 0.0 || needle.len() > units.len() {
        return Ok(Value::Number(-1.0));
    }
    let start = (from as usize).min(units.len() - needle.len());
    let found = (0..=start)
        .rev()
        .find(|&i| units[i..i + needle.len()] == *needle);
    Ok(Value::Number(found.map(|i| i as f64).unwrap_or(-1.0)))
}

fn substr(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let units = this_units(rt, &call)?;
    let len = units.len() as f64;
    let mut start = index_arg(&call.arg(0), 0.0);
    if start < 0.0 {
        start = (len + start).max(0.0);
    }
    let start = start.min(len);
    let count = index_arg(&call.arg(1), len - start).clamp(0.0, len - start);
    let (s, e) = (start as usize, (start + count) as usize);
    Ok(from_units(&units[s..e]))
}

fn substring(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let units = this_units(rt, &call)?;
    let len = units.len() as f64;
    let a = index_arg(&call.arg(0), 0.0).clamp(0.0, len) as usize;
    let b = index_arg(&call.arg(1), len).clamp(0.0, len) as usize;
    let (s, e) = if a <= b { (a, b) } else { (b, a) };
    Ok(from_units(&units[s..e]))
}

fn to_upper_case(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let units = this_units(rt, &call)?;
    Ok(Value::String(String::from_utf16_lossy(&units).to_uppercase()))
}

fn to_lower_case(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let units = this_units(rt, &call)?;
    Ok(Value::String(String::from_utf16_lossy(&units).to_lowercase()))
}

fn split(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let units = this_units(rt, &call)?;
    let text = String::from_utf16_lossy(&units);
    let parts: Vec<Value> = match call.arg(0) {
        Value::Undefined => vec![Value::String(text)],
        separator => {
            let separator = rt.to_string_value(&separator)?;
            if separator.is_empty() {
                units.iter().map(|u| from_units(std::slice::from_ref(u))).collect()
            } else {
                text.split(separator.as_str()).map(Value::from).collect()
            }
        }
    };
    let limit = match call.arg(1) {
        Value::Undefined => parts.len(),
        l => l.to_u32() as usize,
    };
    let parts = parts.into_iter().take(limit).collect();
    Ok(Value::Object(rt.new_array(parts)))
}

fn concat(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let units = this_units(rt, &call)?;
    let mut text = String::from_utf16_lossy(&units);
    for arg in call.args {
        text.push_str(&rt.to_string_value(arg)?);
    }
    Ok(Value::String(text))
}

fn value_of(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let units = this_units(rt, &call)?;
    Ok(from_units(&units))
}

fn from_char_code(_rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let units: Vec<u16> = call.args.iter().map(|v| v.to_u32() as u16).collect();
    Ok(from_units(&units))
}
