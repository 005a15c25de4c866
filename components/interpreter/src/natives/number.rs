//! `Number` and `Boolean`.

use core_types::{format_number, ErrorKind, ScriptError, ScriptResult, Value};
use memory_manager::ObjectKind;

use super::{builtin, constant, constructor, NativeCall};
use crate::runtime::Runtime;

pub(super) fn install(rt: &mut Runtime) {
    let proto = rt.protos().number;
    let number = constructor(rt, "Number", number_ctor, proto);
    builtin(rt, "Number", "toString", number_to_string);
    builtin(rt, "Number", "valueOf", number_value_of);
    constant(rt, number, "MAX_VALUE", Value::Number(f64::MAX));
    constant(rt, number, "MIN_VALUE", Value::Number(f64::from_bits(1)));
    constant(rt, number, "NaN", Value::Number(f64::NAN));
    constant(rt, number, "NEGATIVE_INFINITY", Value::Number(f64::NEG_INFINITY));
    constant(rt, number, "POSITIVE_INFINITY", Value::Number(f64::INFINITY));

    let proto = rt.protos().boolean;
    constructor(rt, "Boolean", boolean_ctor, proto);
    builtin(rt, "Boolean", "toString", boolean_to_string);
    builtin(rt, "Boolean", "valueOf", boolean_value_of);
}

fn boxed_or_primitive(rt: &mut Runtime, construct: bool, value: Value) -> Value {
    if construct {
        return rt.to_object(&value).map(Value::Object).unwrap_or_default();
    }
    value
}

fn number_ctor(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let n = match call.args.first() {
        Some(v) => rt.to_number_value(v)?,
        None => 0.0,
    };
    Ok(boxed_or_primitive(rt, call.construct, Value::Number(n)))
}

fn boolean_ctor(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let b = rt.to_bool(&call.arg(0));
    Ok(boxed_or_primitive(rt, call.construct, Value::Boolean(b)))
}

/// The primitive behind `this`: the value itself or a boxed payload.
fn this_primitive(rt: &Runtime, call: &NativeCall<'_>) -> Value {
    match &call.this {
        Value::Object(id) => match rt.heap().get(*id).map(|o| &o.kind) {
            Some(ObjectKind::Boxed(inner)) => inner.clone(),
            _ => Value::Undefined,
        },
        other => other.clone(),
    }
}

fn this_number(rt: &Runtime, call: &NativeCall<'_>) -> ScriptResult<f64> {
    match this_primitive(rt, call) {
        Value::Number(n) => Ok(n),
        other => Err(ScriptError::new(
            ErrorKind::TypeError,
            format!("Number method called on {}", other.type_name()),
        )),
    }
}

/// Formats an integer part in `radix`; fractions are truncated the way
/// legacy players do for non-decimal radixes.
pub(crate) fn format_radix(n: f64, radix: u32) -> String {
    if !n.is_finite() {
        return format_number(n);
    }
    let negative = n < 0.0;
    let mut value = n.abs().trunc();
    if value == 0.0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    let base = f64::from(radix);
    while value >= 1.0 {
        let digit = (value % base) as u32;
        digits.push(std::char::from_digit(digit, radix).unwrap_or('0'));
        value = (value / base).trunc();
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

fn number_to_string(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let n = this_number(rt, &call)?;
    let radix = match call.arg(0) {
        Value::Undefined => 10,
        r => r.to_u32(),
    };
    if radix == 10 || !(2..=36).contains(&radix) {
        return Ok(Value::from(format_number(n)));
    }
    Ok(Value::from(format_radix(n, radix)))
}

fn number_value_of(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(Value::Number(this_number(rt, &call)?))
}

fn this_boolean(rt: &Runtime, call: &NativeCall<'_>) -> ScriptResult<bool> {
    match this_primitive(rt, call) {
        Value::Boolean(b) => Ok(b),
        other => Err(ScriptError::new(
            ErrorKind::TypeError,
            format!("Boolean method called on {}", other.type_name()),
        )),
    }
}

fn boolean_to_string(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(Value::from(this_boolean(rt, &call)?.to_string()))
}

fn boolean_value_of(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(Value::Boolean(this_boolean(rt, &call)?))
}
