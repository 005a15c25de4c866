//! Global functions.

use core_types::{ScriptResult, Value};
use memory_manager::PropFlags;

use super::{method, NativeCall};
use crate::runtime::{Interval, Runtime};

pub(super) fn install(rt: &mut Runtime) {
    let global = rt.global();
    method(rt, global, "trace", trace);
    method(rt, global, "ASSetPropFlags", as_set_prop_flags);
    method(rt, global, "getVersion", get_version);
    method(rt, global, "getTimer", get_timer);
    method(rt, global, "setInterval", set_interval);
    method(rt, global, "clearInterval", clear_interval);
    method(rt, global, "parseInt", parse_int);
    method(rt, global, "parseFloat", parse_float);
    method(rt, global, "isNaN", is_nan);
    method(rt, global, "isFinite", is_finite);
    rt.heap_mut()
        .define_member(global, "NaN", Value::Number(f64::NAN), PropFlags::ALL);
    rt.heap_mut()
        .define_member(global, "Infinity", Value::Number(f64::INFINITY), PropFlags::ALL);
}

fn trace(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let line = rt.to_string_value(&call.arg(0))?;
    rt.trace(&line);
    Ok(Value::Undefined)
}

/// `ASSetPropFlags(obj, props, set, clear)`.
///
/// `props` is a comma list, an array of names, or null for every member.
/// Bits outside the three known flags are ignored. Version 5 documents that
/// omit `clear` clear every bit first. When both masks are zero every member
/// becomes DONT_ENUM.
fn as_set_prop_flags(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let Some(object) = call.arg(0).as_object() else {
        return Ok(Value::Undefined);
    };
    let known = u32::from(PropFlags::ALL.bits());
    let mut set = call.arg(2).to_u32() & known;
    let clear = if call.args.len() < 4 {
        if rt.version().get() == 5 {
            known
        } else {
            0
        }
    } else {
        call.arg(3).to_u32() & known
    };

    let mut names = match call.arg(1) {
        Value::Undefined | Value::Null => None,
        Value::Object(list) => match rt.heap().array_elements(list).map(<[Value]>::to_vec) {
            Some(elements) => {
                let mut names = Vec::with_capacity(elements.len());
                for element in &elements {
                    names.push(rt.to_string_value(element)?);
                }
                Some(names)
            }
            None => None,
        },
        other => Some(
            rt.to_string_value(&other)?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ),
    };
    if set == 0 && clear == 0 {
        names = None;
        set = u32::from(PropFlags::DONT_ENUM.bits());
    }
    rt.heap_mut().set_flags(
        object,
        names.as_deref(),
        PropFlags::from_bits(set),
        PropFlags::from_bits(clear),
    );
    Ok(Value::Undefined)
}

fn get_version(rt: &mut Runtime, _call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(Value::from(format!("TSR {},0,0,0", rt.version().get())))
}

fn get_timer(rt: &mut Runtime, _call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(Value::Number(rt.time_ms().floor()))
}

/// `setInterval(func, ms, args...)` or `setInterval(obj, "method", ms, args...)`.
fn set_interval(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let first = call.arg(0);
    let (target, method, rest) = if rt.is_callable(&first) {
        (first, None, 1)
    } else if first.as_object().is_some() {
        let name = rt.to_string_value(&call.arg(1))?;
        (first, Some(name), 2)
    } else {
        return Ok(Value::Undefined);
    };
    let period_ms = rt.to_number_value(&call.arg(rest))?;
    let args = call.args.get(rest + 1..).unwrap_or(&[]).to_vec();
    let id = rt.next_interval_id;
    rt.next_interval_id += 1;
    rt.intervals.push(Interval {
        id,
        target,
        method,
        args,
        period_ms: if period_ms.is_finite() { period_ms } else { 0.0 },
        elapsed_ms: 0.0,
    });
    Ok(Value::Number(f64::from(id)))
}

fn clear_interval(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let id = call.arg(0).to_u32();
    rt.intervals.retain(|i| i.id != id);
    Ok(Value::Undefined)
}

/// Integer prefix of `text` in `radix`; a missing radix detects `0x` and
/// legacy octal prefixes.
pub(crate) fn parse_int_str(text: &str, radix: Option<u32>) -> f64 {
    let s = text.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let has_hex_prefix = s.len() > 1 && (s.starts_with("0x") || s.starts_with("0X"));
    let (radix, digits) = match radix {
        Some(16) | None if has_hex_prefix => (16, &s[2..]),
        None if s.len() > 1 && s.starts_with('0') && s.as_bytes()[1].is_ascii_digit() => (8, s),
        None => (10, s),
        Some(r) if (2..=36).contains(&r) => (r, s),
        Some(_) => return f64::NAN,
    };
    let mut value = 0.0f64;
    let mut any = false;
    for c in digits.chars() {
        let Some(d) = c.to_digit(radix) else {
            break;
        };
        value = value * f64::from(radix) + f64::from(d);
        any = true;
    }
    if !any {
        return f64::NAN;
    }
    if negative {
        -value
    } else {
        value
    }
}

/// Longest decimal prefix of `text` that reads as a number.
pub(crate) fn parse_float_str(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &s[digits_start..end] == "." {
        return f64::NAN;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

fn parse_int(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let text = rt.to_string_value(&call.arg(0))?;
    let radix = match call.arg(1) {
        Value::Undefined => None,
        r => Some(r.to_u32()),
    };
    Ok(Value::Number(parse_int_str(&text, radix)))
}

fn parse_float(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let text = rt.to_string_value(&call.arg(0))?;
    Ok(Value::Number(parse_float_str(&text)))
}

fn is_nan(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(Value::Boolean(rt.to_number_value(&call.arg(0))?.is_nan()))
}

fn is_finite(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(Value::Boolean(rt.to_number_value(&call.arg(0))?.is_finite()))
}
