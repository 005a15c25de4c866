//! `Math`.

use core_types::{ScriptResult, Value};

use super::{constant, method, namespace, NativeCall, NativeFn};
use crate::runtime::Runtime;

pub(super) fn install(rt: &mut Runtime) {
    let math = namespace(rt, "Math");
    constant(rt, math, "E", Value::Number(std::f64::consts::E));
    constant(rt, math, "LN10", Value::Number(std::f64::consts::LN_10));
    constant(rt, math, "LN2", Value::Number(std::f64::consts::LN_2));
    constant(rt, math, "LOG10E", Value::Number(std::f64::consts::LOG10_E));
    constant(rt, math, "LOG2E", Value::Number(std::f64::consts::LOG2_E));
    constant(rt, math, "PI", Value::Number(std::f64::consts::PI));
    constant(rt, math, "SQRT1_2", Value::Number(std::f64::consts::FRAC_1_SQRT_2));
    constant(rt, math, "SQRT2", Value::Number(std::f64::consts::SQRT_2));

    let unary: [(&'static str, NativeFn); 12] = [
        ("abs", abs),
        ("acos", acos),
        ("asin", asin),
        ("atan", atan),
        ("ceil", ceil),
        ("cos", cos),
        ("exp", exp),
        ("floor", floor),
        ("log", log),
        ("sin", sin),
        ("sqrt", sqrt),
        ("tan", tan),
    ];
    for (name, func) in unary {
        method(rt, math, name, func);
    }
    method(rt, math, "atan2", atan2);
    method(rt, math, "max", max);
    method(rt, math, "min", min);
    method(rt, math, "pow", pow);
    method(rt, math, "random", random);
    method(rt, math, "round", round);
}

macro_rules! unary {
    ($($name:ident => $f:expr),* $(,)?) => {
        $(
            fn $name(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
                let x = rt.to_number_value(&call.arg(0))?;
                let f: fn(f64) -> f64 = $f;
                Ok(Value::Number(f(x)))
            }
        )*
    };
}

unary!(
    abs => f64::abs,
    acos => f64::acos,
    asin => f64::asin,
    atan => f64::atan,
    ceil => f64::ceil,
    cos => f64::cos,
    exp => f64::exp,
    floor => f64::floor,
    log => f64::ln,
    sin => f64::sin,
    sqrt => f64::sqrt,
    tan => f64::tan,
);

fn two_numbers(rt: &mut Runtime, call: &NativeCall<'_>) -> ScriptResult<(f64, f64)> {
    Ok((
        rt.to_number_value(&call.arg(0))?,
        rt.to_number_value(&call.arg(1))?,
    ))
}

fn atan2(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let (y, x) = two_numbers(rt, &call)?;
    Ok(Value::Number(y.atan2(x)))
}

fn pow(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let (x, y) = two_numbers(rt, &call)?;
    Ok(Value::Number(x.powf(y)))
}

fn max(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let (a, b) = two_numbers(rt, &call)?;
    if a.is_nan() || b.is_nan() {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(a.max(b)))
}

fn min(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let (a, b) = two_numbers(rt, &call)?;
    if a.is_nan() || b.is_nan() {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(a.min(b)))
}

/// Rounds half up: `round(-2.5)` is `-2`.
fn round(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let x = rt.to_number_value(&call.arg(0))?;
    Ok(Value::Number((x + 0.5).floor()))
}

fn random(rt: &mut Runtime, _call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(Value::Number(rt.rng.next_f64()))
}
