//! `Function.prototype.call` and `apply`.

use core_types::{ScriptResult, Value};

use super::{builtin, constructor, NativeCall};
use crate::runtime::Runtime;

pub(super) fn install(rt: &mut Runtime) {
    let proto = rt.protos().function;
    constructor(rt, "Function", function_ctor, proto);
    builtin(rt, "Function", "call", call);
    builtin(rt, "Function", "apply", apply);
}

fn function_ctor(_rt: &mut Runtime, _call: NativeCall<'_>) -> ScriptResult<Value> {
    Ok(Value::Undefined)
}

fn receiver(value: Value) -> Value {
    if value.is_nullish() {
        Value::Undefined
    } else {
        value
    }
}

fn call(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let this = receiver(call.arg(0));
    let rest = call.args.get(1..).unwrap_or(&[]);
    rt.call_function(&call.this, this, rest, call.env)
}

fn apply(rt: &mut Runtime, call: NativeCall<'_>) -> ScriptResult<Value> {
    let this = receiver(call.arg(0));
    let args = call
        .arg(1)
        .as_object()
        .and_then(|list| rt.heap().array_elements(list))
        .map(<[Value]>::to_vec)
        .unwrap_or_default();
    rt.call_function(&call.this, this, &args, call.env)
}
