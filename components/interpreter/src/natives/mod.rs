//! Native function library.
//!
//! Natives are plain function pointers registered in the runtime's
//! registry and wrapped in function objects. Methods shared by every object
//! of a class go into the heap's builtin table; constructors and namespaces
//! (`Math`, `Key`) are members of `_global`.

mod array;
mod function;
mod global;
mod key;
mod math;
mod movieclip;
mod number;
mod object;
mod sound;
mod string;

use core_types::{ObjectId, Value};
use memory_manager::PropFlags;

use crate::context::Environment;
use crate::runtime::Runtime;

pub use sound::SoundState;

pub(crate) use key::listeners as key_listeners;
pub(crate) use movieclip::{duplicate as duplicate_clip, remove as remove_clip};

/// Signature of every native.
pub type NativeFn = fn(&mut Runtime, NativeCall<'_>) -> core_types::ScriptResult<Value>;

/// Arguments of a native call.
#[derive(Debug)]
pub struct NativeCall<'a> {
    /// Receiver (a primitive for methods called on primitives)
    pub this: Value,
    /// Arguments in call order
    pub args: &'a [Value],
    /// Caller's environment, when called from AVM1 code
    pub env: Option<&'a mut Environment>,
    /// Called through `new`
    pub construct: bool,
    /// The function object being called
    pub callee: ObjectId,
}

impl NativeCall<'_> {
    /// Argument `index`, undefined when missing.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// Receiver object, if the receiver is one.
    pub fn this_object(&self) -> Option<ObjectId> {
        self.this.as_object()
    }
}

const HIDDEN: PropFlags = PropFlags::DONT_ENUM;
const CONSTANT: PropFlags = PropFlags::ALL;

/// Defines a hidden method member on `object`.
pub(crate) fn method(rt: &mut Runtime, object: ObjectId, name: &'static str, func: NativeFn) {
    let f = rt.new_native(name, func);
    rt.heap_mut()
        .define_member(object, name, Value::Object(f), HIDDEN);
}

/// Adds a method shared by every object of `class`.
pub(crate) fn builtin(rt: &mut Runtime, class: &str, name: &'static str, func: NativeFn) {
    let f = rt.new_native(name, func);
    rt.heap_mut().set_builtin(class, name, Value::Object(f));
}

/// Defines a read-only, hidden, undeletable member.
pub(crate) fn constant(rt: &mut Runtime, object: ObjectId, name: &str, value: Value) {
    rt.heap_mut().define_member(object, name, value, CONSTANT);
}

/// Defines a global constructor wired to `proto`.
pub(crate) fn constructor(
    rt: &mut Runtime,
    name: &'static str,
    func: NativeFn,
    proto: ObjectId,
) -> ObjectId {
    let ctor = rt.new_native(name, func);
    let global = rt.global();
    let heap = rt.heap_mut();
    heap.define_member(
        ctor,
        "prototype",
        Value::Object(proto),
        PropFlags::DONT_ENUM | PropFlags::DONT_DELETE,
    );
    heap.define_member(proto, "constructor", Value::Object(ctor), HIDDEN);
    heap.define_member(global, name, Value::Object(ctor), HIDDEN);
    ctor
}

/// Defines a global namespace object such as `Math`.
pub(crate) fn namespace(rt: &mut Runtime, name: &str) -> ObjectId {
    let object = rt.new_object();
    let global = rt.global();
    rt.heap_mut()
        .define_member(global, name, Value::Object(object), HIDDEN);
    object
}

/// Installs the whole library into a fresh runtime.
pub(crate) fn install(rt: &mut Runtime) {
    object::install(rt);
    function::install(rt);
    global::install(rt);
    array::install(rt);
    string::install(rt);
    number::install(rt);
    math::install(rt);
    key::install(rt);
    movieclip::install(rt);
    sound::install(rt);
}
