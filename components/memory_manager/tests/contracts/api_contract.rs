//! Contract tests verifying the memory_manager API surface.

use core_types::Value;
use memory_manager::{
    Heap, NativeId, ObjectKind, PropFlags, ScriptObject, SetOutcome, MAX_PROTO_DEPTH,
};

/// Contract: register returns a handle that resolves until destroyed
#[test]
fn contract_register_resolves() {
    let mut heap = Heap::new();
    let id = heap.register(ScriptObject::plain());
    assert!(heap.contains(id));
    assert_eq!(heap.len(), 1);
}

/// Contract: set_member reports acceptance
#[test]
fn contract_put_member_outcomes() {
    let mut heap = Heap::new();
    let id = heap.register(ScriptObject::plain());
    assert_eq!(heap.put_member(id, "a", Value::Null), SetOutcome::Stored);
    heap.set_flags(id, None, PropFlags::READ_ONLY, PropFlags::NONE);
    assert_eq!(heap.put_member(id, "a", Value::Null), SetOutcome::Rejected);
}

/// Contract: flag bits match the script-visible values
#[test]
fn contract_flag_bits() {
    assert_eq!(PropFlags::DONT_ENUM.bits(), 1);
    assert_eq!(PropFlags::DONT_DELETE.bits(), 2);
    assert_eq!(PropFlags::READ_ONLY.bits(), 4);
    assert_eq!(PropFlags::from_bits(0xFF), PropFlags::ALL);
}

/// Contract: class names drive builtin lookup
#[test]
fn contract_class_names() {
    use memory_manager::Callable;
    let kinds = [
        (ObjectKind::Plain, "Object"),
        (ObjectKind::Array(Vec::new()), "Array"),
        (ObjectKind::Boxed(Value::Number(1.0)), "Number"),
        (ObjectKind::Function(Callable::Native(NativeId(0))), "Function"),
        (ObjectKind::Clip, "MovieClip"),
    ];
    for (kind, name) in kinds {
        assert_eq!(kind.class_name(), name);
    }
}

/// Contract: prototype walks are bounded
#[test]
fn contract_proto_depth() {
    assert_eq!(MAX_PROTO_DEPTH, 256);
}
