//! Tests for member resolution and flags

use core_types::{PropertyAccessor, Value};
use memory_manager::{
    Heap, ObjectKind, PropFlags, ScriptObject, SetOutcome, Watch, MAX_ARRAY_LENGTH,
};

#[test]
fn test_prototype_provides_and_own_shadows() {
    let mut heap = Heap::new();
    let parent = heap.register(ScriptObject::plain());
    let child = heap.register(ScriptObject::plain());
    heap.set_prototype(child, Some(parent));
    heap.put_member(parent, "k", Value::from("parent"));

    assert_eq!(heap.lookup(child, "k"), Some(Value::from("parent")));
    assert_eq!(heap.get_own(child, "k"), None);

    heap.put_member(child, "k", Value::from("child"));
    assert_eq!(heap.lookup(child, "k"), Some(Value::from("child")));

    heap.delete_member(child, "k");
    assert_eq!(heap.lookup(child, "k"), Some(Value::from("parent")));
}

#[test]
fn test_dont_enum_toggle_is_idempotent() {
    let mut heap = Heap::new();
    let obj = heap.register(ScriptObject::plain());
    heap.put_member(obj, "a", Value::Null);
    heap.put_member(obj, "b", Value::Null);
    let names = vec!["a".to_string()];

    heap.set_flags(obj, Some(&names), PropFlags::DONT_ENUM, PropFlags::NONE);
    heap.set_flags(obj, Some(&names), PropFlags::DONT_ENUM, PropFlags::NONE);
    assert_eq!(heap.enumerate(obj), vec!["b"]);

    heap.set_flags(obj, Some(&names), PropFlags::NONE, PropFlags::DONT_ENUM);
    assert_eq!(heap.enumerate(obj), vec!["a", "b"]);
}

#[test]
fn test_enumeration_keeps_insertion_order() {
    let mut heap = Heap::new();
    let obj = heap.register(ScriptObject::plain());
    for name in ["zeta", "alpha", "mid"] {
        heap.put_member(obj, name, Value::Null);
    }
    heap.put_member(obj, "ALPHA", Value::Boolean(true));
    assert_eq!(heap.enumerate(obj), vec!["zeta", "alpha", "mid"]);
}

#[test]
fn test_proto_member_rewires_link() {
    let mut heap = Heap::new();
    let proto = heap.register(ScriptObject::plain());
    let obj = heap.register(ScriptObject::plain());
    heap.put_member(obj, "__proto__", Value::Object(proto));
    assert_eq!(heap.get(obj).and_then(|o| o.proto), Some(proto));
    assert_eq!(heap.get_own(obj, "__proto__"), Some(Value::Object(proto)));
    assert_eq!(heap.ref_count(proto), Some(1));
}

#[test]
fn test_own_accessor_requests_setter() {
    let mut heap = Heap::new();
    let setter = heap.register(ScriptObject::plain());
    let obj = heap.register(ScriptObject::plain());
    let accessor = PropertyAccessor {
        getter: None,
        setter: Some(setter),
        target: Some(obj),
    };
    heap.define_member(obj, "p", Value::Property(accessor), PropFlags::NONE);
    assert_eq!(
        heap.put_member(obj, "p", Value::Number(1.0)),
        SetOutcome::InvokeSetter(accessor)
    );
    assert_eq!(heap.get_own(obj, "p"), Some(Value::Property(accessor)));
}

#[test]
fn test_watch_counts_callback() {
    let mut heap = Heap::new();
    let callback = heap.register(ScriptObject::plain());
    let obj = heap.register(ScriptObject::plain());
    heap.set_watch(
        obj,
        "x",
        Watch {
            callback,
            user_data: Value::Null,
        },
    );
    assert_eq!(heap.ref_count(callback), Some(1));
    assert_eq!(heap.watch(obj, "X").map(|w| w.callback), Some(callback));
    assert!(heap.remove_watch(obj, "x"));
    assert_eq!(heap.ref_count(callback), Some(0));
    assert!(!heap.remove_watch(obj, "x"));
}

#[test]
fn test_boxed_string_length() {
    let mut heap = Heap::new();
    let boxed = heap.register(ScriptObject::new(ObjectKind::Boxed(Value::from("héllo"))));
    assert_eq!(heap.get_own(boxed, "length"), Some(Value::Number(5.0)));
    assert_eq!(heap.get(boxed).map(|o| o.class_name()), Some("String"));
}

#[test]
fn test_array_update_counts() {
    let mut heap = Heap::new();
    let item = heap.register(ScriptObject::plain());
    let arr = heap.register(ScriptObject::new(ObjectKind::Array(vec![
        Value::Object(item),
        Value::Object(item),
    ])));
    assert_eq!(heap.ref_count(item), Some(2));
    let popped = heap.array_update(arr, |elements| elements.pop());
    assert_eq!(popped, Some(Some(Value::Object(item))));
    assert_eq!(heap.ref_count(item), Some(1));
}

#[test]
fn test_array_element_write_swaps_counts() {
    let mut heap = Heap::new();
    let first = heap.register(ScriptObject::plain());
    let second = heap.register(ScriptObject::plain());
    let arr = heap.register(ScriptObject::new(ObjectKind::Array(vec![Value::Object(first)])));

    assert_eq!(heap.put_member(arr, "0", Value::Object(second)), SetOutcome::Stored);
    assert_eq!(heap.ref_count(first), Some(0));
    assert_eq!(heap.ref_count(second), Some(1));

    assert_eq!(heap.put_member(arr, "3", Value::Object(second)), SetOutcome::Stored);
    assert_eq!(heap.ref_count(second), Some(2));
    assert_eq!(heap.get_own(arr, "length"), Some(Value::Number(4.0)));
}

#[test]
fn test_array_index_past_cap_is_named_member() {
    let mut heap = Heap::new();
    let arr = heap.register(ScriptObject::new(ObjectKind::Array(vec![Value::Number(1.0)])));
    heap.put_member(arr, "4000000000", Value::Number(5.0));
    assert_eq!(heap.get_own(arr, "length"), Some(Value::Number(1.0)));
    assert_eq!(heap.get_own(arr, "4000000000"), Some(Value::Number(5.0)));
}

#[test]
fn test_array_length_write_is_capped() {
    let mut heap = Heap::new();
    let item = heap.register(ScriptObject::plain());
    let arr = heap.register(ScriptObject::new(ObjectKind::Array(vec![
        Value::Object(item),
        Value::Number(2.0),
    ])));

    heap.put_member(arr, "length", Value::Number(4e9));
    assert_eq!(
        heap.get_own(arr, "length"),
        Some(Value::Number(MAX_ARRAY_LENGTH as f64))
    );
    assert_eq!(heap.array_push(arr, Value::Null), Some(MAX_ARRAY_LENGTH));

    heap.put_member(arr, "length", Value::Number(0.0));
    assert_eq!(heap.array_elements(arr).map(<[Value]>::len), Some(0));
    assert_eq!(heap.ref_count(item), Some(0));
}
