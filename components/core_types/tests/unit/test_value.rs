//! Unit tests for Value coercions

use core_types::{ObjectId, ScriptVersion, Value};
use proptest::prelude::*;

const LEGACY: ScriptVersion = ScriptVersion::new(6);
const MODERN: ScriptVersion = ScriptVersion::new(8);

#[test]
fn test_to_number_of_each_variant() {
    assert!(Value::Undefined.to_number().is_nan());
    assert_eq!(Value::Null.to_number(), 0.0);
    assert_eq!(Value::Boolean(false).to_number(), 0.0);
    assert_eq!(Value::Number(2.5).to_number(), 2.5);
    assert_eq!(Value::from(" 8").to_number(), 8.0);
    assert!(Value::Object(ObjectId::new(0, 0)).to_number().is_nan());
}

#[test]
fn test_unparsable_string_is_nan_not_zero() {
    assert!(Value::from("12abc").to_number().is_nan());
    assert!(Value::from("").to_number().is_nan());
}

#[test]
fn test_to_string_of_each_variant() {
    assert_eq!(Value::Undefined.to_string(), "undefined");
    assert_eq!(Value::Null.to_string(), "null");
    assert_eq!(Value::Boolean(true).to_string(), "true");
    assert_eq!(Value::Number(12.0).to_string(), "12");
    assert_eq!(Value::Number(f64::NEG_INFINITY).to_string(), "-Infinity");
    assert_eq!(Value::from("x").to_string(), "x");
}

#[test]
fn test_to_bool_versions() {
    assert!(!Value::from("abc").to_bool(LEGACY));
    assert!(Value::from("abc").to_bool(MODERN));
    assert!(Value::Object(ObjectId::new(3, 1)).to_bool(LEGACY));
    assert!(!Value::Undefined.to_bool(MODERN));
}

#[test]
fn test_type_names() {
    assert_eq!(Value::Undefined.type_name(), "undefined");
    assert_eq!(Value::Null.type_name(), "null");
    assert_eq!(Value::Number(1.0).type_name(), "number");
    assert_eq!(Value::from("s").type_name(), "string");
    assert_eq!(Value::Object(ObjectId::new(0, 0)).type_name(), "object");
}

#[test]
fn test_nullish_equivalence_class() {
    assert!(Value::Undefined.loose_equals(&Value::Undefined));
    assert!(Value::Null.loose_equals(&Value::Undefined));
    assert!(!Value::Undefined.loose_equals(&Value::from("")));
    assert!(!Value::Boolean(false).loose_equals(&Value::Null));
}

proptest! {
    #[test]
    fn prop_number_equality_with_own_string(n in -1.0e9f64..1.0e9f64) {
        let n = (n * 1000.0).round() / 1000.0;
        let s = Value::String(Value::Number(n).to_string());
        prop_assert!(Value::Number(n).loose_equals(&s));
        prop_assert!(s.loose_equals(&Value::Number(n)));
    }

    #[test]
    fn prop_strict_implies_loose(a in any::<i32>(), b in any::<i32>()) {
        let (x, y) = (Value::from(a), Value::from(b));
        if x.strict_equals(&y) {
            prop_assert!(x.loose_equals(&y));
        }
    }
}
