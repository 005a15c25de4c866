//! Unit tests for ScriptError

use core_types::{CodeLocation, ErrorKind, ScriptError, Value};

#[test]
fn test_error_display_includes_kind_and_message() {
    let error = ScriptError::new(ErrorKind::ReferenceError, "trace is not defined");
    assert_eq!(error.to_string(), "reference error: trace is not defined");
}

#[test]
fn test_error_location() {
    let error = ScriptError::malformed("truncated push").at(CodeLocation::method(2, 16));
    assert_eq!(error.kind, ErrorKind::MalformedCode);
    assert_eq!(error.location.map(|l| l.to_string()), Some("method#2@0x0010".to_string()));
}

#[test]
fn test_thrown_errors_carry_value() {
    let error = ScriptError::thrown(Value::from("boom"));
    assert!(matches!(error.kind, ErrorKind::Thrown(Value::String(ref s)) if s == "boom"));
}

#[test]
fn test_error_is_std_error() {
    fn takes_error(_: &dyn std::error::Error) {}
    takes_error(&ScriptError::stack_underflow());
}
