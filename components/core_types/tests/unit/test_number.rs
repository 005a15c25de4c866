//! Unit tests for number formatting and parsing

use core_types::{format_number, parse_number, to_int32, Value};
use proptest::prelude::*;

#[test]
fn test_format_matches_printf_g() {
    assert_eq!(format_number(100.0), "100");
    assert_eq!(format_number(3.14159), "3.14159");
    assert_eq!(format_number(1e14), "1e+14");
    assert_eq!(format_number(-1e-7), "-1e-07");
    assert_eq!(format_number(123.456e10), "1234560000000");
}

#[test]
fn test_parse_accepts_literal_forms() {
    assert_eq!(parse_number(".5"), Some(0.5));
    assert_eq!(parse_number("5."), Some(5.0));
    assert_eq!(parse_number("+7"), Some(7.0));
    assert_eq!(parse_number("\t1e3"), Some(1000.0));
    assert_eq!(parse_number("-0x10"), Some(-16.0));
}

#[test]
fn test_nan_round_trips_as_literal() {
    let text = Value::Number(f64::NAN).to_string();
    assert_eq!(text, "NaN");
    assert!(Value::String(text).to_number().is_nan());
}

#[test]
fn test_int32_of_large_values() {
    assert_eq!(to_int32(-2147483649.0), 2147483647);
    assert_eq!(to_int32(1e20), 1661992960);
}

proptest! {
    #[test]
    fn prop_finite_numbers_round_trip_to_14_digits(n in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
        let text = format_number(n);
        let parsed = parse_number(&text).expect("formatted numbers parse");
        let tolerance = n.abs() * 1e-13;
        prop_assert!((parsed - n).abs() <= tolerance, "{} -> {} -> {}", n, text, parsed);
    }

    #[test]
    fn prop_integers_format_exactly(n in -1_000_000_000i64..1_000_000_000i64) {
        prop_assert_eq!(format_number(n as f64), n.to_string());
    }
}
