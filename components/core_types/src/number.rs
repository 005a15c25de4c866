//! Number formatting and parsing.
//!
//! Numbers are printed with 14 significant digits in the style of C's
//! `%.14g`, which is what both legacy players and the newer machine use for
//! `Number -> String` conversion.

/// Formats a number the way script code sees it as a string.
///
/// NaN prints as `NaN`, the infinities as `Infinity` and `-Infinity`. Finite
/// values use at most 14 significant digits, switching to exponent notation
/// when the decimal exponent is below -4 or at least 14.
///
/// # Examples
///
/// ```
/// use core_types::format_number;
///
/// assert_eq!(format_number(12.0), "12");
/// assert_eq!(format_number(0.1 + 0.2), "0.3");
/// assert_eq!(format_number(1e21), "1e+21");
/// assert_eq!(format_number(f64::NAN), "NaN");
/// ```
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    // Scientific rendering first: it yields the rounded decimal exponent.
    let sci = format!("{:.13e}", n);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if !(-4..14).contains(&exponent) {
        let mantissa = strip_fraction_zeros(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
    }

    let decimals = (13 - exponent).max(0) as usize;
    let fixed = format!("{:.*}", decimals, n);
    strip_fraction_zeros(&fixed).to_string()
}

fn strip_fraction_zeros(s: &str) -> &str {
    if !s.contains('.') {
        return s;
    }
    let trimmed = s.trim_end_matches('0');
    trimmed.strip_suffix('.').unwrap_or(trimmed)
}

/// Parses a whole string as a number.
///
/// Leading whitespace is skipped, then the rest of the string must be a
/// decimal literal, a `0x` hexadecimal literal, or one of `Infinity`,
/// `-Infinity` and `NaN`. Anything else (including the empty string) yields
/// `None`.
///
/// # Examples
///
/// ```
/// use core_types::parse_number;
///
/// assert_eq!(parse_number("  42"), Some(42.0));
/// assert_eq!(parse_number("0x1A"), Some(26.0));
/// assert_eq!(parse_number("-1.5e2"), Some(-150.0));
/// assert_eq!(parse_number("12px"), None);
/// assert_eq!(parse_number(""), None);
/// ```
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }

    let (negative, body) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    if let Some(hex) = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
    {
        if hex.is_empty() {
            return None;
        }
        let value = u64::from_str_radix(hex, 16).ok()? as f64;
        return Some(if negative { -value } else { value });
    }

    // Rust's float grammar is close to strtod's; reject the forms it allows
    // that a script literal never does.
    if body.starts_with(|c: char| c == '+' || c == '-') {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Converts a number to a signed 32-bit integer with wrap-around.
///
/// NaN and the infinities become 0; other values are truncated toward zero
/// and reduced modulo 2^32.
///
/// # Examples
///
/// ```
/// use core_types::to_int32;
///
/// assert_eq!(to_int32(3.9), 3);
/// assert_eq!(to_int32(4294967295.0), -1);
/// assert_eq!(to_int32(f64::NAN), 0);
/// ```
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// Converts a number to an unsigned 32-bit integer with wrap-around.
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    let truncated = n.trunc();
    let modulo = truncated.rem_euclid(4294967296.0);
    modulo as u32
}
