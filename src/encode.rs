//! Scalar leaf encoding.
//!
//! Converts a single [`Value`] into the string written to a leaf topic. An
//! empty string is an erase: the broker drops the retained message.
//!
//! | Value | Payload |
//! |-------|---------|
//! | `Nil`, unset time | `""` |
//! | text | verbatim |
//! | float | 5 significant digits (`1234.6`, `1.2346e+05`) |
//! | time | Unix seconds |
//! | duration | whole seconds |
//! | described | its description |

use crate::value::Value;

/// Significant digits for floating point leaves.
pub const FLOAT_PRECISION: usize = 5;

/// Encodes a scalar value as a leaf payload.
///
/// Containers are not expected here; they fall back to a compact debug
/// rendering.
///
/// ```rust
/// use rs_sitebridge::encode::encode;
/// use rs_sitebridge::value::Value;
/// use std::time::Duration;
///
/// assert_eq!(encode(&Value::Float(3.14159265)), "3.1416");
/// assert_eq!(encode(&Value::Duration(Duration::from_secs(90))), "90");
/// assert_eq!(encode(&Value::Nil), "");
/// ```
pub fn encode(value: &Value) -> String {
    match value {
        Value::Nil => String::new(),
        Value::Str(s) => s.clone(),
        Value::Float(f) => format_float(*f),
        Value::Time(None) => String::new(),
        Value::Time(Some(t)) => t.timestamp().to_string(),
        // whole seconds, not the human readable form
        Value::Duration(d) => d.as_secs().to_string(),
        Value::Described(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Uint(u) => u.to_string(),
        Value::Optional(None) => String::new(),
        Value::Optional(Some(inner)) => encode(inner),
        other => format!("{:?}", other),
    }
}

/// Formats a float with [`FLOAT_PRECISION`] significant digits.
///
/// Trailing zeros are dropped; very small or large magnitudes switch to
/// exponent notation with a signed, two-digit exponent.
pub fn format_float(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    let sci = format!("{:.*e}", FLOAT_PRECISION - 1, v);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return v.to_string();
    };
    let exp: i32 = exp.parse().unwrap_or(0);

    let negative = mantissa.starts_with('-');
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    let mut out = String::with_capacity(16);
    if negative {
        out.push('-');
    }

    if exp < -4 || exp >= FLOAT_PRECISION as i32 {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exp < 0 { '-' } else { '+' });
        out.push_str(&format!("{:02}", exp.unsigned_abs()));
    } else if exp >= 0 {
        let int_len = exp as usize + 1;
        if digits.len() <= int_len {
            out.push_str(digits);
            out.extend(core::iter::repeat('0').take(int_len - digits.len()));
        } else {
            out.push_str(&digits[..int_len]);
            out.push('.');
            out.push_str(&digits[int_len..]);
        }
    } else {
        out.push_str("0.");
        out.extend(core::iter::repeat('0').take((-exp - 1) as usize));
        out.push_str(digits);
    }

    out
}
