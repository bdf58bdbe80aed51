//! Plain-text payload parsing for writable topics.
//!
//! Every parser returns [`BridgeError::Parse`] for malformed input and never
//! touches domain state.
//!
//! | Parser | Accepts |
//! |--------|---------|
//! | [`parse_bool`] | `1 t T TRUE true True 0 f F FALSE false False` |
//! | [`parse_int`] | base-10 signed integer |
//! | [`parse_float`] | decimal or exponent float |
//! | [`parse_optional_float`] | empty (clear) or float |
//! | [`parse_duration_secs`] | non-negative whole seconds |
//! | [`parse_enum`] | any `FromStr` token |

use std::str::FromStr;
use std::time::Duration;

use crate::error::BridgeError;

/// Parse a boolean payload.
///
/// ```rust
/// use rs_sitebridge::parsing::parse_bool;
///
/// assert_eq!(parse_bool("1").unwrap(), true);
/// assert_eq!(parse_bool("False").unwrap(), false);
/// assert!(parse_bool("yes").is_err());
/// ```
pub fn parse_bool(payload: &str) -> Result<bool, BridgeError> {
    match payload {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(BridgeError::parse("bool", payload)),
    }
}

/// Parse a signed integer payload.
pub fn parse_int(payload: &str) -> Result<i64, BridgeError> {
    payload
        .parse()
        .map_err(|_| BridgeError::parse("int", payload))
}

/// Parse a float payload.
pub fn parse_float(payload: &str) -> Result<f64, BridgeError> {
    payload
        .parse()
        .map_err(|_| BridgeError::parse("float", payload))
}

/// Parse an optional float payload; empty means "no value".
///
/// ```rust
/// use rs_sitebridge::parsing::parse_optional_float;
///
/// assert_eq!(parse_optional_float("").unwrap(), None);
/// assert_eq!(parse_optional_float("12.5").unwrap(), Some(12.5));
/// assert!(parse_optional_float("abc").is_err());
/// ```
pub fn parse_optional_float(payload: &str) -> Result<Option<f64>, BridgeError> {
    if payload.is_empty() {
        return Ok(None);
    }
    parse_float(payload).map(Some)
}

/// Parse a duration given in whole seconds.
pub fn parse_duration_secs(payload: &str) -> Result<Duration, BridgeError> {
    payload
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| BridgeError::parse("duration", payload))
}

/// Parse an enumeration token.
pub fn parse_enum<E: FromStr>(payload: &str) -> Result<E, BridgeError> {
    payload
        .parse()
        .map_err(|_| BridgeError::parse(core::any::type_name::<E>(), payload))
}

/// Parse an optional enumeration token; empty means "no value".
pub fn parse_optional_enum<E: FromStr>(payload: &str) -> Result<Option<E>, BridgeError> {
    if payload.is_empty() {
        return Ok(None);
    }
    parse_enum(payload).map(Some)
}

/// Returns true for payloads that mean "clear".
///
/// Some transports never deliver a zero-length payload to a listener, so a
/// configured sentinel (e.g. `-`) is accepted as well.
pub fn is_blank(payload: &str, sentinel: &str) -> bool {
    payload.is_empty() || (!sentinel.is_empty() && payload == sentinel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::ChargeMode;

    // =========================================================================
    // parse_bool tests
    // =========================================================================

    #[test]
    fn parse_bool_true_tokens() {
        for token in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(parse_bool(token).unwrap(), "{}", token);
        }
    }

    #[test]
    fn parse_bool_false_tokens() {
        for token in ["0", "f", "F", "FALSE", "false", "False"] {
            assert!(!parse_bool(token).unwrap(), "{}", token);
        }
    }

    #[test]
    fn parse_bool_rejects_other_text() {
        assert!(parse_bool("yes").is_err());
        assert!(parse_bool("").is_err());
        assert!(parse_bool(" true").is_err());
    }

    // =========================================================================
    // numeric tests
    // =========================================================================

    #[test]
    fn parse_int_valid() {
        assert_eq!(parse_int("3").unwrap(), 3);
        assert_eq!(parse_int("-1").unwrap(), -1);
    }

    #[test]
    fn parse_int_rejects_float() {
        assert!(parse_int("1.5").is_err());
        assert!(parse_int("").is_err());
    }

    #[test]
    fn parse_float_valid() {
        assert_eq!(parse_float("16").unwrap(), 16.0);
        assert_eq!(parse_float("-0.25").unwrap(), -0.25);
        assert_eq!(parse_float("1e3").unwrap(), 1000.0);
    }

    #[test]
    fn parse_float_invalid() {
        let err = parse_float("abc").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn parse_optional_float_clears_on_empty() {
        assert_eq!(parse_optional_float("").unwrap(), None);
        assert_eq!(parse_optional_float("0").unwrap(), Some(0.0));
    }

    // =========================================================================
    // duration tests
    // =========================================================================

    #[test]
    fn parse_duration_seconds() {
        assert_eq!(parse_duration_secs("60").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration_secs("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_rejects_negative_and_fractions() {
        assert!(parse_duration_secs("-5").is_err());
        assert!(parse_duration_secs("1.5").is_err());
    }

    // =========================================================================
    // enum tests
    // =========================================================================

    #[test]
    fn parse_enum_known_token() {
        assert_eq!(parse_enum::<ChargeMode>("pv").unwrap(), ChargeMode::Pv);
    }

    #[test]
    fn parse_enum_unknown_token() {
        assert!(parse_enum::<ChargeMode>("turbo").unwrap_err().is_parse());
    }

    #[test]
    fn parse_optional_enum_empty() {
        assert_eq!(parse_optional_enum::<ChargeMode>("").unwrap(), None);
        assert_eq!(
            parse_optional_enum::<ChargeMode>("now").unwrap(),
            Some(ChargeMode::Now)
        );
    }

    // =========================================================================
    // is_blank tests
    // =========================================================================

    #[test]
    fn is_blank_sentinel() {
        assert!(is_blank("", "-"));
        assert!(is_blank("-", "-"));
        assert!(!is_blank("tesla", "-"));
        assert!(!is_blank("-", ""));
    }
}
