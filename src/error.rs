//! Error types shared by the setter registry, projector and transports.
//!
//! | Variant | Raised by | Reported through |
//! |---------|-----------|------------------|
//! | [`BridgeError::Parse`] | payload parsers | listener error channel |
//! | [`BridgeError::Json`] | plan setters | listener error channel |
//! | [`BridgeError::Lookup`] | vehicle-by-name setter | listener error channel |
//! | [`BridgeError::Marshal`] | custom [`MqttMarshal`](crate::value::MqttMarshal) values | logged by the projector |
//! | [`BridgeError::Transport`] | publish / listen / cleanup | caller of `listen` / startup |
//! | [`BridgeError::Domain`] | domain setters rejecting a value | listener error channel |

use thiserror::Error;

/// Errors produced while bridging state to and from the transport.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Malformed inbound payload.
    #[error("invalid {kind} payload: {payload:?}")]
    Parse {
        /// Expected value family (e.g. "bool", "float").
        kind: &'static str,
        /// Offending payload.
        payload: String,
    },
    /// Malformed JSON payload.
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),
    /// A named reference could not be resolved.
    #[error("not found: {0}")]
    Lookup(String),
    /// A value failed to marshal itself.
    #[error("marshal mqtt: {0}")]
    Marshal(String),
    /// The transport failed to publish, listen or clean up.
    #[error("mqtt: {0}")]
    Transport(String),
    /// The domain object rejected the value.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl BridgeError {
    /// Creates a parse error for the given value family.
    pub fn parse(kind: &'static str, payload: &str) -> Self {
        Self::Parse {
            kind,
            payload: payload.to_string(),
        }
    }

    /// Wraps any transport error.
    pub fn transport(err: impl core::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Returns true for malformed inbound payloads (plain text or JSON).
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Json(_))
    }
}

/// Error returned by domain setters for values they refuse.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// Value is outside the accepted range.
    #[error("{name} out of range: {value}")]
    OutOfRange {
        /// Setting name.
        name: &'static str,
        /// Rejected value, rendered as text.
        value: String,
    },
    /// Setting is not supported by this object.
    #[error("{0} not supported")]
    NotSupported(&'static str),
    /// Any other rejection.
    #[error("{0}")]
    Invalid(String),
}

/// Result type for bridge operations.
pub type Result<T, E = BridgeError> = core::result::Result<T, E>;
