//! Structured JSON payloads accepted on writable topics.
//!
//! # Example
//!
//! ```
//! use rs_sitebridge::messages::{parse_plan_request, PlanRequest};
//!
//! let json = r#"{"time": "2024-01-01T10:00:00Z", "precondition": 600, "value": 80}"#;
//! let plan: PlanRequest<i64> = parse_plan_request(json).unwrap();
//! assert_eq!(plan.value, 80);
//! assert_eq!(plan.precondition().as_secs(), 600);
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Charging plan: reach `value` by `time`.
///
/// # Fields
///
/// - `time`: RFC 3339 target time; missing or `null` clears the plan
/// - `precondition`: seconds of preconditioning before `time` (default 0);
///   negative values are accepted and read as no preconditioning
/// - `value`: target energy (kWh, float) or soc (%, integer)
///
/// # JSON Examples
///
/// Energy plan:
/// ```json
/// {"time": "2024-01-01T10:00:00Z", "precondition": 600, "value": 12.5}
/// ```
///
/// Soc plan without preconditioning:
/// ```json
/// {"time": "2024-01-01T07:30:00+01:00", "value": 80}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest<V> {
    /// Target time
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    /// Preconditioning in seconds
    #[serde(default)]
    pub precondition: i64,
    /// Target value
    #[serde(default)]
    pub value: V,
}

impl<V> PlanRequest<V> {
    /// Create a new plan request.
    pub fn new(time: DateTime<Utc>, precondition: Duration, value: V) -> Self {
        Self {
            time: Some(time),
            precondition: i64::try_from(precondition.as_secs()).unwrap_or(i64::MAX),
            value,
        }
    }

    /// Preconditioning as a duration.
    pub fn precondition(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.precondition).unwrap_or(0))
    }
}

/// Parse a plan request from a JSON payload.
pub fn parse_plan_request<V>(payload: &str) -> Result<PlanRequest<V>, serde_json::Error>
where
    V: DeserializeOwned + Default,
{
    serde_json::from_str(payload)
}
