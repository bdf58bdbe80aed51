//! Enumerated control modes exposed as writable topics.
//!
//! Both enums parse from and render to their lowercase wire tokens:
//!
//! ```rust
//! use rs_sitebridge::{BatteryMode, ChargeMode};
//!
//! assert_eq!("minpv".parse::<ChargeMode>().unwrap(), ChargeMode::MinPv);
//! assert_eq!(BatteryMode::Hold.to_string(), "hold");
//! ```

use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Charging mode of a loadpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ChargeMode {
    /// Charging disabled.
    #[default]
    Off,
    /// Charge at maximum power.
    Now,
    /// Minimum current plus surplus solar.
    MinPv,
    /// Surplus solar only.
    Pv,
}

/// Externally requested home battery mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BatteryMode {
    /// No external request; the site decides.
    #[default]
    Unknown,
    /// Normal operation.
    Normal,
    /// Hold charge, no discharge.
    Hold,
    /// Force charge from grid.
    Charge,
}
