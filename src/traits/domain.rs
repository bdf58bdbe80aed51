//! Domain collaborators whose setters are exposed as writable topics.
//!
//! The bridge does not implement any control logic. It only forwards parsed
//! values to these objects, which own their own synchronization and are
//! shared as `Arc<dyn ...>` between listener callbacks.
//!
//! | Trait | Topic parent |
//! |-------|--------------|
//! | [`SiteApi`] | `{root}/site` |
//! | [`LoadpointApi`] | `{root}/loadpoints/{n}` (1-based) |
//! | [`VehicleApi`] | `{root}/vehicles/{name}` |
//!
//! Setters that can reject a value return [`DomainError`]; the rest return
//! `()` and are adapted with [`pass`](crate::services::pass).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{BridgeError, DomainError};
use crate::modes::{BatteryMode, ChargeMode};

/// Site-level control surface.
pub trait SiteApi: Send + Sync {
    /// Loadpoints currently known to the site, in index order.
    fn loadpoints(&self) -> Vec<Arc<dyn LoadpointApi>>;

    /// Configured vehicles.
    fn vehicles(&self) -> Arc<dyn VehicleRegistry>;

    /// Battery soc above which the battery may be used for charging.
    fn set_buffer_soc(&self, soc: f64) -> Result<(), DomainError>;

    /// Battery soc above which vehicle charging starts from battery.
    fn set_buffer_start_soc(&self, soc: f64) -> Result<(), DomainError>;

    /// Prevent battery discharge while vehicles charge fast.
    fn set_battery_discharge_control(&self, enable: bool) -> Result<(), DomainError>;

    /// Battery soc below which the battery has priority over vehicles.
    fn set_priority_soc(&self, soc: f64) -> Result<(), DomainError>;

    /// Grid power offset used by surplus calculation.
    fn set_residual_power(&self, power: f64) -> Result<(), DomainError>;

    /// Tariff limit below which the battery charges from grid; `None` disables.
    fn set_battery_grid_charge_limit(&self, limit: Option<f64>);

    /// Externally requested battery mode.
    fn set_battery_mode_external(&self, mode: BatteryMode);
}

/// Loadpoint-level control surface.
pub trait LoadpointApi: Send + Sync {
    /// Charge mode.
    fn set_mode(&self, mode: ChargeMode);

    /// Configured phases (0 = automatic).
    fn set_phases_configured(&self, phases: i64) -> Result<(), DomainError>;

    /// Session soc limit.
    fn set_limit_soc(&self, soc: i64);

    /// Loadpoint priority.
    fn set_priority(&self, priority: i64);

    /// Minimum charge current (A).
    fn set_min_current(&self, current: f64) -> Result<(), DomainError>;

    /// Maximum charge current (A).
    fn set_max_current(&self, current: f64) -> Result<(), DomainError>;

    /// Session energy limit (kWh).
    fn set_limit_energy(&self, energy: f64);

    /// Surplus threshold to enable charging (W).
    fn set_enable_threshold(&self, threshold: f64);

    /// Surplus threshold to disable charging (W).
    fn set_disable_threshold(&self, threshold: f64);

    /// Delay before enabling.
    fn set_enable_delay(&self, delay: Duration);

    /// Delay before disabling.
    fn set_disable_delay(&self, delay: Duration);

    /// Tariff limit for smart charging; `None` disables.
    fn set_smart_cost_limit(&self, limit: Option<f64>);

    /// Feed-in tariff limit for smart charging; `None` disables.
    fn set_smart_feed_in_priority_limit(&self, limit: Option<f64>);

    /// Allow charging from the home battery.
    fn set_battery_boost(&self, enable: bool) -> Result<(), DomainError>;

    /// Energy plan: reach `energy` kWh by `time`; an unset time clears the plan.
    fn set_plan_energy(
        &self,
        time: Option<DateTime<Utc>>,
        precondition: Duration,
        energy: f64,
    ) -> Result<(), DomainError>;

    /// Assigned vehicle; `None` detaches.
    fn set_vehicle(&self, vehicle: Option<Arc<dyn VehicleApi>>);
}

/// Vehicle-level control surface.
pub trait VehicleApi: Send + Sync {
    /// Configured vehicle name.
    fn name(&self) -> String;

    /// Default soc limit.
    fn set_limit_soc(&self, soc: i64);

    /// Minimum soc charged regardless of mode.
    fn set_min_soc(&self, soc: i64);

    /// Soc plan: reach `soc` % by `time`; an unset time clears the plan.
    fn set_plan_soc(
        &self,
        time: Option<DateTime<Utc>>,
        precondition: Duration,
        soc: i64,
    ) -> Result<(), DomainError>;
}

/// Registry of configured vehicles.
pub trait VehicleRegistry: Send + Sync {
    /// All configured vehicles.
    fn settings(&self) -> Vec<Arc<dyn VehicleApi>>;

    /// Looks up a vehicle by name.
    fn by_name(&self, name: &str) -> Result<Arc<dyn VehicleApi>, BridgeError> {
        self.settings()
            .into_iter()
            .find(|v| v.name() == name)
            .ok_or_else(|| BridgeError::Lookup(format!("vehicle {}", name)))
    }
}
