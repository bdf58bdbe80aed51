//! # rs-sitebridge
//!
//! Mirrors the live state of an energy site (site, loadpoints, vehicles) onto
//! an MQTT topic tree and accepts writes back on `.../set` topics.
//!
//! ## Features
//!
//! - **Structured projection**: nested values become one retained leaf per
//!   scalar, sequences are 1-indexed, per-phase triplets publish a sum
//! - **Stable scalar encoding**: 5 significant digits, Unix seconds, whole
//!   second durations, empty payload for "erase"
//! - **Typed setters**: parse-and-apply adapters per value family, with
//!   per-topic error reporting
//! - **Liveness heartbeat**: `{root}/updated`, at most once per second
//!
//! ## Architecture
//!
//! The crate is structured to allow testing without a broker:
//!
//! - `traits` - Transport, domain and clock abstractions
//! - `value` / `encode` / `projector` - Outbound value model and topic projection
//! - `parsing` / `messages` - Inbound payload parsing
//! - `services` - Setter registry, update router, broker transport
//! - `hal` - Mock implementations for testing
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_sitebridge::{
//!     config::BridgeConfig,
//!     hal::{MockClock, MockSite, MockTransport},
//!     services::{Param, SiteBridge},
//!     traits::SiteApi,
//!     value::Record,
//! };
//!
//! let site = Arc::new(MockSite::with_loadpoints(1));
//! let api: Arc<dyn SiteApi> = site.clone();
//!
//! let mut bridge =
//!     SiteBridge::new(MockTransport::new(), BridgeConfig::default(), MockClock::new(), &api)
//!         .unwrap();
//! bridge.start(api.as_ref());
//!
//! // Outbound: phase currents publish l1..l3 plus their sum
//! bridge.handle(&Param::loadpoint(0, "chargeCurrents", [6.0, 6.0, 5.5]));
//! assert_eq!(bridge.transport().payload_of("evcc/loadpoints/1/chargeCurrents"), Some("17.5"));
//!
//! // Outbound: records publish one leaf per field
//! let battery = Record::new().field("Power", -250).field("Soc", 81.5);
//! bridge.handle(&Param::site("battery", battery));
//! assert_eq!(bridge.transport().payload_of("evcc/site/battery/soc"), Some("81.5"));
//!
//! // Inbound: writes are parsed and applied to the domain object
//! bridge.transport().deliver("evcc/loadpoints/1/mode/set", "pv").unwrap();
//! assert_eq!(site.loadpoint(0).state().mode.to_string(), "pv");
//! ```

#![warn(missing_docs)]

/// Bridge and broker configuration.
pub mod config;
/// Scalar encoding of leaf values.
pub mod encode;
/// Error types.
pub mod error;
/// Mock implementations for testing.
pub mod hal;
/// Structured JSON payloads accepted on writable topics.
pub mod messages;
/// Charge and battery modes.
pub mod modes;
/// Plain-text payload parsers.
pub mod parsing;
/// Projection of values onto a topic tree.
pub mod projector;
/// Setter registry, update router and broker transport.
pub mod services;
/// Transport, domain and clock abstractions.
pub mod traits;
/// Closed value model for published state.
pub mod value;

// Re-exports for convenience
pub use config::{BridgeConfig, Config, MqttConfig};
pub use encode::encode;
pub use error::{BridgeError, DomainError, Result};
pub use modes::{BatteryMode, ChargeMode};
pub use projector::{publish, Publisher};
pub use services::{Param, SiteBridge};
pub use traits::{
    Clock, Listener, LoadpointApi, SiteApi, SystemClock, Transport, VehicleApi, VehicleRegistry,
};
pub use value::{MqttMarshal, Publishable, Record, Value};

#[cfg(feature = "mqtt")]
pub use services::{MqttEventLoop, RumqttTransport};
