//! Trait definitions for the transport, domain collaborators and time.
//!
//! These abstractions let the bridge:
//! - Run against any publish/subscribe transport (broker, mock)
//! - Forward writes to any site/loadpoint/vehicle implementation
//! - Be tested with a controllable clock
//!
//! # Submodules
//!
//! - `network`: [`Transport`] and inbound [`Listener`] callbacks
//! - `domain`: [`SiteApi`], [`LoadpointApi`], [`VehicleApi`], [`VehicleRegistry`]
//! - `clock`: [`Clock`] time source for the heartbeat

pub mod clock;
pub mod domain;
pub mod network;

pub use clock::*;
pub use domain::*;
pub use network::*;
