//! Bridge services: inbound setters, outbound update routing and the broker
//! transport.
//!
//! - `setters`: parse-and-apply tables for writable topics
//! - `router`: [`SiteBridge`] draining [`Param`] events into the topic tree
//! - `mqtt` feature: `rumqttc`-backed [`Transport`](crate::traits::Transport)
//!
//! # Wiring
//!
//! ```ignore
//! let (transport, event_loop) = RumqttTransport::new(&config.mqtt);
//! tokio::spawn(event_loop.run_event_loop());
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(64);
//! let mut bridge = SiteBridge::new(transport, config.bridge, SystemClock, &site)?;
//! bridge.run(site, rx).await;
//! ```

pub mod router;
pub mod setters;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use router::*;
pub use setters::{listen, register, Setter};

#[cfg(feature = "mqtt")]
pub use mqtt::*;
