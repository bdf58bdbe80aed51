//! Update router: drains domain update events into the topic tree.
//!
//! The router is the single consumer of [`Param`] events. For every event it
//! resolves the destination topic, emits the liveness heartbeat when due and
//! projects the value below the topic.
//!
//! ```text
//! Param { loadpoint: Some(0), key: "chargePower" } -> evcc/loadpoints/1/chargePower
//! Param { loadpoint: None,    key: "vehicles" }    -> evcc/vehicles
//! Param { loadpoint: None,    key: "pvPower" }     -> evcc/site/pvPower
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_sitebridge::config::BridgeConfig;
//! use rs_sitebridge::hal::{MockClock, MockSite, MockTransport};
//! use rs_sitebridge::services::{Param, SiteBridge};
//! use rs_sitebridge::traits::SiteApi;
//!
//! let site: Arc<dyn SiteApi> = Arc::new(MockSite::with_loadpoints(1));
//! let mut bridge = SiteBridge::new(
//!     MockTransport::new(),
//!     BridgeConfig::default(),
//!     MockClock::at(10_000),
//!     &site,
//! )
//! .unwrap();
//!
//! bridge.handle(&Param::loadpoint(0, "chargePower", 3700.0));
//!
//! let transport = bridge.transport();
//! assert_eq!(transport.payload_of("evcc/loadpoints/1/chargePower"), Some("3700"));
//! assert_eq!(transport.payload_of("evcc/updated"), Some("10"));
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::projector::publish;
use crate::traits::{Clock, SiteApi, Transport};
use crate::value::Value;

use super::setters;

/// Site collections with reserved placeholder slots.
const RESERVED_COLLECTIONS: [&str; 3] = ["pv", "battery", "vehicles"];

// ============================================================================
// Update event
// ============================================================================

/// A changed value reported by the site or one of its loadpoints.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// 0-based loadpoint index, `None` for site-level values.
    pub loadpoint: Option<usize>,
    /// Key below the parent topic.
    pub key: String,
    /// New value.
    pub value: Value,
}

impl Param {
    /// Site-level update.
    pub fn site(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            loadpoint: None,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Loadpoint-level update.
    pub fn loadpoint(index: usize, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            loadpoint: Some(index),
            key: key.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// Site bridge
// ============================================================================

/// Publishes site state to a transport and owns the heartbeat.
pub struct SiteBridge<T, C>
where
    T: Transport,
    C: Clock,
{
    transport: T,
    config: BridgeConfig,
    clock: C,
    last_heartbeat: Option<u64>,
}

impl<T, C> SiteBridge<T, C>
where
    T: Transport,
    C: Clock,
{
    /// Erase stale retained state below the root and install all setters.
    ///
    /// Fails if the transport rejects the cleanup or any listener.
    pub fn new(
        mut transport: T,
        config: BridgeConfig,
        clock: C,
        site: &Arc<dyn SiteApi>,
    ) -> Result<Self, BridgeError> {
        let root = config.root_topic.clone();

        transport
            .cleanup(&root, true)
            .map_err(|err| BridgeError::transport(err))?;
        setters::listen(&mut transport, &root, site, &config.blank_payload)?;

        Ok(Self {
            transport,
            config,
            clock,
            last_heartbeat: None,
        })
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Bridge configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Consume the bridge, returning the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Publish summary counts and reserved placeholders.
    ///
    /// Resets the heartbeat so the next event always emits one.
    pub fn start(&mut self, site: &dyn SiteApi) {
        self.last_heartbeat = None;

        let loadpoints = site.loadpoints().len();
        let vehicles = site.vehicles().settings().len();
        let loadpoints_topic = self.config.topic("loadpoints");
        let vehicles_topic = self.config.topic("vehicles");
        self.publish_value(&loadpoints_topic, &Value::from(loadpoints));
        self.publish_value(&vehicles_topic, &Value::from(vehicles));

        for collection in RESERVED_COLLECTIONS {
            for slot in 0..self.config.reserved_slots {
                let topic = self.config.topic(&format!("site/{}/{}", collection, slot));
                self.publish_value(&topic, &Value::Nil);
            }
        }

        debug!(
            root = %self.config.root_topic,
            loadpoints,
            vehicles,
            "bridge started"
        );
    }

    /// Destination topic of an event.
    pub fn topic_for(&self, param: &Param) -> String {
        match (param.loadpoint, param.key.as_str()) {
            (Some(index), key) => self.config.topic(&format!("loadpoints/{}/{}", index + 1, key)),
            (None, "vehicles") => self.config.topic("vehicles"),
            (None, key) => self.config.topic(&format!("site/{}", key)),
        }
    }

    /// Publish one event, preceded by a heartbeat when due.
    pub fn handle(&mut self, param: &Param) {
        self.heartbeat();
        let topic = self.topic_for(param);
        self.publish_value(&topic, &param.value);
    }

    /// Consume events until every sender is dropped.
    pub async fn run(&mut self, site: Arc<dyn SiteApi>, mut rx: mpsc::Receiver<Param>) {
        self.start(site.as_ref());

        while let Some(param) = rx.recv().await {
            self.handle(&param);
        }

        debug!(root = %self.config.root_topic, "update channel closed");
    }

    /// Erase everything below the root.
    ///
    /// Failures are logged, not returned.
    pub fn shutdown(&mut self) {
        match self.transport.cleanup(&self.config.root_topic, true) {
            Ok(()) => debug!(root = %self.config.root_topic, "bridge shut down"),
            Err(err) => error!(root = %self.config.root_topic, "cleanup: {}", err),
        }
    }

    fn heartbeat(&mut self) {
        let now = self.clock.now_ms();
        let due = self
            .last_heartbeat
            .map_or(true, |last| now.saturating_sub(last) > self.config.heartbeat_ms);
        if !due {
            return;
        }

        let topic = self.config.topic("updated");
        let stamp = Value::Uint(self.clock.unix_secs());
        self.publish_value(&topic, &stamp);
        self.last_heartbeat = Some(now);
    }

    fn publish_value(&mut self, topic: &str, value: &Value) {
        let retained = self.config.retained;
        publish(&mut self.transport, topic, retained, value);
    }
}
