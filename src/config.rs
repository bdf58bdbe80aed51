//! Bridge and broker configuration.
//!
//! # Example
//!
//! ```rust
//! use rs_sitebridge::config::{BridgeConfig, Config, MqttConfig};
//!
//! // Use defaults
//! let config = Config::default();
//! assert_eq!(config.bridge.root_topic, "evcc");
//!
//! // Or customize
//! let config = Config::default()
//!     .with_bridge(BridgeConfig::default().with_root_topic("home/evcc"))
//!     .with_mqtt(MqttConfig::default().with_host("192.168.1.100"));
//! assert_eq!(config.bridge.topic("site"), "home/evcc/site");
//! ```

use std::env;
use std::time::Duration;

/// Environment variable prefix read by [`Config::from_env`].
pub const ENV_PREFIX: &str = "SITEBRIDGE_";

// ============================================================================
// Main Config
// ============================================================================

/// Complete application configuration
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Topic layout and publishing behaviour
    pub bridge: BridgeConfig,
    /// Broker connection
    pub mqtt: MqttConfig,
}

impl Config {
    /// Set bridge configuration
    pub fn with_bridge(mut self, bridge: BridgeConfig) -> Self {
        self.bridge = bridge;
        self
    }

    /// Set MQTT configuration
    pub fn with_mqtt(mut self, mqtt: MqttConfig) -> Self {
        self.mqtt = mqtt;
        self
    }

    /// Defaults overridden by `SITEBRIDGE_*` environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `SITEBRIDGE_ROOT` | `bridge.root_topic` |
    /// | `SITEBRIDGE_BROKER_HOST` | `mqtt.host` |
    /// | `SITEBRIDGE_BROKER_PORT` | `mqtt.port` (ignored if not a port) |
    /// | `SITEBRIDGE_CLIENT_ID` | `mqtt.client_id` |
    /// | `SITEBRIDGE_USER` | `mqtt.username` |
    /// | `SITEBRIDGE_PASSWORD` | `mqtt.password` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Defaults overridden by values from `lookup` (keys without prefix).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(root) = lookup("ROOT") {
            config.bridge = config.bridge.with_root_topic(&root);
        }
        if let Some(host) = lookup("BROKER_HOST") {
            config.mqtt.host = host;
        }
        if let Some(port) = lookup("BROKER_PORT").and_then(|p| p.parse().ok()) {
            config.mqtt.port = port;
        }
        if let Some(id) = lookup("CLIENT_ID") {
            config.mqtt.client_id = id;
        }
        if let Some(user) = lookup("USER") {
            config.mqtt.username = user;
        }
        if let Some(password) = lookup("PASSWORD") {
            config.mqtt.password = password;
        }

        config
    }
}

// ============================================================================
// Bridge Config
// ============================================================================

/// Topic layout and publishing behaviour
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BridgeConfig {
    /// Root of the topic tree (e.g., "evcc" -> "evcc/site/...")
    pub root_topic: String,
    /// Payload treated like an empty payload by clearing setters
    pub blank_payload: String,
    /// Minimum interval between heartbeats in milliseconds
    pub heartbeat_ms: u64,
    /// Number of reserved placeholder slots per site collection
    pub reserved_slots: usize,
    /// Publish state as retained messages
    pub retained: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            root_topic: "evcc".to_string(),
            blank_payload: "-".to_string(),
            heartbeat_ms: 1000,
            reserved_slots: 10,
            retained: true,
        }
    }
}

impl BridgeConfig {
    /// Set the root topic
    pub fn with_root_topic(mut self, root: &str) -> Self {
        self.root_topic = root.trim_end_matches('/').to_string();
        self
    }

    /// Set the blank payload sentinel
    pub fn with_blank_payload(mut self, blank: &str) -> Self {
        self.blank_payload = blank.to_string();
        self
    }

    /// Set the heartbeat interval
    pub fn with_heartbeat_ms(mut self, ms: u64) -> Self {
        self.heartbeat_ms = ms;
        self
    }

    /// Set the number of reserved placeholder slots
    pub fn with_reserved_slots(mut self, slots: usize) -> Self {
        self.reserved_slots = slots;
        self
    }

    /// Build a topic string below the root
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.root_topic, suffix)
    }
}

// ============================================================================
// MQTT Config
// ============================================================================

/// MQTT broker configuration
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MqttConfig {
    /// Broker hostname or IP
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Client ID (should be unique per bridge)
    pub client_id: String,
    /// Username for authentication (empty = no auth)
    pub username: String,
    /// Password for authentication
    pub password: String,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Delay before polling again after a connection error, in milliseconds
    pub reconnect_delay_ms: u64,
    /// How long stale retained messages are swept after connecting, in milliseconds
    pub sweep_window_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "rs-sitebridge".to_string(),
            username: String::new(),
            password: String::new(),
            keep_alive_secs: 30,
            reconnect_delay_ms: 5000,
            sweep_window_ms: 2000,
        }
    }
}

impl MqttConfig {
    /// Set the broker host
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Set the broker port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the client ID
    pub fn with_client_id(mut self, id: &str) -> Self {
        self.client_id = id.to_string();
        self
    }

    /// Set authentication credentials
    pub fn with_auth(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    /// Check if authentication is configured
    pub fn has_auth(&self) -> bool {
        !self.username.is_empty()
    }

    /// Keep-alive as a duration
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs as u64)
    }

    /// Reconnect delay as a duration
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Stale retained sweep window as a duration
    pub fn sweep_window(&self) -> Duration {
        Duration::from_millis(self.sweep_window_ms)
    }
}
