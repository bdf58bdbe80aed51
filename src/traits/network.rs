//! Publish/subscribe transport abstraction.
//!
//! The bridge never talks to a broker directly. It publishes leaves,
//! installs per-topic listeners and erases stale state through a
//! [`Transport`]:
//!
//! ```text
//! evcc/site/pvPower             - published leaf (retained)
//! evcc/loadpoints/1/mode        - published leaf (retained)
//! evcc/loadpoints/1/mode/set    - listener installed by the setter registry
//! evcc/updated                  - heartbeat
//! ```
//!
//! Connection handling, QoS, reconnects and wire encoding are the
//! transport's business. A broker-backed implementation lives in
//! `services::mqtt` (feature `mqtt`), a recording mock in
//! [`crate::hal::mock`].

use std::sync::Arc;

use crate::error::BridgeError;

/// Suffix appended to a writable topic to form its listener topic.
pub const SET_SUFFIX: &str = "set";

/// Callback invoked by the transport with the payload of an inbound write.
///
/// Listeners may fire concurrently on the transport's own threads. An error
/// is reported back to the transport, which decides how to surface it.
pub type Listener = Arc<dyn Fn(&str) -> Result<(), BridgeError> + Send + Sync>;

/// Transport used by the bridge (sync-first).
///
/// `publish` must not wait for broker acknowledgement; it may block on
/// back-pressure of the outgoing queue.
///
/// # Example
///
/// ```rust
/// use rs_sitebridge::traits::Transport;
/// use rs_sitebridge::hal::MockTransport;
///
/// let mut transport = MockTransport::new();
/// transport.publish("evcc/site/gridPower", b"1200", true).unwrap();
/// assert_eq!(transport.payload_of("evcc/site/gridPower"), Some("1200"));
/// ```
pub trait Transport {
    /// Error type for transport operations.
    type Error: std::error::Error;

    /// Publish a payload to a topic.
    ///
    /// An empty retained payload erases the topic on the broker.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error>;

    /// Install a listener for inbound writes.
    ///
    /// The listener is bound to `{topic}/set`. A later listener for the same
    /// topic replaces the earlier one.
    fn listen(&mut self, topic: &str, listener: Listener) -> Result<(), Self::Error>;

    /// Erase retained state below `root` (and `root` itself).
    ///
    /// With `recursive` false only `root` itself is erased.
    fn cleanup(&mut self, root: &str, recursive: bool) -> Result<(), Self::Error>;
}

/// Listener topic for a writable topic.
pub fn set_topic(topic: &str) -> String {
    format!("{}/{}", topic, SET_SUFFIX)
}

/// Returns true if `topic` is `root` or lies below it.
pub fn is_below(topic: &str, root: &str) -> bool {
    topic == root
        || topic
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}
