//! Projection of nested values onto a topic tree.
//!
//! [`publish`] turns one [`Value`] into a set of leaf writes below a topic:
//!
//! ```text
//! evcc/site/gridCurrents          = 12.4      (sum of phases)
//! evcc/site/gridCurrents/l1       = 4.1
//! evcc/site/gridCurrents/l2       = 4.2
//! evcc/site/gridCurrents/l3       = 4.1
//! evcc/site/pv                    = 2         (sequence length)
//! evcc/site/pv/1/power            = 1500
//! evcc/site/pv/2/power            = 780.5
//! ```
//!
//! Leaves are encoded with [`encode`](crate::encode::encode) and handed to a
//! [`Publisher`]. Every leaf is independent: a failing custom marshaler only
//! drops its own leaf.

use tracing::{error, warn};

use crate::encode::encode;
use crate::traits::Transport;
use crate::value::Value;

/// Sink for encoded leaf writes.
pub trait Publisher {
    /// Publish one encoded leaf.
    fn publish_leaf(&mut self, topic: &str, retained: bool, payload: &str);
}

impl<T: Transport> Publisher for T {
    fn publish_leaf(&mut self, topic: &str, retained: bool, payload: &str) {
        if let Err(err) = self.publish(topic, payload.as_bytes(), retained) {
            warn!(topic, "publish failed: {}", err);
        }
    }
}

/// A single leaf write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Write {
    /// Destination topic.
    pub topic: String,
    /// Retained flag.
    pub retained: bool,
    /// Encoded payload; empty means erase.
    pub payload: String,
}

/// Publisher that only records writes.
///
/// ```rust
/// use rs_sitebridge::projector::CollectingPublisher;
/// use rs_sitebridge::value::Value;
///
/// let writes = CollectingPublisher::collect("t", true, &Value::from(vec![1, 2]));
/// let topics: Vec<_> = writes.iter().map(|w| w.topic.as_str()).collect();
/// assert_eq!(topics, ["t", "t/1", "t/2"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectingPublisher {
    /// Writes in publish order.
    pub writes: Vec<Write>,
}

impl CollectingPublisher {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Projects `value` and returns the resulting writes.
    pub fn collect(topic: &str, retained: bool, value: &Value) -> Vec<Write> {
        let mut collector = Self::new();
        publish(&mut collector, topic, retained, value);
        collector.writes
    }

    /// Payload of the last write to `topic`.
    pub fn payload_of(&self, topic: &str) -> Option<&str> {
        self.writes
            .iter()
            .rev()
            .find(|w| w.topic == topic)
            .map(|w| w.payload.as_str())
    }
}

impl Publisher for CollectingPublisher {
    fn publish_leaf(&mut self, topic: &str, retained: bool, payload: &str) {
        self.writes.push(Write {
            topic: topic.to_string(),
            retained,
            payload: payload.to_string(),
        });
    }
}

/// Publishes `value` at `topic`.
///
/// A 3-element numeric sequence is treated as per-phase measurements and
/// published as `l1`..`l3` plus their sum at `topic`. Everything else goes
/// through [`project`].
pub fn publish<P: Publisher + ?Sized>(publisher: &mut P, topic: &str, retained: bool, value: &Value) {
    if let Some(phases) = value.as_phases() {
        let mut total = 0.0;
        for (i, phase) in phases.iter().enumerate() {
            total += phase;
            leaf(publisher, &format!("{}/l{}", topic, i + 1), retained, &Value::Float(*phase));
        }
        leaf(publisher, topic, retained, &Value::Float(total));
        return;
    }

    project(publisher, topic, retained, value);
}

/// Recursively projects `value` at `topic` without the phase override.
pub fn project<P: Publisher + ?Sized>(publisher: &mut P, topic: &str, retained: bool, value: &Value) {
    match value {
        Value::Nil | Value::Described(_) => leaf(publisher, topic, retained, value),

        Value::Custom(marshaler) => match marshaler.marshal_mqtt() {
            Ok(bytes) => publisher.publish_leaf(topic, retained, &String::from_utf8_lossy(&bytes)),
            Err(err) => error!(topic, "marshal mqtt: {}", err),
        },

        Value::Seq(items) => {
            leaf(publisher, topic, retained, &Value::Uint(items.len() as u64));
            for (i, item) in items.iter().enumerate() {
                project(publisher, &format!("{}/{}", topic, i + 1), retained, item);
            }
        }

        Value::Map(entries) => {
            for (key, item) in entries {
                project(publisher, &format!("{}/{}", topic, key), retained, item);
            }
        }

        Value::Record(fields) => {
            for field in fields {
                let topic = format!("{}/{}", topic, lower_first(&field.name));
                if field.omit_empty && field.value.is_zero() {
                    leaf(publisher, &topic, retained, &Value::Nil);
                } else {
                    project(publisher, &topic, retained, &field.value);
                }
            }
        }

        Value::Optional(Some(inner)) => project(publisher, topic, retained, inner),
        Value::Optional(None) => leaf(publisher, topic, retained, &Value::Nil),

        scalar => leaf(publisher, topic, retained, scalar),
    }
}

fn leaf<P: Publisher + ?Sized>(publisher: &mut P, topic: &str, retained: bool, value: &Value) {
    publisher.publish_leaf(topic, retained, &encode(value));
}

/// Lowercases the first character of a field name.
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
