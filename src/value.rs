//! Closed value model for everything the bridge publishes.
//!
//! Domain state is converted into a [`Value`] before projection, so the
//! projector only ever matches over a fixed set of shapes:
//!
//! | Variant | Projected as |
//! |---------|--------------|
//! | `Nil`, scalars, `Described` | single leaf |
//! | `Custom` | single leaf with the marshaled bytes |
//! | `Seq` | count leaf plus `1..=n` children |
//! | `Map` | one child per key |
//! | `Record` | one child per field (lower-camel name) |
//! | `Optional` | the inner value at the same topic, or an erase |
//!
//! # Example
//!
//! ```rust
//! use rs_sitebridge::value::{Record, Value};
//!
//! let battery = Record::new()
//!     .field("Power", 1250.5)
//!     .field("Soc", 64)
//!     .omit_empty("Capacity", 0.0);
//!
//! let value: Value = battery.into();
//! assert!(matches!(value, Value::Record(ref fields) if fields.len() == 3));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::BridgeError;
use crate::modes::{BatteryMode, ChargeMode};

/// Types that render themselves into an MQTT payload.
///
/// Takes precedence over structural projection: the whole value is published
/// as one leaf. A failure is logged and the leaf is skipped.
pub trait MqttMarshal: Send + Sync {
    /// Returns the payload bytes for this value.
    fn marshal_mqtt(&self) -> Result<Vec<u8>, BridgeError>;
}

/// A publishable value.
#[derive(Clone)]
pub enum Value {
    /// Absent value; publishes an erase.
    Nil,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    Uint(u64),
    /// Floating point number.
    Float(f64),
    /// Text, published verbatim.
    Str(String),
    /// Absolute timestamp; `None` is the unset timestamp.
    Time(Option<DateTime<Utc>>),
    /// Duration, published as whole seconds.
    Duration(Duration),
    /// Value that describes itself as text.
    Described(String),
    /// Value with its own payload encoding.
    Custom(Arc<dyn MqttMarshal>),
    /// Ordered sequence.
    Seq(Vec<Value>),
    /// String-keyed map.
    Map(BTreeMap<String, Value>),
    /// Aggregate with named fields.
    Record(Vec<Field>),
    /// Value that may be absent.
    Optional(Option<Box<Value>>),
}

impl Value {
    /// Wraps anything implementing `Display` as a self-describing value.
    pub fn described(value: impl fmt::Display) -> Self {
        Self::Described(value.to_string())
    }

    /// Wraps a custom marshaler.
    pub fn custom(value: impl MqttMarshal + 'static) -> Self {
        Self::Custom(Arc::new(value))
    }

    /// Returns true if this is the zero value of its kind.
    ///
    /// Used for fields annotated with omit-empty.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Nil => true,
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::Uint(u) => *u == 0,
            // negative zero is not the zero value
            Self::Float(f) => f.to_bits() == 0,
            Self::Str(s) | Self::Described(s) => s.is_empty(),
            Self::Time(t) => t.is_none(),
            Self::Duration(d) => d.is_zero(),
            Self::Custom(_) => false,
            Self::Seq(items) => items.is_empty(),
            Self::Map(entries) => entries.is_empty(),
            Self::Record(fields) => fields.iter().all(|f| f.value.is_zero()),
            Self::Optional(inner) => inner.is_none(),
        }
    }

    /// Numeric view of scalar numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Uint(u) => Some(*u as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Per-phase triplet `[l1, l2, l3]` if this is a 3-element numeric sequence.
    pub fn as_phases(&self) -> Option<[f64; 3]> {
        match self {
            Self::Seq(items) if items.len() == 3 => {
                let mut phases = [0.0; 3];
                for (slot, item) in phases.iter_mut().zip(items) {
                    *slot = item.as_f64()?;
                }
                Some(phases)
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("Nil"),
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Self::Uint(v) => f.debug_tuple("Uint").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Self::Time(v) => f.debug_tuple("Time").field(v).finish(),
            Self::Duration(v) => f.debug_tuple("Duration").field(v).finish(),
            Self::Described(v) => f.debug_tuple("Described").field(v).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
            Self::Seq(v) => f.debug_tuple("Seq").field(v).finish(),
            Self::Map(v) => f.debug_tuple("Map").field(v).finish(),
            Self::Record(v) => f.debug_tuple("Record").field(v).finish(),
            Self::Optional(v) => f.debug_tuple("Optional").field(v).finish(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Uint(a), Self::Uint(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::Duration(a), Self::Duration(b)) => a == b,
            (Self::Described(a), Self::Described(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            (Self::Seq(a), Self::Seq(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => a == b,
            (Self::Optional(a), Self::Optional(b)) => a == b,
            _ => false,
        }
    }
}

/// Named field of a [`Value::Record`].
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    /// Field name; the first character is lowercased in the topic.
    pub name: String,
    /// Publish an erase instead of the value when the value is zero.
    pub omit_empty: bool,
    /// Field value.
    pub value: Value,
}

/// Builder for record values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            omit_empty: false,
            value: value.into(),
        });
        self
    }

    /// Appends a field that is erased while it holds its zero value.
    pub fn omit_empty(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            omit_empty: true,
            value: value.into(),
        });
        self
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

impl Publishable for Record {
    fn to_value(&self) -> Value {
        Value::Record(self.fields.clone())
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record.fields)
    }
}

// ============================================================================
// Conversions
// ============================================================================

/// Types with a canonical [`Value`] form.
pub trait Publishable {
    /// Converts `self` into the closed value model.
    fn to_value(&self) -> Value;
}

impl Publishable for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: Publishable + ?Sized> Publishable for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

macro_rules! publishable {
    ($variant:ident as $target:ty: $($t:ty),+) => {
        $(
            impl Publishable for $t {
                fn to_value(&self) -> Value {
                    Value::$variant(<$target>::from(*self))
                }
            }

            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    v.to_value()
                }
            }
        )+
    };
}

publishable!(Bool as bool: bool);
publishable!(Int as i64: i8, i16, i32, i64);
publishable!(Uint as u64: u8, u16, u32, u64);
publishable!(Float as f64: f32, f64);

impl Publishable for usize {
    fn to_value(&self) -> Value {
        Value::Uint(*self as u64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        v.to_value()
    }
}

impl Publishable for isize {
    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl From<isize> for Value {
    fn from(v: isize) -> Self {
        v.to_value()
    }
}

impl Publishable for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl Publishable for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl Publishable for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Time(Some(*self))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(Some(v))
    }
}

impl Publishable for Duration {
    fn to_value(&self) -> Value {
        Value::Duration(*self)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl Publishable for ChargeMode {
    fn to_value(&self) -> Value {
        Value::described(self)
    }
}

impl From<ChargeMode> for Value {
    fn from(v: ChargeMode) -> Self {
        v.to_value()
    }
}

impl Publishable for BatteryMode {
    fn to_value(&self) -> Value {
        Value::described(self)
    }
}

impl From<BatteryMode> for Value {
    fn from(v: BatteryMode) -> Self {
        v.to_value()
    }
}

impl<T: Publishable> Publishable for Option<T> {
    fn to_value(&self) -> Value {
        Value::Optional(self.as_ref().map(|v| Box::new(v.to_value())))
    }
}

impl<T: Publishable> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.to_value()
    }
}

impl<T: Publishable> Publishable for [T] {
    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(Publishable::to_value).collect())
    }
}

impl<T: Publishable> Publishable for Vec<T> {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: Publishable> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        v.to_value()
    }
}

impl<T: Publishable, const N: usize> Publishable for [T; N] {
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T: Publishable, const N: usize> From<[T; N]> for Value {
    fn from(v: [T; N]) -> Self {
        v.to_value()
    }
}

impl<T: Publishable> Publishable for BTreeMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }
}

impl<T: Publishable> From<BTreeMap<String, T>> for Value {
    fn from(v: BTreeMap<String, T>) -> Self {
        v.to_value()
    }
}

impl<T: Publishable> Publishable for HashMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect(),
        )
    }
}

impl<T: Publishable> From<HashMap<String, T>> for Value {
    fn from(v: HashMap<String, T>) -> Self {
        v.to_value()
    }
}

impl Publishable for serde_json::Value {
    fn to_value(&self) -> Value {
        use serde_json::Value as Json;

        match self {
            Json::Null => Value::Nil,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Uint(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::Seq(items.iter().map(Publishable::to_value).collect()),
            Json::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        v.to_value()
    }
}
