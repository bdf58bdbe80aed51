//! Writable topics: parse-and-apply tables for site, loadpoints and vehicles.
//!
//! Each table entry binds a topic suffix to a [`Listener`] built from one of
//! the adapter builders below. A builder pairs a payload parser with a
//! domain setter; the setter is only invoked after the payload parsed.
//!
//! | Builder | Payload | Setter receives |
//! |---------|---------|-----------------|
//! | [`bool_setter`] | `1`/`true`/`0`/`false` ... | `bool` |
//! | [`int_setter`] | integer | `i64` |
//! | [`float_setter`] | float | `f64` |
//! | [`float_ptr_setter`] | empty or float | `Option<f64>` (empty clears) |
//! | [`duration_setter`] | whole seconds | `Duration` |
//! | [`enum_setter`] | enum token | `E` |
//! | [`enum_ptr_setter`] | empty or enum token | `Option<E>` |
//! | [`plan_setter`] | `{"time","precondition","value"}` | `(time, precondition, value)` |
//! | [`vehicle_setter`] | vehicle name, empty or blank sentinel | `Option<vehicle>` |
//!
//! # Topics
//!
//! ```text
//! {root}/site/{suffix}/set
//! {root}/loadpoints/{n}/{suffix}/set     (n is 1-based)
//! {root}/vehicles/{name}/{suffix}/set
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{BridgeError, DomainError};
use crate::messages::parse_plan_request;
use crate::modes::{BatteryMode, ChargeMode};
use crate::parsing::{
    is_blank, parse_bool, parse_duration_secs, parse_enum, parse_float, parse_int,
};
use crate::traits::{LoadpointApi, Listener, SiteApi, Transport, VehicleApi};

/// Site-level writable suffixes, in registration order.
pub const SITE_TOPICS: [&str; 9] = [
    "bufferSoc",
    "bufferStartSoc",
    "batteryDischargeControl",
    "prioritySoc",
    "residualPower",
    "smartCostLimit",
    "smartFeedInPriorityLimit",
    "batteryGridChargeLimit",
    "batteryMode",
];

/// Loadpoint-level writable suffixes, in registration order.
pub const LOADPOINT_TOPICS: [&str; 16] = [
    "mode",
    "phases",
    "limitSoc",
    "priority",
    "minCurrent",
    "maxCurrent",
    "limitEnergy",
    "enableThreshold",
    "disableThreshold",
    "enableDelay",
    "disableDelay",
    "smartCostLimit",
    "smartFeedInPriorityLimit",
    "batteryBoost",
    "planEnergy",
    "vehicle",
];

/// Vehicle-level writable suffixes, in registration order.
pub const VEHICLE_TOPICS: [&str; 3] = ["limitSoc", "minSoc", "planSoc"];

// ============================================================================
// Setter descriptor
// ============================================================================

/// A writable topic suffix and its parse-and-apply callback.
#[derive(Clone)]
pub struct Setter {
    /// Topic suffix below the parent topic.
    pub topic: &'static str,
    /// Parses the payload and applies it.
    pub fun: Listener,
}

impl Setter {
    /// Create a setter from any parse-and-apply function.
    pub fn new<F>(topic: &'static str, fun: F) -> Self
    where
        F: Fn(&str) -> Result<(), BridgeError> + Send + Sync + 'static,
    {
        Self {
            topic,
            fun: Arc::new(fun),
        }
    }

    /// Apply a payload as the transport would.
    pub fn apply(&self, payload: &str) -> Result<(), BridgeError> {
        (self.fun)(payload)
    }
}

impl fmt::Debug for Setter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter").field("topic", &self.topic).finish()
    }
}

// ============================================================================
// Adapter builders
// ============================================================================

/// Adapts an infallible setter.
pub fn pass<T, F>(set: F) -> impl Fn(T) -> Result<(), DomainError> + Send + Sync + 'static
where
    T: 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    move |value: T| -> Result<(), DomainError> {
        set(value);
        Ok(())
    }
}

/// Pairs a parser with a setter.
pub fn setter_func<T, P, S, E>(
    parse: P,
    set: S,
) -> impl Fn(&str) -> Result<(), BridgeError> + Send + Sync + 'static
where
    T: 'static,
    E: Into<BridgeError> + 'static,
    P: Fn(&str) -> Result<T, BridgeError> + Send + Sync + 'static,
    S: Fn(T) -> Result<(), E> + Send + Sync + 'static,
{
    move |payload: &str| -> Result<(), BridgeError> {
        let value = parse(payload)?;
        set(value).map_err(Into::into)
    }
}

/// Pairs a parser with a setter taking an optional value.
///
/// An empty payload passes `None` instead of being parsed.
pub fn ptr_setter<T, P, S, E>(
    parse: P,
    set: S,
) -> impl Fn(&str) -> Result<(), BridgeError> + Send + Sync + 'static
where
    T: 'static,
    E: Into<BridgeError> + 'static,
    P: Fn(&str) -> Result<T, BridgeError> + Send + Sync + 'static,
    S: Fn(Option<T>) -> Result<(), E> + Send + Sync + 'static,
{
    move |payload: &str| -> Result<(), BridgeError> {
        let value = if payload.is_empty() {
            None
        } else {
            Some(parse(payload)?)
        };
        set(value).map_err(Into::into)
    }
}

/// Boolean setter.
pub fn bool_setter<S, E>(set: S) -> impl Fn(&str) -> Result<(), BridgeError> + Send + Sync + 'static
where
    E: Into<BridgeError> + 'static,
    S: Fn(bool) -> Result<(), E> + Send + Sync + 'static,
{
    setter_func(parse_bool, set)
}

/// Integer setter.
pub fn int_setter<S, E>(set: S) -> impl Fn(&str) -> Result<(), BridgeError> + Send + Sync + 'static
where
    E: Into<BridgeError> + 'static,
    S: Fn(i64) -> Result<(), E> + Send + Sync + 'static,
{
    setter_func(parse_int, set)
}

/// Float setter.
pub fn float_setter<S, E>(set: S) -> impl Fn(&str) -> Result<(), BridgeError> + Send + Sync + 'static
where
    E: Into<BridgeError> + 'static,
    S: Fn(f64) -> Result<(), E> + Send + Sync + 'static,
{
    setter_func(parse_float, set)
}

/// Optional float setter; an empty payload clears the value.
pub fn float_ptr_setter<S, E>(set: S) -> impl Fn(&str) -> Result<(), BridgeError> + Send + Sync + 'static
where
    E: Into<BridgeError> + 'static,
    S: Fn(Option<f64>) -> Result<(), E> + Send + Sync + 'static,
{
    ptr_setter(parse_float, set)
}

/// Duration setter; the payload is whole seconds.
pub fn duration_setter<S, E>(set: S) -> impl Fn(&str) -> Result<(), BridgeError> + Send + Sync + 'static
where
    E: Into<BridgeError> + 'static,
    S: Fn(Duration) -> Result<(), E> + Send + Sync + 'static,
{
    setter_func(parse_duration_secs, set)
}

/// Enumeration setter.
pub fn enum_setter<T, S, E>(set: S) -> impl Fn(&str) -> Result<(), BridgeError> + Send + Sync + 'static
where
    T: FromStr + 'static,
    E: Into<BridgeError> + 'static,
    S: Fn(T) -> Result<(), E> + Send + Sync + 'static,
{
    setter_func(parse_enum::<T>, set)
}

/// Optional enumeration setter; an empty payload passes `None`.
pub fn enum_ptr_setter<T, S, E>(set: S) -> impl Fn(&str) -> Result<(), BridgeError> + Send + Sync + 'static
where
    T: FromStr + 'static,
    E: Into<BridgeError> + 'static,
    S: Fn(Option<T>) -> Result<(), E> + Send + Sync + 'static,
{
    ptr_setter(parse_enum::<T>, set)
}

/// Plan setter; the payload is a JSON [`PlanRequest`](crate::messages::PlanRequest).
pub fn plan_setter<V, S, E>(set: S) -> impl Fn(&str) -> Result<(), BridgeError> + Send + Sync + 'static
where
    V: DeserializeOwned + Default + 'static,
    E: Into<BridgeError> + 'static,
    S: Fn(Option<DateTime<Utc>>, Duration, V) -> Result<(), E> + Send + Sync + 'static,
{
    move |payload: &str| -> Result<(), BridgeError> {
        let plan = parse_plan_request::<V>(payload)?;
        let precondition = plan.precondition();
        set(plan.time, precondition, plan.value).map_err(Into::into)
    }
}

/// Vehicle assignment by name.
///
/// An empty payload or the `blank` sentinel detaches the vehicle. Unknown
/// names fail without touching the loadpoint.
pub fn vehicle_setter(
    site: Arc<dyn SiteApi>,
    lp: Arc<dyn LoadpointApi>,
    blank: String,
) -> impl Fn(&str) -> Result<(), BridgeError> + Send + Sync + 'static {
    move |payload: &str| -> Result<(), BridgeError> {
        // some transports swallow empty payloads, hence the sentinel
        if is_blank(payload, &blank) {
            lp.set_vehicle(None);
            return Ok(());
        }

        let vehicle = site.vehicles().by_name(payload)?;
        lp.set_vehicle(Some(vehicle));
        Ok(())
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Clones an `Arc` into a `move` closure.
macro_rules! bind {
    ($obj:expr, |$this:ident $(, $arg:ident : $ty:ty)*| $body:expr) => {{
        let $this = Arc::clone(&$obj);
        move |$($arg: $ty),*| $body
    }};
}

/// Site-level setters.
///
/// `smartCostLimit` and `smartFeedInPriorityLimit` fan out to the loadpoints
/// known when the write arrives.
pub fn site_setters(site: Arc<dyn SiteApi>) -> Vec<Setter> {
    vec![
        Setter::new(
            "bufferSoc",
            float_setter(bind!(site, |s, soc: f64| s.set_buffer_soc(soc))),
        ),
        Setter::new(
            "bufferStartSoc",
            float_setter(bind!(site, |s, soc: f64| s.set_buffer_start_soc(soc))),
        ),
        Setter::new(
            "batteryDischargeControl",
            bool_setter(bind!(site, |s, enable: bool| s.set_battery_discharge_control(enable))),
        ),
        Setter::new(
            "prioritySoc",
            float_setter(bind!(site, |s, soc: f64| s.set_priority_soc(soc))),
        ),
        Setter::new(
            "residualPower",
            float_setter(bind!(site, |s, power: f64| s.set_residual_power(power))),
        ),
        Setter::new(
            "smartCostLimit",
            float_ptr_setter(pass(bind!(site, |s, limit: Option<f64>| {
                for lp in s.loadpoints() {
                    lp.set_smart_cost_limit(limit);
                }
            }))),
        ),
        Setter::new(
            "smartFeedInPriorityLimit",
            float_ptr_setter(pass(bind!(site, |s, limit: Option<f64>| {
                for lp in s.loadpoints() {
                    lp.set_smart_feed_in_priority_limit(limit);
                }
            }))),
        ),
        Setter::new(
            "batteryGridChargeLimit",
            float_ptr_setter(pass(bind!(site, |s, limit: Option<f64>| s
                .set_battery_grid_charge_limit(limit)))),
        ),
        Setter::new(
            "batteryMode",
            enum_ptr_setter(pass(bind!(site, |s, mode: Option<BatteryMode>| s
                .set_battery_mode_external(mode.unwrap_or(BatteryMode::Unknown))))),
        ),
    ]
}

/// Loadpoint-level setters.
pub fn loadpoint_setters(
    site: Arc<dyn SiteApi>,
    lp: Arc<dyn LoadpointApi>,
    blank: &str,
) -> Vec<Setter> {
    vec![
        Setter::new(
            "mode",
            enum_setter(pass(bind!(lp, |l, mode: ChargeMode| l.set_mode(mode)))),
        ),
        Setter::new(
            "phases",
            int_setter(bind!(lp, |l, phases: i64| l.set_phases_configured(phases))),
        ),
        Setter::new(
            "limitSoc",
            int_setter(pass(bind!(lp, |l, soc: i64| l.set_limit_soc(soc)))),
        ),
        Setter::new(
            "priority",
            int_setter(pass(bind!(lp, |l, priority: i64| l.set_priority(priority)))),
        ),
        Setter::new(
            "minCurrent",
            float_setter(bind!(lp, |l, current: f64| l.set_min_current(current))),
        ),
        Setter::new(
            "maxCurrent",
            float_setter(bind!(lp, |l, current: f64| l.set_max_current(current))),
        ),
        Setter::new(
            "limitEnergy",
            float_setter(pass(bind!(lp, |l, energy: f64| l.set_limit_energy(energy)))),
        ),
        Setter::new(
            "enableThreshold",
            float_setter(pass(bind!(lp, |l, threshold: f64| l.set_enable_threshold(threshold)))),
        ),
        Setter::new(
            "disableThreshold",
            float_setter(pass(bind!(lp, |l, threshold: f64| l.set_disable_threshold(threshold)))),
        ),
        Setter::new(
            "enableDelay",
            duration_setter(pass(bind!(lp, |l, delay: Duration| l.set_enable_delay(delay)))),
        ),
        Setter::new(
            "disableDelay",
            duration_setter(pass(bind!(lp, |l, delay: Duration| l.set_disable_delay(delay)))),
        ),
        Setter::new(
            "smartCostLimit",
            float_ptr_setter(pass(bind!(lp, |l, limit: Option<f64>| l.set_smart_cost_limit(limit)))),
        ),
        Setter::new(
            "smartFeedInPriorityLimit",
            float_ptr_setter(pass(bind!(lp, |l, limit: Option<f64>| l
                .set_smart_feed_in_priority_limit(limit)))),
        ),
        Setter::new(
            "batteryBoost",
            bool_setter(bind!(lp, |l, enable: bool| l.set_battery_boost(enable))),
        ),
        Setter::new(
            "planEnergy",
            plan_setter(bind!(lp, |l, time: Option<DateTime<Utc>>, precondition: Duration, energy: f64| l
                .set_plan_energy(time, precondition, energy))),
        ),
        Setter::new(
            "vehicle",
            vehicle_setter(site, lp, blank.to_string()),
        ),
    ]
}

/// Vehicle-level setters.
pub fn vehicle_setters(vehicle: Arc<dyn VehicleApi>) -> Vec<Setter> {
    vec![
        Setter::new(
            "limitSoc",
            int_setter(pass(bind!(vehicle, |v, soc: i64| v.set_limit_soc(soc)))),
        ),
        Setter::new(
            "minSoc",
            int_setter(pass(bind!(vehicle, |v, soc: i64| v.set_min_soc(soc)))),
        ),
        Setter::new(
            "planSoc",
            plan_setter(bind!(vehicle, |v, time: Option<DateTime<Utc>>, precondition: Duration, soc: i64| v
                .set_plan_soc(time, precondition, soc))),
        ),
    ]
}

// ============================================================================
// Registration
// ============================================================================

/// Binds every setter below `parent` on the transport.
///
/// Stops at the first transport error.
pub fn register<T: Transport + ?Sized>(
    transport: &mut T,
    parent: &str,
    setters: Vec<Setter>,
) -> Result<(), BridgeError> {
    for setter in setters {
        let topic = format!("{}/{}", parent, setter.topic);
        transport
            .listen(&topic, setter.fun)
            .map_err(|err| BridgeError::transport(err))?;
    }
    Ok(())
}

/// Installs site, loadpoint and vehicle setters below `root`.
pub fn listen<T: Transport + ?Sized>(
    transport: &mut T,
    root: &str,
    site: &Arc<dyn SiteApi>,
    blank: &str,
) -> Result<(), BridgeError> {
    register(transport, &format!("{}/site", root), site_setters(Arc::clone(site)))?;

    for (id, lp) in site.loadpoints().into_iter().enumerate() {
        let topic = format!("{}/loadpoints/{}", root, id + 1);
        register(transport, &topic, loadpoint_setters(Arc::clone(site), lp, blank))?;
    }

    for vehicle in site.vehicles().settings() {
        let topic = format!("{}/vehicles/{}", root, vehicle.name());
        register(transport, &topic, vehicle_setters(vehicle))?;
    }

    debug!(root, "setters registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_float_ptr_setter_semantics() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let setter = float_ptr_setter(pass(move |v: Option<f64>| sink.lock().unwrap().push(v)));

        setter("").unwrap();
        setter("12.5").unwrap();
        assert!(setter("abc").unwrap_err().is_parse());

        assert_eq!(*calls.lock().unwrap(), vec![None, Some(12.5)]);
    }

    #[test]
    fn test_setter_not_called_on_parse_error() {
        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        let setter = bool_setter(pass(move |_: bool| *flag.lock().unwrap() = true));

        assert!(setter("maybe").is_err());
        assert!(!*called.lock().unwrap());
    }

    #[test]
    fn test_domain_error_propagates() {
        let setter = int_setter(|v: i64| {
            if v > 3 {
                Err(DomainError::OutOfRange {
                    name: "phases",
                    value: v.to_string(),
                })
            } else {
                Ok(())
            }
        });

        assert!(setter("3").is_ok());
        let err = setter("4").unwrap_err();
        assert!(matches!(err, BridgeError::Domain(_)));
    }

    #[test]
    fn test_duration_setter_seconds() {
        let got = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&got);
        let setter = duration_setter(pass(move |d: Duration| *sink.lock().unwrap() = Some(d)));

        setter("90").unwrap();
        assert_eq!(*got.lock().unwrap(), Some(Duration::from_secs(90)));
        assert!(setter("1m").is_err());
    }

    #[test]
    fn test_enum_ptr_setter_empty() {
        let got = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&got);
        let setter = enum_ptr_setter(pass(move |m: Option<BatteryMode>| sink.lock().unwrap().push(m)));

        setter("").unwrap();
        setter("hold").unwrap();
        assert!(setter("drain").is_err());
        assert_eq!(*got.lock().unwrap(), vec![None, Some(BatteryMode::Hold)]);
    }

    #[test]
    fn test_plan_setter_json_error() {
        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        let setter = plan_setter(move |_: Option<DateTime<Utc>>, _: Duration, _: f64| {
            *flag.lock().unwrap() = true;
            Ok::<(), DomainError>(())
        });

        let err = setter("not json").unwrap_err();
        assert!(matches!(err, BridgeError::Json(_)));
        assert!(!*called.lock().unwrap());
    }

    #[test]
    fn test_setter_debug_shows_topic() {
        let setter = Setter::new("bufferSoc", |_: &str| Ok(()));
        assert_eq!(format!("{:?}", setter), "Setter { topic: \"bufferSoc\" }");
        assert!(setter.apply("anything").is_ok());
    }
}
