//! Mock implementations for testing without a broker or a real site.
//!
//! | Mock | Implements | Purpose |
//! |------|------------|---------|
//! | [`MockTransport`] | [`Transport`] | Records writes, listeners and cleanups |
//! | [`MockClock`] | [`Clock`] | Shared, controllable time source |
//! | [`MockSite`] | [`SiteApi`] | Site state plus loadpoints and vehicles |
//! | [`MockLoadpoint`] | [`LoadpointApi`] | Loadpoint state |
//! | [`MockVehicle`] | [`VehicleApi`] | Vehicle state |
//! | [`MockVehicles`] | [`VehicleRegistry`] | Vehicle list |
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use rs_sitebridge::hal::{MockSite, MockTransport};
//! use rs_sitebridge::services::listen;
//! use rs_sitebridge::traits::SiteApi;
//!
//! let site = Arc::new(MockSite::with_loadpoints(1));
//! let api: Arc<dyn SiteApi> = site.clone();
//! let mut transport = MockTransport::new();
//!
//! listen(&mut transport, "evcc", &api, "-").unwrap();
//! transport.deliver("evcc/loadpoints/1/maxCurrent/set", "16").unwrap();
//!
//! assert_eq!(site.loadpoint(0).state().max_current, 16.0);
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::{BridgeError, DomainError};
use crate::modes::{BatteryMode, ChargeMode};
use crate::traits::{
    is_below, set_topic, Clock, Listener, LoadpointApi, SiteApi, Transport, VehicleApi,
    VehicleRegistry,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Clock
// ============================================================================

/// Mock clock with shared, manually advanced time.
///
/// Clones share the same time, so a test can keep a handle while the
/// bridge owns another.
///
/// # Example
///
/// ```rust
/// use rs_sitebridge::hal::MockClock;
/// use rs_sitebridge::traits::Clock;
///
/// let clock = MockClock::new();
/// let handle = clock.clone();
///
/// handle.set(1000);
/// assert_eq!(clock.now_ms(), 1000);
///
/// handle.advance(500);
/// assert_eq!(clock.now_ms(), 1500);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MockClock {
    current_ms: Arc<AtomicU64>,
}

impl MockClock {
    /// Creates a new mock clock starting at 0ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock clock at the given Unix time in milliseconds.
    pub fn at(ms: u64) -> Self {
        let clock = Self::new();
        clock.set(ms);
        clock
    }

    /// Sets the current time in milliseconds.
    pub fn set(&self, ms: u64) {
        self.current_ms.store(ms, Ordering::SeqCst);
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, ms: u64) {
        self.current_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Error injected into [`MockTransport`] operations.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("mock transport: {0}")]
pub struct MockTransportError(pub String);

/// Mock transport that records everything.
///
/// Listeners are keyed by their full `.../set` topic and can be triggered
/// with [`deliver`](Self::deliver).
#[derive(Default)]
pub struct MockTransport {
    /// Messages that have been published (topic, payload, retain).
    pub published: Vec<(String, Vec<u8>, bool)>,
    /// Installed listeners by `.../set` topic.
    pub listeners: BTreeMap<String, Listener>,
    /// Cleanup calls (root, recursive).
    pub cleanups: Vec<(String, bool)>,
    /// Fail every publish.
    pub fail_publish: bool,
    /// Fail listening once this many listeners are installed.
    pub fail_listen_after: Option<usize>,
    /// Fail every cleanup.
    pub fail_cleanup: bool,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get published messages for a topic.
    pub fn published_to(&self, topic: &str) -> Vec<&(String, Vec<u8>, bool)> {
        self.published
            .iter()
            .filter(|(t, _, _)| t == topic)
            .collect()
    }

    /// Last payload published to a topic, if valid UTF-8.
    pub fn payload_of(&self, topic: &str) -> Option<&str> {
        self.published
            .iter()
            .rev()
            .find(|(t, _, _)| t == topic)
            .and_then(|(_, payload, _)| core::str::from_utf8(payload).ok())
    }

    /// Retained state after replaying all writes and cleanups.
    ///
    /// Empty payloads erase, as on a broker.
    pub fn retained(&self) -> BTreeMap<String, String> {
        let mut state = BTreeMap::new();
        for (topic, payload, retain) in &self.published {
            if !retain {
                continue;
            }
            if payload.is_empty() {
                state.remove(topic);
            } else {
                state.insert(topic.clone(), String::from_utf8_lossy(payload).into_owned());
            }
        }
        state
    }

    /// Check if a listener is installed for a writable topic.
    pub fn is_listening(&self, topic: &str) -> bool {
        self.listeners.contains_key(&set_topic(topic))
    }

    /// Deliver an inbound write to the listener bound to `topic`.
    pub fn deliver(&self, topic: &str, payload: &str) -> Result<(), BridgeError> {
        let listener = self
            .listeners
            .get(topic)
            .ok_or_else(|| BridgeError::Lookup(format!("listener {}", topic)))?;
        listener(payload)
    }

    /// Forget recorded writes.
    pub fn clear_published(&mut self) {
        self.published.clear();
    }
}

impl Transport for MockTransport {
    type Error = MockTransportError;

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        if self.fail_publish {
            return Err(MockTransportError(format!("publish {}", topic)));
        }
        self.published
            .push((topic.to_string(), payload.to_vec(), retain));
        Ok(())
    }

    fn listen(&mut self, topic: &str, listener: Listener) -> Result<(), Self::Error> {
        if self
            .fail_listen_after
            .is_some_and(|limit| self.listeners.len() >= limit)
        {
            return Err(MockTransportError(format!("listen {}", topic)));
        }
        self.listeners.insert(set_topic(topic), listener);
        Ok(())
    }

    fn cleanup(&mut self, root: &str, recursive: bool) -> Result<(), Self::Error> {
        if self.fail_cleanup {
            return Err(MockTransportError(format!("cleanup {}", root)));
        }
        self.cleanups.push((root.to_string(), recursive));

        let stale: Vec<String> = self
            .retained()
            .into_keys()
            .filter(|t| if recursive { is_below(t, root) } else { t == root })
            .collect();
        for topic in stale {
            self.published.push((topic, Vec::new(), true));
        }
        Ok(())
    }
}

// ============================================================================
// Domain
// ============================================================================

/// Site settings recorded by [`MockSite`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SiteState {
    /// Buffer soc.
    pub buffer_soc: f64,
    /// Buffer start soc.
    pub buffer_start_soc: f64,
    /// Battery discharge control.
    pub battery_discharge_control: bool,
    /// Priority soc.
    pub priority_soc: f64,
    /// Residual power.
    pub residual_power: f64,
    /// Battery grid charge limit.
    pub battery_grid_charge_limit: Option<f64>,
    /// External battery mode.
    pub battery_mode: BatteryMode,
    /// Number of successful setter calls.
    pub calls: usize,
}

/// Mock site holding mock loadpoints and vehicles.
///
/// Soc settings outside `0..=100` are rejected with [`DomainError::OutOfRange`].
#[derive(Default)]
pub struct MockSite {
    state: Mutex<SiteState>,
    loadpoints: Mutex<Vec<Arc<MockLoadpoint>>>,
    vehicles: Arc<MockVehicles>,
}

impl MockSite {
    /// Creates a site without loadpoints or vehicles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a site with `n` loadpoints.
    pub fn with_loadpoints(n: usize) -> Self {
        let site = Self::new();
        for _ in 0..n {
            site.add_loadpoint();
        }
        site
    }

    /// Adds a loadpoint and returns it.
    pub fn add_loadpoint(&self) -> Arc<MockLoadpoint> {
        let lp = Arc::new(MockLoadpoint::new());
        lock(&self.loadpoints).push(Arc::clone(&lp));
        lp
    }

    /// Adds a vehicle and returns it.
    pub fn add_vehicle(&self, name: &str) -> Arc<MockVehicle> {
        self.vehicles.add(name)
    }

    /// Loadpoint by 0-based index.
    ///
    /// # Panics
    ///
    /// Panics if there is no such loadpoint.
    pub fn loadpoint(&self, index: usize) -> Arc<MockLoadpoint> {
        Arc::clone(&lock(&self.loadpoints)[index])
    }

    /// Snapshot of the site settings.
    pub fn state(&self) -> SiteState {
        lock(&self.state).clone()
    }

    fn soc(&self, name: &'static str, soc: f64) -> Result<(), DomainError> {
        if (0.0..=100.0).contains(&soc) {
            Ok(())
        } else {
            Err(DomainError::OutOfRange {
                name,
                value: soc.to_string(),
            })
        }
    }

    fn update(&self, f: impl FnOnce(&mut SiteState)) {
        let mut state = lock(&self.state);
        f(&mut state);
        state.calls += 1;
    }
}

impl SiteApi for MockSite {
    fn loadpoints(&self) -> Vec<Arc<dyn LoadpointApi>> {
        lock(&self.loadpoints)
            .iter()
            .map(|lp| Arc::clone(lp) as Arc<dyn LoadpointApi>)
            .collect()
    }

    fn vehicles(&self) -> Arc<dyn VehicleRegistry> {
        Arc::clone(&self.vehicles) as Arc<dyn VehicleRegistry>
    }

    fn set_buffer_soc(&self, soc: f64) -> Result<(), DomainError> {
        self.soc("bufferSoc", soc)?;
        self.update(|s| s.buffer_soc = soc);
        Ok(())
    }

    fn set_buffer_start_soc(&self, soc: f64) -> Result<(), DomainError> {
        self.soc("bufferStartSoc", soc)?;
        self.update(|s| s.buffer_start_soc = soc);
        Ok(())
    }

    fn set_battery_discharge_control(&self, enable: bool) -> Result<(), DomainError> {
        self.update(|s| s.battery_discharge_control = enable);
        Ok(())
    }

    fn set_priority_soc(&self, soc: f64) -> Result<(), DomainError> {
        self.soc("prioritySoc", soc)?;
        self.update(|s| s.priority_soc = soc);
        Ok(())
    }

    fn set_residual_power(&self, power: f64) -> Result<(), DomainError> {
        self.update(|s| s.residual_power = power);
        Ok(())
    }

    fn set_battery_grid_charge_limit(&self, limit: Option<f64>) {
        self.update(|s| s.battery_grid_charge_limit = limit);
    }

    fn set_battery_mode_external(&self, mode: BatteryMode) {
        self.update(|s| s.battery_mode = mode);
    }
}

/// Energy or soc plan recorded by the mocks.
#[derive(Clone, Debug, PartialEq)]
pub struct Plan<V> {
    /// Target time.
    pub time: Option<DateTime<Utc>>,
    /// Preconditioning.
    pub precondition: Duration,
    /// Target value.
    pub value: V,
}

/// Loadpoint settings recorded by [`MockLoadpoint`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadpointState {
    /// Charge mode.
    pub mode: ChargeMode,
    /// Configured phases.
    pub phases: i64,
    /// Soc limit.
    pub limit_soc: i64,
    /// Priority.
    pub priority: i64,
    /// Minimum current.
    pub min_current: f64,
    /// Maximum current.
    pub max_current: f64,
    /// Energy limit.
    pub limit_energy: f64,
    /// Enable threshold.
    pub enable_threshold: f64,
    /// Disable threshold.
    pub disable_threshold: f64,
    /// Enable delay.
    pub enable_delay: Duration,
    /// Disable delay.
    pub disable_delay: Duration,
    /// Smart cost limit.
    pub smart_cost_limit: Option<f64>,
    /// Smart feed-in priority limit.
    pub smart_feed_in_priority_limit: Option<f64>,
    /// Battery boost.
    pub battery_boost: bool,
    /// Energy plan.
    pub plan_energy: Option<Plan<f64>>,
    /// Name of the assigned vehicle.
    pub vehicle: Option<String>,
    /// Number of successful setter calls.
    pub calls: usize,
}

/// Mock loadpoint.
///
/// Phases other than 0, 1 or 3 and negative currents are rejected.
#[derive(Debug, Default)]
pub struct MockLoadpoint {
    state: Mutex<LoadpointState>,
}

impl MockLoadpoint {
    /// Creates a loadpoint with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the loadpoint settings.
    pub fn state(&self) -> LoadpointState {
        lock(&self.state).clone()
    }

    fn update(&self, f: impl FnOnce(&mut LoadpointState)) {
        let mut state = lock(&self.state);
        f(&mut state);
        state.calls += 1;
    }

    fn current(name: &'static str, current: f64) -> Result<(), DomainError> {
        if current < 0.0 {
            return Err(DomainError::OutOfRange {
                name,
                value: current.to_string(),
            });
        }
        Ok(())
    }
}

impl LoadpointApi for MockLoadpoint {
    fn set_mode(&self, mode: ChargeMode) {
        self.update(|s| s.mode = mode);
    }

    fn set_phases_configured(&self, phases: i64) -> Result<(), DomainError> {
        if !matches!(phases, 0 | 1 | 3) {
            return Err(DomainError::OutOfRange {
                name: "phases",
                value: phases.to_string(),
            });
        }
        self.update(|s| s.phases = phases);
        Ok(())
    }

    fn set_limit_soc(&self, soc: i64) {
        self.update(|s| s.limit_soc = soc);
    }

    fn set_priority(&self, priority: i64) {
        self.update(|s| s.priority = priority);
    }

    fn set_min_current(&self, current: f64) -> Result<(), DomainError> {
        Self::current("minCurrent", current)?;
        self.update(|s| s.min_current = current);
        Ok(())
    }

    fn set_max_current(&self, current: f64) -> Result<(), DomainError> {
        Self::current("maxCurrent", current)?;
        self.update(|s| s.max_current = current);
        Ok(())
    }

    fn set_limit_energy(&self, energy: f64) {
        self.update(|s| s.limit_energy = energy);
    }

    fn set_enable_threshold(&self, threshold: f64) {
        self.update(|s| s.enable_threshold = threshold);
    }

    fn set_disable_threshold(&self, threshold: f64) {
        self.update(|s| s.disable_threshold = threshold);
    }

    fn set_enable_delay(&self, delay: Duration) {
        self.update(|s| s.enable_delay = delay);
    }

    fn set_disable_delay(&self, delay: Duration) {
        self.update(|s| s.disable_delay = delay);
    }

    fn set_smart_cost_limit(&self, limit: Option<f64>) {
        self.update(|s| s.smart_cost_limit = limit);
    }

    fn set_smart_feed_in_priority_limit(&self, limit: Option<f64>) {
        self.update(|s| s.smart_feed_in_priority_limit = limit);
    }

    fn set_battery_boost(&self, enable: bool) -> Result<(), DomainError> {
        self.update(|s| s.battery_boost = enable);
        Ok(())
    }

    fn set_plan_energy(
        &self,
        time: Option<DateTime<Utc>>,
        precondition: Duration,
        energy: f64,
    ) -> Result<(), DomainError> {
        self.update(|s| {
            s.plan_energy = Some(Plan {
                time,
                precondition,
                value: energy,
            })
        });
        Ok(())
    }

    fn set_vehicle(&self, vehicle: Option<Arc<dyn VehicleApi>>) {
        self.update(|s| s.vehicle = vehicle.map(|v| v.name()));
    }
}

/// Vehicle settings recorded by [`MockVehicle`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VehicleState {
    /// Soc limit.
    pub limit_soc: i64,
    /// Minimum soc.
    pub min_soc: i64,
    /// Soc plan.
    pub plan_soc: Option<Plan<i64>>,
}

/// Mock vehicle.
///
/// Plans with a soc outside `0..=100` are rejected.
#[derive(Debug)]
pub struct MockVehicle {
    name: String,
    state: Mutex<VehicleState>,
}

impl MockVehicle {
    /// Creates a named vehicle.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(VehicleState::default()),
        }
    }

    /// Snapshot of the vehicle settings.
    pub fn state(&self) -> VehicleState {
        lock(&self.state).clone()
    }
}

impl VehicleApi for MockVehicle {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn set_limit_soc(&self, soc: i64) {
        lock(&self.state).limit_soc = soc;
    }

    fn set_min_soc(&self, soc: i64) {
        lock(&self.state).min_soc = soc;
    }

    fn set_plan_soc(
        &self,
        time: Option<DateTime<Utc>>,
        precondition: Duration,
        soc: i64,
    ) -> Result<(), DomainError> {
        if !(0..=100).contains(&soc) {
            return Err(DomainError::OutOfRange {
                name: "planSoc",
                value: soc.to_string(),
            });
        }
        lock(&self.state).plan_soc = Some(Plan {
            time,
            precondition,
            value: soc,
        });
        Ok(())
    }
}

/// Mock vehicle registry.
#[derive(Debug, Default)]
pub struct MockVehicles {
    vehicles: Mutex<Vec<Arc<MockVehicle>>>,
}

impl MockVehicles {
    /// Adds a vehicle and returns it.
    pub fn add(&self, name: &str) -> Arc<MockVehicle> {
        let vehicle = Arc::new(MockVehicle::new(name));
        lock(&self.vehicles).push(Arc::clone(&vehicle));
        vehicle
    }
}

impl VehicleRegistry for MockVehicles {
    fn settings(&self) -> Vec<Arc<dyn VehicleApi>> {
        lock(&self.vehicles)
            .iter()
            .map(|v| Arc::clone(v) as Arc<dyn VehicleApi>)
            .collect()
    }
}
