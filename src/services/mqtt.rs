//! MQTT broker transport built on `rumqttc`.
//!
//! [`RumqttTransport`] is the synchronous [`Transport`] half handed to the
//! bridge. [`MqttEventLoop`] is the async half that must be polled on the
//! runtime:
//!
//! - Incoming publishes on `.../set` topics are dispatched to listeners
//! - Listener errors are logged as `set <topic>: <err>`
//! - Stale retained messages below a cleanup root are erased while the
//!   root is being swept
//! - Subscriptions are restored after every reconnect
//!
//! Requests that do not fit in the client queue wait in an ordered backlog
//! that the event loop drains as the queue empties. Nothing is dropped.
//!
//! # Example
//!
//! ```ignore
//! let (transport, event_loop) = RumqttTransport::new(&config.mqtt);
//! tokio::spawn(event_loop.run_event_loop());
//!
//! let mut bridge = SiteBridge::new(transport, config.bridge, SystemClock, &site)?;
//! bridge.run(site, rx).await;
//! bridge.shutdown();
//! ```

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use tracing::{debug, error, warn};

use crate::config::MqttConfig;
use crate::error::BridgeError;
use crate::traits::{is_below, set_topic, Listener, Transport};

/// Capacity of the client request queue.
///
/// Requests beyond it wait in the transport backlog.
pub const REQUEST_CAPACITY: usize = 1024;

const QOS: QoS = QoS::AtLeastOnce;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Build client options from the broker configuration.
pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive());
    if config.has_auth() {
        options.set_credentials(&config.username, &config.password);
    }
    options
}

fn wildcard(root: &str) -> String {
    format!("{}/#", root)
}

// ============================================================================
// Outgoing requests
// ============================================================================

/// Request waiting for room in the client queue.
#[derive(Clone, Debug, PartialEq)]
enum Outgoing {
    Publish {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    Subscribe(String),
    Unsubscribe(String),
}

impl Outgoing {
    fn publish(topic: &str, payload: &[u8], retain: bool) -> Self {
        Self::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain,
        }
    }

    fn send(&self, client: &AsyncClient) -> Result<(), ClientError> {
        match self {
            Self::Publish {
                topic,
                payload,
                retain,
            } => client.try_publish(topic.as_str(), QOS, *retain, payload.clone()),
            Self::Subscribe(topic) => client.try_subscribe(topic.as_str(), QOS),
            Self::Unsubscribe(topic) => client.try_unsubscribe(topic.as_str()),
        }
    }
}

// ============================================================================
// Shared state
// ============================================================================

/// Stale retained sweep below a cleanup root.
///
/// The deadline is set once the connection is up; until then the sweep
/// stays open.
#[derive(Clone, Debug)]
struct Sweep {
    root: String,
    deadline: Option<Instant>,
}

/// State shared between the transport and its event loop.
#[derive(Clone, Default)]
struct Shared {
    /// Listeners by `.../set` topic.
    listeners: Arc<Mutex<HashMap<String, Listener>>>,
    /// Roots currently swept for stale retained messages.
    sweeps: Arc<Mutex<Vec<Sweep>>>,
    /// Topics holding retained state published by this session.
    retained: Arc<Mutex<BTreeSet<String>>>,
    /// Requests that did not fit in the client queue, oldest first.
    backlog: Arc<Mutex<VecDeque<Outgoing>>>,
}

impl Shared {
    fn listener(&self, topic: &str) -> Option<Listener> {
        lock(&self.listeners).get(topic).cloned()
    }

    fn track(&self, topic: &str, payload: &[u8], retain: bool) {
        if !retain {
            return;
        }
        let mut retained = lock(&self.retained);
        if payload.is_empty() {
            retained.remove(topic);
        } else {
            retained.insert(topic.to_string());
        }
    }

    /// Hand a request to the client, or queue it behind earlier overflow.
    fn enqueue(&self, client: &AsyncClient, request: Outgoing) {
        let mut backlog = lock(&self.backlog);
        if backlog.is_empty() && request.send(client).is_ok() {
            return;
        }
        backlog.push_back(request);
    }

    /// Move backlogged requests into the client queue while it has room.
    fn flush(&self, client: &AsyncClient) {
        let mut backlog = lock(&self.backlog);
        while let Some(request) = backlog.front() {
            if request.send(client).is_err() {
                break;
            }
            backlog.pop_front();
        }
    }

    /// Open a sweep below `root`. Returns false if one is already open.
    fn start_sweep(&self, root: &str) -> bool {
        let mut sweeps = lock(&self.sweeps);
        if sweeps.iter().any(|s| s.root == root) {
            return false;
        }
        sweeps.push(Sweep {
            root: root.to_string(),
            deadline: None,
        });
        true
    }

    /// Start the clock on sweeps opened before `now`.
    fn arm_sweeps(&self, now: Instant, window: Duration) {
        for sweep in lock(&self.sweeps).iter_mut() {
            if sweep.deadline.is_none() {
                sweep.deadline = Some(now + window);
            }
        }
    }

    /// Close sweeps whose window has passed and return their roots.
    fn finish_sweeps(&self, now: Instant) -> Vec<String> {
        let mut sweeps = lock(&self.sweeps);
        let (done, open): (Vec<Sweep>, Vec<Sweep>) = sweeps
            .drain(..)
            .partition(|s| s.deadline.map_or(false, |d| now >= d));
        *sweeps = open;
        done.into_iter().map(|s| s.root).collect()
    }

    /// Retained message left over from an earlier session.
    fn is_stale(&self, topic: &str, retain: bool, payload: &[u8]) -> bool {
        retain
            && !payload.is_empty()
            && !lock(&self.retained).contains(topic)
            && lock(&self.sweeps).iter().any(|s| is_below(topic, &s.root))
    }

    fn subscriptions(&self) -> Vec<String> {
        let mut topics: Vec<String> = lock(&self.listeners).keys().cloned().collect();
        topics.extend(lock(&self.sweeps).iter().map(|s| wildcard(&s.root)));
        topics
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Broker-backed transport.
///
/// Operations never wait for the broker and never fail: requests that do
/// not fit in the client queue are kept in order until the event loop has
/// room for them.
#[derive(Clone)]
pub struct RumqttTransport {
    client: AsyncClient,
    shared: Shared,
}

impl RumqttTransport {
    /// Create the transport and the event loop that drives it.
    pub fn new(config: &MqttConfig) -> (Self, MqttEventLoop) {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CAPACITY);
        let shared = Shared::default();

        let transport = Self {
            client: client.clone(),
            shared: shared.clone(),
        };
        let event_loop = MqttEventLoop {
            client,
            eventloop,
            shared,
            reconnect_delay: config.reconnect_delay(),
            sweep_window: config.sweep_window(),
        };
        (transport, event_loop)
    }

    /// Topics currently holding retained state from this session.
    pub fn retained_topics(&self) -> Vec<String> {
        lock(&self.shared.retained).iter().cloned().collect()
    }

    /// Number of requests waiting for room in the client queue.
    pub fn backlog_len(&self) -> usize {
        lock(&self.shared.backlog).len()
    }
}

impl Transport for RumqttTransport {
    type Error = ClientError;

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), Self::Error> {
        self.shared
            .enqueue(&self.client, Outgoing::publish(topic, payload, retain));
        self.shared.track(topic, payload, retain);
        Ok(())
    }

    fn listen(&mut self, topic: &str, listener: Listener) -> Result<(), Self::Error> {
        let topic = set_topic(topic);
        self.shared
            .enqueue(&self.client, Outgoing::Subscribe(topic.clone()));
        lock(&self.shared.listeners).insert(topic, listener);
        Ok(())
    }

    fn cleanup(&mut self, root: &str, recursive: bool) -> Result<(), Self::Error> {
        let own: Vec<String> = lock(&self.shared.retained)
            .iter()
            .filter(|t| if recursive { is_below(t, root) } else { *t == root })
            .cloned()
            .collect();

        for topic in &own {
            self.publish(topic, &[], true)?;
        }

        if recursive {
            if self.shared.start_sweep(root) {
                self.shared
                    .enqueue(&self.client, Outgoing::Subscribe(wildcard(root)));
            }
        } else if own.is_empty() {
            self.publish(root, &[], true)?;
        }

        debug!(root, recursive, erased = own.len(), "cleanup");
        Ok(())
    }
}

// ============================================================================
// Event loop
// ============================================================================

/// Async half of [`RumqttTransport`].
pub struct MqttEventLoop {
    client: AsyncClient,
    eventloop: EventLoop,
    shared: Shared,
    reconnect_delay: Duration,
    sweep_window: Duration,
}

impl MqttEventLoop {
    /// Poll the connection forever.
    ///
    /// Connection errors are logged and retried after the reconnect delay.
    pub async fn run_event_loop(mut self) {
        let mut sessions = 0u32;
        let mut connected = false;
        loop {
            match self.eventloop.poll().await {
                Ok(event) => {
                    match event {
                        Event::Incoming(Packet::ConnAck(_)) => {
                            sessions += 1;
                            connected = true;
                            debug!(sessions, "mqtt connected");
                            // requests queued before the first connect are still pending
                            if sessions > 1 {
                                self.resubscribe();
                            }
                        }
                        Event::Incoming(Packet::Publish(publish)) => self.dispatch(&publish),
                        _ => {}
                    }
                    if connected {
                        self.expire_sweeps(Instant::now());
                    }
                    self.shared.flush(&self.client);
                }
                Err(err) => {
                    connected = false;
                    warn!("mqtt: {}", err);
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    fn resubscribe(&self) {
        for topic in self.shared.subscriptions() {
            self.shared.enqueue(&self.client, Outgoing::Subscribe(topic));
        }
    }

    fn expire_sweeps(&self, now: Instant) {
        self.shared.arm_sweeps(now, self.sweep_window);
        for root in self.shared.finish_sweeps(now) {
            debug!(root = root.as_str(), "stale retained sweep done");
            self.shared
                .enqueue(&self.client, Outgoing::Unsubscribe(wildcard(&root)));
        }
    }

    fn dispatch(&self, publish: &Publish) {
        let topic = publish.topic.as_str();

        // retained writes to a set topic are stale commands, never applied
        if !publish.retain {
            if let Some(listener) = self.shared.listener(topic) {
                let result = match core::str::from_utf8(&publish.payload) {
                    Ok(payload) => listener(payload),
                    Err(err) => Err(BridgeError::parse("utf-8", &err.to_string())),
                };
                if let Err(err) = result {
                    error!("set {}: {}", topic, err);
                }
                return;
            }
        }

        if self.shared.is_stale(topic, publish.retain, &publish.payload) {
            debug!(topic, "erasing stale retained message");
            self.shared
                .enqueue(&self.client, Outgoing::publish(topic, &[], true));
        }
    }
}
