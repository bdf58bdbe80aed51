//! Desktop bridge demo with an in-memory site.
//!
//! Connects to an MQTT broker, publishes a simulated site every second and
//! applies writes sent to `.../set` topics to the mock site.
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=debug cargo run --example desktop_bridge --features mqtt
//! ```
//!
//! Then, with a broker on localhost:
//!
//! ```sh
//! mosquitto_sub -v -t 'evcc/#'
//! mosquitto_pub -t evcc/loadpoints/1/mode/set -m pv
//! mosquitto_pub -t evcc/loadpoints/1/vehicle/set -m demo
//! ```
//!
//! # Configuration
//!
//! Defaults can be overridden with `SITEBRIDGE_*` environment variables
//! (`SITEBRIDGE_BROKER_HOST`, `SITEBRIDGE_ROOT`, ...).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rs_sitebridge::hal::MockSite;
use rs_sitebridge::services::{Param, RumqttTransport, SiteBridge};
use rs_sitebridge::traits::{LoadpointApi, SiteApi, SystemClock};
use rs_sitebridge::value::Record;
use rs_sitebridge::{ChargeMode, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    info!(
        broker = %format!("{}:{}", config.mqtt.host, config.mqtt.port),
        root = %config.bridge.root_topic,
        "starting desktop bridge"
    );

    // Demo site: two loadpoints, one vehicle
    let site = Arc::new(MockSite::with_loadpoints(2));
    site.add_vehicle("demo");
    site.loadpoint(0).set_mode(ChargeMode::Pv);
    let api: Arc<dyn SiteApi> = site.clone();

    let (transport, event_loop) = RumqttTransport::new(&config.mqtt);
    tokio::spawn(event_loop.run_event_loop());

    let mut bridge = SiteBridge::new(transport, config.bridge.clone(), SystemClock, &api)
        .context("registering setters")?;

    let (tx, rx) = mpsc::channel::<Param>(64);
    let run_site = Arc::clone(&api);
    let bridge_task = tokio::spawn(async move {
        bridge.run(run_site, rx).await;
        bridge
    });

    let producer = tokio::spawn(simulate(Arc::clone(&site), tx));

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");

    // dropping the sender ends the run loop
    producer.abort();
    let mut bridge = bridge_task.await.context("bridge task")?;
    bridge.shutdown();

    // give the event loop a moment to flush the erase requests
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}

/// Emits a simulated site snapshot every second.
async fn simulate(site: Arc<MockSite>, tx: mpsc::Sender<Param>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut tick = 0u64;

    loop {
        interval.tick().await;
        tick += 1;

        let phase = (tick % 60) as f64 / 60.0 * std::f64::consts::TAU;
        let pv_power = 4000.0 + 2500.0 * phase.sin();
        let state = site.state();

        let battery = Record::new()
            .field("Power", -850.0 + 100.0 * phase.cos())
            .field("Soc", 62.5)
            .omit_empty("Capacity", 0.0);

        let mut events = vec![
            Param::site("pvPower", pv_power),
            Param::site("gridCurrents", [4.1, 3.9 + phase.sin(), 4.0]),
            Param::site("battery", vec![battery]),
            Param::site("bufferSoc", state.buffer_soc),
            Param::site("batteryMode", state.battery_mode),
        ];

        for index in 0..2 {
            let lp = site.loadpoint(index);
            let lp_state = lp.state();
            events.push(Param::loadpoint(index, "mode", lp_state.mode));
            events.push(Param::loadpoint(index, "maxCurrent", lp_state.max_current));
            events.push(Param::loadpoint(index, "smartCostLimit", lp_state.smart_cost_limit));
            events.push(Param::loadpoint(index, "vehicleName", lp_state.vehicle.clone()));
            events.push(Param::loadpoint(
                index,
                "enableDelay",
                lp_state.enable_delay,
            ));
        }

        for event in events {
            if tx.send(event).await.is_err() {
                return;
            }
        }
    }
}
