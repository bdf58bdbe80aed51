//! Update router tests: event routing, heartbeat and lifecycle

use std::sync::Arc;

use rs_sitebridge::{
    config::BridgeConfig,
    hal::{MockClock, MockSite, MockTransport},
    services::{Param, SiteBridge},
    traits::SiteApi,
    value::Record,
    ChargeMode,
};
use tokio::sync::mpsc;

type Bridge = SiteBridge<MockTransport, MockClock>;

fn bridge_with(config: BridgeConfig, clock: &MockClock) -> (Arc<MockSite>, Bridge) {
    let site = Arc::new(MockSite::with_loadpoints(2));
    site.add_vehicle("tesla");
    site.add_vehicle("zoe");
    let api: Arc<dyn SiteApi> = site.clone();
    let bridge = SiteBridge::new(MockTransport::new(), config, clock.clone(), &api).unwrap();
    (site, bridge)
}

fn bridge(clock: &MockClock) -> (Arc<MockSite>, Bridge) {
    bridge_with(BridgeConfig::default(), clock)
}

fn heartbeats(bridge: &Bridge) -> usize {
    bridge.transport().published_to("evcc/updated").len()
}

// ============================================================================
// Routing
// ============================================================================

#[test]
fn loadpoint_events_route_one_based() {
    let clock = MockClock::new();
    let (_, mut bridge) = bridge(&clock);

    bridge.handle(&Param::loadpoint(0, "mode", ChargeMode::Now));
    bridge.handle(&Param::loadpoint(1, "chargePower", 11000.0));

    let transport = bridge.transport();
    assert_eq!(transport.payload_of("evcc/loadpoints/1/mode"), Some("now"));
    assert_eq!(transport.payload_of("evcc/loadpoints/2/chargePower"), Some("11000"));
}

#[test]
fn vehicles_key_routes_to_root() {
    let clock = MockClock::new();
    let (_, mut bridge) = bridge(&clock);

    let names = vec!["tesla", "zoe"];
    bridge.handle(&Param::site("vehicles", names));

    let transport = bridge.transport();
    assert_eq!(transport.payload_of("evcc/vehicles"), Some("2"));
    assert_eq!(transport.payload_of("evcc/vehicles/1"), Some("tesla"));
    assert!(transport.payload_of("evcc/site/vehicles").is_none());
}

#[test]
fn site_events_route_below_site() {
    let clock = MockClock::new();
    let (_, mut bridge) = bridge(&clock);

    bridge.handle(&Param::site(
        "pv",
        vec![Record::new().field("Power", 2500), Record::new().field("Power", 0)],
    ));

    let transport = bridge.transport();
    assert_eq!(transport.payload_of("evcc/site/pv"), Some("2"));
    assert_eq!(transport.payload_of("evcc/site/pv/1/power"), Some("2500"));
    assert_eq!(transport.payload_of("evcc/site/pv/2/power"), Some("0"));
}

#[test]
fn phase_currents_routed_through_override() {
    let clock = MockClock::new();
    let (_, mut bridge) = bridge(&clock);

    bridge.handle(&Param::site("gridCurrents", [1.5, 2.5, 3.0]));

    let transport = bridge.transport();
    assert_eq!(transport.payload_of("evcc/site/gridCurrents/l1"), Some("1.5"));
    assert_eq!(transport.payload_of("evcc/site/gridCurrents/l2"), Some("2.5"));
    assert_eq!(transport.payload_of("evcc/site/gridCurrents/l3"), Some("3"));
    assert_eq!(transport.payload_of("evcc/site/gridCurrents"), Some("7"));
}

#[test]
fn custom_root_topic() {
    let clock = MockClock::at(42_000);
    let config = BridgeConfig::default().with_root_topic("home/energy/");
    let (_, mut bridge) = bridge_with(config, &clock);

    bridge.handle(&Param::site("homePower", 830));

    let transport = bridge.transport();
    assert_eq!(transport.payload_of("home/energy/site/homePower"), Some("830"));
    assert_eq!(transport.payload_of("home/energy/updated"), Some("42"));
    assert!(transport.is_listening("home/energy/loadpoints/1/mode"));
}

#[test]
fn unretained_config_publishes_live_messages() {
    let clock = MockClock::new();
    let config = BridgeConfig {
        retained: false,
        ..Default::default()
    };
    let (_, mut bridge) = bridge_with(config, &clock);

    bridge.handle(&Param::site("gridPower", 1));
    assert!(bridge.transport().published.iter().all(|(_, _, retain)| !retain));
}

// ============================================================================
// Heartbeat
// ============================================================================

#[test]
fn first_event_publishes_heartbeat() {
    let clock = MockClock::at(1_700_000_000_500);
    let (_, mut bridge) = bridge(&clock);

    bridge.handle(&Param::site("gridPower", 1));

    let updated = bridge.transport().published_to("evcc/updated");
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].1, b"1700000000".to_vec());
    assert!(updated[0].2, "heartbeat is retained");
}

#[test]
fn heartbeat_precedes_event_value() {
    let clock = MockClock::at(3_000);
    let (_, mut bridge) = bridge(&clock);

    bridge.handle(&Param::site("gridPower", 1));

    let topics: Vec<_> = bridge
        .transport()
        .published
        .iter()
        .map(|(t, _, _)| t.as_str())
        .collect();
    assert_eq!(topics, vec!["evcc/updated", "evcc/site/gridPower"]);
}

#[test]
fn events_within_a_second_share_one_heartbeat() {
    let clock = MockClock::at(10_000);
    let (_, mut bridge) = bridge(&clock);

    for _ in 0..5 {
        bridge.handle(&Param::site("gridPower", 1));
        clock.advance(150);
    }
    assert_eq!(heartbeats(&bridge), 1);
}

#[test]
fn events_more_than_a_second_apart_each_publish_heartbeat() {
    let clock = MockClock::at(10_000);
    let (_, mut bridge) = bridge(&clock);

    for _ in 0..3 {
        bridge.handle(&Param::site("gridPower", 1));
        clock.advance(1_001);
    }
    assert_eq!(heartbeats(&bridge), 3);
}

#[test]
fn heartbeat_interval_is_configurable() {
    let clock = MockClock::at(10_000);
    let config = BridgeConfig::default().with_heartbeat_ms(5_000);
    let (_, mut bridge) = bridge_with(config, &clock);

    bridge.handle(&Param::site("gridPower", 1));
    clock.advance(4_000);
    bridge.handle(&Param::site("gridPower", 1));
    clock.advance(2_000);
    bridge.handle(&Param::site("gridPower", 1));

    assert_eq!(heartbeats(&bridge), 2);
}

#[test]
fn start_resets_heartbeat() {
    let clock = MockClock::at(10_000);
    let (site, mut bridge) = bridge(&clock);

    bridge.handle(&Param::site("gridPower", 1));
    bridge.start(site.as_ref());
    bridge.handle(&Param::site("gridPower", 1));

    assert_eq!(heartbeats(&bridge), 2);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn startup_erases_stale_state_before_listening() {
    let clock = MockClock::new();
    let site: Arc<dyn SiteApi> = Arc::new(MockSite::with_loadpoints(1));

    let mut transport = MockTransport::new();
    transport
        .published
        .push(("evcc/site/oldKey".to_string(), b"1".to_vec(), true));

    let bridge = SiteBridge::new(transport, BridgeConfig::default(), clock, &site).unwrap();
    assert!(bridge.transport().retained().is_empty());
    assert!(bridge.transport().is_listening("evcc/site/bufferSoc"));
}

#[test]
fn start_publishes_counts_and_reserved_slots() {
    let clock = MockClock::new();
    let config = BridgeConfig::default().with_reserved_slots(3);
    let (site, mut bridge) = bridge_with(config, &clock);

    bridge.start(site.as_ref());

    let transport = bridge.transport();
    assert_eq!(transport.payload_of("evcc/loadpoints"), Some("2"));
    assert_eq!(transport.payload_of("evcc/vehicles"), Some("2"));
    for collection in ["pv", "battery", "vehicles"] {
        for slot in 0..3 {
            let topic = format!("evcc/site/{}/{}", collection, slot);
            assert_eq!(transport.payload_of(&topic), Some(""), "{}", topic);
        }
        assert!(transport
            .payload_of(&format!("evcc/site/{}/3", collection))
            .is_none());
    }
    // counts plus three collections of placeholders
    assert_eq!(transport.published.len(), 2 + 3 * 3);
}

#[test]
fn shutdown_leaves_no_retained_state() {
    let clock = MockClock::new();
    let (site, mut bridge) = bridge(&clock);

    bridge.start(site.as_ref());
    bridge.handle(&Param::site("pvPower", 5000));
    bridge.handle(&Param::loadpoint(0, "charging", true));
    assert!(!bridge.transport().retained().is_empty());

    bridge.shutdown();
    assert!(bridge.transport().retained().is_empty());
}

#[test]
fn inbound_write_round_trip() {
    let clock = MockClock::new();
    let (site, mut bridge) = bridge(&clock);

    bridge
        .transport()
        .deliver("evcc/loadpoints/1/mode/set", "minpv")
        .unwrap();
    let mode = site.loadpoint(0).state().mode;
    bridge.handle(&Param::loadpoint(0, "mode", mode));

    assert_eq!(bridge.transport().payload_of("evcc/loadpoints/1/mode"), Some("minpv"));
}

// ============================================================================
// Run loop
// ============================================================================

#[tokio::test]
async fn run_processes_events_in_order() {
    let clock = MockClock::at(60_000);
    let (site, mut bridge) = bridge(&clock);
    let (tx, rx) = mpsc::channel(16);

    let producer = tokio::spawn(async move {
        for power in [100, 200, 300] {
            tx.send(Param::site("gridPower", power)).await.unwrap();
        }
    });

    bridge.run(site, rx).await;
    producer.await.unwrap();

    let transport = bridge.transport();
    let values: Vec<_> = transport
        .published_to("evcc/site/gridPower")
        .iter()
        .map(|(_, payload, _)| String::from_utf8(payload.clone()).unwrap())
        .collect();
    assert_eq!(values, vec!["100", "200", "300"]);
    assert_eq!(heartbeats(&bridge), 1);
}

#[tokio::test]
async fn run_returns_when_channel_closed_without_events() {
    let clock = MockClock::new();
    let (site, mut bridge) = bridge(&clock);
    let (tx, rx) = mpsc::channel::<Param>(1);
    drop(tx);

    bridge.run(site, rx).await;

    assert_eq!(bridge.transport().payload_of("evcc/loadpoints"), Some("2"));
    assert_eq!(heartbeats(&bridge), 0);
}

#[tokio::test]
async fn bridges_do_not_share_heartbeat() {
    let clock = MockClock::at(5_000);
    let (site_a, mut first) = bridge(&clock);
    let (site_b, mut second) = bridge(&clock);

    let (tx_a, rx_a) = mpsc::channel(4);
    let (tx_b, rx_b) = mpsc::channel(4);
    tx_a.send(Param::site("gridPower", 1)).await.unwrap();
    tx_b.send(Param::site("gridPower", 2)).await.unwrap();
    drop(tx_a);
    drop(tx_b);

    first.run(site_a, rx_a).await;
    second.run(site_b, rx_b).await;

    assert_eq!(heartbeats(&first), 1);
    assert_eq!(heartbeats(&second), 1);
}
