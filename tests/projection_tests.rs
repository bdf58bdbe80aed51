//! Outbound projection tests: values to topic trees

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rs_sitebridge::{
    error::BridgeError,
    projector::{publish, CollectingPublisher, Write},
    value::{MqttMarshal, Record, Value},
    BatteryMode, ChargeMode,
};

fn writes(value: impl Into<Value>) -> Vec<Write> {
    CollectingPublisher::collect("evcc/site/x", true, &value.into())
}

fn pairs(writes: &[Write]) -> Vec<(&str, &str)> {
    writes
        .iter()
        .map(|w| (w.topic.as_str(), w.payload.as_str()))
        .collect()
}

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn scalar_publishes_single_leaf() {
    let w = writes(1500.26);
    assert_eq!(pairs(&w), vec![("evcc/site/x", "1500.3")]);
    assert!(w[0].retained);
}

#[test]
fn nil_publishes_erase() {
    assert_eq!(pairs(&writes(Value::Nil)), vec![("evcc/site/x", "")]);
}

#[test]
fn unset_time_publishes_erase_not_zero() {
    let w = writes(Value::Time(None));
    assert_eq!(pairs(&w), vec![("evcc/site/x", "")]);
}

#[test]
fn time_publishes_unix_seconds() {
    let t = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
    assert_eq!(pairs(&writes(t)), vec![("evcc/site/x", "1704103200")]);
}

#[test]
fn duration_publishes_whole_seconds() {
    let w = writes(Duration::from_millis(90_900));
    assert_eq!(pairs(&w), vec![("evcc/site/x", "90")]);
}

#[test]
fn modes_publish_their_token() {
    assert_eq!(pairs(&writes(ChargeMode::MinPv)), vec![("evcc/site/x", "minpv")]);
    assert_eq!(pairs(&writes(BatteryMode::Hold)), vec![("evcc/site/x", "hold")]);
}

#[test]
fn retained_flag_is_passed_through() {
    let w = CollectingPublisher::collect("t", false, &Value::from(vec![1, 2]));
    assert!(w.iter().all(|w| !w.retained));
}

// ============================================================================
// Sequences
// ============================================================================

#[test]
fn sequence_publishes_count_then_one_based_children() {
    let w = writes(vec![10, 20]);
    assert_eq!(
        pairs(&w),
        vec![
            ("evcc/site/x", "2"),
            ("evcc/site/x/1", "10"),
            ("evcc/site/x/2", "20"),
        ]
    );
}

#[test]
fn empty_sequence_publishes_zero_count() {
    let w = writes(Vec::<i64>::new());
    assert_eq!(pairs(&w), vec![("evcc/site/x", "0")]);
}

#[test]
fn sequence_children_match_individual_projection() {
    let items = vec![
        Value::from(Record::new().field("Power", 1500)),
        Value::from("text"),
        Value::from(vec![1.5, 2.5]),
    ];
    let w = writes(items.clone());
    assert_eq!(w[0].payload, "3");

    let mut expected = Vec::new();
    for (i, item) in items.iter().enumerate() {
        expected.extend(CollectingPublisher::collect(
            &format!("evcc/site/x/{}", i + 1),
            true,
            item,
        ));
    }
    assert_eq!(&w[1..], expected.as_slice());
}

#[test]
fn four_element_numeric_sequence_uses_generic_rule() {
    let w = writes(vec![1, 2, 3, 4]);
    assert_eq!(w.len(), 5);
    assert_eq!(w[0].payload, "4");
    assert!(w.iter().all(|w| !w.topic.contains("/l")));
}

// ============================================================================
// Phase triplets
// ============================================================================

#[test]
fn phase_triplet_publishes_legs_and_sum() {
    let w = writes([4.5, 5.0, 6.25]);
    assert_eq!(
        pairs(&w),
        vec![
            ("evcc/site/x/l1", "4.5"),
            ("evcc/site/x/l2", "5"),
            ("evcc/site/x/l3", "6.25"),
            ("evcc/site/x", "15.75"),
        ]
    );
}

#[test]
fn phase_triplet_handles_negative_values() {
    let w = writes(vec![-1.5, 2.0, -3.0]);
    assert_eq!(w.len(), 4);
    assert_eq!(w[3].payload, "-2.5");
}

#[test]
fn phase_triplet_of_integers() {
    let w = writes([10, 11, 12]);
    assert_eq!(w[3].payload, "33");
}

#[test]
fn three_element_non_numeric_sequence_uses_generic_rule() {
    let w = writes(vec!["a", "b", "c"]);
    assert_eq!(
        pairs(&w),
        vec![
            ("evcc/site/x", "3"),
            ("evcc/site/x/1", "a"),
            ("evcc/site/x/2", "b"),
            ("evcc/site/x/3", "c"),
        ]
    );
}

#[test]
fn phase_override_only_at_top_level() {
    // nested triplets are plain sequences
    let value = Record::new().field("Currents", [1.0, 2.0, 3.0]);
    let w = writes(value);
    assert_eq!(w[0].topic, "evcc/site/x/currents");
    assert_eq!(w[0].payload, "3");
    assert_eq!(w[1].topic, "evcc/site/x/currents/1");
}

// ============================================================================
// Maps and records
// ============================================================================

#[test]
fn map_publishes_every_key() {
    let mut map = HashMap::new();
    map.insert("grid".to_string(), 0.32);
    map.insert("feedin".to_string(), 0.08);
    let w = writes(map);

    let mut got = pairs(&w);
    got.sort();
    assert_eq!(
        got,
        vec![("evcc/site/x/feedin", "0.08"), ("evcc/site/x/grid", "0.32")]
    );
}

#[test]
fn map_has_no_count_leaf() {
    let mut map = BTreeMap::new();
    map.insert("a".to_string(), 1);
    let w = writes(map);
    assert_eq!(pairs(&w), vec![("evcc/site/x/a", "1")]);
}

#[test]
fn record_fields_are_lower_first() {
    let w = writes(Record::new().field("Power", 100).field("SoC", 50).field("eta", 1));
    assert_eq!(
        pairs(&w),
        vec![
            ("evcc/site/x/power", "100"),
            ("evcc/site/x/soC", "50"),
            ("evcc/site/x/eta", "1"),
        ]
    );
}

#[test]
fn omit_empty_zero_field_publishes_single_erase() {
    let nested = Record::new().field("Inner", 0);
    let w = writes(
        Record::new()
            .omit_empty("Capacity", 0.0)
            .omit_empty("Details", nested)
            .omit_empty("List", Vec::<i64>::new()),
    );
    assert_eq!(
        pairs(&w),
        vec![
            ("evcc/site/x/capacity", ""),
            ("evcc/site/x/details", ""),
            ("evcc/site/x/list", ""),
        ]
    );
}

#[test]
fn omit_empty_non_zero_field_recurses() {
    let w = writes(Record::new().omit_empty("Capacity", 10.5));
    assert_eq!(pairs(&w), vec![("evcc/site/x/capacity", "10.5")]);
}

#[test]
fn omit_empty_negative_zero_is_published() {
    let w = writes(Record::new().omit_empty("Offset", -0.0));
    assert_eq!(pairs(&w), vec![("evcc/site/x/offset", "-0")]);
}

#[test]
fn zero_field_without_omit_empty_publishes_zero() {
    let w = writes(Record::new().field("Capacity", 0.0));
    assert_eq!(pairs(&w), vec![("evcc/site/x/capacity", "0")]);
}

#[test]
fn sequence_of_records() {
    let pv = vec![
        Record::new().field("Power", 1500),
        Record::new().field("Power", 780.5),
    ];
    let w = writes(pv);
    assert_eq!(
        pairs(&w),
        vec![
            ("evcc/site/x", "2"),
            ("evcc/site/x/1/power", "1500"),
            ("evcc/site/x/2/power", "780.5"),
        ]
    );
}

// ============================================================================
// Optionals
// ============================================================================

#[test]
fn optional_present_projects_inner_at_same_topic() {
    let w = writes(Some(vec![1, 2]));
    assert_eq!(
        pairs(&w),
        vec![("evcc/site/x", "2"), ("evcc/site/x/1", "1"), ("evcc/site/x/2", "2")]
    );
}

#[test]
fn optional_absent_publishes_erase() {
    let w = writes(None::<f64>);
    assert_eq!(pairs(&w), vec![("evcc/site/x", "")]);
}

// ============================================================================
// Custom marshaling
// ============================================================================

struct Tariff;

impl MqttMarshal for Tariff {
    fn marshal_mqtt(&self) -> Result<Vec<u8>, BridgeError> {
        Ok(br#"[{"start":"10:00","price":0.3}]"#.to_vec())
    }
}

struct Unavailable;

impl MqttMarshal for Unavailable {
    fn marshal_mqtt(&self) -> Result<Vec<u8>, BridgeError> {
        Err(BridgeError::Marshal("forecast unavailable".to_string()))
    }
}

#[test]
fn custom_marshaler_publishes_one_leaf() {
    let w = writes(Value::custom(Tariff));
    assert_eq!(
        pairs(&w),
        vec![("evcc/site/x", r#"[{"start":"10:00","price":0.3}]"#)]
    );
}

#[test]
fn failing_marshaler_skips_only_its_leaf() {
    let w = writes(
        Record::new()
            .field("Before", 1)
            .field("Forecast", Value::custom(Unavailable))
            .field("After", 2),
    );
    assert_eq!(
        pairs(&w),
        vec![("evcc/site/x/before", "1"), ("evcc/site/x/after", "2")]
    );
}

// ============================================================================
// JSON values
// ============================================================================

#[test]
fn json_value_projects_structurally() {
    let json: serde_json::Value =
        serde_json::from_str(r#"{"tariff":{"grid":0.3,"zones":[1,2]},"name":null}"#).unwrap();
    let w = writes(json);
    let mut got = pairs(&w);
    got.sort();
    assert_eq!(
        got,
        vec![
            ("evcc/site/x/name", ""),
            ("evcc/site/x/tariff/grid", "0.3"),
            ("evcc/site/x/tariff/zones", "2"),
            ("evcc/site/x/tariff/zones/1", "1"),
            ("evcc/site/x/tariff/zones/2", "2"),
        ]
    );
}

// ============================================================================
// Purity
// ============================================================================

#[test]
fn projecting_twice_yields_same_writes() {
    let value = Value::from(
        Record::new()
            .field("Currents", vec![1.0, 2.0])
            .field("Mode", ChargeMode::Pv)
            .omit_empty("Title", ""),
    );

    let mut first = CollectingPublisher::new();
    let mut second = CollectingPublisher::new();
    publish(&mut first, "evcc/site/x", true, &value);
    publish(&mut second, "evcc/site/x", true, &value);

    assert_eq!(first, second);
}

#[test]
fn leaf_topics_are_unique_within_projection() {
    let value = Value::from(
        Record::new()
            .field("Pv", vec![Record::new().field("Power", 1)])
            .field("Grid", [1, 2, 3])
            .field("Meta", Some(Record::new().field("Id", "a"))),
    );
    let w = CollectingPublisher::collect("root", true, &value);
    let mut topics: Vec<_> = w.iter().map(|w| &w.topic).collect();
    let total = topics.len();
    topics.sort();
    topics.dedup();
    assert_eq!(topics.len(), total);
}
