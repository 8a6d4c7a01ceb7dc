// StatsProcessor tests: merge, rejection, flush cadence, persistence lifecycle

mod common;

use common::{FlakyStore, counters_report, wifi_report};
use fleetgw::error::StatsError;
use fleetgw::models::{Associations, ConnectionContext};
use fleetgw::stats::StatsProcessor;
use fleetgw::store::{MemoryStatsStore, StatsStore};
use serde_json::json;
use std::sync::Arc;

async fn initialized(store: Arc<MemoryStatsStore>, serial: &str) -> StatsProcessor {
    let mut processor = StatsProcessor::new(store);
    assert!(!processor.initialize(serial).await);
    processor
}

#[tokio::test]
async fn add_accumulates_counter_values() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store, "SN1").await;

    processor
        .add(&counters_report("eth0", "rx_bytes", 100))
        .await
        .unwrap();
    processor
        .add(&counters_report("eth0", "rx_bytes", 50))
        .await
        .unwrap();

    assert_eq!(processor.counters().get("eth0", "rx_bytes"), Some(150));
}

#[tokio::test]
async fn add_merges_deltas_like_counters() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store, "SN1").await;

    processor
        .add(&json!({ "interfaces": [ { "name": "eth0", "deltas": { "rx_bytes": 7 } } ] }))
        .await
        .unwrap();
    processor
        .add(&counters_report("eth0", "rx_bytes", 3))
        .await
        .unwrap();

    assert_eq!(processor.counters().get("eth0", "rx_bytes"), Some(10));
}

#[tokio::test]
async fn counters_take_precedence_over_deltas_in_one_entry() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store, "SN1").await;

    processor
        .add(&json!({
            "interfaces": [
                { "name": "eth0", "counters": { "rx_bytes": 5 }, "deltas": { "rx_bytes": 1000 } }
            ]
        }))
        .await
        .unwrap();

    assert_eq!(processor.counters().get("eth0", "rx_bytes"), Some(5));
}

#[tokio::test]
async fn serialization_keeps_first_seen_order() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store, "SN1").await;

    processor
        .add(&json!({
            "interfaces": [
                { "name": "wan", "counters": { "tx_bytes": 2, "rx_bytes": 1 } },
                { "name": "lan", "counters": { "rx_packets": 4 } }
            ]
        }))
        .await
        .unwrap();
    processor
        .add(&json!({
            "interfaces": [
                { "name": "lan", "counters": { "collisions": 1, "rx_packets": 1 } },
                { "name": "wan", "counters": { "rx_bytes": 1 } }
            ]
        }))
        .await
        .unwrap();

    assert_eq!(
        processor.to_json_string(),
        r#"{"interfaces":[{"name":"wan","counters":{"tx_bytes":2,"rx_bytes":2}},{"name":"lan","counters":{"rx_packets":5,"collisions":1}}]}"#
    );
    let value = processor.to_json();
    assert_eq!(value["interfaces"][1]["name"], "lan");
    assert_eq!(value["interfaces"][1]["counters"]["rx_packets"], 5);
}

#[tokio::test]
async fn add_without_interfaces_is_rejected_without_side_effects() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store.clone(), "SN1").await;
    processor
        .add(&counters_report("eth0", "rx_bytes", 100))
        .await
        .unwrap();
    let before = processor.counters().clone();

    let err = processor.add(&json!({})).await.unwrap_err();
    assert!(matches!(err, StatsError::MissingInterfaces));

    let err = processor
        .add(&json!({ "interfaces": { "name": "eth0" } }))
        .await
        .unwrap_err();
    assert!(matches!(err, StatsError::MissingInterfaces));

    assert_eq!(processor.counters(), &before);
    assert_eq!(processor.dirty_count(), 3);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn invalid_entry_keeps_earlier_entries_merged() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store, "SN1").await;

    let err = processor
        .add(&json!({
            "interfaces": [
                { "name": "eth0", "counters": { "rx_bytes": 100 } },
                { "name": "eth1" },
                { "name": "eth2", "counters": { "rx_bytes": 1 } }
            ]
        }))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        StatsError::InvalidInterface { index: 1, .. }
    ));
    assert_eq!(processor.counters().get("eth0", "rx_bytes"), Some(100));
    assert!(processor.counters().interface("eth1").is_none());
    assert!(processor.counters().interface("eth2").is_none());
}

#[tokio::test]
async fn entry_without_name_is_rejected() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store, "SN1").await;

    let err = processor
        .add(&json!({ "interfaces": [ { "counters": { "rx_bytes": 1 } } ] }))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StatsError::InvalidInterface { index: 0, reason: "missing name" }
    ));
    assert!(processor.counters().is_empty());
}

#[tokio::test]
async fn non_object_counters_are_rejected() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store, "SN1").await;

    let err = processor
        .add(&json!({ "interfaces": [ { "name": "eth0", "counters": [1, 2] } ] }))
        .await
        .unwrap_err();
    assert!(matches!(err, StatsError::InvalidInterface { index: 0, .. }));
}

#[tokio::test]
async fn non_numeric_counter_is_rejected() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store, "SN1").await;

    let err = processor
        .add(&json!({
            "interfaces": [ { "name": "eth0", "counters": { "rx_bytes": 5, "state": "up" } } ]
        }))
        .await
        .unwrap_err();

    match err {
        StatsError::InvalidCounter { interface, counter } => {
            assert_eq!(interface, "eth0");
            assert_eq!(counter, "state");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(processor.counters().get("eth0", "rx_bytes"), Some(5));
}

#[tokio::test]
async fn counters_saturate_instead_of_wrapping() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store, "SN1").await;

    processor
        .add(&counters_report("eth0", "rx_bytes", u64::MAX - 1))
        .await
        .unwrap();
    processor
        .add(&counters_report("eth0", "rx_bytes", 10))
        .await
        .unwrap();

    assert_eq!(processor.counters().get("eth0", "rx_bytes"), Some(u64::MAX));
}

#[tokio::test]
async fn add_str_rejects_invalid_json_without_touching_state() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store, "SN1").await;

    let err = processor.add_str("{\"interfaces\": [").await.unwrap_err();
    assert!(matches!(err, StatsError::Parse(_)));
    assert_eq!(processor.dirty_count(), 0);

    processor
        .add_str(r#"{"interfaces":[{"name":"eth0","counters":{"rx_bytes":9}}]}"#)
        .await
        .unwrap();
    assert_eq!(processor.counters().get("eth0", "rx_bytes"), Some(9));
    assert_eq!(processor.dirty_count(), 1);
}

#[tokio::test]
async fn eleventh_update_flushes_to_store() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store.clone(), "SN1").await;

    for _ in 0..10 {
        processor
            .add(&counters_report("eth0", "rx_bytes", 1))
            .await
            .unwrap();
    }
    assert_eq!(processor.dirty_count(), 10);
    assert_eq!(store.writes(), 0);

    processor
        .add(&counters_report("eth0", "rx_bytes", 1))
        .await
        .unwrap();
    assert_eq!(processor.dirty_count(), 0);
    assert_eq!(store.writes(), 1);

    let blob = store.get("SN1").await.unwrap().unwrap();
    assert_eq!(
        blob,
        r#"{"interfaces":[{"name":"eth0","counters":{"rx_bytes":11}}]}"#
    );
}

#[tokio::test]
async fn flush_threshold_is_configurable() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = StatsProcessor::new(store.clone()).with_flush_threshold(2);
    processor.initialize("SN1").await;

    for _ in 0..2 {
        processor
            .add(&counters_report("eth0", "rx_bytes", 1))
            .await
            .unwrap();
    }
    assert_eq!(store.writes(), 0);
    processor
        .add(&counters_report("eth0", "rx_bytes", 1))
        .await
        .unwrap();
    assert_eq!(store.writes(), 1);
    assert_eq!(processor.dirty_count(), 0);
}

#[tokio::test]
async fn save_then_initialize_restores_counters() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut first = initialized(store.clone(), "SN1").await;
    first
        .add(&json!({
            "interfaces": [
                { "name": "eth0", "counters": { "rx_bytes": 100, "tx_bytes": 20 } },
                { "name": "wlan0", "deltas": { "rx_packets": 3 } }
            ]
        }))
        .await
        .unwrap();
    first
        .add(&counters_report("eth0", "rx_bytes", 50))
        .await
        .unwrap();
    first.save().await.unwrap();
    assert_eq!(first.dirty_count(), 0);

    let mut second = StatsProcessor::new(store.clone());
    assert!(second.initialize("SN1").await);
    assert_eq!(second.serial_number(), "SN1");
    assert_eq!(second.counters(), first.counters());
    assert_eq!(second.to_json_string(), first.to_json_string());
    // The replayed blob counts as one update.
    assert_eq!(second.dirty_count(), 1);
}

#[tokio::test]
async fn initialize_clears_previous_device_state() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store.clone(), "SN1").await;
    processor
        .add(&counters_report("eth0", "rx_bytes", 100))
        .await
        .unwrap();

    assert!(!processor.initialize("SN2").await);
    assert_eq!(processor.serial_number(), "SN2");
    assert!(processor.counters().is_empty());
    assert_eq!(processor.dirty_count(), 0);
}

#[tokio::test]
async fn initialize_treats_read_failure_as_no_prior_state() {
    let store = Arc::new(FlakyStore::default());
    store.inner.set("SN1", &counters_report("eth0", "rx_bytes", 1).to_string()).await.unwrap();
    store.set_fail_reads(true);

    let mut processor = StatsProcessor::new(store.clone());
    assert!(!processor.initialize("SN1").await);
    assert!(processor.counters().is_empty());
}

#[tokio::test]
async fn initialize_with_corrupt_blob_returns_false() {
    let store = Arc::new(MemoryStatsStore::new());
    store.set("SN1", "not json").await.unwrap();

    let mut processor = StatsProcessor::new(store);
    assert!(!processor.initialize("SN1").await);
    assert!(processor.counters().is_empty());
}

#[tokio::test]
async fn failed_save_keeps_counters_for_retry() {
    let store = Arc::new(FlakyStore::default());
    let mut processor = StatsProcessor::new(store.clone());
    processor.initialize("SN1").await;
    processor
        .add(&counters_report("eth0", "rx_bytes", 100))
        .await
        .unwrap();

    store.set_fail_writes(true);
    let err = processor.save().await.unwrap_err();
    assert!(matches!(err, StatsError::Store(_)));
    assert_eq!(processor.dirty_count(), 0);
    assert_eq!(processor.counters().get("eth0", "rx_bytes"), Some(100));

    store.set_fail_writes(false);
    processor.save().await.unwrap();
    assert_eq!(
        store.inner.get("SN1").await.unwrap().as_deref(),
        Some(r#"{"interfaces":[{"name":"eth0","counters":{"rx_bytes":100}}]}"#)
    );
}

#[tokio::test]
async fn failed_auto_save_does_not_fail_the_update() {
    let store = Arc::new(FlakyStore::default());
    let mut processor = StatsProcessor::new(store.clone());
    processor.initialize("SN1").await;
    store.set_fail_writes(true);

    for _ in 0..11 {
        processor
            .add(&counters_report("eth0", "rx_bytes", 1))
            .await
            .unwrap();
    }
    assert_eq!(store.failed_writes.load(std::sync::atomic::Ordering::Relaxed), 1);
    assert_eq!(processor.dirty_count(), 0);
    assert_eq!(processor.counters().get("eth0", "rx_bytes"), Some(11));
}

#[tokio::test]
async fn save_before_initialize_is_an_error() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = StatsProcessor::new(store.clone());
    let err = processor.save().await.unwrap_err();
    assert!(matches!(err, StatsError::NotInitialized));
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn connection_receives_latest_associations() {
    let store = Arc::new(MemoryStatsStore::new());
    let connection = Arc::new(ConnectionContext::new("SN1"));
    let mut processor = StatsProcessor::new(store).with_connection(connection.clone());
    processor.initialize("SN1").await;

    processor
        .add(&wifi_report("phy0", json!([6]), 3))
        .await
        .unwrap();
    assert_eq!(
        connection.associations(),
        Associations {
            band_2g: 3,
            band_5g: 0
        }
    );

    processor
        .add(&wifi_report("phy1", json!(36), 2))
        .await
        .unwrap();
    assert_eq!(
        connection.associations(),
        Associations {
            band_2g: 0,
            band_5g: 2
        }
    );

    // No radios: counts reset rather than keeping the previous report's values.
    processor
        .add(&counters_report("eth0", "rx_bytes", 1))
        .await
        .unwrap();
    assert_eq!(connection.associations(), Associations::default());
}

#[tokio::test]
async fn rejected_report_leaves_associations_untouched() {
    let store = Arc::new(MemoryStatsStore::new());
    let connection = Arc::new(ConnectionContext::new("SN1"));
    let mut processor = StatsProcessor::new(store).with_connection(connection.clone());
    processor.initialize("SN1").await;

    processor
        .add(&wifi_report("phy0", json!([1]), 4))
        .await
        .unwrap();
    let mut bad = wifi_report("phy0", json!([1]), 1);
    bad["interfaces"][0]
        .as_object_mut()
        .unwrap()
        .remove("counters");
    assert!(processor.add(&bad).await.is_err());

    assert_eq!(connection.associations().band_2g, 4);
}

#[tokio::test]
async fn display_dumps_each_interface() {
    let store = Arc::new(MemoryStatsStore::new());
    let mut processor = initialized(store, "SN1").await;
    processor
        .add(&json!({
            "interfaces": [ { "name": "eth0", "counters": { "rx_bytes": 1, "tx_bytes": 2 } } ]
        }))
        .await
        .unwrap();

    assert_eq!(
        processor.to_string(),
        "Interface: eth0\n     rx_bytes: 1\n     tx_bytes: 2\n"
    );
}
