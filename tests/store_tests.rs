use device_telemetry::store::{SnapshotStore, delta_key};
use serde_json::json;
use std::sync::Arc;

#[test]
fn read_returns_the_last_written_value() {
    let store = SnapshotStore::new();
    store.write("memory", json!({"total": 1024}));
    store.write("memory", json!({"total": 2048}));
    let entry = store.read("memory").unwrap();
    assert_eq!(entry.value, json!({"total": 2048}));
    assert!(entry.written_at_ms > 0);
}

#[test]
fn read_of_unknown_key_is_none() {
    let store = SnapshotStore::new();
    assert!(store.read("never_written").is_none());
    assert!(store.is_empty());
}

#[test]
fn writes_record_a_fresh_timestamp() {
    let store = SnapshotStore::new();
    store.write("cpu", json!(1));
    let first = store.read("cpu").unwrap().written_at_ms;
    std::thread::sleep(std::time::Duration::from_millis(5));
    store.write("cpu", json!(2));
    let second = store.read("cpu").unwrap().written_at_ms;
    assert!(second >= first);
}

#[test]
fn concurrent_writers_on_distinct_keys_all_land() {
    let store = Arc::new(SnapshotStore::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            std::thread::spawn(move || {
                for round in 0..100 {
                    store.write(&format!("metric_{i}"), json!({"round": round}));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.len(), 8);
    for i in 0..8 {
        let entry = store.read(&format!("metric_{i}")).unwrap();
        assert_eq!(entry.value, json!({"round": 99}));
    }
}

#[test]
fn keys_lists_every_written_metric() {
    let store = SnapshotStore::new();
    store.write("a", json!(1));
    store.write("b", json!(2));
    let mut keys = store.keys();
    keys.sort();
    assert_eq!(keys, vec!["a", "b"]);
}

#[test]
fn delta_key_encodes_model_and_cadence() {
    assert_eq!(
        delta_key("network_general_stats", 1),
        "network_general_stats::delta::1s"
    );
    assert_eq!(
        delta_key("device_defender_data", 60),
        "device_defender_data::delta::60s"
    );
}
