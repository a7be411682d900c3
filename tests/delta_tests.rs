use device_telemetry::delta::{DeltaOutcome, DeltaTracker};
use serde_json::json;

#[test]
fn first_observation_is_baseline_only() {
    let mut tracker = DeltaTracker::new();
    assert!(matches!(
        tracker.tick(&json!({"bytes_sent": 100})),
        DeltaOutcome::Baseline
    ));
    assert!(tracker.has_baseline());
}

#[test]
fn second_observation_yields_per_field_differences() {
    let mut tracker = DeltaTracker::new();
    tracker.tick(&json!({"bytes_sent": 100, "bytes_recv": 200}));
    let outcome = tracker.tick(&json!({"bytes_sent": 150, "bytes_recv": 260}));
    match outcome {
        DeltaOutcome::Delta(delta) => {
            assert_eq!(delta, json!({"bytes_sent": 50, "bytes_recv": 60}));
        }
        other => panic!("expected Delta, got {other:?}"),
    }
}

#[test]
fn deltas_are_against_the_previous_tick_not_the_first() {
    let mut tracker = DeltaTracker::new();
    tracker.tick(&json!({"packets": 10}));
    tracker.tick(&json!({"packets": 25}));
    match tracker.tick(&json!({"packets": 31})) {
        DeltaOutcome::Delta(delta) => assert_eq!(delta, json!({"packets": 6})),
        other => panic!("expected Delta, got {other:?}"),
    }
}

#[test]
fn nested_maps_are_differenced_recursively() {
    let mut tracker = DeltaTracker::new();
    tracker.tick(&json!({"eth0": {"bytes_sent": 100}, "lo": {"bytes_sent": 10}}));
    match tracker.tick(&json!({"eth0": {"bytes_sent": 180}, "lo": {"bytes_sent": 10}})) {
        DeltaOutcome::Delta(delta) => {
            assert_eq!(delta, json!({"eth0": {"bytes_sent": 80}, "lo": {"bytes_sent": 0}}));
        }
        other => panic!("expected Delta, got {other:?}"),
    }
}

#[test]
fn non_numeric_fields_are_left_out_of_the_delta() {
    let mut tracker = DeltaTracker::new();
    tracker.tick(&json!({"bytes_sent": 100, "iface": "eth0", "isup": true, "addrs": [1, 2]}));
    match tracker.tick(&json!({"bytes_sent": 120, "iface": "eth0", "isup": true, "addrs": [1, 2]})) {
        DeltaOutcome::Delta(delta) => {
            assert_eq!(delta, json!({"bytes_sent": 20}));
        }
        other => panic!("expected Delta, got {other:?}"),
    }
}

#[test]
fn counter_going_backwards_reports_a_reset_never_a_negative() {
    let mut tracker = DeltaTracker::new();
    tracker.tick(&json!({"bytes_sent": 5000, "bytes_recv": 100}));
    match tracker.tick(&json!({"bytes_sent": 40, "bytes_recv": 120})) {
        DeltaOutcome::CounterReset { fields } => {
            assert_eq!(fields, vec!["bytes_sent"]);
        }
        other => panic!("expected CounterReset, got {other:?}"),
    }
    // After a reset the low value is the new baseline.
    match tracker.tick(&json!({"bytes_sent": 90, "bytes_recv": 150})) {
        DeltaOutcome::Delta(delta) => {
            assert_eq!(delta, json!({"bytes_sent": 50, "bytes_recv": 30}));
        }
        other => panic!("expected Delta, got {other:?}"),
    }
}
