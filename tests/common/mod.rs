// Shared test helpers: canned query registries that stand in for the OS.

use device_telemetry::source::QueryRegistry;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Registry with fixed, OS-independent query results.
pub fn canned_registry() -> QueryRegistry {
    let mut registry = QueryRegistry::new();
    registry.register("memory_info", |_args| {
        Ok(json!({
            "total": 1024u64,
            "available": 512u64,
            "percent": 50.0,
            "internal_buffer": [1, 2, 3],
        }))
    });
    registry.register("uptime", |_args| Ok(json!(3600u64)));
    registry.register("per_disk_io", |args| {
        assert!(args.kwarg_bool("perdisk", false));
        Ok(json!({"sda": {"read_bytes": 500u64}}))
    });
    registry
}

/// Register a query that counts its invocations and returns monotonically
/// increasing network-style counters (call n: bytes_sent = 100 + 50*(n-1),
/// bytes_recv = 200 + 60*(n-1)).
pub fn register_counting_net_query(registry: &mut QueryRegistry, name: &str) -> Arc<AtomicU64> {
    let calls = Arc::new(AtomicU64::new(0));
    let calls_in_query = calls.clone();
    registry.register(name, move |_args| {
        let n = calls_in_query.fetch_add(1, Ordering::SeqCst);
        Ok(json!({
            "bytes_sent": 100 + 50 * n,
            "bytes_recv": 200 + 60 * n,
        }))
    });
    calls
}
