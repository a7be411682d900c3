// Shared latest-value snapshot store. Last-write-wins, no history.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

/// One flattened sampler output: field name -> scalar, nested map, or sequence.
pub type Snapshot = serde_json::Map<String, Value>;

/// Latest value for one metric key plus its wall-clock write time.
/// Consumers treat a timestamp older than several sampling intervals as
/// "metric unavailable".
#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub value: Value,
    pub written_at_ms: u64,
}

/// Concurrency-safe mapping from metric key to the most recent record.
/// The store owns its own synchronization; callers only see `read`/`write`.
/// A key may have several writers (a family's metric worker and its delta
/// workers each refresh the raw snapshot); writes replace the whole entry,
/// so readers always see one writer's complete record and the newest write
/// wins.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: RwLock<HashMap<String, StoreEntry>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full overwrite of the entry for `key`. Never partial: a concurrent
    /// reader observes either the previous or the new record.
    pub fn write(&self, key: &str, value: Value) {
        let entry = StoreEntry {
            value,
            written_at_ms: now_ms(),
        };
        match self.inner.write() {
            Ok(mut map) => {
                map.insert(key.to_string(), entry);
            }
            Err(e) => {
                tracing::error!(error = %e, key, "snapshot store lock poisoned on write");
            }
        }
    }

    pub fn read(&self, key: &str) -> Option<StoreEntry> {
        match self.inner.read() {
            Ok(map) => map.get(key).cloned(),
            Err(e) => {
                tracing::error!(error = %e, key, "snapshot store lock poisoned on read");
                None
            }
        }
    }

    /// Registered keys, for the periodic app-stats log line.
    pub fn keys(&self) -> Vec<String> {
        match self.inner.read() {
            Ok(map) => map.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sibling store key holding the latest computed delta for a delta-bearing
/// metric at one cadence.
pub fn delta_key(model_key: &str, cadence_secs: u64) -> String {
    format!("{model_key}::delta::{cadence_secs}s")
}

pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}
