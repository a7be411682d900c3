// Interval differencing of monotonically increasing OS counters.

use serde_json::{Map, Value};

/// Result of one delta tick.
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaOutcome {
    /// First tick for a fresh series: the raw sample became the baseline,
    /// no difference exists yet. Consumers see a null delta.
    Baseline,
    /// Field-wise `current - previous` over every scalar numeric leaf.
    /// Sequence-valued fields are excluded; string/bool leaves are skipped.
    Delta(Value),
    /// At least one counter decreased (process restart, counter wrap).
    /// Reported distinctly instead of a negative rate; the baseline is
    /// replaced so the next tick diffs against post-reset values.
    CounterReset { fields: Vec<String> },
}

/// Per-series differencing state. One instance per (metric, tracked field,
/// cadence) - e.g. "network/per-second" and "network/per-minute" are
/// distinct series over the same underlying counters.
#[derive(Debug, Default)]
pub struct DeltaTracker {
    previous: Option<Value>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `current` against the stored baseline, then replace the
    /// baseline with `current` (on every tick, including resets).
    pub fn tick(&mut self, current: &Value) -> DeltaOutcome {
        let outcome = match &self.previous {
            None => DeltaOutcome::Baseline,
            Some(prev) => {
                let mut resets = Vec::new();
                let delta = diff_value(current, prev, "", &mut resets);
                if resets.is_empty() {
                    DeltaOutcome::Delta(delta)
                } else {
                    DeltaOutcome::CounterReset { fields: resets }
                }
            }
        };
        self.previous = Some(current.clone());
        outcome
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }
}

/// Recursive structural diff over the {scalar, record, sequence} union.
/// Keys absent from the previous sample (new interface, new disk) are
/// skipped for this tick; they enter the baseline for the next one.
fn diff_value(current: &Value, previous: &Value, path: &str, resets: &mut Vec<String>) -> Value {
    match (current, previous) {
        (Value::Object(cur), Value::Object(prev)) => {
            let mut out = Map::new();
            for (key, cur_val) in cur {
                if cur_val.is_array() {
                    continue;
                }
                let Some(prev_val) = prev.get(key) else {
                    continue;
                };
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                match (cur_val, prev_val) {
                    (Value::Object(_), Value::Object(_)) => {
                        out.insert(
                            key.clone(),
                            diff_value(cur_val, prev_val, &child_path, resets),
                        );
                    }
                    (Value::Number(c), Value::Number(p)) => {
                        out.insert(key.clone(), diff_number(c, p, &child_path, resets));
                    }
                    // Strings, bools, nulls, type changes: not counters.
                    _ => {}
                }
            }
            Value::Object(out)
        }
        _ => Value::Null,
    }
}

fn diff_number(
    current: &serde_json::Number,
    previous: &serde_json::Number,
    path: &str,
    resets: &mut Vec<String>,
) -> Value {
    if let (Some(c), Some(p)) = (current.as_u64(), previous.as_u64()) {
        return match c.checked_sub(p) {
            Some(d) => Value::from(d),
            None => {
                resets.push(path.to_string());
                Value::from(0u64)
            }
        };
    }
    match (current.as_f64(), previous.as_f64()) {
        (Some(c), Some(p)) => {
            let d = c - p;
            if d < 0.0 {
                resets.push(path.to_string());
                Value::from(0.0)
            } else {
                Value::from(d)
            }
        }
        _ => Value::Null,
    }
}
