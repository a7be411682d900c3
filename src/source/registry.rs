// Named-query registry: string key -> bound query closure, validated
// against metric specs at catalog build so a broken spec never reaches
// the scheduler.

use crate::error::SourceQueryError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Positional and keyword arguments for one query invocation, mirroring
/// the argument surface of the underlying OS stats interface
/// (`pernic`, `perdisk`, `percpu`, `logical`, `all`, `interval`, `kind`).
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl QueryArgs {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn positional(args: Vec<Value>) -> Self {
        Self {
            args,
            kwargs: Map::new(),
        }
    }

    pub fn keyword(pairs: &[(&str, Value)]) -> Self {
        let mut kwargs = Map::new();
        for (name, value) in pairs {
            kwargs.insert((*name).to_string(), value.clone());
        }
        Self {
            args: Vec::new(),
            kwargs,
        }
    }

    pub fn kwarg_bool(&self, name: &str, default: bool) -> bool {
        self.kwargs
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    pub fn kwarg_u64(&self, name: &str, default: u64) -> u64 {
        self.kwargs
            .get(name)
            .and_then(Value::as_u64)
            .unwrap_or(default)
    }

    pub fn kwarg_str<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.kwargs
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or(default)
    }

    pub fn arg_str(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Value::as_str)
    }
}

pub type QueryFn = Arc<dyn Fn(&QueryArgs) -> Result<Value, SourceQueryError> + Send + Sync>;

/// The OS telemetry source abstraction the sampling core consumes:
/// named, invokable queries returning JSON-shaped records.
#[derive(Clone, Default)]
pub struct QueryRegistry {
    queries: HashMap<String, QueryFn>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, query: F)
    where
        F: Fn(&QueryArgs) -> Result<Value, SourceQueryError> + Send + Sync + 'static,
    {
        self.queries.insert(name.to_string(), Arc::new(query));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queries.contains_key(name)
    }

    /// Invoke a registered query. An unknown name here means validation
    /// was skipped; surfaced as a query error rather than a panic.
    pub fn invoke(&self, name: &str, args: &QueryArgs) -> Result<Value, SourceQueryError> {
        match self.queries.get(name) {
            Some(query) => query(args),
            None => Err(SourceQueryError::new(name, "query not registered")),
        }
    }
}

impl std::fmt::Debug for QueryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRegistry")
            .field("queries", &self.queries.keys().collect::<Vec<_>>())
            .finish()
    }
}
