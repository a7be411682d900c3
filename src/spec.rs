// Declarative description of one metric family: what to read from the OS
// and how to shape it. Specs are built once at startup and immutable
// thereafter.

use crate::error::ConfigurationError;
use crate::source::{QueryArgs, QueryRegistry};
use crate::store::{Snapshot, SnapshotStore};
use std::collections::HashSet;
use std::sync::Arc;

/// Model-specific derive step: a function over the bound fields that may
/// compute new ones. The store reference exists only for cross-family
/// enrichment (the defender report reads other families' latest
/// snapshots); most derives ignore it. Shared closure so catalog-time
/// parameters (cadences, windows) can be captured.
pub type DeriveFn = Arc<dyn Fn(&mut Snapshot, &SnapshotStore) + Send + Sync>;

/// A parametrized OS query binding: invoke `query` with `args`, bind the
/// result under `name`.
#[derive(Debug, Clone)]
pub struct AdvancedField {
    pub name: String,
    pub query: String,
    pub args: QueryArgs,
}

impl AdvancedField {
    pub fn new(name: &str, query: &str, args: QueryArgs) -> Self {
        Self {
            name: name.to_string(),
            query: query.to_string(),
            args,
        }
    }
}

#[derive(Clone, Default)]
pub struct MetricSpec {
    /// Unique key this family's snapshot is stored under.
    pub model_key: String,
    /// Zero-argument query whose record the `attributes` are pulled from.
    pub primary_source: Option<String>,
    pub attributes: Vec<String>,
    /// Output-field-name -> zero-argument query name, bound whole.
    pub auxiliary_fields: Vec<(String, String)>,
    pub advanced_fields: Vec<AdvancedField>,
    /// Force-added to the output after exclusion; lets derived-only fields
    /// surface.
    pub include_fields: Vec<String>,
    pub exclude_fields: Vec<String>,
    pub derive: Option<DeriveFn>,
    pub background_enabled: bool,
    pub sample_interval_secs: u64,
}

impl MetricSpec {
    /// Fail fast on references the registry cannot satisfy, so a broken
    /// spec never reaches the scheduler.
    pub fn validate(&self, registry: &QueryRegistry) -> Result<(), ConfigurationError> {
        let check = |query: &str| {
            if registry.contains(query) {
                Ok(())
            } else {
                Err(ConfigurationError::UnknownQuery {
                    model_key: self.model_key.clone(),
                    query: query.to_string(),
                })
            }
        };
        if let Some(primary) = &self.primary_source {
            check(primary)?;
        }
        for (_, query) in &self.auxiliary_fields {
            check(query)?;
        }
        for field in &self.advanced_fields {
            check(&field.query)?;
        }
        if self.background_enabled && self.sample_interval_secs == 0 {
            return Err(ConfigurationError::ZeroInterval {
                model_key: self.model_key.clone(),
            });
        }
        Ok(())
    }

    /// Output names in declaration order: attributes, auxiliary, advanced.
    pub fn declared_names(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .map(String::as_str)
            .chain(self.auxiliary_fields.iter().map(|(name, _)| name.as_str()))
            .chain(self.advanced_fields.iter().map(|f| f.name.as_str()))
            .collect()
    }
}

impl std::fmt::Debug for MetricSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricSpec")
            .field("model_key", &self.model_key)
            .field("primary_source", &self.primary_source)
            .field("attributes", &self.attributes)
            .field("auxiliary_fields", &self.auxiliary_fields)
            .field("advanced_fields", &self.advanced_fields)
            .field("include_fields", &self.include_fields)
            .field("exclude_fields", &self.exclude_fields)
            .field("derive", &self.derive.as_ref().map(|_| "<fn>"))
            .field("background_enabled", &self.background_enabled)
            .field("sample_interval_secs", &self.sample_interval_secs)
            .finish()
    }
}

/// Validate a whole catalog: per-spec checks plus model_key uniqueness.
pub fn validate_catalog(
    specs: &[MetricSpec],
    registry: &QueryRegistry,
) -> Result<(), ConfigurationError> {
    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.model_key.as_str()) {
            return Err(ConfigurationError::DuplicateModelKey {
                model_key: spec.model_key.clone(),
            });
        }
        spec.validate(registry)?;
    }
    Ok(())
}
