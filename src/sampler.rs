// Executes one metric spec's collection pipeline: bind, derive, project.

use crate::error::SourceQueryError;
use crate::source::{QueryArgs, QueryRegistry};
use crate::spec::MetricSpec;
use crate::store::{Snapshot, SnapshotStore};
use serde_json::Value;

/// Run the pipeline once, synchronously. May block briefly inside
/// interval-windowed queries; callers run this under spawn_blocking.
/// Query failures propagate - disposition is the caller's decision.
pub fn sample(
    spec: &MetricSpec,
    registry: &QueryRegistry,
    store: &SnapshotStore,
) -> Result<Snapshot, SourceQueryError> {
    let mut bound = Snapshot::new();

    if let Some(primary) = &spec.primary_source {
        let record = registry.invoke(primary, &QueryArgs::none())?;
        for attribute in &spec.attributes {
            let value = record.get(attribute).cloned().unwrap_or(Value::Null);
            bound.insert(attribute.clone(), value);
        }
    }

    for (name, query) in &spec.auxiliary_fields {
        bound.insert(name.clone(), registry.invoke(query, &QueryArgs::none())?);
    }

    for field in &spec.advanced_fields {
        bound.insert(field.name.clone(), registry.invoke(&field.query, &field.args)?);
    }

    if let Some(derive) = &spec.derive {
        derive(&mut bound, store);
    }

    Ok(project(spec, &bound))
}

/// Output projection: declared names minus `exclude_fields`, then
/// `include_fields` force-added. Names absent from the bound map are
/// skipped, so projecting an already-projected snapshot is a no-op.
pub fn project(spec: &MetricSpec, bound: &Snapshot) -> Snapshot {
    let mut out = Snapshot::new();
    for name in spec.declared_names() {
        if spec.exclude_fields.iter().any(|f| f == name) {
            continue;
        }
        if let Some(value) = bound.get(name) {
            out.insert(name.to_string(), value.clone());
        }
    }
    for name in &spec.include_fields {
        if let Some(value) = bound.get(name) {
            out.insert(name.clone(), value.clone());
        }
    }
    out
}
