//! Key Spec: the accessor → dimension label mapping built alongside a query.
//!
//! The collaborator that issues a query registers one entry per metric
//! column it asks for and names the column after the returned accessor. The
//! renderers then resolve accessors back to labels. An accessor with no
//! entry is dropped from every rendered report.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Dimension labels copied verbatim onto rendered entries
/// (`vendor`, `objectType`, `metric`, `direction`, `aggregation`, ...).
pub type Labels = serde_json::Map<String, serde_json::Value>;

/// Whether an accessor is a per-metric column or a report-wide summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeySpecKind {
    Metric,
    Summary,
}

/// Labels registered for one accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySpecEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: KeySpecKind,
    pub labels: Labels,
}

impl KeySpecEntry {
    pub fn metric(name: impl Into<String>, labels: Labels) -> Self {
        Self {
            name: name.into(),
            kind: KeySpecKind::Metric,
            labels,
        }
    }

    pub fn summary(name: impl Into<String>, labels: Labels) -> Self {
        Self {
            name: name.into(),
            kind: KeySpecKind::Summary,
            labels,
        }
    }
}

/// Resolver from accessor to [`KeySpecEntry`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeySpec {
    entries: HashMap<String, KeySpecEntry>,
}

impl KeySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry under a content-derived accessor and return it.
    ///
    /// The accessor is the SHA-256 hex digest of the entry's canonical JSON.
    /// String arrays are sorted first so `["b", "a"]` and `["a", "b"]`
    /// produce the same accessor.
    pub fn add_entry(&mut self, mut entry: KeySpecEntry) -> String {
        canonicalize(&mut entry.labels);
        let accessor = accessor_for(&entry);
        self.entries.insert(accessor.clone(), entry);
        accessor
    }

    /// Register an entry under an accessor chosen by the caller.
    pub fn insert(&mut self, accessor: impl Into<String>, entry: KeySpecEntry) {
        self.entries.insert(accessor.into(), entry);
    }

    pub fn get(&self, accessor: &str) -> Option<&KeySpecEntry> {
        self.entries.get(accessor)
    }

    /// Resolve only per-metric entries. Summary accessors resolve to `None`,
    /// which keeps them out of per-metric series.
    pub fn metric_entry(&self, accessor: &str) -> Option<&KeySpecEntry> {
        self.get(accessor)
            .filter(|entry| entry.kind == KeySpecKind::Metric)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sort every array made only of strings, recursively.
fn canonicalize(labels: &mut Labels) {
    for value in labels.values_mut() {
        canonicalize_value(value);
    }
}

fn canonicalize_value(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Array(items) => {
            if items.iter().all(|v| v.is_string()) {
                items.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
            } else {
                items.iter_mut().for_each(canonicalize_value);
            }
        }
        serde_json::Value::Object(map) => canonicalize(map),
        _ => {}
    }
}

fn accessor_for(entry: &KeySpecEntry) -> String {
    // serde_json::Map is ordered by key, so this serialization is canonical.
    let bytes = serde_json::to_vec(entry).unwrap_or_default();
    let hash = Sha256::digest(&bytes);
    format!("{hash:x}")
}
