//! Row renderers: turn flat, key-encoded store rows into per-metric entries.
//!
//! All renderers share the same resolution step: split the composite result
//! key with the [`KeyCodec`], look the accessor up in the [`KeySpec`] and
//! drop the column when there is no per-metric entry for it. They differ
//! only in how the positional suffix is used:
//!
//! | Renderer          | Suffix             | Output                                |
//! |-------------------|--------------------|---------------------------------------|
//! | [`timeseries`]    | ignored            | `{labels.., series: [{timestamp, value}]}` |
//! | [`histogram`]     | bucket index       | `{labels.., series: [{timestamp, values: [..]}]}` |
//! | [`severity`]      | severity name      | `{labels.., critical: [..], major: [..]}` |
//!
//! [`top_n`] does not read rows at all; it only fixes presentation order.

pub mod histogram;
pub mod severity;
pub mod timeseries;
pub mod top_n;

use crate::key_codec::{CompositeKey, KeyCodec};
use crate::key_spec::{KeySpec, KeySpecEntry, Labels};
use crate::series::RowValue;

/// Inputs shared by the row renderers for one query result.
pub struct RenderContext<'a> {
    key_spec: &'a KeySpec,
    codec: &'a dyn KeyCodec,
    static_labels: Labels,
}

impl<'a> RenderContext<'a> {
    pub fn new(key_spec: &'a KeySpec, codec: &'a dyn KeyCodec) -> Self {
        Self {
            key_spec,
            codec,
            static_labels: Labels::new(),
        }
    }

    /// Labels stamped onto every rendered entry, overriding key spec labels
    /// of the same name (e.g. `monitoredObjectIds` for a meta-scoped query).
    pub fn with_static_labels(mut self, labels: Labels) -> Self {
        self.static_labels = labels;
        self
    }

    /// Decode a raw result key and resolve its accessor. `None` when the
    /// accessor has no per-metric key spec entry.
    pub(crate) fn resolve<'k>(&self, key: &'k str) -> Option<(CompositeKey<'k>, &'a KeySpecEntry)> {
        let composite = self.codec.decode(key);
        let entry = self.key_spec.metric_entry(composite.accessor)?;
        Some((composite, entry))
    }

    /// Output labels for an entry: key spec labels, then static labels.
    pub(crate) fn labels_for(&self, entry: &KeySpecEntry) -> Labels {
        let mut labels = entry.labels.clone();
        for (k, v) in &self.static_labels {
            labels.insert(k.clone(), v.clone());
        }
        labels
    }
}

/// Numeric value of a row cell, if it has one. Integer, single and double
/// precision values all coerce to `f64`.
pub(crate) fn numeric(value: &RowValue) -> Option<f64> {
    value.as_f64()
}
