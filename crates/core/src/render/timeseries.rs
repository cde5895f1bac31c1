//! Result normalizer: rows → one ordered `{timestamp, value}` series per
//! accessor.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::key_spec::Labels;
use crate::series::TimeseriesRow;

use super::{numeric, RenderContext};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    pub timestamp: String,
    pub value: f64,
}

/// Rendered per-metric series with its dimension labels flattened in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesEntry {
    #[serde(flatten)]
    pub labels: Labels,
    pub series: Vec<MetricPoint>,
}

/// Group rows by accessor, keeping input order within each series.
///
/// Columns whose accessor is not a per-metric key spec entry are dropped.
/// Non-numeric cells are skipped for that timestamp only; an accessor that
/// was seen keeps its entry even if none of its cells were numeric.
pub fn render_timeseries(
    ctx: &RenderContext<'_>,
    rows: &[TimeseriesRow],
) -> BTreeMap<String, SeriesEntry> {
    let mut out: BTreeMap<String, SeriesEntry> = BTreeMap::new();

    for row in rows {
        for (key, value) in &row.result {
            let Some((composite, entry)) = ctx.resolve(key) else {
                continue;
            };

            let rendered = out
                .entry(composite.accessor.to_string())
                .or_insert_with(|| SeriesEntry {
                    labels: ctx.labels_for(entry),
                    series: Vec::new(),
                });

            if let Some(value) = numeric(value) {
                rendered.series.push(MetricPoint {
                    timestamp: row.timestamp.clone(),
                    value,
                });
            }
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
