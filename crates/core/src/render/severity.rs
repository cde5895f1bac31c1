//! Severity classifier for threshold-crossing reports.
//!
//! Result keys are `"{accessor}::{severity}"`; each accessor gets one
//! `{timestamp, violationCount}` series per severity. Entries are then
//! regrouped under the metric identifiers the caller asked for, which may
//! span several object types and directions.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::key_spec::Labels;
use crate::metric::MetricIdentifier;
use crate::series::TimeseriesRow;
use crate::types::parse_timestamp;

use super::{numeric, RenderContext};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationPoint {
    pub timestamp: String,
    pub violation_count: f64,
}

/// Severity name → ordered violation series.
pub type SeveritySeries = BTreeMap<String, Vec<ViolationPoint>>;

/// One accessor's severities, flattened next to its dimension labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityEntry {
    #[serde(flatten)]
    pub labels: Labels,
    #[serde(flatten)]
    pub severities: SeveritySeries,
}

/// Severity series merged for every stream of one requested identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricViolationGroup {
    #[serde(flatten)]
    pub metric: MetricIdentifier,
    #[serde(flatten)]
    pub severities: SeveritySeries,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Build per-accessor severity series.
///
/// Only non-zero numeric cells produce a point; a zero count is
/// indistinguishable from "no violation" in the store. An accessor appears
/// once it has at least one point.
pub fn render_severities(
    ctx: &RenderContext<'_>,
    rows: &[TimeseriesRow],
) -> BTreeMap<String, SeverityEntry> {
    let mut out: BTreeMap<String, SeverityEntry> = BTreeMap::new();

    for row in rows {
        for (key, value) in &row.result {
            let Some((composite, entry)) = ctx.resolve(key) else {
                continue;
            };
            let Some(severity) = composite.suffix else {
                continue;
            };
            let Some(count) = numeric(value).filter(|v| *v != 0.0) else {
                continue;
            };

            out.entry(composite.accessor.to_string())
                .or_insert_with(|| SeverityEntry {
                    labels: ctx.labels_for(entry),
                    severities: SeveritySeries::new(),
                })
                .severities
                .entry(severity.to_string())
                .or_default()
                .push(ViolationPoint {
                    timestamp: row.timestamp.clone(),
                    violation_count: count,
                });
        }
    }

    out
}

// ---------------------------------------------------------------------------
// Regrouping
// ---------------------------------------------------------------------------

/// Regroup severity entries under the requested metric identifiers.
///
/// Every `(objectType, direction)` combination of a filter contributes the
/// series of the entries whose labels match it. Points sharing a timestamp
/// are summed, and each merged series is sorted chronologically. A filter
/// without any matching data is still returned, carrying only its
/// identifier.
pub fn regroup_by_metric(
    filters: &[MetricIdentifier],
    entries: &BTreeMap<String, SeverityEntry>,
) -> Vec<MetricViolationGroup> {
    filters
        .iter()
        .map(|filter| {
            let mut severities = SeveritySeries::new();

            for (object_type, direction) in filter.combinations() {
                let matching = entries.values().filter(|entry| {
                    label_is(&entry.labels, "vendor", &filter.vendor)
                        && label_is(&entry.labels, "metric", &filter.metric)
                        && label_is(&entry.labels, "objectType", object_type)
                        && label_is(&entry.labels, "direction", direction)
                });

                for entry in matching {
                    for (severity, points) in &entry.severities {
                        merge_points(severities.entry(severity.clone()).or_default(), points);
                    }
                }
            }

            for points in severities.values_mut() {
                points.sort_by_key(|p| parse_timestamp(&p.timestamp));
            }

            MetricViolationGroup {
                metric: filter.clone(),
                severities,
            }
        })
        .collect()
}

fn label_is(labels: &Labels, name: &str, expected: &str) -> bool {
    labels.get(name).and_then(|v| v.as_str()) == Some(expected)
}

fn merge_points(into: &mut Vec<ViolationPoint>, from: &[ViolationPoint]) {
    for point in from {
        match into.iter_mut().find(|p| p.timestamp == point.timestamp) {
            Some(existing) => existing.violation_count += point.violation_count,
            None => into.push(point.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
