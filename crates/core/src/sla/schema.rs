//! Violation schema: how to read the columns of an SLA query response.
//!
//! Every SLA query comes back with a schema mapping each response key to
//! what it holds. Keys built for one SLA unit all start with the unit's
//! prefix `vendor.objectType.metric.sla.direction`, so schemas from
//! different units never share keys.

use std::collections::HashMap;

use serde::Serialize;

use crate::threshold_profile::SlaUnit;

// Per-metric fields.
pub const VIOLATION_COUNT: &str = "violationCount";
pub const TOTAL_DURATION: &str = "totalDuration";
pub const VIOLATION_DURATION: &str = "violationDuration";

// Report-wide summary fields.
pub const OBJECT_COUNT: &str = "objectCount";
pub const TOTAL_VIOLATION_COUNT: &str = "totalViolationCount";
pub const TOTAL_VIOLATION_DURATION: &str = "totalViolationDuration";

/// Time bucket kinds for the weekly-pattern breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeBucket {
    HourOfDay,
    DayOfWeek,
}

impl TimeBucket {
    pub const ALL: [TimeBucket; 2] = [TimeBucket::HourOfDay, TimeBucket::DayOfWeek];

    /// Response field holding the bucket label.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::HourOfDay => "hourOfDay",
            Self::DayOfWeek => "dayOfWeek",
        }
    }

    /// Valid labels: hours `0..=23`, ISO weekdays `1..=7` (Monday = 1).
    pub fn accepts(&self, label: u32) -> bool {
        match self {
            Self::HourOfDay => label <= 23,
            Self::DayOfWeek => (1..=7).contains(&label),
        }
    }
}

impl std::fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Dimensions of one SLA-tracked stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricLabels {
    pub vendor: String,
    pub object_type: String,
    pub metric: String,
    pub direction: String,
}

impl From<&SlaUnit> for MetricLabels {
    fn from(unit: &SlaUnit) -> Self {
        Self {
            vendor: unit.vendor.clone(),
            object_type: unit.object_type.clone(),
            metric: unit.metric.clone(),
            direction: unit.direction.clone(),
        }
    }
}

/// What one response key holds.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaEntry {
    /// Report-wide total (`totalDuration`, `objectCount`, ...).
    Summary { field: String },
    /// Per-metric value (`violationCount`, `totalDuration`, ...).
    Metric { labels: MetricLabels, field: String },
    /// Time bucket label column of a bucketed query.
    Bucket { labels: MetricLabels, bucket: TimeBucket },
}

/// Response key → [`SchemaEntry`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViolationSchema(HashMap<String, SchemaEntry>);

impl ViolationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema of the granular / all-granularity violations query over
    /// `units`: three per-metric columns per unit plus the summary totals.
    pub fn for_violations(units: &[SlaUnit]) -> Self {
        let mut schema = Self::new();
        for unit in units {
            let prefix = unit.key_prefix();
            let labels = MetricLabels::from(unit);
            for field in [VIOLATION_COUNT, TOTAL_DURATION, VIOLATION_DURATION] {
                schema.add_metric(format!("{prefix}.{field}"), labels.clone(), field);
            }
        }
        for field in [OBJECT_COUNT, TOTAL_VIOLATION_COUNT, TOTAL_VIOLATION_DURATION, TOTAL_DURATION] {
            schema.add_summary(field, field);
        }
        schema
    }

    /// Schema of one unit's time-bucketed query: the bucket label column and
    /// the violation count.
    pub fn for_time_bucket(unit: &SlaUnit, bucket: TimeBucket) -> Self {
        let prefix = unit.key_prefix();
        let labels = MetricLabels::from(unit);
        let mut schema = Self::new();
        schema.add_bucket(format!("{prefix}.{}", bucket.field_name()), labels.clone(), bucket);
        schema.add_metric(format!("{prefix}.{VIOLATION_COUNT}"), labels, VIOLATION_COUNT);
        schema
    }

    pub fn add_summary(&mut self, key: impl Into<String>, field: impl Into<String>) {
        self.0.insert(key.into(), SchemaEntry::Summary { field: field.into() });
    }

    pub fn add_metric(&mut self, key: impl Into<String>, labels: MetricLabels, field: impl Into<String>) {
        self.0.insert(
            key.into(),
            SchemaEntry::Metric {
                labels,
                field: field.into(),
            },
        );
    }

    pub fn add_bucket(&mut self, key: impl Into<String>, labels: MetricLabels, bucket: TimeBucket) {
        self.0.insert(key.into(), SchemaEntry::Bucket { labels, bucket });
    }

    pub fn get(&self, key: &str) -> Option<&SchemaEntry> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Union with `other`. Returns the keys present in both whose entries
    /// differ; `other` wins for those.
    pub fn merge(&mut self, other: ViolationSchema) -> Vec<String> {
        let mut collisions = Vec::new();
        for (key, entry) in other.0 {
            if let Some(previous) = self.0.insert(key.clone(), entry) {
                if Some(&previous) != self.0.get(&key) {
                    collisions.push(key);
                }
            }
        }
        collisions.sort();
        collisions
    }
}
