//! Decode raw SLA query responses into per-metric violation partials.
//!
//! Three response shapes are handled:
//!
//! - granular timeseries: `[{timestamp, result: {key: value}}]`, one entry
//!   per time bucket at the request's granularity;
//! - all-granularity timeseries: the same shape with a single entry;
//! - time-bucketed top-N: `[{timestamp, result: [{key: value}, ..]}]`, one
//!   row per hour-of-day or day-of-week bucket.
//!
//! Keys are resolved through the [`ViolationSchema`]. Unknown keys,
//! non-numeric values and zero values are skipped; zero is how the store
//! encodes "no violations" and absent buckets must look the same.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

use super::schema::{MetricLabels, SchemaEntry, TimeBucket, ViolationSchema};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Violation values for one timestamp or bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour_of_day: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u32>,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl ViolationSummary {
    pub fn at(timestamp: &str) -> Self {
        Self {
            timestamp: Some(timestamp.to_string()),
            ..Default::default()
        }
    }

    pub fn in_bucket(bucket: TimeBucket, label: u32) -> Self {
        let mut summary = Self::default();
        match bucket {
            TimeBucket::HourOfDay => summary.hour_of_day = Some(label),
            TimeBucket::DayOfWeek => summary.day_of_week = Some(label),
        }
        summary
    }

    /// Add `value` to `field`. Streams sharing a metric name accumulate.
    pub fn add(&mut self, field: &str, value: f64) {
        *self.values.entry(field.to_string()).or_insert(0.0) += value;
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}

/// The streams that contributed to one metric-name entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricStreams {
    pub metric: String,
    pub vendor: BTreeSet<String>,
    pub object_type: BTreeSet<String>,
    pub direction: BTreeSet<String>,
}

impl MetricStreams {
    pub fn new(metric: &str) -> Self {
        Self {
            metric: metric.to_string(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, labels: &MetricLabels) {
        self.vendor.insert(labels.vendor.clone());
        self.object_type.insert(labels.object_type.clone());
        self.direction.insert(labels.direction.clone());
    }

    pub fn absorb(&mut self, other: &MetricStreams) {
        self.vendor.extend(other.vendor.iter().cloned());
        self.object_type.extend(other.object_type.iter().cloned());
        self.direction.extend(other.direction.iter().cloned());
    }
}

/// One metric's values keyed by timestamp (`String`) or bucket label (`u32`).
#[derive(Debug, Clone, PartialEq)]
pub struct MetricViolations<K: Ord> {
    pub streams: MetricStreams,
    pub series: BTreeMap<K, ViolationSummary>,
}

impl<K: Ord> MetricViolations<K> {
    fn new(metric: &str) -> Self {
        Self {
            streams: MetricStreams::new(metric),
            series: BTreeMap::new(),
        }
    }
}

/// Granular partial: per-metric series plus the summary per timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GranularViolations {
    pub per_metric: BTreeMap<String, MetricViolations<String>>,
    pub summary: BTreeMap<String, ViolationSummary>,
}

/// All-granularity partial: one total per metric plus the global summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TotalViolations {
    pub per_metric: BTreeMap<String, MetricTotals>,
    pub summary: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricTotals {
    pub streams: MetricStreams,
    pub totals: ViolationSummary,
}

/// Hour-of-day or day-of-week partial.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketViolations {
    pub bucket: TimeBucket,
    pub per_metric: BTreeMap<String, MetricViolations<u32>>,
}

impl BucketViolations {
    pub fn empty(bucket: TimeBucket) -> Self {
        Self {
            bucket,
            per_metric: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct TimeseriesEntry {
    timestamp: String,
    #[serde(default)]
    result: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct TopNEntry {
    #[serde(default)]
    result: Vec<BTreeMap<String, serde_json::Value>>,
}

fn parse<'de, T: Deserialize<'de>>(raw: &'de [u8], what: &str) -> Result<T, CoreError> {
    serde_json::from_slice(raw)
        .map_err(|e| CoreError::Decode(format!("malformed {what} response: {e}")))
}

/// Non-zero numeric value, or `None` for anything the report should skip.
fn violation_value(value: &serde_json::Value) -> Option<f64> {
    value.as_f64().filter(|v| *v != 0.0)
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

/// Decode a granular violations response.
pub fn decode_granular(raw: &[u8], schema: &ViolationSchema) -> Result<GranularViolations, CoreError> {
    let entries: Vec<TimeseriesEntry> = parse(raw, "granular SLA violations")?;
    let mut out = GranularViolations::default();

    for entry in &entries {
        let ts = entry.timestamp.as_str();
        for (key, value) in &entry.result {
            let Some(value) = violation_value(value) else {
                continue;
            };
            match schema.get(key) {
                Some(SchemaEntry::Summary { field }) => {
                    out.summary
                        .entry(ts.to_string())
                        .or_insert_with(|| ViolationSummary::at(ts))
                        .add(field, value);
                }
                Some(SchemaEntry::Metric { labels, field }) => {
                    let metric = out
                        .per_metric
                        .entry(labels.metric.clone())
                        .or_insert_with(|| MetricViolations::new(&labels.metric));
                    metric.streams.record(labels);
                    metric
                        .series
                        .entry(ts.to_string())
                        .or_insert_with(|| ViolationSummary::at(ts))
                        .add(field, value);
                }
                Some(SchemaEntry::Bucket { .. }) | None => {}
            }
        }
    }

    Ok(out)
}

/// Decode an all-granularity violations response. Only the first entry is
/// read; the store returns exactly one for granularity `all`.
pub fn decode_totals(raw: &[u8], schema: &ViolationSchema) -> Result<TotalViolations, CoreError> {
    let entries: Vec<TimeseriesEntry> = parse(raw, "SLA violation totals")?;
    let mut out = TotalViolations::default();

    let Some(entry) = entries.first() else {
        return Ok(out);
    };

    for (key, value) in &entry.result {
        let Some(value) = violation_value(value) else {
            continue;
        };
        match schema.get(key) {
            Some(SchemaEntry::Summary { field }) => {
                *out.summary.entry(field.clone()).or_insert(0.0) += value;
            }
            Some(SchemaEntry::Metric { labels, field }) => {
                let metric = out
                    .per_metric
                    .entry(labels.metric.clone())
                    .or_insert_with(|| MetricTotals {
                        streams: MetricStreams::new(&labels.metric),
                        totals: ViolationSummary::default(),
                    });
                metric.streams.record(labels);
                metric.totals.add(field, value);
            }
            Some(SchemaEntry::Bucket { .. }) | None => {}
        }
    }

    Ok(out)
}

/// Decode the time-bucketed responses of every SLA unit for one bucket kind.
///
/// # Errors
///
/// [`CoreError::Decode`] for malformed JSON, a bucket label that is not an
/// integer in range for `bucket`, or a row carrying known values but no
/// bucket label.
pub fn decode_buckets(
    raws: &[Vec<u8>],
    schema: &ViolationSchema,
    bucket: TimeBucket,
) -> Result<BucketViolations, CoreError> {
    let mut out = BucketViolations::empty(bucket);

    for raw in raws {
        let entries: Vec<TopNEntry> = parse(raw, &format!("SLA {bucket}"))?;
        let Some(entry) = entries.first() else {
            continue;
        };

        for row in &entry.result {
            let label = bucket_label(row, schema, bucket)?;

            for (key, value) in row {
                let Some(SchemaEntry::Metric { labels, field }) = schema.get(key) else {
                    continue;
                };
                let Some(value) = violation_value(value) else {
                    continue;
                };
                let Some(label) = label else {
                    return Err(CoreError::Decode(format!(
                        "{bucket} row for '{}' has no bucket label",
                        labels.metric
                    )));
                };

                let metric = out
                    .per_metric
                    .entry(labels.metric.clone())
                    .or_insert_with(|| MetricViolations::new(&labels.metric));
                metric.streams.record(labels);
                metric
                    .series
                    .entry(label)
                    .or_insert_with(|| ViolationSummary::in_bucket(bucket, label))
                    .add(field, value);
            }
        }
    }

    Ok(out)
}

/// The row's bucket label, if the row has a label column for `bucket`.
fn bucket_label(
    row: &BTreeMap<String, serde_json::Value>,
    schema: &ViolationSchema,
    bucket: TimeBucket,
) -> Result<Option<u32>, CoreError> {
    let mut found = None;

    for (key, value) in row {
        match schema.get(key) {
            Some(SchemaEntry::Bucket { bucket: kind, .. }) if *kind == bucket => {}
            _ => continue,
        }

        let label = match value {
            serde_json::Value::String(s) => s.trim().parse::<u32>().ok(),
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            _ => None,
        }
        .filter(|label| bucket.accepts(*label))
        .ok_or_else(|| CoreError::Decode(format!("invalid {bucket} label {value} in '{key}'")))?;

        match found {
            Some(previous) if previous != label => {
                return Err(CoreError::Decode(format!(
                    "conflicting {bucket} labels {previous} and {label} in one row"
                )));
            }
            _ => found = Some(label),
        }
    }

    Ok(found)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::sla::test_support::{sla_unit, PREFIX_DELAY};

    fn bytes(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    fn violations_schema() -> ViolationSchema {
        ViolationSchema::for_violations(&[sla_unit("delayP95", "twamp-pe"), sla_unit("delayP95", "twamp-sf")])
    }

    // -- decode_granular ------------------------------------------------------

    #[test]
    fn granular_splits_summary_and_metrics() {
        let raw = bytes(json!([
            {"timestamp": "t0", "result": {
                format!("{PREFIX_DELAY}.violationCount"): 2,
                format!("{PREFIX_DELAY}.totalDuration"): 3600,
                "totalDuration": 7200,
                "objectCount": 0,
                "unknown": 5,
            }},
            {"timestamp": "t1", "result": {
                format!("{PREFIX_DELAY}.violationCount"): 0,
                "totalViolationCount": 1,
            }},
        ]));

        let out = decode_granular(&raw, &violations_schema()).unwrap();

        let delay = &out.per_metric["delayP95"];
        assert_eq!(delay.series.len(), 1);
        assert_eq!(delay.series["t0"].get("violationCount"), Some(2.0));
        assert_eq!(delay.series["t0"].timestamp.as_deref(), Some("t0"));
        assert!(delay.streams.object_type.contains("twamp-pe"));

        assert_eq!(out.summary["t0"].get("totalDuration"), Some(7200.0));
        assert_eq!(out.summary["t0"].get("objectCount"), None);
        assert_eq!(out.summary["t1"].get("totalViolationCount"), Some(1.0));
    }

    #[test]
    fn same_metric_name_accumulates_across_streams() {
        let raw = bytes(json!([{"timestamp": "t0", "result": {
            "accedian.twamp-pe.delayP95.sla.0.violationCount": 2,
            "accedian.twamp-sf.delayP95.sla.0.violationCount": 3,
        }}]));

        let out = decode_granular(&raw, &violations_schema()).unwrap();
        let delay = &out.per_metric["delayP95"];

        assert_eq!(delay.series["t0"].get("violationCount"), Some(5.0));
        assert_eq!(delay.streams.object_type.len(), 2);
    }

    #[test]
    fn granular_malformed_json_is_decode_error() {
        assert_matches!(decode_granular(b"{not json", &violations_schema()), Err(CoreError::Decode(_)));
    }

    #[test]
    fn granular_empty_response_is_empty() {
        let out = decode_granular(b"[]", &violations_schema()).unwrap();
        assert!(out.per_metric.is_empty());
        assert!(out.summary.is_empty());
    }

    // -- decode_totals --------------------------------------------------------

    #[test]
    fn totals_read_first_entry_only() {
        let raw = bytes(json!([
            {"timestamp": "t0", "result": {
                format!("{PREFIX_DELAY}.violationDuration"): 60,
                "totalDuration": 1000,
                "totalViolationDuration": 60,
            }},
            {"timestamp": "t1", "result": {"totalDuration": 99999}},
        ]));

        let out = decode_totals(&raw, &violations_schema()).unwrap();

        assert_eq!(out.summary["totalDuration"], 1000.0);
        assert_eq!(out.summary["totalViolationDuration"], 60.0);
        let totals = &out.per_metric["delayP95"].totals;
        assert_eq!(totals.get("violationDuration"), Some(60.0));
        assert!(totals.timestamp.is_none());
    }

    // -- decode_buckets -------------------------------------------------------

    fn hour_schema() -> ViolationSchema {
        ViolationSchema::for_time_bucket(&sla_unit("delayP95", "twamp-pe"), TimeBucket::HourOfDay)
    }

    #[test]
    fn buckets_keyed_by_parsed_label() {
        let raw = bytes(json!([{"timestamp": "t0", "result": [
            {format!("{PREFIX_DELAY}.hourOfDay"): "13", format!("{PREFIX_DELAY}.violationCount"): 9},
            {format!("{PREFIX_DELAY}.hourOfDay"): "02", format!("{PREFIX_DELAY}.violationCount"): 4},
            {format!("{PREFIX_DELAY}.hourOfDay"): "07", format!("{PREFIX_DELAY}.violationCount"): 0},
        ]}]));

        let out = decode_buckets(&[raw], &hour_schema(), TimeBucket::HourOfDay).unwrap();
        let series = &out.per_metric["delayP95"].series;

        assert_eq!(series.keys().copied().collect::<Vec<_>>(), vec![2, 13]);
        assert_eq!(series[&2].hour_of_day, Some(2));
        assert_eq!(series[&13].get("violationCount"), Some(9.0));
    }

    #[test]
    fn numeric_day_labels_are_accepted() {
        let unit = sla_unit("delayP95", "twamp-pe");
        let schema = ViolationSchema::for_time_bucket(&unit, TimeBucket::DayOfWeek);
        let raw = bytes(json!([{"timestamp": "t0", "result": [
            {format!("{PREFIX_DELAY}.dayOfWeek"): 7, format!("{PREFIX_DELAY}.violationCount"): 1},
        ]}]));

        let out = decode_buckets(&[raw], &schema, TimeBucket::DayOfWeek).unwrap();
        assert_eq!(out.per_metric["delayP95"].series[&7].day_of_week, Some(7));
    }

    #[test]
    fn non_integer_label_is_decode_error() {
        let raw = bytes(json!([{"timestamp": "t0", "result": [
            {format!("{PREFIX_DELAY}.hourOfDay"): "noon", format!("{PREFIX_DELAY}.violationCount"): 1},
        ]}]));
        assert_matches!(
            decode_buckets(&[raw], &hour_schema(), TimeBucket::HourOfDay),
            Err(CoreError::Decode(_))
        );
    }

    #[test]
    fn out_of_range_label_is_decode_error() {
        let raw = bytes(json!([{"timestamp": "t0", "result": [
            {format!("{PREFIX_DELAY}.hourOfDay"): "24", format!("{PREFIX_DELAY}.violationCount"): 1},
        ]}]));
        assert_matches!(
            decode_buckets(&[raw], &hour_schema(), TimeBucket::HourOfDay),
            Err(CoreError::Decode(_))
        );
    }

    #[test]
    fn row_without_label_is_decode_error() {
        let raw = bytes(json!([{"timestamp": "t0", "result": [
            {format!("{PREFIX_DELAY}.violationCount"): 1},
        ]}]));
        assert_matches!(
            decode_buckets(&[raw], &hour_schema(), TimeBucket::HourOfDay),
            Err(CoreError::Decode(_))
        );
    }

    #[test]
    fn empty_bucket_responses_are_skipped() {
        let raws = [b"[]".to_vec(), bytes(json!([{"timestamp": "t0", "result": []}]))];
        let out = decode_buckets(&raws, &hour_schema(), TimeBucket::HourOfDay).unwrap();
        assert!(out.per_metric.is_empty());
    }
}
