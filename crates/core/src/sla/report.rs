//! Merge of the four SLA partials into one report.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::envelope::{new_report_id, wrap, ConfiguredReport, ReportEnvelope};
use crate::report_types::SLA_REPORTS;
use crate::request::SlaReportRequest;
use crate::types::parse_timestamp;

use super::decode::{
    BucketViolations, GranularViolations, MetricStreams, TotalViolations, ViolationSummary,
};
use super::schema::{TOTAL_DURATION, TOTAL_VIOLATION_DURATION};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// One metric name's entry. Any breakdown whose partial had no data for the
/// metric is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaMetricReport {
    #[serde(flatten)]
    pub streams: MetricStreams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals: Option<ViolationSummary>,
    pub by_granularity: Vec<ViolationSummary>,
    pub by_hour_per_day: Vec<ViolationSummary>,
    pub by_day_per_week: Vec<ViolationSummary>,
}

impl SlaMetricReport {
    fn new(metric: &str) -> Self {
        Self {
            streams: MetricStreams::new(metric),
            totals: None,
            by_granularity: Vec::new(),
            by_hour_per_day: Vec::new(),
            by_day_per_week: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaSummary {
    #[serde(flatten)]
    pub totals: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_compliance_percent: Option<f64>,
    pub by_granularity: Vec<ViolationSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlaReportResult {
    pub summary: SlaSummary,
    pub metric: Vec<SlaMetricReport>,
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// The four independently computed partials of one SLA report.
#[derive(Debug, Clone, PartialEq)]
pub struct SlaPartials {
    pub granular: GranularViolations,
    pub totals: TotalViolations,
    pub by_hour_of_day: BucketViolations,
    pub by_day_of_week: BucketViolations,
}

impl SlaPartials {
    /// Build the report result: one entry per metric name seen in any
    /// partial, ordered by name.
    pub fn merge(self) -> SlaReportResult {
        let mut metrics: BTreeMap<String, SlaMetricReport> = BTreeMap::new();

        for (name, totals) in self.totals.per_metric {
            let entry = metrics.entry(name).or_insert_with_key(|n| SlaMetricReport::new(n));
            entry.streams.absorb(&totals.streams);
            entry.totals = Some(totals.totals);
        }

        for (name, granular) in self.granular.per_metric {
            let entry = metrics.entry(name).or_insert_with_key(|n| SlaMetricReport::new(n));
            entry.streams.absorb(&granular.streams);
            entry.by_granularity = chronological(granular.series);
        }

        for (name, hours) in self.by_hour_of_day.per_metric {
            let entry = metrics.entry(name).or_insert_with_key(|n| SlaMetricReport::new(n));
            entry.streams.absorb(&hours.streams);
            entry.by_hour_per_day = hours.series.into_values().collect();
        }

        for (name, days) in self.by_day_of_week.per_metric {
            let entry = metrics.entry(name).or_insert_with_key(|n| SlaMetricReport::new(n));
            entry.streams.absorb(&days.streams);
            entry.by_day_per_week = days.series.into_values().collect();
        }

        let summary = SlaSummary {
            sla_compliance_percent: compliance_percent(&self.totals.summary),
            totals: self.totals.summary,
            by_granularity: chronological(self.granular.summary),
        };

        SlaReportResult {
            summary,
            metric: metrics.into_values().collect(),
        }
    }
}

/// `(totalDuration - totalViolationDuration) / totalDuration * 100`.
///
/// `None` unless the summary carries both durations and `totalDuration` is
/// positive.
pub fn compliance_percent(summary: &BTreeMap<String, f64>) -> Option<f64> {
    let total = summary.get(TOTAL_DURATION).copied().filter(|t| *t > 0.0)?;
    let violated = summary.get(TOTAL_VIOLATION_DURATION).copied()?;
    Some((total - violated) / total * 100.0)
}

/// Flatten a timestamp-keyed series in chronological order.
fn chronological(series: BTreeMap<String, ViolationSummary>) -> Vec<ViolationSummary> {
    let mut out: Vec<(String, ViolationSummary)> = series.into_iter().collect();
    out.sort_by_key(|(ts, _)| parse_timestamp(ts));
    out.into_iter().map(|(_, summary)| summary).collect()
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A finished SLA report with the request it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct SlaReport {
    pub id: String,
    pub config: SlaReportRequest,
    pub result: SlaReportResult,
}

pub type SlaReportEnvelope = ReportEnvelope<ConfiguredReport<SlaReportRequest, SlaReportResult>>;

impl SlaReport {
    pub fn new(config: SlaReportRequest, result: SlaReportResult) -> Self {
        Self {
            id: new_report_id(),
            config,
            result,
        }
    }

    pub fn into_envelope(self) -> SlaReportEnvelope {
        wrap(
            self.id,
            SLA_REPORTS,
            ConfiguredReport {
                config: self.config,
                result: self.result,
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
