//! Report request models and their validation.
//!
//! Requests are echoed back in the rendered report, so every field that was
//! supplied serializes again under the same camelCase name.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::metric::MetricIdentifier;
use crate::types::{MetaFilter, MonitoredObjectId};

/// Granularity that collapses the whole interval into a single bucket.
pub const GRANULARITY_ALL: &str = "all";

/// Number of top-N results returned when the request does not say.
pub const DEFAULT_NUM_RESULTS: u32 = 10;

// ---------------------------------------------------------------------------
// Shared checks
// ---------------------------------------------------------------------------

fn require(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// ISO-8601 interval, `start/end` or `start/period`.
fn validate_interval(interval: &str) -> Result<(), CoreError> {
    require("interval", interval)?;
    match interval.split_once('/') {
        Some((start, end)) if !start.is_empty() && !end.is_empty() => Ok(()),
        _ => Err(CoreError::Validation(format!(
            "interval '{interval}' must be an ISO-8601 interval (start/end)"
        ))),
    }
}

fn validate_scope(
    meta: &Option<MetaFilter>,
    monitored_objects: &Option<Vec<MonitoredObjectId>>,
) -> Result<(), CoreError> {
    if meta.is_some() && monitored_objects.is_some() {
        return Err(CoreError::Validation(
            "request cannot contain both meta filter and monitored object id filter".to_string(),
        ));
    }
    Ok(())
}

fn validate_metrics(metrics: &[MetricIdentifier]) -> Result<(), CoreError> {
    if metrics.is_empty() {
        return Err(CoreError::Validation("at least one metric is required".to_string()));
    }
    metrics.iter().try_for_each(MetricIdentifier::validate)
}

fn timeout_from_ms(ms: Option<u64>) -> Option<Duration> {
    ms.filter(|ms| *ms > 0).map(Duration::from_millis)
}

// ---------------------------------------------------------------------------
// Aggregate metrics / histograms
// ---------------------------------------------------------------------------

/// Request for aggregate metrics or histograms over a set of metric streams.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRequest {
    pub tenant_id: String,
    pub interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitored_objects: Option<Vec<MonitoredObjectId>>,
    #[serde(default)]
    pub metrics: Vec<MetricIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore_cleaning: bool,
}

impl MetricsRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        require("tenantId", &self.tenant_id)?;
        validate_interval(&self.interval)?;
        validate_scope(&self.meta, &self.monitored_objects)?;
        validate_metrics(&self.metrics)
    }

    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.timeout)
    }
}

// ---------------------------------------------------------------------------
// Threshold crossings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdCrossingRequest {
    pub tenant_id: String,
    pub interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaFilter>,
    #[serde(default)]
    pub metrics: Vec<MetricIdentifier>,
    pub threshold_profile_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl ThresholdCrossingRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        require("tenantId", &self.tenant_id)?;
        validate_interval(&self.interval)?;
        require("thresholdProfileId", &self.threshold_profile_id)?;
        validate_metrics(&self.metrics)
    }

    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.timeout)
    }
}

// ---------------------------------------------------------------------------
// Top-N
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn is_descending(&self) -> bool {
        matches!(self, Self::Desc)
    }
}

/// Top-N request, for both metric values and threshold-crossing counts per
/// monitored object. The latter also names a threshold profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopNRequest {
    pub tenant_id: String,
    pub interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitored_objects: Option<Vec<MonitoredObjectId>>,
    pub metric: MetricIdentifier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_results: Option<u32>,
    #[serde(default, rename = "sorted")]
    pub sort_order: SortOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_profile_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl TopNRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        require("tenantId", &self.tenant_id)?;
        validate_interval(&self.interval)?;
        validate_scope(&self.meta, &self.monitored_objects)?;
        self.metric.validate()?;
        if self.num_results == Some(0) {
            return Err(CoreError::Validation("numResults must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn num_results(&self) -> u32 {
        self.num_results.unwrap_or(DEFAULT_NUM_RESULTS)
    }

    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.timeout)
    }
}

// ---------------------------------------------------------------------------
// SLA reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaReportRequest {
    #[serde(default, rename = "slaScheduleConfigId", skip_serializing_if = "Option::is_none")]
    pub sla_schedule_config: Option<String>,
    pub tenant_id: String,
    pub interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaFilter>,
    pub threshold_profile_id: String,
    pub granularity: String,
    /// Milliseconds. Overrides the configured SLA report timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Metric-name whitelist over the profile's SLA metrics. Empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore_cleaning: bool,
}

impl SlaReportRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        require("tenantId", &self.tenant_id)?;
        validate_interval(&self.interval)?;
        require("thresholdProfileId", &self.threshold_profile_id)?;
        require("granularity", &self.granularity)
    }

    /// Copy of this request at another granularity.
    pub fn with_granularity(&self, granularity: &str) -> Self {
        Self {
            granularity: granularity.to_string(),
            ..self.clone()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_ms(self.timeout)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
