//! Metric identifiers used as query filters and as output grouping keys.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// MetricIdentifier
// ---------------------------------------------------------------------------

/// Identifies a distinct metric stream. `object_type` and `direction` may
/// name several values; every combination of the two is a separate stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricIdentifier {
    pub vendor: String,
    #[serde(default)]
    pub object_type: Vec<String>,
    #[serde(alias = "name")]
    pub metric: String,
    #[serde(default)]
    pub direction: Vec<String>,
}

impl MetricIdentifier {
    pub fn new(
        vendor: impl Into<String>,
        object_type: &[&str],
        metric: impl Into<String>,
        direction: &[&str],
    ) -> Self {
        Self {
            vendor: vendor.into(),
            object_type: object_type.iter().map(|s| s.to_string()).collect(),
            metric: metric.into(),
            direction: direction.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Every `(object_type, direction)` pair covered by this identifier, in
    /// declaration order.
    pub fn combinations(&self) -> Vec<(&str, &str)> {
        self.object_type
            .iter()
            .flat_map(|ot| {
                self.direction
                    .iter()
                    .map(move |dir| (ot.as_str(), dir.as_str()))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.vendor.trim().is_empty() {
            return Err(CoreError::Validation("metric vendor must not be empty".to_string()));
        }
        if self.metric.trim().is_empty() {
            return Err(CoreError::Validation("metric name must not be empty".to_string()));
        }
        if self.object_type.is_empty() {
            return Err(CoreError::Validation(format!(
                "metric '{}' must name at least one object type",
                self.metric
            )));
        }
        if self.direction.is_empty() {
            return Err(CoreError::Validation(format!(
                "metric '{}' must name at least one direction",
                self.metric
            )));
        }
        Ok(())
    }
}

/// Whether `metric` passes a metric-name whitelist. An empty whitelist
/// admits everything.
pub fn in_whitelist(whitelist: &[String], metric: &str) -> bool {
    whitelist.is_empty() || whitelist.iter().any(|m| m == metric)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
