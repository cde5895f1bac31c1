//! Tenant threshold profiles.
//!
//! A profile is a typed tree
//! `vendor → objectType → metric → direction → event → attributes`.
//! Event names are severities (`critical`, `major`, `minor`, `warning`) or
//! `sla`; only the latter drives SLA report generation.
//!
//! Attributes are stored as strings (`"lowerLimit": "25000000"`) and are
//! parsed into [`EventAttributes`] on demand.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::metric::in_whitelist;

/// Event name that marks a metric stream as SLA-tracked.
pub const SLA_EVENT: &str = "sla";

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    #[serde(default)]
    pub vendor_map: BTreeMap<String, VendorThresholds>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorThresholds {
    #[serde(default)]
    pub monitored_object_type_map: BTreeMap<String, ObjectTypeThresholds>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeThresholds {
    #[serde(default)]
    pub metric_map: BTreeMap<String, MetricThresholds>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricThresholds {
    #[serde(default)]
    pub direction_map: BTreeMap<String, DirectionThresholds>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectionThresholds {
    #[serde(default)]
    pub event_map: BTreeMap<String, EventAttrMap>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttrMap {
    #[serde(default)]
    pub event_attr_map: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Event attributes
// ---------------------------------------------------------------------------

/// How an event's limits are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdEventType {
    Static,
    BaselineStatic,
    BaselinePercentage,
}

impl ThresholdEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::BaselineStatic => "baseline-static",
            Self::BaselinePercentage => "baseline-percentage",
        }
    }

    pub fn is_baseline(&self) -> bool {
        matches!(self, Self::BaselineStatic | Self::BaselinePercentage)
    }
}

/// Parse an `eventType` attribute. Absent, `standard` and unknown values are
/// all treated as static limits, so parsing never fails.
impl FromStr for ThresholdEventType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "baseline-static" => Self::BaselineStatic,
            "baseline-percentage" => Self::BaselinePercentage,
            _ => Self::Static,
        })
    }
}

/// Parsed form of an event's attribute map.
///
/// A limit of `None` means unbounded on that side. A strict bound excludes
/// the limit itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttributes {
    pub event_type: ThresholdEventType,
    pub lower_limit: Option<f64>,
    pub lower_strict: bool,
    pub upper_limit: Option<f64>,
    pub upper_strict: bool,
    pub unit: Option<String>,
}

impl EventAttributes {
    /// Parse and validate a raw attribute map. Missing or empty entries take
    /// their defaults; malformed numbers and booleans are rejected.
    pub fn parse(attrs: &BTreeMap<String, String>) -> Result<Self, CoreError> {
        let attr = |name: &str| attrs.get(name).map(String::as_str).filter(|v| !v.is_empty());

        let lower_limit = attr("lowerLimit").map(|v| parse_number("lowerLimit", v)).transpose()?;
        let upper_limit = attr("upperLimit").map(|v| parse_number("upperLimit", v)).transpose()?;
        let lower_strict = attr("lowerStrict")
            .map(|v| parse_bool("lowerStrict", v))
            .transpose()?
            .unwrap_or(false);
        let upper_strict = attr("upperStrict")
            .map(|v| parse_bool("upperStrict", v))
            .transpose()?
            .unwrap_or(false);

        if let (Some(lower), Some(upper)) = (lower_limit, upper_limit) {
            if lower > upper {
                return Err(CoreError::Validation(format!(
                    "lowerLimit {lower} must not exceed upperLimit {upper}"
                )));
            }
        }

        Ok(Self {
            event_type: attr("eventType")
                .and_then(|s| s.parse().ok())
                .unwrap_or(ThresholdEventType::Static),
            lower_limit,
            lower_strict,
            upper_limit,
            upper_strict,
            unit: attr("unit").map(str::to_string),
        })
    }
}

fn parse_number(name: &str, value: &str) -> Result<f64, CoreError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            CoreError::Validation(format!("Invalid value for '{name}': {value}. Must be a number"))
        })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, CoreError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "t" => Ok(true),
        "false" | "0" | "f" => Ok(false),
        _ => Err(CoreError::Validation(format!(
            "Invalid value for '{name}': {value}. Must be a boolean"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// One event leaf of the tree with its full path.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdLeaf<'a> {
    pub vendor: &'a str,
    pub object_type: &'a str,
    pub metric: &'a str,
    pub direction: &'a str,
    pub event: &'a str,
    pub attributes: &'a BTreeMap<String, String>,
}

/// An SLA-tracked metric stream: one unit of SLA work.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaUnit {
    pub vendor: String,
    pub object_type: String,
    pub metric: String,
    pub direction: String,
    pub attributes: EventAttributes,
}

impl SlaUnit {
    /// `vendor.objectType.metric.sla.direction`, the prefix every schema
    /// key of this unit's SLA queries starts with.
    pub fn key_prefix(&self) -> String {
        format!(
            "{}.{}.{}.{SLA_EVENT}.{}",
            self.vendor, self.object_type, self.metric, self.direction
        )
    }
}

impl ThresholdProfile {
    /// Flatten the tree into leaves, in key order at every level.
    pub fn leaves(&self) -> Vec<ThresholdLeaf<'_>> {
        let mut out = Vec::new();
        for (vendor, v) in &self.thresholds.vendor_map {
            for (object_type, ot) in &v.monitored_object_type_map {
                for (metric, m) in &ot.metric_map {
                    for (direction, d) in &m.direction_map {
                        for (event, e) in &d.event_map {
                            out.push(ThresholdLeaf {
                                vendor,
                                object_type,
                                metric,
                                direction,
                                event,
                                attributes: &e.event_attr_map,
                            });
                        }
                    }
                }
            }
        }
        out
    }

    /// SLA-tracked streams, restricted to `whitelist` metric names when it
    /// is non-empty.
    ///
    /// # Errors
    ///
    /// [`CoreError::Validation`] when an SLA event's attributes are invalid.
    pub fn sla_units(&self, whitelist: &[String]) -> Result<Vec<SlaUnit>, CoreError> {
        self.leaves()
            .into_iter()
            .filter(|leaf| leaf.event == SLA_EVENT && in_whitelist(whitelist, leaf.metric))
            .map(|leaf| {
                let attributes = EventAttributes::parse(leaf.attributes).map_err(|e| match e {
                    CoreError::Validation(msg) => CoreError::Validation(format!(
                        "{}.{}.{}.{}: {msg}",
                        leaf.vendor, leaf.object_type, leaf.metric, leaf.direction
                    )),
                    other => other,
                })?;
                Ok(SlaUnit {
                    vendor: leaf.vendor.to_string(),
                    object_type: leaf.object_type.to_string(),
                    metric: leaf.metric.to_string(),
                    direction: leaf.direction.to_string(),
                    attributes,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
