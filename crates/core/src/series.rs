//! Raw timestamped rows returned by the analytics store, and the numeric
//! coercion shared by every renderer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single value in a result row.
///
/// The store returns integers, doubles, strings (e.g. `"NaN"` or
/// `"Infinity"` for undefined post-aggregations) and occasionally nulls.
/// `Float32` is never produced by deserialization; collaborators that
/// aggregate in single precision construct it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowValue {
    Integer(i64),
    Float(f64),
    Float32(f32),
    Text(String),
    Other(serde_json::Value),
}

impl RowValue {
    /// Coerce to `f64`. Integer, single and double precision values are
    /// numeric; everything else is not.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RowValue::Integer(v) => Some(*v as f64),
            RowValue::Float(v) => Some(*v),
            RowValue::Float32(v) => Some(f64::from(*v)),
            RowValue::Text(_) | RowValue::Other(_) => None,
        }
    }
}

impl From<i64> for RowValue {
    fn from(v: i64) -> Self {
        RowValue::Integer(v)
    }
}

impl From<f64> for RowValue {
    fn from(v: f64) -> Self {
        RowValue::Float(v)
    }
}

impl From<f32> for RowValue {
    fn from(v: f32) -> Self {
        RowValue::Float32(v)
    }
}

impl From<&str> for RowValue {
    fn from(v: &str) -> Self {
        RowValue::Text(v.to_string())
    }
}

/// One timestamped result row. Rows arrive chronologically ordered; nothing
/// downstream re-sorts them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesRow {
    pub timestamp: String,
    #[serde(default)]
    pub result: BTreeMap<String, RowValue>,
}

impl TimeseriesRow {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            result: BTreeMap::new(),
        }
    }

    /// Add a result column. Builder style, mostly for collaborators and tests.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RowValue>) -> Self {
        self.result.insert(key.into(), value.into());
        self
    }
}
