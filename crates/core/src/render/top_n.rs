//! Top-N presentation order.
//!
//! The store already ranked the list (rank 0 is the extreme value); this
//! only decides whether it is shown as ranked or reversed.

use serde::{Deserialize, Serialize};

use crate::metric::MetricIdentifier;
use crate::types::MonitoredObjectId;

/// One ranked row as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopNEntry {
    pub monitored_object_id: MonitoredObjectId,
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedMetricEntry {
    pub monitored_object_ids: Vec<MonitoredObjectId>,
    #[serde(flatten)]
    pub metric: MetricIdentifier,
    pub result: serde_json::Value,
}

/// Lay out `entries` for presentation: `out[i] = entries[i]` when
/// `descending`, `out[i] = entries[len - 1 - i]` otherwise.
pub fn order_top_n(
    entries: Vec<TopNEntry>,
    metric: &MetricIdentifier,
    descending: bool,
) -> Vec<RankedMetricEntry> {
    let render = |entry: TopNEntry| RankedMetricEntry {
        monitored_object_ids: vec![entry.monitored_object_id],
        metric: metric.clone(),
        result: entry.result,
    };

    if descending {
        entries.into_iter().map(render).collect()
    } else {
        entries.into_iter().rev().map(render).collect()
    }
}
