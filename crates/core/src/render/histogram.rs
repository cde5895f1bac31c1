//! Histogram bucket reconstructor.
//!
//! Each result key carries the bucket index as its suffix
//! (`"{accessor}::{index}"`). Cells are collected per accessor and timestamp
//! and then laid out as a dense array, `values[i]` holding bucket `i`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::CoreError;
use crate::key_spec::Labels;
use crate::series::TimeseriesRow;

use super::{numeric, RenderContext};

/// Buckets observed for one timestamp. A non-numeric cell is kept as `null`
/// so that every index stays in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramEntry {
    pub timestamp: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSeries {
    #[serde(flatten)]
    pub labels: Labels,
    pub series: Vec<HistogramEntry>,
}

/// Sightings for the current timestamp of one accessor.
struct PendingBuckets {
    timestamp: String,
    buckets: BTreeMap<usize, Option<f64>>,
}

struct Builder {
    labels: Labels,
    done: Vec<HistogramEntry>,
    current: Option<PendingBuckets>,
}

impl Builder {
    fn observe(
        &mut self,
        accessor: &str,
        timestamp: &str,
        index: usize,
        value: Option<f64>,
    ) -> Result<(), CoreError> {
        let same_block = self
            .current
            .as_ref()
            .is_some_and(|pending| pending.timestamp == timestamp);

        if !same_block {
            self.flush(accessor)?;
            self.current = Some(PendingBuckets {
                timestamp: timestamp.to_string(),
                buckets: BTreeMap::new(),
            });
        }

        if let Some(pending) = self.current.as_mut() {
            pending.buckets.insert(index, value);
        }
        Ok(())
    }

    fn flush(&mut self, accessor: &str) -> Result<(), CoreError> {
        let Some(pending) = self.current.take() else {
            return Ok(());
        };

        let len = pending.buckets.len();
        let mut values = vec![None; len];
        for (index, value) in pending.buckets {
            if index >= len {
                return Err(CoreError::Decode(format!(
                    "histogram '{accessor}' at {}: bucket index {index} out of range for {len} buckets",
                    pending.timestamp
                )));
            }
            values[index] = value;
        }

        self.done.push(HistogramEntry {
            timestamp: pending.timestamp,
            values,
        });
        Ok(())
    }
}

/// Rebuild ordered bucket arrays per accessor.
///
/// A new [`HistogramEntry`] starts whenever the timestamp changes from the
/// previous row seen for that accessor.
///
/// # Errors
///
/// [`CoreError::Decode`] when a resolved key has no suffix, a suffix that is
/// not a non-negative integer, or indices that are not contiguous from 0.
pub fn render_histogram(
    ctx: &RenderContext<'_>,
    rows: &[TimeseriesRow],
) -> Result<BTreeMap<String, HistogramSeries>, CoreError> {
    let mut builders: BTreeMap<String, Builder> = BTreeMap::new();

    for row in rows {
        for (key, value) in &row.result {
            let Some((composite, entry)) = ctx.resolve(key) else {
                continue;
            };

            let index = composite
                .suffix
                .ok_or_else(|| CoreError::Decode(format!("histogram key '{key}' has no bucket index")))?
                .parse::<usize>()
                .map_err(|_| {
                    CoreError::Decode(format!("histogram key '{key}' has a non-integer bucket index"))
                })?;

            let builder = builders
                .entry(composite.accessor.to_string())
                .or_insert_with(|| Builder {
                    labels: ctx.labels_for(entry),
                    done: Vec::new(),
                    current: None,
                });
            builder.observe(composite.accessor, &row.timestamp, index, numeric(value))?;
        }
    }

    builders
        .into_iter()
        .map(|(accessor, mut builder)| {
            builder.flush(&accessor)?;
            Ok((
                accessor,
                HistogramSeries {
                    labels: builder.labels,
                    series: builder.done,
                },
            ))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
