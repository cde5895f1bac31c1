//! SLA report fan-out.
//!
//! One SLA report needs `2 + 2 * units` backend queries: violations at the
//! request's granularity, the same query at granularity `all`, and one
//! hour-of-day plus one day-of-week query per SLA unit. They are independent
//! and are run concurrently up to `max_concurrent_queries`. The first
//! failure aborts the report; queries still in flight are dropped with it.

use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt, TryStreamExt};
use gather_core::error::CoreError;
use gather_core::request::{SlaReportRequest, GRANULARITY_ALL};
use gather_core::sla::decode::{decode_buckets, decode_granular, decode_totals, BucketViolations};
use gather_core::sla::report::SlaPartials;
use gather_core::sla::schema::{TimeBucket, ViolationSchema};
use gather_core::threshold_profile::SlaUnit;
use tokio_util::sync::CancellationToken;

use crate::backend::{guarded, MetricsBackend, ObjectScope, SlaQueryResult};
use crate::config::ReportConfig;
use crate::error::{QueryError, ReportError, ReportResult};

enum SlaQuery<'u> {
    Granular,
    Totals,
    Buckets(&'u SlaUnit, TimeBucket),
}

enum SlaResponse {
    Granular(SlaQueryResult),
    Totals(SlaQueryResult),
    Buckets(TimeBucket, SlaQueryResult),
}

/// Raw bucket responses of every unit for one bucket kind, with their
/// schemas merged.
struct BucketBatch {
    bucket: TimeBucket,
    schema: ViolationSchema,
    raws: Vec<Vec<u8>>,
}

impl BucketBatch {
    fn new(bucket: TimeBucket) -> Self {
        Self {
            bucket,
            schema: ViolationSchema::new(),
            raws: Vec::new(),
        }
    }

    fn add(&mut self, response: SlaQueryResult) {
        let collisions = self.schema.merge(response.schema);
        if !collisions.is_empty() {
            tracing::warn!(
                bucket = %self.bucket,
                keys = ?collisions,
                "SLA schema keys collided across units"
            );
        }
        self.raws.push(response.raw);
    }

    fn decode(&self) -> ReportResult<BucketViolations> {
        Ok(decode_buckets(&self.raws, &self.schema, self.bucket)?)
    }
}

/// Collects the four SLA partials for one request.
pub struct SlaReportGenerator<'a> {
    backend: &'a dyn MetricsBackend,
    max_concurrent_queries: usize,
    query_timeout: Duration,
}

impl<'a> SlaReportGenerator<'a> {
    pub fn new(backend: &'a dyn MetricsBackend, config: &ReportConfig) -> Self {
        Self {
            backend,
            max_concurrent_queries: config.max_concurrent_queries.max(1),
            query_timeout: config.query_timeout,
        }
    }

    /// Run every SLA sub-query for `units` and decode the responses.
    pub async fn collect_partials(
        &self,
        request: &SlaReportRequest,
        units: &[SlaUnit],
        scope: ObjectScope<'_>,
        cancel: &CancellationToken,
    ) -> ReportResult<SlaPartials> {
        let totals_request = request.with_granularity(GRANULARITY_ALL);

        let mut queries = vec![SlaQuery::Granular, SlaQuery::Totals];
        for bucket in TimeBucket::ALL {
            queries.extend(units.iter().map(|unit| SlaQuery::Buckets(unit, bucket)));
        }
        let query_count = queries.len();
        let started = Instant::now();

        tracing::debug!(
            units = units.len(),
            queries = query_count,
            max_concurrent = self.max_concurrent_queries,
            "Starting SLA sub-queries"
        );

        let responses: Vec<SlaResponse> = stream::iter(queries)
            .map(|query| self.run(query, request, &totals_request, units, scope, cancel))
            .buffer_unordered(self.max_concurrent_queries)
            .try_collect()
            .await
            .map_err(as_internal)?;

        tracing::debug!(
            queries = query_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "SLA sub-queries complete"
        );

        let mut granular = None;
        let mut totals = None;
        let mut by_hour = BucketBatch::new(TimeBucket::HourOfDay);
        let mut by_day = BucketBatch::new(TimeBucket::DayOfWeek);

        for response in responses {
            match response {
                SlaResponse::Granular(r) => granular = Some(decode_granular(&r.raw, &r.schema)?),
                SlaResponse::Totals(r) => totals = Some(decode_totals(&r.raw, &r.schema)?),
                SlaResponse::Buckets(TimeBucket::HourOfDay, r) => by_hour.add(r),
                SlaResponse::Buckets(TimeBucket::DayOfWeek, r) => by_day.add(r),
            }
        }

        Ok(SlaPartials {
            granular: granular
                .ok_or_else(|| CoreError::Internal("missing granular SLA response".to_string()))?,
            totals: totals
                .ok_or_else(|| CoreError::Internal("missing SLA totals response".to_string()))?,
            by_hour_of_day: by_hour.decode()?,
            by_day_of_week: by_day.decode()?,
        })
    }

    async fn run(
        &self,
        query: SlaQuery<'_>,
        request: &SlaReportRequest,
        totals_request: &SlaReportRequest,
        units: &[SlaUnit],
        scope: ObjectScope<'_>,
        cancel: &CancellationToken,
    ) -> ReportResult<SlaResponse> {
        match query {
            SlaQuery::Granular => guarded(
                "SLA violations",
                cancel,
                self.query_timeout,
                self.backend.sla_violations(request, units, scope),
            )
            .await
            .map(SlaResponse::Granular),
            SlaQuery::Totals => guarded(
                "SLA violation totals",
                cancel,
                self.query_timeout,
                self.backend.sla_violations(totals_request, units, scope),
            )
            .await
            .map(SlaResponse::Totals),
            SlaQuery::Buckets(unit, bucket) => {
                tracing::debug!(
                    vendor = %unit.vendor,
                    object_type = %unit.object_type,
                    metric = %unit.metric,
                    direction = %unit.direction,
                    %bucket,
                    "Querying SLA time buckets"
                );
                guarded(
                    "SLA time buckets",
                    cancel,
                    self.query_timeout,
                    self.backend.sla_time_buckets(request, unit, bucket, scope),
                )
                .await
                .map(|r| SlaResponse::Buckets(bucket, r))
            }
        }
    }
}

/// Any SLA sub-query failure is an internal failure of the report, including
/// a collaborator's `NotFound`.
fn as_internal(err: ReportError) -> ReportError {
    match err {
        ReportError::Upstream {
            operation,
            source: source @ QueryError::NotFound { .. },
        } => ReportError::Upstream {
            operation,
            source: QueryError::Failed(source.to_string()),
        },
        other => other,
    }
}
