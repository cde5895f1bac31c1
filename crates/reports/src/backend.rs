//! Collaborator seams of the report service.
//!
//! The service never builds store queries itself. It hands validated
//! requests to a [`MetricsBackend`], which returns rows plus the key spec
//! that names their columns (or raw SLA responses plus their schema).
//! Threshold profiles and metadata-to-object resolution come from
//! [`ThresholdProfileStore`] and [`MonitoredObjectFilter`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use gather_core::key_spec::KeySpec;
use gather_core::render::top_n::TopNEntry;
use gather_core::request::{MetricsRequest, SlaReportRequest, ThresholdCrossingRequest, TopNRequest};
use gather_core::series::TimeseriesRow;
use gather_core::sla::schema::{TimeBucket, ViolationSchema};
use gather_core::threshold_profile::{SlaUnit, ThresholdProfile};
use gather_core::types::{MetaFilter, MonitoredObjectId};
use tokio_util::sync::CancellationToken;

use crate::error::{QueryError, ReportError, ReportResult};

/// Rows of a timeseries-shaped query and the key spec naming their columns.
#[derive(Debug, Clone, Default)]
pub struct TimeseriesResult {
    pub rows: Vec<TimeseriesRow>,
    pub key_spec: KeySpec,
}

/// Raw SLA response and the schema to decode it with.
#[derive(Debug, Clone, Default)]
pub struct SlaQueryResult {
    pub raw: Vec<u8>,
    pub schema: ViolationSchema,
}

/// Monitored objects a query is restricted to. `None` when the request
/// carried no metadata filter.
pub type ObjectScope<'a> = Option<&'a [MonitoredObjectId]>;

/// Executes report queries against the analytics store.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    async fn aggregate_metrics(
        &self,
        request: &MetricsRequest,
        scope: ObjectScope<'_>,
    ) -> Result<TimeseriesResult, QueryError>;

    /// Rows keyed `"{accessor}{delimiter}{bucketIndex}"`.
    async fn histogram(
        &self,
        request: &MetricsRequest,
        scope: ObjectScope<'_>,
    ) -> Result<TimeseriesResult, QueryError>;

    /// Rows keyed `"{accessor}{delimiter}{severity}"`.
    async fn threshold_crossing(
        &self,
        request: &ThresholdCrossingRequest,
        profile: &ThresholdProfile,
        scope: ObjectScope<'_>,
    ) -> Result<TimeseriesResult, QueryError>;

    /// Entries already ranked by the store, extreme value first.
    async fn top_n_for_metric(
        &self,
        request: &TopNRequest,
        scope: ObjectScope<'_>,
    ) -> Result<Vec<TopNEntry>, QueryError>;

    async fn threshold_crossing_top_n(
        &self,
        request: &TopNRequest,
        profile: &ThresholdProfile,
        scope: ObjectScope<'_>,
    ) -> Result<Vec<TopNEntry>, QueryError>;

    /// Violation counts and durations for `units` at the request's
    /// granularity.
    async fn sla_violations(
        &self,
        request: &SlaReportRequest,
        units: &[SlaUnit],
        scope: ObjectScope<'_>,
    ) -> Result<SlaQueryResult, QueryError>;

    /// One unit's violation counts bucketed by hour of day or day of week.
    async fn sla_time_buckets(
        &self,
        request: &SlaReportRequest,
        unit: &SlaUnit,
        bucket: TimeBucket,
        scope: ObjectScope<'_>,
    ) -> Result<SlaQueryResult, QueryError>;
}

#[async_trait]
pub trait ThresholdProfileStore: Send + Sync {
    async fn get_threshold_profile(
        &self,
        tenant_id: &str,
        profile_id: &str,
    ) -> Result<ThresholdProfile, QueryError>;
}

#[async_trait]
pub trait MonitoredObjectFilter: Send + Sync {
    /// Ids of the tenant's monitored objects matching every `meta` criterion.
    async fn filter_monitored_objects(
        &self,
        tenant_id: &str,
        meta: &MetaFilter,
    ) -> Result<Vec<MonitoredObjectId>, QueryError>;
}

/// Run one collaborator call under `timeout`, abandoning it as soon as
/// `cancel` fires.
pub(crate) async fn guarded<T, F>(
    operation: &'static str,
    cancel: &CancellationToken,
    timeout: Duration,
    call: F,
) -> ReportResult<T>
where
    F: Future<Output = Result<T, QueryError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReportError::Cancelled),
        outcome = tokio::time::timeout(timeout, call) => match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(ReportError::Upstream { operation, source }),
            Err(_) => Err(ReportError::TimedOut {
                operation,
                timeout_ms: timeout.as_millis() as u64,
            }),
        },
    }
}
