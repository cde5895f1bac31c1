//! Shared fixtures for report service integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gather_core::render::top_n::TopNEntry;
use gather_core::request::{
    MetricsRequest, SlaReportRequest, ThresholdCrossingRequest, TopNRequest, GRANULARITY_ALL,
};
use gather_core::sla::schema::{TimeBucket, ViolationSchema};
use gather_core::threshold_profile::{SlaUnit, ThresholdProfile};
use gather_core::types::{MetaFilter, MonitoredObjectId};
use gather_reports::backend::{
    MetricsBackend, MonitoredObjectFilter, ObjectScope, SlaQueryResult, ThresholdProfileStore,
    TimeseriesResult,
};
use gather_reports::error::QueryError;
use gather_reports::{ReportConfig, ReportService};
use serde_json::json;

pub const TENANT: &str = "tenant-1";
pub const PROFILE_ID: &str = "tp-1";
pub const T0: &str = "2024-03-01T00:00:00Z";
pub const T1: &str = "2024-03-01T01:00:00Z";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Metrics backend
// ---------------------------------------------------------------------------

/// In-memory backend. Timeseries-shaped queries return canned results; SLA
/// queries synthesize responses from the units they are asked about.
#[derive(Default)]
pub struct FakeBackend {
    pub timeseries: TimeseriesResult,
    pub histogram: TimeseriesResult,
    pub crossings: TimeseriesResult,
    pub top_n: Vec<TopNEntry>,
    /// SLA time-bucket queries for this metric fail.
    pub fail_sla_metric: Option<String>,
    /// Failing time-bucket queries report `NotFound` instead of `Failed`.
    pub fail_sla_not_found: bool,
    /// Every SLA query sleeps this long first.
    pub sla_delay: Option<Duration>,

    pub calls: Mutex<Vec<String>>,
    pub scopes: Mutex<Vec<Option<Vec<MonitoredObjectId>>>>,
    pub top_n_granularities: Mutex<Vec<Option<String>>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeBackend {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str, scope: ObjectScope<'_>) {
        self.calls.lock().unwrap().push(call.to_string());
        self.scopes.lock().unwrap().push(scope.map(<[_]>::to_vec));
    }

    async fn sla_call<T>(&self, f: impl FnOnce() -> Result<T, QueryError>) -> Result<T, QueryError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.sla_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        f()
    }
}

#[async_trait]
impl MetricsBackend for FakeBackend {
    async fn aggregate_metrics(
        &self,
        _request: &MetricsRequest,
        scope: ObjectScope<'_>,
    ) -> Result<TimeseriesResult, QueryError> {
        self.record("aggregate_metrics", scope);
        Ok(self.timeseries.clone())
    }

    async fn histogram(
        &self,
        _request: &MetricsRequest,
        scope: ObjectScope<'_>,
    ) -> Result<TimeseriesResult, QueryError> {
        self.record("histogram", scope);
        Ok(self.histogram.clone())
    }

    async fn threshold_crossing(
        &self,
        _request: &ThresholdCrossingRequest,
        _profile: &ThresholdProfile,
        scope: ObjectScope<'_>,
    ) -> Result<TimeseriesResult, QueryError> {
        self.record("threshold_crossing", scope);
        Ok(self.crossings.clone())
    }

    async fn top_n_for_metric(
        &self,
        request: &TopNRequest,
        scope: ObjectScope<'_>,
    ) -> Result<Vec<TopNEntry>, QueryError> {
        self.record("top_n_for_metric", scope);
        self.top_n_granularities.lock().unwrap().push(request.granularity.clone());
        Ok(self.top_n.clone())
    }

    async fn threshold_crossing_top_n(
        &self,
        request: &TopNRequest,
        _profile: &ThresholdProfile,
        scope: ObjectScope<'_>,
    ) -> Result<Vec<TopNEntry>, QueryError> {
        self.record("threshold_crossing_top_n", scope);
        self.top_n_granularities.lock().unwrap().push(request.granularity.clone());
        Ok(self.top_n.clone())
    }

    async fn sla_violations(
        &self,
        request: &SlaReportRequest,
        units: &[SlaUnit],
        scope: ObjectScope<'_>,
    ) -> Result<SlaQueryResult, QueryError> {
        self.record("sla_violations", scope);
        let all = request.granularity == GRANULARITY_ALL;
        self.sla_call(|| Ok(sla_violations_response(units, all))).await
    }

    async fn sla_time_buckets(
        &self,
        _request: &SlaReportRequest,
        unit: &SlaUnit,
        bucket: TimeBucket,
        scope: ObjectScope<'_>,
    ) -> Result<SlaQueryResult, QueryError> {
        self.record("sla_time_buckets", scope);
        let fail = self.fail_sla_metric.as_deref() == Some(unit.metric.as_str());
        self.sla_call(|| {
            if fail && self.fail_sla_not_found {
                return Err(QueryError::NotFound {
                    entity: "datasource",
                    id: unit.metric.clone(),
                });
            }
            if fail {
                return Err(QueryError::Failed(format!("store rejected {} query", unit.metric)));
            }
            Ok(sla_bucket_response(unit, bucket))
        })
        .await
    }
}

/// Per unit: 2 violations, 60s violated out of 3600s over the interval;
/// one violation per unit in each of the two granular buckets. Granular
/// entries come back newest first.
pub fn sla_violations_response(units: &[SlaUnit], all: bool) -> SlaQueryResult {
    let n = units.len() as u64;
    let raw = if all {
        let mut result = serde_json::Map::new();
        for unit in units {
            let prefix = unit.key_prefix();
            result.insert(format!("{prefix}.violationCount"), json!(2));
            result.insert(format!("{prefix}.violationDuration"), json!(60));
            result.insert(format!("{prefix}.totalDuration"), json!(3600));
        }
        result.insert("objectCount".into(), json!(n));
        result.insert("totalViolationCount".into(), json!(2 * n));
        result.insert("totalViolationDuration".into(), json!(60 * n));
        result.insert("totalDuration".into(), json!(3600 * n));
        json!([{"timestamp": T0, "result": result}])
    } else {
        let entry = |ts: &str| {
            let mut result = serde_json::Map::new();
            for unit in units {
                result.insert(format!("{}.violationCount", unit.key_prefix()), json!(1));
            }
            result.insert("totalViolationCount".into(), json!(n));
            json!({"timestamp": ts, "result": result})
        };
        json!([entry(T1), entry(T0)])
    };

    SlaQueryResult {
        raw: serde_json::to_vec(&raw).unwrap(),
        schema: ViolationSchema::for_violations(units),
    }
}

/// One violation per unit, at hour `03` or on day `2`.
pub fn sla_bucket_response(unit: &SlaUnit, bucket: TimeBucket) -> SlaQueryResult {
    let prefix = unit.key_prefix();
    let label = match bucket {
        TimeBucket::HourOfDay => "03",
        TimeBucket::DayOfWeek => "2",
    };
    let raw = json!([{"timestamp": T0, "result": [{
        format!("{prefix}.{}", bucket.field_name()): label,
        format!("{prefix}.violationCount"): 1,
    }]}]);

    SlaQueryResult {
        raw: serde_json::to_vec(&raw).unwrap(),
        schema: ViolationSchema::for_time_bucket(unit, bucket),
    }
}

// ---------------------------------------------------------------------------
// Profile store / object filter
// ---------------------------------------------------------------------------

pub struct FakeProfiles {
    pub profile: Option<ThresholdProfile>,
}

#[async_trait]
impl ThresholdProfileStore for FakeProfiles {
    async fn get_threshold_profile(
        &self,
        _tenant_id: &str,
        profile_id: &str,
    ) -> Result<ThresholdProfile, QueryError> {
        self.profile
            .clone()
            .filter(|p| p.id == profile_id)
            .ok_or_else(|| QueryError::NotFound {
                entity: "ThresholdProfile",
                id: profile_id.to_string(),
            })
    }
}

pub struct FakeObjects {
    pub ids: Vec<MonitoredObjectId>,
}

#[async_trait]
impl MonitoredObjectFilter for FakeObjects {
    async fn filter_monitored_objects(
        &self,
        _tenant_id: &str,
        _meta: &MetaFilter,
    ) -> Result<Vec<MonitoredObjectId>, QueryError> {
        Ok(self.ids.clone())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// SLA on accedian/twamp-pe delayP95 and jitterP95 (direction 0) and on
/// cisco/twamp-sl delayP95 (direction 1). accedian delayP95 also has a
/// critical severity.
pub fn sla_profile() -> ThresholdProfile {
    serde_json::from_value(json!({
        "id": PROFILE_ID,
        "tenantId": TENANT,
        "name": "default",
        "thresholds": {"vendorMap": {
            "accedian": {"monitoredObjectTypeMap": {"twamp-pe": {"metricMap": {
                "delayP95": {"directionMap": {"0": {"eventMap": {
                    "critical": {"eventAttrMap": {"upperLimit": "50000"}},
                    "sla": {"eventAttrMap": {"upperLimit": "30000", "upperStrict": "true"}},
                }}}},
                "jitterP95": {"directionMap": {"0": {"eventMap": {
                    "sla": {"eventAttrMap": {"upperLimit": "5000", "unit": "us"}},
                }}}},
            }}}},
            "cisco": {"monitoredObjectTypeMap": {"twamp-sl": {"metricMap": {
                "delayP95": {"directionMap": {"1": {"eventMap": {
                    "sla": {"eventAttrMap": {"eventType": "baseline-percentage", "upperLimit": "20"}},
                }}}},
            }}}},
        }},
    }))
    .unwrap()
}

pub fn meta(key: &str, value: &str) -> MetaFilter {
    MetaFilter::from([(key.to_string(), vec![value.to_string()])])
}

pub struct Harness {
    pub service: ReportService,
    pub backend: Arc<FakeBackend>,
}

pub fn harness(backend: FakeBackend) -> Harness {
    harness_with(backend, Some(sla_profile()), ReportConfig::default())
}

pub fn harness_with(
    backend: FakeBackend,
    profile: Option<ThresholdProfile>,
    config: ReportConfig,
) -> Harness {
    init_tracing();
    let backend = Arc::new(backend);
    let service = ReportService::new(
        backend.clone(),
        Arc::new(FakeProfiles { profile }),
        Arc::new(FakeObjects {
            ids: vec!["mo-1".to_string(), "mo-2".to_string()],
        }),
        config,
    );
    Harness { service, backend }
}
