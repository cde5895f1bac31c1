mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use gather_core::error::CoreError;
use gather_core::request::SlaReportRequest;
use gather_reports::error::{QueryError, StatusClass};
use gather_reports::{ReportConfig, ReportError};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::*;

fn request() -> SlaReportRequest {
    SlaReportRequest {
        tenant_id: TENANT.into(),
        interval: "2024-03-01T00:00:00Z/2024-03-02T00:00:00Z".into(),
        threshold_profile_id: PROFILE_ID.into(),
        granularity: "PT1H".into(),
        timezone: Some("UTC".into()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Merged report
// ---------------------------------------------------------------------------

#[tokio::test]
async fn report_has_one_entry_per_metric_name() {
    let h = harness(FakeBackend::default());

    let envelope = h
        .service
        .sla_report(request(), &CancellationToken::new())
        .await
        .unwrap();
    let value = envelope.to_json().unwrap();
    let attributes = &value["data"]["attributes"];

    assert_eq!(value["data"]["type"], json!("slaReports"));
    assert_eq!(attributes["config"]["thresholdProfileId"], json!(PROFILE_ID));

    let metrics = attributes["result"]["metric"].as_array().unwrap();
    assert_eq!(metrics.len(), 2);

    // Two delayP95 streams fold into one entry.
    let delay = &metrics[0];
    assert_eq!(delay["metric"], json!("delayP95"));
    assert_eq!(delay["vendor"], json!(["accedian", "cisco"]));
    assert_eq!(delay["direction"], json!(["0", "1"]));
    assert_eq!(delay["totals"]["violationCount"], json!(4.0));
    assert_eq!(delay["totals"]["violationDuration"], json!(120.0));
    assert_eq!(
        delay["byGranularity"],
        json!([
            {"timestamp": T0, "violationCount": 2.0},
            {"timestamp": T1, "violationCount": 2.0},
        ])
    );
    assert_eq!(delay["byHourPerDay"], json!([{"hourOfDay": 3, "violationCount": 2.0}]));
    assert_eq!(delay["byDayPerWeek"], json!([{"dayOfWeek": 2, "violationCount": 2.0}]));

    let jitter = &metrics[1];
    assert_eq!(jitter["metric"], json!("jitterP95"));
    assert_eq!(jitter["byHourPerDay"], json!([{"hourOfDay": 3, "violationCount": 1.0}]));
}

#[tokio::test]
async fn summary_carries_totals_and_compliance() {
    let h = harness(FakeBackend::default());

    let envelope = h
        .service
        .sla_report(request(), &CancellationToken::new())
        .await
        .unwrap();
    let summary = &envelope.attributes().result.summary;

    assert_eq!(summary.totals["totalDuration"], 10800.0);
    assert_eq!(summary.totals["totalViolationDuration"], 180.0);
    assert_eq!(summary.totals["objectCount"], 3.0);

    let compliance = summary.sla_compliance_percent.unwrap();
    assert!((compliance - (10800.0 - 180.0) / 10800.0 * 100.0).abs() < 1e-9);

    let timestamps: Vec<_> = summary
        .by_granularity
        .iter()
        .map(|s| s.timestamp.as_deref().unwrap())
        .collect();
    assert_eq!(timestamps, vec![T0, T1]);
    assert_eq!(summary.by_granularity[0].get("totalViolationCount"), Some(3.0));
}

#[tokio::test]
async fn issues_two_violation_queries_and_two_bucket_queries_per_unit() {
    let h = harness(FakeBackend::default());

    h.service
        .sla_report(request(), &CancellationToken::new())
        .await
        .unwrap();

    let calls = h.backend.calls();
    assert_eq!(calls.iter().filter(|c| *c == "sla_violations").count(), 2);
    assert_eq!(calls.iter().filter(|c| *c == "sla_time_buckets").count(), 6);
}

#[tokio::test]
async fn metric_whitelist_restricts_units() {
    let h = harness(FakeBackend::default());
    let request = SlaReportRequest {
        metrics: vec!["jitterP95".into()],
        ..request()
    };

    let envelope = h
        .service
        .sla_report(request, &CancellationToken::new())
        .await
        .unwrap();

    let metrics = &envelope.attributes().result.metric;
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].streams.metric, "jitterP95");
    assert_eq!(
        h.backend.calls().iter().filter(|c| *c == "sla_time_buckets").count(),
        2
    );
}

#[tokio::test]
async fn metadata_scope_reaches_every_sub_query() {
    let h = harness(FakeBackend::default());
    let request = SlaReportRequest {
        meta: Some(meta("region", "east")),
        ..request()
    };

    h.service
        .sla_report(request, &CancellationToken::new())
        .await
        .unwrap();

    let scopes = h.backend.scopes.lock().unwrap().clone();
    assert_eq!(scopes.len(), 8);
    assert!(scopes
        .iter()
        .all(|s| s.as_deref() == Some(&["mo-1".to_string(), "mo-2".to_string()][..])));
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_failed_sub_query_fails_the_report() {
    let h = harness(FakeBackend {
        fail_sla_metric: Some("jitterP95".into()),
        ..Default::default()
    });

    let err = h
        .service
        .sla_report(request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ReportError::Upstream {
            operation: "SLA time buckets",
            source: QueryError::Failed(_),
        }
    );
    assert_eq!(err.status_class(), StatusClass::Internal);
}

#[tokio::test]
async fn not_found_sub_query_fails_as_internal() {
    let h = harness(FakeBackend {
        fail_sla_metric: Some("delayP95".into()),
        fail_sla_not_found: true,
        ..Default::default()
    });

    let err = h
        .service
        .sla_report(request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ReportError::Upstream {
            operation: "SLA time buckets",
            source: QueryError::Failed(_),
        }
    );
    assert_eq!(err.status_class(), StatusClass::Internal);
}

#[tokio::test(start_paused = true)]
async fn concurrency_is_capped() {
    let config = ReportConfig {
        max_concurrent_queries: 2,
        ..Default::default()
    };
    let h = harness_with(
        FakeBackend {
            sla_delay: Some(Duration::from_millis(20)),
            ..Default::default()
        },
        Some(sla_profile()),
        config,
    );

    h.service
        .sla_report(request(), &CancellationToken::new())
        .await
        .unwrap();

    let max = h.backend.max_in_flight.load(std::sync::atomic::Ordering::SeqCst);
    assert!(max <= 2, "max in flight was {max}");
    assert!(max >= 1);
}

#[tokio::test(start_paused = true)]
async fn request_timeout_bounds_the_whole_report() {
    let h = harness(FakeBackend {
        sla_delay: Some(Duration::from_secs(5)),
        ..Default::default()
    });
    let request = SlaReportRequest {
        timeout: Some(100),
        ..request()
    };

    let err = h
        .service
        .sla_report(request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(
        err,
        ReportError::TimedOut {
            operation: "SLA report",
            timeout_ms: 100,
        }
    );
}

#[tokio::test]
async fn cancelled_request_is_abandoned() {
    let h = harness(FakeBackend::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h.service.sla_report(request(), &cancel).await.unwrap_err();

    assert_matches!(err, ReportError::Cancelled);
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn unknown_profile_is_not_found() {
    let h = harness_with(FakeBackend::default(), None, ReportConfig::default());

    let err = h
        .service
        .sla_report(request(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status_class(), StatusClass::NotFound);
}

#[tokio::test]
async fn profile_without_sla_thresholds_is_rejected() {
    let h = harness(FakeBackend::default());
    let request = SlaReportRequest {
        metrics: vec!["packetLoss".into()],
        ..request()
    };

    let err = h
        .service
        .sla_report(request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(err, ReportError::Core(CoreError::Validation(_)));
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn invalid_request_is_rejected_before_any_query() {
    let h = harness(FakeBackend::default());
    let request = SlaReportRequest {
        interval: String::new(),
        ..request()
    };

    let err = h
        .service
        .sla_report(request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status_class(), StatusClass::BadRequest);
    assert!(h.backend.calls().is_empty());
}
