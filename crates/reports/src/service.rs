//! Report service: validate, scope, query, render, wrap.
//!
//! Every method takes the caller's [`CancellationToken`]; cancelling it
//! abandons whatever collaborator call is in flight and returns
//! [`ReportError::Cancelled`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use gather_core::envelope::{
    new_report_id, render_report, wrap, ConfiguredReport, ReportAttributes, ReportEnvelope,
};
use gather_core::error::CoreError;
use gather_core::key_codec::DelimitedKeyCodec;
use gather_core::key_spec::{KeySpec, Labels};
use gather_core::render::histogram::{render_histogram, HistogramSeries};
use gather_core::render::severity::{regroup_by_metric, render_severities, MetricViolationGroup};
use gather_core::render::timeseries::{render_timeseries, SeriesEntry};
use gather_core::render::top_n::{order_top_n, RankedMetricEntry};
use gather_core::render::RenderContext;
use gather_core::report_types::{
    AGGREGATE_METRICS, HISTOGRAMS, SLA_REPORTS, THRESHOLD_CROSSINGS, THRESHOLD_CROSSING_BY_MO_TOP_NS,
    TOP_N_FOR_METRICS,
};
use gather_core::request::{
    MetricsRequest, SlaReportRequest, ThresholdCrossingRequest, TopNRequest, GRANULARITY_ALL,
};
use gather_core::sla::report::{SlaReport, SlaReportEnvelope};
use gather_core::threshold_profile::ThresholdProfile;
use gather_core::types::{MetaFilter, MonitoredObjectId};
use tokio_util::sync::CancellationToken;

use crate::backend::{guarded, MetricsBackend, MonitoredObjectFilter, ThresholdProfileStore};
use crate::config::ReportConfig;
use crate::error::{ReportError, ReportResult};
use crate::sla::SlaReportGenerator;

pub type TimeseriesReport = ReportEnvelope<ReportAttributes<MetricsRequest, Vec<SeriesEntry>>>;
pub type HistogramReport = ReportEnvelope<ReportAttributes<MetricsRequest, Vec<HistogramSeries>>>;
pub type ThresholdCrossingReport =
    ReportEnvelope<ConfiguredReport<ThresholdCrossingRequest, Vec<MetricViolationGroup>>>;
pub type TopNReport = ReportEnvelope<ReportAttributes<TopNRequest, Vec<RankedMetricEntry>>>;

/// Static label attached to every entry of a metadata-scoped report.
const MONITORED_OBJECT_IDS: &str = "monitoredObjectIds";

/// Generates every report type from its request.
pub struct ReportService {
    backend: Arc<dyn MetricsBackend>,
    profiles: Arc<dyn ThresholdProfileStore>,
    objects: Arc<dyn MonitoredObjectFilter>,
    codec: DelimitedKeyCodec,
    config: ReportConfig,
}

impl ReportService {
    pub fn new(
        backend: Arc<dyn MetricsBackend>,
        profiles: Arc<dyn ThresholdProfileStore>,
        objects: Arc<dyn MonitoredObjectFilter>,
        config: ReportConfig,
    ) -> Self {
        Self {
            backend,
            profiles,
            objects,
            codec: config.key_codec(),
            config,
        }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Timeseries reports
    // -----------------------------------------------------------------------

    #[tracing::instrument(skip_all, fields(tenant_id = %request.tenant_id))]
    pub async fn aggregate_metrics(
        &self,
        request: MetricsRequest,
        cancel: &CancellationToken,
    ) -> ReportResult<TimeseriesReport> {
        request.validate()?;
        let started = Instant::now();

        let scope = self.resolve_scope(&request.tenant_id, request.meta.as_ref(), cancel).await?;
        let result = guarded(
            "aggregate metrics",
            cancel,
            self.query_timeout(request.timeout()),
            self.backend.aggregate_metrics(&request, scope.as_deref()),
        )
        .await?;

        let ctx = self.render_context(&result.key_spec, scope.as_deref());
        let rendered: Vec<SeriesEntry> = render_timeseries(&ctx, &result.rows).into_values().collect();

        log_rendered(AGGREGATE_METRICS, rendered.len(), started);
        Ok(render_report(AGGREGATE_METRICS, request, rendered))
    }

    #[tracing::instrument(skip_all, fields(tenant_id = %request.tenant_id))]
    pub async fn histogram(
        &self,
        request: MetricsRequest,
        cancel: &CancellationToken,
    ) -> ReportResult<HistogramReport> {
        request.validate()?;
        let started = Instant::now();

        let scope = self.resolve_scope(&request.tenant_id, request.meta.as_ref(), cancel).await?;
        let result = guarded(
            "histogram",
            cancel,
            self.query_timeout(request.timeout()),
            self.backend.histogram(&request, scope.as_deref()),
        )
        .await?;

        let ctx = self.render_context(&result.key_spec, scope.as_deref());
        let rendered: Vec<HistogramSeries> = render_histogram(&ctx, &result.rows)
            .inspect_err(|e| tracing::error!(error = %e, "Unable to render histogram report"))?
            .into_values()
            .collect();

        log_rendered(HISTOGRAMS, rendered.len(), started);
        Ok(render_report(HISTOGRAMS, request, rendered))
    }

    #[tracing::instrument(skip_all, fields(
        tenant_id = %request.tenant_id,
        threshold_profile_id = %request.threshold_profile_id,
    ))]
    pub async fn threshold_crossing(
        &self,
        request: ThresholdCrossingRequest,
        cancel: &CancellationToken,
    ) -> ReportResult<ThresholdCrossingReport> {
        request.validate()?;
        let started = Instant::now();

        let profile = self
            .threshold_profile(&request.tenant_id, &request.threshold_profile_id, cancel)
            .await?;
        let scope = self.resolve_scope(&request.tenant_id, request.meta.as_ref(), cancel).await?;
        let result = guarded(
            "threshold crossings",
            cancel,
            self.query_timeout(request.timeout()),
            self.backend.threshold_crossing(&request, &profile, scope.as_deref()),
        )
        .await?;

        let ctx = RenderContext::new(&result.key_spec, &self.codec);
        let rendered = regroup_by_metric(&request.metrics, &render_severities(&ctx, &result.rows));

        log_rendered(THRESHOLD_CROSSINGS, rendered.len(), started);
        Ok(wrap(
            new_report_id(),
            THRESHOLD_CROSSINGS,
            ConfiguredReport {
                config: request,
                result: rendered,
            },
        ))
    }

    // -----------------------------------------------------------------------
    // Top-N reports
    // -----------------------------------------------------------------------

    #[tracing::instrument(skip_all, fields(tenant_id = %request.tenant_id, metric = %request.metric.metric))]
    pub async fn top_n_for_metric(
        &self,
        request: TopNRequest,
        cancel: &CancellationToken,
    ) -> ReportResult<TopNReport> {
        request.validate()?;
        let started = Instant::now();

        let scope = self.resolve_scope(&request.tenant_id, request.meta.as_ref(), cancel).await?;
        let ranked = guarded(
            "top N for metric",
            cancel,
            self.query_timeout(request.timeout()),
            self.backend.top_n_for_metric(&request, scope.as_deref()),
        )
        .await?;

        let rendered = order_top_n(ranked, &request.metric, request.sort_order.is_descending());

        log_rendered(TOP_N_FOR_METRICS, rendered.len(), started);
        Ok(render_report(TOP_N_FOR_METRICS, request, rendered))
    }

    /// Monitored objects ranked by threshold crossings. Always computed over
    /// the whole interval: the request's granularity is replaced by `all`.
    #[tracing::instrument(skip_all, fields(tenant_id = %request.tenant_id, metric = %request.metric.metric))]
    pub async fn threshold_crossing_top_n(
        &self,
        request: TopNRequest,
        cancel: &CancellationToken,
    ) -> ReportResult<TopNReport> {
        request.validate()?;
        let profile_id = request
            .threshold_profile_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| CoreError::Validation("thresholdProfileId is required".to_string()))?;
        let request = TopNRequest {
            granularity: Some(GRANULARITY_ALL.to_string()),
            ..request
        };
        let started = Instant::now();

        let profile = self.threshold_profile(&request.tenant_id, &profile_id, cancel).await?;
        let scope = self.resolve_scope(&request.tenant_id, request.meta.as_ref(), cancel).await?;
        let ranked = guarded(
            "threshold crossings by monitored object",
            cancel,
            self.query_timeout(request.timeout()),
            self.backend.threshold_crossing_top_n(&request, &profile, scope.as_deref()),
        )
        .await?;

        let rendered = order_top_n(ranked, &request.metric, request.sort_order.is_descending());

        log_rendered(THRESHOLD_CROSSING_BY_MO_TOP_NS, rendered.len(), started);
        Ok(render_report(THRESHOLD_CROSSING_BY_MO_TOP_NS, request, rendered))
    }

    // -----------------------------------------------------------------------
    // SLA reports
    // -----------------------------------------------------------------------

    /// Build an SLA report over every `sla` threshold of the request's
    /// profile (restricted to `metrics` when given).
    ///
    /// The request's `timeout` bounds the whole report; the configured SLA
    /// timeout applies when it is unset. Any failed sub-query fails the
    /// report.
    #[tracing::instrument(skip_all, fields(
        tenant_id = %request.tenant_id,
        threshold_profile_id = %request.threshold_profile_id,
    ))]
    pub async fn sla_report(
        &self,
        request: SlaReportRequest,
        cancel: &CancellationToken,
    ) -> ReportResult<SlaReportEnvelope> {
        request.validate()?;
        let started = Instant::now();

        let profile = self
            .threshold_profile(&request.tenant_id, &request.threshold_profile_id, cancel)
            .await?;
        let units = profile.sla_units(&request.metrics)?;
        if units.is_empty() {
            return Err(CoreError::Validation(format!(
                "Threshold profile {} has no SLA thresholds for the requested metrics",
                request.threshold_profile_id
            ))
            .into());
        }

        let scope = self.resolve_scope(&request.tenant_id, request.meta.as_ref(), cancel).await?;
        let timeout = request.timeout().unwrap_or(self.config.sla_timeout);
        let generator = SlaReportGenerator::new(self.backend.as_ref(), &self.config);

        let partials = match tokio::time::timeout(
            timeout,
            generator.collect_partials(&request, &units, scope.as_deref(), cancel),
        )
        .await
        {
            Ok(Ok(partials)) => partials,
            Ok(Err(e)) => {
                tracing::error!(error = %e, units = units.len(), "SLA report generation failed");
                return Err(e);
            }
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                tracing::error!(timeout_ms, units = units.len(), "SLA report generation timed out");
                return Err(ReportError::TimedOut {
                    operation: "SLA report",
                    timeout_ms,
                });
            }
        };

        let report = SlaReport::new(request, partials.merge());
        tracing::info!(
            report_type = SLA_REPORTS,
            report_id = %report.id,
            units = units.len(),
            metrics = report.result.metric.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Report rendered"
        );
        Ok(report.into_envelope())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn query_timeout(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(self.config.query_timeout)
    }

    async fn threshold_profile(
        &self,
        tenant_id: &str,
        profile_id: &str,
        cancel: &CancellationToken,
    ) -> ReportResult<ThresholdProfile> {
        guarded(
            "threshold profile",
            cancel,
            self.config.query_timeout,
            self.profiles.get_threshold_profile(tenant_id, profile_id),
        )
        .await
    }

    /// Monitored objects matching `meta`, or `None` when the request has no
    /// metadata filter.
    async fn resolve_scope(
        &self,
        tenant_id: &str,
        meta: Option<&MetaFilter>,
        cancel: &CancellationToken,
    ) -> ReportResult<Option<Vec<MonitoredObjectId>>> {
        let Some(meta) = meta else {
            return Ok(None);
        };

        let ids = guarded(
            "monitored objects",
            cancel,
            self.config.query_timeout,
            self.objects.filter_monitored_objects(tenant_id, meta),
        )
        .await?;

        tracing::debug!(?meta, count = ids.len(), "Resolved monitored objects for metadata filter");
        Ok(Some(ids))
    }

    fn render_context<'a>(
        &'a self,
        key_spec: &'a KeySpec,
        scope: Option<&[MonitoredObjectId]>,
    ) -> RenderContext<'a> {
        let ctx = RenderContext::new(key_spec, &self.codec);
        match scope {
            Some(ids) => {
                let mut labels = Labels::new();
                labels.insert(MONITORED_OBJECT_IDS.to_string(), serde_json::json!(ids));
                ctx.with_static_labels(labels)
            }
            None => ctx,
        }
    }
}

fn log_rendered(report_type: &str, entries: usize, started: Instant) {
    tracing::info!(
        report_type,
        entries,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Report rendered"
    );
}
