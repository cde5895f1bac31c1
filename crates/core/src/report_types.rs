//! Report type tags carried in the envelope's `type` field.

pub const AGGREGATE_METRICS: &str = "aggregateMetrics";
pub const HISTOGRAMS: &str = "histograms";
pub const THRESHOLD_CROSSINGS: &str = "thresholdCrossings";
pub const TOP_N_FOR_METRICS: &str = "topNForMetrics";
pub const THRESHOLD_CROSSING_BY_MO_TOP_NS: &str = "thresholdCrossingByMOTopNs";
pub const SLA_REPORTS: &str = "slaReports";

