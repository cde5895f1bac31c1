//! Report envelope: `{ "data": { "id", "type", "attributes" } }`.
//!
//! Every rendered report leaves the engine wrapped in a [`ReportEnvelope`].
//! Attributes come in two layouts:
//!
//! - [`ReportAttributes`]: request fields inlined next to `result`
//!   (aggregate metrics, histograms, top-N).
//! - [`ConfiguredReport`]: request nested under `config`
//!   (threshold crossings, SLA reports).

use serde::Serialize;

use crate::error::CoreError;

/// Standard `{ "data": T }` envelope for one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEnvelope<A: Serialize> {
    pub data: ReportData<A>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportData<A: Serialize> {
    pub id: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub attributes: A,
}

/// Request fields flattened alongside the rendered `result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportAttributes<C: Serialize, R: Serialize> {
    #[serde(flatten)]
    pub config: C,
    pub result: R,
}

/// Request kept whole under `config`, next to the rendered `result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfiguredReport<C: Serialize, R: Serialize> {
    pub config: C,
    pub result: R,
}

/// Wrap attributes with an id and a type tag.
pub fn wrap<A: Serialize>(id: impl Into<String>, report_type: &str, attributes: A) -> ReportEnvelope<A> {
    ReportEnvelope {
        data: ReportData {
            id: id.into(),
            report_type: report_type.to_string(),
            attributes,
        },
    }
}

/// Fresh report id (UUID v4).
pub fn new_report_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Wrap `result` with the request inlined, under a fresh id.
pub fn render_report<C: Serialize, R: Serialize>(
    report_type: &str,
    config: C,
    result: R,
) -> ReportEnvelope<ReportAttributes<C, R>> {
    wrap(new_report_id(), report_type, ReportAttributes { config, result })
}

impl<A: Serialize> ReportEnvelope<A> {
    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn report_type(&self) -> &str {
        &self.data.report_type
    }

    pub fn attributes(&self) -> &A {
        &self.data.attributes
    }

    /// Serialize for the response body. A payload that cannot be
    /// represented as JSON (e.g. a map with non-string keys) is an
    /// internal error.
    pub fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        serde_json::to_value(self)
            .map_err(|e| CoreError::Internal(format!("failed to serialize report: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Config {
        tenant_id: String,
        granularity: String,
    }

    fn config() -> Config {
        Config {
            tenant_id: "t1".into(),
            granularity: "PT1H".into(),
        }
    }

    #[test]
    fn wraps_payload_under_data() {
        let envelope = wrap("id-1", "histograms", json!({"result": []}));
        assert_eq!(
            envelope.to_json().unwrap(),
            json!({"data": {"id": "id-1", "type": "histograms", "attributes": {"result": []}}})
        );
    }

    #[test]
    fn render_report_inlines_config() {
        let envelope = render_report("aggregateMetrics", config(), vec![1, 2]);
        let value = envelope.to_json().unwrap();

        assert_eq!(value["data"]["type"], json!("aggregateMetrics"));
        assert_eq!(value["data"]["attributes"]["tenantId"], json!("t1"));
        assert_eq!(value["data"]["attributes"]["result"], json!([1, 2]));
        assert_eq!(envelope.id().len(), 36);
    }

    #[test]
    fn configured_report_nests_config() {
        let envelope = wrap(
            "id-2",
            "thresholdCrossings",
            ConfiguredReport {
                config: config(),
                result: json!({}),
            },
        );
        let value = envelope.to_json().unwrap();
        assert_eq!(value["data"]["attributes"]["config"]["granularity"], json!("PT1H"));
    }

    #[test]
    fn report_ids_are_unique() {
        assert_ne!(new_report_id(), new_report_id());
    }

    #[test]
    fn unrepresentable_payload_is_internal_error() {
        let mut bad = BTreeMap::new();
        bad.insert(vec![1_u8], 1);
        assert_matches!(wrap("x", "t", bad).to_json(), Err(CoreError::Internal(_)));
    }
}
