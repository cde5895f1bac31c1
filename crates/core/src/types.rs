use std::collections::BTreeMap;

/// All parsed timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Monitored objects are identified by their string id in the analytics store.
pub type MonitoredObjectId = String;

/// Metadata criteria used to scope a query to a set of monitored objects,
/// e.g. `{"region": ["east", "west"]}`.
pub type MetaFilter = BTreeMap<String, Vec<String>>;

/// Parse an RFC 3339 timestamp as returned by the analytics store.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&chrono::Utc))
}
