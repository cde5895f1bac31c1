use std::time::Duration;

use gather_core::key_codec::{DelimitedKeyCodec, DEFAULT_KEY_DELIMITER};

const DEFAULT_MAX_CONCURRENT_QUERIES: usize = 4;
const DEFAULT_QUERY_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SLA_TIMEOUT_MS: u64 = 30_000;

/// Report service configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Upper bound on SLA sub-queries in flight at once (default: `4`).
    pub max_concurrent_queries: usize,
    /// Timeout for one backend query (default: `10s`).
    pub query_timeout: Duration,
    /// Timeout for a whole SLA report when the request sets none
    /// (default: `30s`).
    pub sla_timeout: Duration,
    /// Delimiter between accessor and suffix in result keys (default: `::`).
    pub key_delimiter: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_concurrent_queries: DEFAULT_MAX_CONCURRENT_QUERIES,
            query_timeout: Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS),
            sla_timeout: Duration::from_millis(DEFAULT_SLA_TIMEOUT_MS),
            key_delimiter: DEFAULT_KEY_DELIMITER.to_string(),
        }
    }
}

impl ReportConfig {
    /// Load a local `.env` file if present, then read the environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default |
    /// |---------------------------------|---------|
    /// | `REPORT_MAX_CONCURRENT_QUERIES` | `4`     |
    /// | `REPORT_QUERY_TIMEOUT_MS`       | `10000` |
    /// | `SLA_REPORT_TIMEOUT_MS`         | `30000` |
    /// | `REPORT_KEY_DELIMITER`          | `::`    |
    ///
    /// Unparseable values keep the default and log a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ReportConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_concurrent_queries = parse_or(
            &lookup,
            "REPORT_MAX_CONCURRENT_QUERIES",
            DEFAULT_MAX_CONCURRENT_QUERIES,
        )
        .max(1);

        let query_timeout_ms = parse_or(&lookup, "REPORT_QUERY_TIMEOUT_MS", DEFAULT_QUERY_TIMEOUT_MS);
        let sla_timeout_ms = parse_or(&lookup, "SLA_REPORT_TIMEOUT_MS", DEFAULT_SLA_TIMEOUT_MS);

        let key_delimiter = lookup("REPORT_KEY_DELIMITER")
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_KEY_DELIMITER.to_string());

        Self {
            max_concurrent_queries,
            query_timeout: Duration::from_millis(query_timeout_ms),
            sla_timeout: Duration::from_millis(sla_timeout_ms),
            key_delimiter,
        }
    }

    pub fn key_codec(&self) -> DelimitedKeyCodec {
        DelimitedKeyCodec::new(self.key_delimiter.clone())
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(var = name, value = %raw, default = %default, "Invalid config value, using default");
            default
        }
    }
}
