//! Async report service on top of `gather-core`.
//!
//! Owns the collaborator seams (metrics backend, threshold profile store,
//! monitored-object filter), query timeouts and cancellation, the SLA
//! fan-out, and the service-level error type.

pub mod backend;
pub mod config;
pub mod error;
pub mod service;
pub mod sla;

pub use config::ReportConfig;
pub use error::{ReportError, ReportResult};
pub use service::ReportService;
