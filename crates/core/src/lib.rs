//! Gather metrics report rendering core.
//!
//! Pure, synchronous transforms from analytics-store query results into
//! report documents:
//!
//! - [`render`]: per-metric time series, histogram reconstruction,
//!   threshold-crossing severity series and top-N presentation order.
//! - [`sla`]: SLA violation schema decoding and the merge of the four
//!   SLA partials into one report.
//! - [`envelope`]: the `{ "data": { id, type, attributes } }` wrapper every
//!   report is returned in.
//!
//! Nothing in this crate performs I/O. Query execution, profile lookup and
//! fan-out live in `gather-reports`.

pub mod envelope;
pub mod error;
pub mod key_codec;
pub mod key_spec;
pub mod metric;
pub mod render;
pub mod report_types;
pub mod request;
pub mod series;
pub mod sla;
pub mod threshold_profile;
pub mod types;
