//! SLA report building blocks.
//!
//! An SLA report is assembled from four independently queried partials:
//! violations at the requested granularity, totals over the whole interval,
//! and the hour-of-day and day-of-week breakdowns. [`schema`] describes the
//! response keys of those queries, [`decode`] turns each raw response into a
//! partial, and [`report`] merges the partials into the final document.

pub mod decode;
pub mod report;
pub mod schema;
