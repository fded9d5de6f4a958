//! Live-object aggregation over a frame range.
//!
//! A single background worker recomputes per-type and per-callstack totals.
//! Submitting a new range cancels the running computation and waits for it
//! to stop before the replacement starts, so at most one scan is ever active
//! and results can only arrive in submission order.

mod result;
mod scan;
mod worker;

pub use result::{render_type_report, AggregationResult, Generation, LiveGroup, Totals};
pub use scan::{aggregate_records, CancelToken, ProgressThrottle, ScanOutcome, ScanProgress};
pub use worker::{AggregationError, AggregationWorker, WorkerEvent, WorkerOutcome, WorkerState};
