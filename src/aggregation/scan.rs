use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{AggregationResult, Generation};
use crate::source::{LiveObjectRecord, TraceError};
use crate::timeline::FrameRange;

/// Cooperative cancellation flag shared between the control thread and a
/// worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, not yet cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Limits progress reports to roughly `steps` per scan.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    total: usize,
    step: usize,
    reported: usize,
}

impl ProgressThrottle {
    /// Throttle for `total` units of work split into `steps` reports.
    pub fn new(total: usize, steps: usize) -> Self {
        let steps = steps.max(1);
        Self {
            total,
            step: ((total + steps - 1) / steps).max(1),
            reported: 0,
        }
    }

    /// Total units of work.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns `current` when it crosses into a new step.
    pub fn advance(&mut self, current: usize) -> Option<usize> {
        let bucket = current / self.step;
        if bucket > self.reported {
            self.reported = bucket;
            Some(current)
        } else {
            None
        }
    }
}

/// Progress notification emitted by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanProgress {
    /// First report; carries the size of the work so indicators can be set up.
    Started {
        /// Records to scan.
        total: usize,
    },
    /// Records scanned so far.
    Advanced {
        /// Records scanned.
        current: usize,
        /// Records to scan.
        total: usize,
    },
}

/// How a scan ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every record was folded in.
    Completed(AggregationResult),
    /// The token was cancelled; partial totals are dropped.
    Cancelled {
        /// Records folded in before stopping.
        scanned: usize,
    },
}

/// Fold `records` into an [`AggregationResult`].
///
/// The token is polled every `check_interval` records, bounding cancellation
/// latency independently of the range size. A malformed record aborts the
/// scan with its error.
#[allow(clippy::too_many_arguments)]
pub fn aggregate_records<I>(
    generation: Generation,
    range: FrameRange,
    total: usize,
    records: I,
    cancel: &CancelToken,
    check_interval: usize,
    progress_steps: usize,
    report: &mut dyn FnMut(ScanProgress),
) -> Result<ScanOutcome, TraceError>
where
    I: IntoIterator<Item = Result<LiveObjectRecord, TraceError>>,
{
    let check_interval = check_interval.max(1);
    let mut throttle = ProgressThrottle::new(total, progress_steps);
    let mut result = AggregationResult::new(generation, range);
    let mut scanned = 0usize;

    report(ScanProgress::Started { total });

    for record in records {
        if scanned % check_interval == 0 && cancel.is_cancelled() {
            return Ok(ScanOutcome::Cancelled { scanned });
        }
        result.add(&record?);
        scanned += 1;
        if let Some(current) = throttle.advance(scanned) {
            report(ScanProgress::Advanced { current, total });
        }
    }

    if cancel.is_cancelled() {
        return Ok(ScanOutcome::Cancelled { scanned });
    }
    Ok(ScanOutcome::Completed(result))
}
