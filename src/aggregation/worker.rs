use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::scan::{aggregate_records, CancelToken, ScanOutcome, ScanProgress};
use super::{AggregationResult, Generation};
use crate::source::{TraceError, TraceSource};
use crate::timeline::FrameRange;

/// Faults of a single aggregation. None of them are fatal to the explorer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggregationError {
    /// The trace yielded a record that could not be decoded.
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// The worker thread could not be started.
    #[error("failed to spawn aggregation worker: {0}")]
    Spawn(String),

    /// The worker thread panicked.
    #[error("aggregation worker for generation {generation} panicked")]
    Panicked {
        /// Generation the worker was computing.
        generation: Generation,
    },
}

/// Notification sent from a worker to the control thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Scan started; `total` records will be visited.
    Started {
        /// Request being computed.
        generation: Generation,
        /// Frames being scanned.
        range: FrameRange,
        /// Records to scan.
        total: usize,
    },
    /// Throttled progress.
    Progress {
        /// Request being computed.
        generation: Generation,
        /// Records scanned so far.
        current: usize,
        /// Records to scan.
        total: usize,
    },
    /// Scan finished.
    Completed(Arc<AggregationResult>),
    /// Scan observed its cancellation request.
    Cancelled {
        /// Request that was dropped.
        generation: Generation,
    },
    /// Scan aborted on a fault.
    Failed {
        /// Request that failed.
        generation: Generation,
        /// What went wrong.
        error: AggregationError,
    },
}

impl WorkerEvent {
    /// Generation the event belongs to.
    pub fn generation(&self) -> Generation {
        match self {
            WorkerEvent::Started { generation, .. }
            | WorkerEvent::Progress { generation, .. }
            | WorkerEvent::Cancelled { generation }
            | WorkerEvent::Failed { generation, .. } => *generation,
            WorkerEvent::Completed(result) => result.generation,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerEvent::Completed(_) | WorkerEvent::Cancelled { .. } | WorkerEvent::Failed { .. }
        )
    }
}

/// Lifecycle of the worker slot.
///
/// A worker runs `Idle -> Running -> (completed | cancelled | failed)` and
/// is back to `Idle` as soon as its thread has been joined. How the last
/// worker ended is kept in [`AggregationWorker::last_outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// No computation in flight.
    #[default]
    Idle,
    /// A worker thread is scanning.
    Running {
        /// Request being computed.
        generation: Generation,
    },
}

/// How the most recent worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Scan finished and published its result.
    Completed(Generation),
    /// Scan was superseded or cancelled.
    Cancelled(Generation),
    /// Scan aborted on a fault.
    Failed(Generation),
}

struct ActiveWorker {
    generation: Generation,
    cancel: CancelToken,
    events: Receiver<WorkerEvent>,
    thread: JoinHandle<()>,
}

/// Single-flight aggregation slot.
///
/// Each worker gets its own channel. Replacing a worker drops the old
/// receiver after joining, so nothing from a cancelled worker is ever
/// observed once [`AggregationWorker::cancel_and_wait`] returns.
pub struct AggregationWorker {
    source: Arc<dyn TraceSource>,
    check_interval: usize,
    progress_steps: usize,
    latest: Generation,
    active: Option<ActiveWorker>,
    last_outcome: Option<WorkerOutcome>,
}

impl std::fmt::Debug for AggregationWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationWorker")
            .field("latest", &self.latest)
            .field("state", &self.state())
            .field("check_interval", &self.check_interval)
            .field("progress_steps", &self.progress_steps)
            .finish()
    }
}

impl AggregationWorker {
    /// Create an idle worker slot reading from `source`.
    pub fn new(source: Arc<dyn TraceSource>, check_interval: usize, progress_steps: usize) -> Self {
        Self {
            source,
            check_interval: check_interval.max(1),
            progress_steps: progress_steps.max(1),
            latest: 0,
            active: None,
            last_outcome: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        match &self.active {
            Some(active) => WorkerState::Running {
                generation: active.generation,
            },
            None => WorkerState::Idle,
        }
    }

    /// How the most recent worker ended, once it has been joined.
    pub fn last_outcome(&self) -> Option<WorkerOutcome> {
        self.last_outcome
    }

    /// Most recently submitted generation (0 before the first submit).
    pub fn latest_generation(&self) -> Generation {
        self.latest
    }

    /// Whether `generation` is the outstanding request.
    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.latest
    }

    /// Start aggregating `range`, superseding any running computation.
    ///
    /// Blocks until the previous worker has acknowledged its cancellation.
    pub fn submit(&mut self, range: FrameRange) -> Result<Generation, AggregationError> {
        self.latest += 1;
        let generation = self.latest;
        self.cancel_and_wait();

        let (tx, rx) = unbounded();
        let cancel = CancelToken::new();
        let source = Arc::clone(&self.source);
        let token = cancel.clone();
        let check_interval = self.check_interval;
        let progress_steps = self.progress_steps;

        let thread = thread::Builder::new()
            .name(format!("aggregation-{generation}"))
            .spawn(move || {
                run_worker(
                    source.as_ref(),
                    generation,
                    range,
                    &token,
                    check_interval,
                    progress_steps,
                    &tx,
                )
            })
            .map_err(|err| AggregationError::Spawn(err.to_string()))?;

        info!(generation, %range, "aggregation submitted");
        self.active = Some(ActiveWorker {
            generation,
            cancel,
            events: rx,
            thread,
        });
        Ok(generation)
    }

    /// Cancel the running worker, if any, and wait for its thread to exit.
    ///
    /// Returns the generation that was stopped.
    pub fn cancel_and_wait(&mut self) -> Option<Generation> {
        let active = self.active.take()?;
        let generation = active.generation;
        active.cancel.cancel();
        if active.thread.join().is_err() {
            warn!(generation, "aggregation worker panicked during cancellation");
        }
        drop(active.events);
        debug!(generation, "aggregation cancelled");
        self.last_outcome = Some(WorkerOutcome::Cancelled(generation));
        Some(generation)
    }

    /// Drain pending notifications without blocking.
    pub fn poll_events(&mut self) -> Vec<WorkerEvent> {
        let Some(active) = self.active.as_ref() else {
            return Vec::new();
        };
        let mut events: Vec<WorkerEvent> = active.events.try_iter().collect();
        let vanished = active.thread.is_finished() && active.events.is_empty();
        let terminal = events.iter().rev().find(|e| e.is_terminal()).cloned();
        if terminal.is_some() || vanished {
            if let Some(event) = self.reap(terminal.as_ref()) {
                events.push(event);
            }
        }
        events
    }

    /// Wait up to `timeout` for the next notification.
    pub fn next_event(&mut self, timeout: Duration) -> Option<WorkerEvent> {
        let active = self.active.as_ref()?;
        match active.events.recv_timeout(timeout) {
            Ok(event) => {
                if event.is_terminal() {
                    if let Some(failure) = self.reap(Some(&event)) {
                        return Some(failure);
                    }
                }
                Some(event)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => self.reap(None),
        }
    }

    /// Join a worker whose thread has finished. Returns a failure event when
    /// the thread died without reporting, i.e. it panicked.
    fn reap(&mut self, terminal: Option<&WorkerEvent>) -> Option<WorkerEvent> {
        let active = self.active.take()?;
        let generation = active.generation;
        let panicked = active.thread.join().is_err();
        let (outcome, failure) = match terminal {
            Some(WorkerEvent::Completed(_)) => (WorkerOutcome::Completed(generation), None),
            Some(WorkerEvent::Cancelled { .. }) => (WorkerOutcome::Cancelled(generation), None),
            Some(_) => (WorkerOutcome::Failed(generation), None),
            None => {
                if panicked {
                    warn!(generation, "aggregation worker panicked");
                }
                (
                    WorkerOutcome::Failed(generation),
                    Some(WorkerEvent::Failed {
                        generation,
                        error: AggregationError::Panicked { generation },
                    }),
                )
            }
        };
        self.last_outcome = Some(outcome);
        failure
    }
}

impl Drop for AggregationWorker {
    fn drop(&mut self) {
        self.cancel_and_wait();
    }
}

fn run_worker(
    source: &dyn TraceSource,
    generation: Generation,
    range: FrameRange,
    cancel: &CancelToken,
    check_interval: usize,
    progress_steps: usize,
    tx: &Sender<WorkerEvent>,
) {
    let Some(total) = source.record_count_in_range(range, cancel) else {
        debug!(generation, "aggregation cancelled while counting");
        let _ = tx.send(WorkerEvent::Cancelled { generation });
        return;
    };
    let mut report = |progress: ScanProgress| {
        let event = match progress {
            ScanProgress::Started { total } => WorkerEvent::Started {
                generation,
                range,
                total,
            },
            ScanProgress::Advanced { current, total } => WorkerEvent::Progress {
                generation,
                current,
                total,
            },
        };
        let _ = tx.send(event);
    };

    let outcome = aggregate_records(
        generation,
        range,
        total,
        source.records_in_range(range, cancel),
        cancel,
        check_interval,
        progress_steps,
        &mut report,
    );

    let event = match outcome {
        Ok(ScanOutcome::Completed(result)) => {
            debug!(generation, objects = result.total_count(), "aggregation completed");
            WorkerEvent::Completed(Arc::new(result))
        }
        Ok(ScanOutcome::Cancelled { scanned }) => {
            debug!(generation, scanned, "aggregation observed cancellation");
            WorkerEvent::Cancelled { generation }
        }
        Err(error) => WorkerEvent::Failed {
            generation,
            error: error.into(),
        },
    };
    let _ = tx.send(event);
}
