//! Capture transport that replays a recorded trace into a live store.
//!
//! The transport side is handed to the explorer; the [`ReplayFeed`] side is
//! kept by the driver, which releases frames into the store as time passes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{CaptureTransport, InMemoryTrace, TraceEvent};
use crate::session::{ConnectionFault, Endpoint, LaunchSpec};

#[derive(Debug, Default)]
struct ReplayState {
    pending: VecDeque<TraceEvent>,
    connected: bool,
    paused: bool,
    fail_with: Option<ConnectionFault>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<ReplayState>,
    sink: Arc<InMemoryTrace>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ReplayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`CaptureTransport`] backed by a recorded event list.
#[derive(Debug)]
pub struct ReplayTransport {
    shared: Arc<Shared>,
}

/// Driver handle releasing recorded frames into the live store.
#[derive(Debug, Clone)]
pub struct ReplayFeed {
    shared: Arc<Shared>,
}

impl ReplayTransport {
    /// Transport replaying `events` into `sink`.
    pub fn new(events: Vec<TraceEvent>, sink: Arc<InMemoryTrace>) -> (Self, ReplayFeed) {
        let shared = Arc::new(Shared {
            state: Mutex::new(ReplayState {
                pending: events.into(),
                ..ReplayState::default()
            }),
            sink,
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            ReplayFeed { shared },
        )
    }

    /// Make the next `start` fail with `fault`.
    pub fn failing_with(self, fault: ConnectionFault) -> Self {
        self.shared.lock().fail_with = Some(fault);
        self
    }
}

impl CaptureTransport for ReplayTransport {
    fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }

    fn is_connecting(&self) -> bool {
        false
    }

    fn start(&mut self, endpoint: &Endpoint) -> Result<(), ConnectionFault> {
        let mut state = self.shared.lock();
        if let Some(fault) = state.fail_with.take() {
            return Err(fault);
        }
        debug!(%endpoint, pending = state.pending.len(), "replay connected");
        state.connected = true;
        state.paused = false;
        Ok(())
    }

    fn launch(&mut self, spec: &LaunchSpec) -> Result<(), ConnectionFault> {
        Err(ConnectionFault::LaunchFailed {
            program: spec.program.clone(),
            reason: "replay sessions cannot launch programs".to_string(),
        })
    }

    fn stop(&mut self) {
        self.shared.lock().connected = false;
    }

    fn pause(&mut self) {
        self.shared.lock().paused = true;
    }

    fn resume(&mut self) {
        self.shared.lock().paused = false;
    }

    fn pending_messages(&self) -> u64 {
        self.shared.lock().pending.len() as u64
    }
}

impl ReplayFeed {
    /// Release the next `frames` frames into the store.
    ///
    /// Nothing is released while disconnected or paused. Returns the number
    /// of events written.
    pub fn advance(&self, frames: u64) -> usize {
        let batch: Vec<TraceEvent> = {
            let mut state = self.shared.lock();
            if !state.connected || state.paused {
                return 0;
            }
            let limit = state
                .pending
                .iter()
                .find_map(TraceEvent::frame)
                .map(|first| first.saturating_add(frames.max(1)));
            let mut batch = Vec::new();
            while let Some(event) = state.pending.pop_front() {
                let due = match (event.frame(), limit) {
                    (Some(frame), Some(limit)) => frame < limit,
                    _ => true,
                };
                if !due {
                    state.pending.push_front(event);
                    break;
                }
                batch.push(event);
            }
            batch
        };
        let released = batch.len();
        self.shared.sink.extend(batch);
        released
    }

    /// Simulate the profiled process going away.
    pub fn disconnect(&self) {
        self.shared.lock().connected = false;
    }

    /// Events not yet released.
    pub fn remaining(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Whether every event has been released.
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}
