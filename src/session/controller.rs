use tracing::{debug, info, warn};

use super::{ConnectionFault, Endpoint, LaunchSpec, SessionState};
use crate::source::CaptureTransport;
use crate::timeline::{BoundaryUpdate, FrameRange};

/// What a poll tick did to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollAction {
    /// Session is not live; nothing was polled.
    Skipped,
    /// The connection was found dead and the session stopped.
    Disconnected,
    /// The view was tailing and scrolled to the new live edge.
    Followed(FrameRange),
    /// New frames entered the visible range, which was refreshed.
    Refreshed(FrameRange),
    /// Nothing visible changed.
    Unchanged,
}

/// Result of one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Effect on the view.
    pub action: PollAction,
    /// Boundary change observed, when the session was live.
    pub update: Option<BoundaryUpdate>,
    /// Messages buffered by the transport and not yet in the trace.
    pub backlog: u64,
}

impl PollOutcome {
    pub(crate) fn skipped() -> Self {
        Self {
            action: PollAction::Skipped,
            update: None,
            backlog: 0,
        }
    }
}

/// Drives the capture transport through the session lifecycle.
///
/// Every failed transition lands in a well-defined state: a failed start or
/// launch returns to `Closed` with nothing retained, a lost connection moves
/// to `Stopped`.
pub struct SessionController {
    state: SessionState,
    transport: Box<dyn CaptureTransport>,
    last_fault: Option<ConnectionFault>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("last_fault", &self.last_fault)
            .finish()
    }
}

impl SessionController {
    /// Closed session over `transport`.
    pub fn new(transport: Box<dyn CaptureTransport>) -> Self {
        Self {
            state: SessionState::Closed,
            transport,
            last_fault: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Fault that ended the most recent session, if any.
    pub fn last_fault(&self) -> Option<&ConnectionFault> {
        self.last_fault.as_ref()
    }

    /// Connect to a running profiler.
    pub fn start(&mut self, endpoint: &Endpoint) -> Result<(), ConnectionFault> {
        self.begin_connect("start capture")?;
        info!(%endpoint, "connecting");
        let outcome = self.transport.start(endpoint);
        self.finish_connect(outcome)
    }

    /// Launch a target program with the profiler attached.
    pub fn launch(&mut self, spec: &LaunchSpec) -> Result<(), ConnectionFault> {
        self.begin_connect("launch")?;
        info!(program = %spec.program, port = spec.port, runtime = ?spec.runtime, "launching target");
        let outcome = self.transport.launch(spec);
        self.finish_connect(outcome)
    }

    /// Mark a trace opened offline: viewable, not live.
    pub fn open_offline(&mut self) -> Result<(), ConnectionFault> {
        if !self.state.can_start() {
            return Err(self.invalid("open a trace"));
        }
        self.last_fault = None;
        self.transition(SessionState::Stopped);
        Ok(())
    }

    /// Suspend record emission. Buffered data keeps being polled.
    pub fn pause(&mut self) -> Result<(), ConnectionFault> {
        match self.state {
            SessionState::Live { paused: false } => {
                self.transport.pause();
                self.transition(SessionState::Live { paused: true });
                Ok(())
            }
            SessionState::Live { paused: true } => Ok(()),
            _ => Err(self.invalid("pause")),
        }
    }

    /// Resume record emission.
    pub fn resume(&mut self) -> Result<(), ConnectionFault> {
        match self.state {
            SessionState::Live { paused: true } => {
                self.transport.resume();
                self.transition(SessionState::Live { paused: false });
                Ok(())
            }
            SessionState::Live { paused: false } => Ok(()),
            _ => Err(self.invalid("resume")),
        }
    }

    /// End the live session.
    pub fn stop(&mut self) -> Result<(), ConnectionFault> {
        match self.state {
            SessionState::Live { .. } | SessionState::Connecting => {
                self.transport.stop();
                self.transition(SessionState::Stopped);
                Ok(())
            }
            _ => Err(self.invalid("stop")),
        }
    }

    /// Drop the session entirely.
    pub fn close(&mut self) {
        if self.state.is_live() || self.state == SessionState::Connecting {
            self.transport.stop();
        }
        self.last_fault = None;
        self.transition(SessionState::Closed);
    }

    /// Check the connection at the start of a poll tick.
    ///
    /// Returns the transport backlog, or `Disconnected` after moving the
    /// session to `Stopped` when the transport is neither connected nor
    /// connecting.
    pub fn check_connection(&mut self) -> Result<u64, ConnectionFault> {
        if !self.state.is_live() {
            return Err(self.invalid("poll"));
        }
        if !self.transport.is_connected() && !self.transport.is_connecting() {
            warn!("connection lost, stopping session");
            self.transport.stop();
            self.last_fault = Some(ConnectionFault::Disconnected);
            self.transition(SessionState::Stopped);
            return Err(ConnectionFault::Disconnected);
        }
        Ok(self.transport.pending_messages())
    }

    fn begin_connect(&mut self, operation: &'static str) -> Result<(), ConnectionFault> {
        if !self.state.can_start() {
            return Err(self.invalid(operation));
        }
        self.last_fault = None;
        self.transition(SessionState::Connecting);
        Ok(())
    }

    fn finish_connect(&mut self, outcome: Result<(), ConnectionFault>) -> Result<(), ConnectionFault> {
        match outcome {
            Ok(()) => {
                self.transition(SessionState::Live { paused: false });
                Ok(())
            }
            Err(fault) => {
                warn!(%fault, category = ?fault.category(), "connection failed");
                self.transport.stop();
                self.last_fault = Some(fault.clone());
                self.transition(SessionState::Closed);
                Err(fault)
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "session transition");
            self.state = next;
        }
    }

    fn invalid(&self, operation: &'static str) -> ConnectionFault {
        ConnectionFault::InvalidState {
            operation,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct ScriptedTransport {
        connected: Arc<AtomicBool>,
        fail_with: Option<ConnectionFault>,
        paused: bool,
    }

    impl CaptureTransport for ScriptedTransport {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
        fn is_connecting(&self) -> bool {
            false
        }
        fn start(&mut self, _endpoint: &Endpoint) -> Result<(), ConnectionFault> {
            match self.fail_with.clone() {
                Some(fault) => Err(fault),
                None => {
                    self.connected.store(true, Ordering::SeqCst);
                    Ok(())
                }
            }
        }
        fn launch(&mut self, spec: &LaunchSpec) -> Result<(), ConnectionFault> {
            Err(ConnectionFault::LaunchFailed {
                program: spec.program.clone(),
                reason: "not found".into(),
            })
        }
        fn stop(&mut self) {
            self.connected.store(false, Ordering::SeqCst);
        }
        fn pause(&mut self) {
            self.paused = true;
        }
        fn resume(&mut self) {
            self.paused = false;
        }
        fn pending_messages(&self) -> u64 {
            7
        }
    }

    fn controller(fail_with: Option<ConnectionFault>) -> (SessionController, Arc<AtomicBool>) {
        let connected = Arc::new(AtomicBool::new(false));
        let transport = ScriptedTransport {
            connected: connected.clone(),
            fail_with,
            paused: false,
        };
        (SessionController::new(Box::new(transport)), connected)
    }

    #[test]
    fn start_pause_resume_stop() {
        let (mut session, _) = controller(None);
        session.start(&Endpoint::localhost(9000)).unwrap();
        assert_eq!(session.state(), SessionState::Live { paused: false });
        session.pause().unwrap();
        assert_eq!(session.state(), SessionState::Live { paused: true });
        assert_eq!(session.check_connection(), Ok(7));
        session.resume().unwrap();
        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.pause().is_err());
    }

    #[test]
    fn failed_start_returns_to_closed() {
        let (mut session, _) = controller(Some(ConnectionFault::HandshakeTimeout));
        let err = session.start(&Endpoint::localhost(9000)).unwrap_err();
        assert_eq!(err, ConnectionFault::HandshakeTimeout);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.last_fault(), Some(&ConnectionFault::HandshakeTimeout));
    }

    #[test]
    fn failed_launch_is_categorized() {
        let (mut session, _) = controller(None);
        let err = session.launch(&LaunchSpec::new("/bin/missing", 9000)).unwrap_err();
        assert!(matches!(err, ConnectionFault::LaunchFailed { .. }));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn lost_connection_stops_session() {
        let (mut session, connected) = controller(None);
        session.start(&Endpoint::localhost(9000)).unwrap();
        connected.store(false, Ordering::SeqCst);
        assert_eq!(session.check_connection(), Err(ConnectionFault::Disconnected));
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.last_fault(), Some(&ConnectionFault::Disconnected));
    }

    #[test]
    fn cannot_start_twice() {
        let (mut session, _) = controller(None);
        session.start(&Endpoint::localhost(9000)).unwrap();
        let err = session.start(&Endpoint::localhost(9001)).unwrap_err();
        assert!(matches!(err, ConnectionFault::InvalidState { operation: "start capture", .. }));
        assert!(session.state().is_live());
    }
}
