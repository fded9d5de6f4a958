use thiserror::Error;

use super::SessionState;

/// Coarse grouping of connection faults, used to pick the user-facing hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCategory {
    /// The profiler did not answer in time.
    Timeout,
    /// The profiler speaks a different protocol or version.
    Incompatible,
    /// The target process could not be started or instrumented.
    Launch,
    /// The network connection failed or dropped.
    Network,
    /// The operation is not valid in the current session state.
    Lifecycle,
}

/// Faults that end (or prevent) a capture session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionFault {
    /// The handshake did not complete in time.
    #[error("handshake timed out: the profiler did not respond")]
    HandshakeTimeout,

    /// The peer is not a compatible profiler.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// The peer's protocol version is not supported.
    #[error("protocol version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version this build speaks.
        expected: u32,
        /// Version announced by the peer.
        found: u32,
    },

    /// The target program could not be started.
    #[error("failed to launch {program}: {reason}")]
    LaunchFailed {
        /// Program that failed to start.
        program: String,
        /// Diagnostic from the launcher.
        reason: String,
    },

    /// The profiler library could not be injected into the target.
    #[error("failed to inject the profiler into {program}")]
    InjectionFailed {
        /// Target program.
        program: String,
    },

    /// The launcher pipe did not report readiness in time.
    #[error("timed out waiting for the launcher pipe")]
    PipeTimeout,

    /// Symbols needed to hook the runtime were not found.
    #[error("required runtime symbols are missing: {0}")]
    SymbolsMissing(String),

    /// Installing the allocation hooks failed.
    #[error("failed to install allocation hooks: {0}")]
    DetourFailed(String),

    /// Connecting to the endpoint failed.
    #[error("could not connect to {endpoint}: {reason}")]
    ConnectFailed {
        /// Endpoint description.
        endpoint: String,
        /// OS or transport diagnostic.
        reason: String,
    },

    /// The connection was lost while live.
    #[error("connection to the profiled process was lost")]
    Disconnected,

    /// Operation not allowed in the current state.
    #[error("cannot {operation} while the session is {state}")]
    InvalidState {
        /// Attempted operation.
        operation: &'static str,
        /// State at the time of the attempt.
        state: SessionState,
    },
}

impl ConnectionFault {
    /// Category of this fault.
    pub fn category(&self) -> FaultCategory {
        match self {
            ConnectionFault::HandshakeTimeout | ConnectionFault::PipeTimeout => FaultCategory::Timeout,
            ConnectionFault::ProtocolMismatch(_) | ConnectionFault::VersionMismatch { .. } => {
                FaultCategory::Incompatible
            }
            ConnectionFault::LaunchFailed { .. }
            | ConnectionFault::InjectionFailed { .. }
            | ConnectionFault::SymbolsMissing(_)
            | ConnectionFault::DetourFailed(_) => FaultCategory::Launch,
            ConnectionFault::ConnectFailed { .. } | ConnectionFault::Disconnected => {
                FaultCategory::Network
            }
            ConnectionFault::InvalidState { .. } => FaultCategory::Lifecycle,
        }
    }

    /// Hint shown next to the message.
    pub fn hint(&self) -> &'static str {
        match self.category() {
            FaultCategory::Timeout => "check that the target is running with the profiler enabled",
            FaultCategory::Incompatible => "the profiler and the explorer come from different releases",
            FaultCategory::Launch => "check the program path and that the runtime is supported",
            FaultCategory::Network => "check the host and port, then start a new capture",
            FaultCategory::Lifecycle => "stop the current session first",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_details() {
        let fault = ConnectionFault::VersionMismatch {
            expected: 3,
            found: 2,
        };
        assert_eq!(fault.to_string(), "protocol version mismatch: expected 3, found 2");
        assert_eq!(fault.category(), FaultCategory::Incompatible);

        let fault = ConnectionFault::InvalidState {
            operation: "pause",
            state: SessionState::Stopped,
        };
        assert_eq!(fault.to_string(), "cannot pause while the session is stopped");
        assert_eq!(fault.hint(), "stop the current session first");
    }

    #[test]
    fn hints_follow_category() {
        assert_eq!(
            ConnectionFault::Disconnected.hint(),
            "check the host and port, then start a new capture"
        );
        assert_eq!(
            ConnectionFault::HandshakeTimeout.hint(),
            ConnectionFault::PipeTimeout.hint()
        );
    }
}
