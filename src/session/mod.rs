//! Live capture session lifecycle.
//!
//! `Closed → Connecting → Live → Stopped`, with pause/resume only while live.

mod controller;
mod fault;

pub use controller::{PollAction, PollOutcome, SessionController};
pub use fault::{ConnectionFault, FaultCategory};

use std::fmt;

/// Lifecycle state of the capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum SessionState {
    /// No session; nothing loaded.
    Closed,
    /// Handshake with the profiled process in progress.
    Connecting,
    /// Receiving records.
    Live {
        /// The producer has been asked to stop emitting records.
        paused: bool,
    },
    /// Capture ended or trace opened offline; data remains viewable.
    Stopped,
}

impl SessionState {
    /// Whether the session is live, paused or not.
    pub fn is_live(self) -> bool {
        matches!(self, SessionState::Live { .. })
    }

    /// Whether a new capture may be started from this state.
    pub fn can_start(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Stopped)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Closed => write!(f, "closed"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Live { paused: false } => write!(f, "live"),
            SessionState::Live { paused: true } => write!(f, "paused"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Address of a running profiler endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Endpoint on `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Endpoint on the loopback interface.
    pub fn localhost(port: u16) -> Self {
        Self::new("127.0.0.1", port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Runtime the target program is executed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeFlavor {
    /// Just-in-time compiled runtime.
    #[default]
    Jit,
    /// Ahead-of-time compiled runtime.
    Aot,
}

/// Target program to start with the profiler attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable path.
    pub program: String,
    /// Command-line arguments.
    pub args: Vec<String>,
    /// Port the injected profiler listens on.
    pub port: u16,
    /// Runtime flavor of the target.
    pub runtime: RuntimeFlavor,
}

impl LaunchSpec {
    /// Launch `program` without arguments on `port`.
    pub fn new(program: impl Into<String>, port: u16) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            port,
            runtime: RuntimeFlavor::default(),
        }
    }

    /// Set the command-line arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the runtime flavor.
    pub fn with_runtime(mut self, runtime: RuntimeFlavor) -> Self {
        self.runtime = runtime;
        self
    }
}
