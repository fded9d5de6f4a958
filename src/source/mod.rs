//! Collaborator interfaces consumed by the explorer.
//!
//! The trace store, the live capture transport and the reference resolver
//! live outside this crate. [`InMemoryTrace`] is a complete trace store used
//! by the CLI and the tests.

mod memory;
mod replay;
pub mod trace_io;

pub use memory::InMemoryTrace;
pub use replay::{ReplayFeed, ReplayTransport};
pub use trace_io::{parse_trace, TraceEvent};

use thiserror::Error;

use crate::aggregation::CancelToken;
use crate::references::ReferenceNode;
use crate::session::{ConnectionFault, Endpoint, LaunchSpec};
use crate::timeline::{Boundaries, FrameRange, FrameStats};

/// Identifier of an allocated type.
pub type TypeId = u64;

/// Identifier of an allocation callstack.
pub type CallstackId = u64;

/// One live object as seen by the aggregation scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveObjectRecord {
    /// Address of the object in the profiled process.
    pub address: u64,
    /// Type of the object.
    pub type_id: TypeId,
    /// Callstack the object was allocated from.
    pub callstack_id: CallstackId,
    /// Allocation size in bytes.
    pub size: u64,
}

/// Errors raised by trace stores and the trace text loader.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TraceError {
    /// A record could not be decoded.
    #[error("malformed record at frame {frame}: {reason}")]
    MalformedRecord {
        /// Frame the record belongs to.
        frame: u64,
        /// Decoder diagnostic.
        reason: String,
    },

    /// Trace text could not be parsed.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-indexed line number.
        line: usize,
        /// What went wrong.
        message: String,
    },
}

/// Lazily produced live-object records for a range.
pub type RecordIter<'a> = Box<dyn Iterator<Item = Result<LiveObjectRecord, TraceError>> + 'a>;

/// Direction used when snapping a frame to a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapDirection {
    /// Nearest marker at or before the frame.
    AtOrBefore,
    /// Nearest marker at or after the frame.
    AtOrAfter,
}

/// Lookup of marker frames (garbage-collection events).
pub trait MarkerIndex {
    /// Closest marker frame in the given direction, if any exists.
    fn closest_marker_frame(&self, frame: u64, direction: SnapDirection) -> Option<u64>;
}

/// Read access to the recorded trace.
///
/// Implementations are shared with the aggregation worker thread and must
/// hand out records that stay valid while the store keeps growing. Range
/// scans observe `cancel` at a bounded interval however many stored entries
/// they skip.
pub trait TraceSource: MarkerIndex + Send + Sync {
    /// Current extent of the trace.
    fn boundaries(&self) -> Boundaries;

    /// Number of records [`TraceSource::records_in_range`] will yield, or
    /// `None` once `cancel` is set.
    fn record_count_in_range(&self, range: FrameRange, cancel: &CancelToken) -> Option<usize>;

    /// Objects allocated inside `range` and still alive at its end.
    ///
    /// The iterator may end early once `cancel` is set.
    fn records_in_range(&self, range: FrameRange, cancel: &CancelToken) -> RecordIter<'_>;

    /// Per-frame allocation/free counts and live heap size.
    fn frame_stats(&self, range: FrameRange) -> Vec<FrameStats>;

    /// Display name of a type.
    fn type_name(&self, _type_id: TypeId) -> Option<String> {
        None
    }
}

/// Connection to a live profiled process.
pub trait CaptureTransport {
    /// Whether the connection is established.
    fn is_connected(&self) -> bool;

    /// Whether a connection attempt is still in progress.
    fn is_connecting(&self) -> bool;

    /// Connect to an already running profiler endpoint.
    fn start(&mut self, endpoint: &Endpoint) -> Result<(), ConnectionFault>;

    /// Launch a target program with the profiler attached and connect to it.
    fn launch(&mut self, spec: &LaunchSpec) -> Result<(), ConnectionFault>;

    /// Tear the connection down.
    fn stop(&mut self);

    /// Ask the profiled process to stop emitting records.
    fn pause(&mut self);

    /// Ask the profiled process to resume emitting records.
    fn resume(&mut self);

    /// Messages received but not yet written to the trace.
    fn pending_messages(&self) -> u64 {
        0
    }
}

/// Callback receiving the outcome of one reference resolution.
pub type ResolveCallback = Box<dyn FnOnce(Result<Vec<ReferenceNode>, String>) + Send>;

/// Resolves which objects reference a set of addresses.
pub trait ReferenceResolver: Send + Sync {
    /// Start resolving `addresses`; `on_result` is called exactly once, from
    /// any thread.
    fn resolve(&self, addresses: Vec<u64>, on_result: ResolveCallback);
}
