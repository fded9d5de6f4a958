//! Timeline primitives: frame ranges, trace boundaries and the per-frame
//! series backing the allocation histogram and heap-size curve.

mod range;
mod region;

pub use range::{Boundaries, BoundaryUpdate, FrameRange};
pub use region::{FrameStats, TimelineRegion};
