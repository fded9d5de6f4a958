use super::FrameRange;
use crate::source::TraceSource;

/// Allocation activity of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FrameStats {
    /// Frame number.
    pub frame: u64,
    /// Objects allocated during the frame.
    pub allocations: u64,
    /// Objects freed during the frame.
    pub frees: u64,
    /// Bytes alive at the end of the frame.
    pub live_size: u64,
}

impl FrameStats {
    /// Stats of a frame with no activity.
    pub fn empty(frame: u64) -> Self {
        Self {
            frame,
            ..Self::default()
        }
    }
}

/// Cached series for the visible part of the timeline.
///
/// Refreshing is cheap relative to aggregation and runs on the control
/// thread whenever the visible range changes or new frames enter it.
#[derive(Debug, Clone, Default)]
pub struct TimelineRegion {
    range: Option<FrameRange>,
    stats: Vec<FrameStats>,
    max_allocations: u64,
    max_frees: u64,
    max_live_size: u64,
}

impl TimelineRegion {
    /// Create an empty region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reload the series for `range` from the trace.
    pub fn update_region(&mut self, source: &dyn TraceSource, range: FrameRange) {
        self.stats = source.frame_stats(range);
        self.range = Some(range);
        self.max_allocations = self.stats.iter().map(|s| s.allocations).max().unwrap_or(0);
        self.max_frees = self.stats.iter().map(|s| s.frees).max().unwrap_or(0);
        self.max_live_size = self.stats.iter().map(|s| s.live_size).max().unwrap_or(0);
    }

    /// Forget the cached series.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Range the series was last loaded for.
    pub fn range(&self) -> Option<FrameRange> {
        self.range
    }

    /// Per-frame stats, ordered by frame.
    pub fn stats(&self) -> &[FrameStats] {
        &self.stats
    }

    /// Peak allocations per frame (histogram scale).
    pub fn max_allocations(&self) -> u64 {
        self.max_allocations
    }

    /// Peak frees per frame (histogram scale).
    pub fn max_frees(&self) -> u64 {
        self.max_frees
    }

    /// Peak live heap size (curve scale).
    pub fn max_live_size(&self) -> u64 {
        self.max_live_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{InMemoryTrace, TraceEvent};

    #[test]
    fn update_region_tracks_peaks() {
        let trace = InMemoryTrace::from_events([
            TraceEvent::Alloc {
                frame: 1,
                address: 1,
                type_id: 1,
                callstack_id: 1,
                size: 10,
            },
            TraceEvent::Alloc {
                frame: 1,
                address: 2,
                type_id: 1,
                callstack_id: 1,
                size: 30,
            },
            TraceEvent::Free { frame: 2, address: 1 },
        ]);

        let mut region = TimelineRegion::new();
        region.update_region(&trace, FrameRange::new(0, 2));
        assert_eq!(region.range(), Some(FrameRange::new(0, 2)));
        assert_eq!(region.max_allocations(), 2);
        assert_eq!(region.max_frees(), 1);
        assert_eq!(region.max_live_size(), 40);
        assert_eq!(region.stats().last().map(|s| s.live_size), Some(30));
    }
}
