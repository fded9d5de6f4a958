use std::fmt;
use std::ops::RangeInclusive;

/// Inclusive span of trace frames.
///
/// Frames are unsigned, so the range is always within `[0, ∞)`. It may
/// extend past [`Boundaries::max_frame`] while a live capture is growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FrameRange {
    /// First frame of the span.
    pub start: u64,
    /// Last frame of the span (inclusive).
    pub end: u64,
}

impl FrameRange {
    /// Create a range from two frames in either order.
    pub fn new(a: u64, b: u64) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// Number of frames in the span, saturating at `u64::MAX`.
    ///
    /// A range built by hand with `end < start` has length 1.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    /// A range always holds at least one frame.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `frame` lies inside the span.
    pub fn contains(&self, frame: u64) -> bool {
        self.start <= frame && frame <= self.end
    }

    /// Interpret `end` as an edge one past the last covered frame and return
    /// the frames actually covered.
    ///
    /// Selections are mapped in edge coordinates; aggregation runs over the
    /// covered frames.
    pub fn covered_frames(self) -> Self {
        Self {
            start: self.start,
            end: self.end.saturating_sub(1).max(self.start),
        }
    }

    /// Iterate over every frame in the span.
    pub fn frames(self) -> RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Known extent of the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Boundaries {
    /// Earliest frame present in the trace.
    pub min_frame: u64,
    /// Latest frame present in the trace.
    pub max_frame: u64,
}

/// Boundaries before and after a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryUpdate {
    /// Boundaries prior to the refresh.
    pub previous: Boundaries,
    /// Boundaries after the refresh.
    pub current: Boundaries,
}

impl BoundaryUpdate {
    /// Whether the live edge moved forward.
    pub fn advanced(&self) -> bool {
        self.current.max_frame > self.previous.max_frame
    }

    /// Number of frames the live edge moved by.
    pub fn advanced_by(&self) -> u64 {
        self.current.max_frame - self.previous.max_frame
    }
}

impl Boundaries {
    /// Create boundaries from an observed extent.
    pub fn new(min_frame: u64, max_frame: u64) -> Self {
        Self {
            min_frame: min_frame.min(max_frame),
            max_frame,
        }
    }

    /// Replace the boundaries wholesale (trace open, session start).
    pub fn init(&mut self, observed: Boundaries) {
        *self = Self::new(observed.min_frame, observed.max_frame);
    }

    /// Reset to `(0, 0)` when the session data is discarded.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Fold a freshly observed extent in. `max_frame` never moves backwards.
    pub fn refresh(&mut self, observed: Boundaries) -> BoundaryUpdate {
        let previous = *self;
        let max_frame = previous.max_frame.max(observed.max_frame);
        *self = Self::new(observed.min_frame, max_frame);
        BoundaryUpdate {
            previous,
            current: *self,
        }
    }

    /// Clamp a possibly negative position into `[min_frame, max_frame]`.
    pub fn clamp(&self, position: i64) -> u64 {
        if position <= self.min_frame as i64 {
            self.min_frame
        } else {
            (position as u64).min(self.max_frame)
        }
    }

    /// Full extent as a range.
    pub fn range(&self) -> FrameRange {
        FrameRange::new(self.min_frame, self.max_frame)
    }
}
