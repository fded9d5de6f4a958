/// Smallest zoom factor (pixels per frame).
pub const DEFAULT_MIN_ZOOM: f64 = 0.02;

/// Largest zoom factor (pixels per frame).
pub const DEFAULT_MAX_ZOOM: f64 = 10.0;

/// Inclusive bounds for the zoom factor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ZoomLimits {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl ZoomLimits {
    /// Clamp a requested factor into the limits. Non-finite requests fall to
    /// the nearest meaningful bound.
    pub fn clamp(&self, requested: f64) -> f64 {
        if requested.is_nan() || requested <= self.min {
            self.min
        } else if requested > self.max {
            self.max
        } else {
            requested
        }
    }

    /// Whether the limits describe a usable, non-empty interval.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min > 0.0 && self.min <= self.max
    }
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_ZOOM,
            max: DEFAULT_MAX_ZOOM,
        }
    }
}

/// Scroll position and zoom factor of the timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ZoomState {
    /// Pixels per frame, within [`ZoomLimits`].
    pub zoom_factor: f64,
    /// First visible frame.
    pub scroll_pos: u64,
}
