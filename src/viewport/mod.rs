//! Viewport and zoom model.
//!
//! Derives the visible frame range from a scroll position, a zoom factor
//! (pixels per frame) and the canvas width reported by the renderer.

mod zoom;

pub use zoom::{ZoomLimits, ZoomState, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM};

use crate::timeline::{Boundaries, BoundaryUpdate, FrameRange};

/// Owner of [`ZoomState`].
///
/// Every mutator returns the recomputed visible range so the caller can
/// notify views. The model never aggregates anything itself.
#[derive(Debug, Clone)]
pub struct Viewport {
    state: ZoomState,
    canvas_width: f64,
    limits: ZoomLimits,
    wheel_sensitivity: f64,
}

impl Viewport {
    /// Create a viewport with the given zoom limits and wheel sensitivity.
    pub fn new(limits: ZoomLimits, initial_zoom: f64, wheel_sensitivity: f64) -> Self {
        Self {
            state: ZoomState {
                zoom_factor: limits.clamp(initial_zoom),
                scroll_pos: 0,
            },
            canvas_width: 0.0,
            limits,
            wheel_sensitivity,
        }
    }

    /// Current zoom state.
    pub fn state(&self) -> ZoomState {
        self.state
    }

    /// Canvas width in pixels.
    pub fn canvas_width(&self) -> f64 {
        self.canvas_width
    }

    /// Scroll to the start of the trace and apply `zoom`.
    pub fn reset(&mut self, bounds: &Boundaries, zoom: f64) -> FrameRange {
        self.state.scroll_pos = bounds.min_frame;
        self.set_zoom(zoom);
        self.visible_range()
    }

    /// Clamp and apply a zoom factor, returning the effective factor.
    pub fn set_zoom(&mut self, requested: f64) -> f64 {
        self.state.zoom_factor = self.limits.clamp(requested);
        self.state.zoom_factor
    }

    /// Apply a wheel gesture: `pixel_delta / sensitivity` is added to the zoom.
    pub fn wheel(&mut self, pixel_delta: f64) -> f64 {
        let requested = self.state.zoom_factor + pixel_delta / self.wheel_sensitivity;
        self.set_zoom(requested)
    }

    /// Move the left edge, clamped to the trace boundaries.
    pub fn set_scroll(&mut self, position: i64, bounds: &Boundaries) -> FrameRange {
        self.state.scroll_pos = bounds.clamp(position);
        self.visible_range()
    }

    /// Record a new canvas width and recompute the visible range.
    pub fn resize(&mut self, canvas_width: f64) -> FrameRange {
        self.canvas_width = if canvas_width.is_finite() {
            canvas_width.max(0.0)
        } else {
            0.0
        };
        self.visible_range()
    }

    /// Frames covered by the canvas at the current zoom.
    pub fn visible_span(&self) -> u64 {
        (self.canvas_width / self.state.zoom_factor).floor() as u64
    }

    /// `[scroll_pos, scroll_pos + canvas_width / zoom_factor]`.
    pub fn visible_range(&self) -> FrameRange {
        let start = self.state.scroll_pos;
        FrameRange {
            start,
            end: start.saturating_add(self.visible_span()),
        }
    }

    /// Whether the right edge of the view reaches the live edge.
    pub fn sees_live_edge(&self, bounds: &Boundaries) -> bool {
        self.visible_range().end >= bounds.max_frame
    }

    /// Advance the scroll position so the right edge tracks the new live edge.
    ///
    /// `was_tailing` is [`Viewport::sees_live_edge`] evaluated before the
    /// boundaries were refreshed. Returns whether the view moved.
    pub fn follow_live_edge(&mut self, update: &BoundaryUpdate, was_tailing: bool) -> bool {
        let max_frame = update.current.max_frame;
        if !was_tailing || self.visible_range().end >= max_frame {
            return false;
        }
        self.state.scroll_pos = max_frame
            .saturating_sub(self.visible_span())
            .max(update.current.min_frame);
        true
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ZoomLimits::default(), 1.0, 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_range_uses_canvas_and_zoom() {
        let mut viewport = Viewport::default();
        viewport.resize(800.0);
        viewport.set_zoom(2.0);
        viewport.set_scroll(100, &Boundaries::new(0, 5000));
        assert_eq!(viewport.visible_range(), FrameRange::new(100, 500));
    }

    #[test]
    fn set_scroll_clamps_to_boundaries() {
        let mut viewport = Viewport::default();
        let bounds = Boundaries::new(10, 20);
        assert_eq!(viewport.set_scroll(-5, &bounds).start, 10);
        assert_eq!(viewport.set_scroll(99, &bounds).start, 20);
    }

    #[test]
    fn wheel_adjusts_zoom_by_sensitivity() {
        let mut viewport = Viewport::default();
        assert!((viewport.wheel(500.0) - 1.5).abs() < 1e-9);
        assert!((viewport.wheel(-100_000.0) - DEFAULT_MIN_ZOOM).abs() < 1e-9);
    }

    #[test]
    fn tailing_view_follows_live_edge() {
        let mut bounds = Boundaries::new(0, 1000);
        let mut viewport = Viewport::default();
        viewport.resize(500.0);
        viewport.set_scroll(500, &bounds);

        let was_tailing = viewport.sees_live_edge(&bounds);
        let update = bounds.refresh(Boundaries::new(0, 1100));
        assert!(viewport.follow_live_edge(&update, was_tailing));
        assert_eq!(viewport.state().scroll_pos, 600);
        assert_eq!(viewport.visible_range().end, 1100);
    }

    #[test]
    fn scrolled_away_view_stays_put() {
        let mut bounds = Boundaries::new(0, 1000);
        let mut viewport = Viewport::default();
        viewport.resize(100.0);
        viewport.set_scroll(200, &bounds);

        let was_tailing = viewport.sees_live_edge(&bounds);
        let update = bounds.refresh(Boundaries::new(0, 1100));
        assert!(!viewport.follow_live_edge(&update, was_tailing));
        assert_eq!(viewport.state().scroll_pos, 200);
    }
}
