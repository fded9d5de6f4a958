//! Maps drag selections on the timeline canvas to frame intervals.

use crate::source::{MarkerIndex, SnapDirection};
use crate::timeline::FrameRange;
use crate::viewport::ZoomState;

/// Rectangle spanned by a drag gesture, corners in drag order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    /// X of the press position.
    pub x0: f64,
    /// Y of the press position.
    pub y0: f64,
    /// X of the release position.
    pub x1: f64,
    /// Y of the release position.
    pub y1: f64,
}

impl PixelRect {
    /// Rectangle between two corners.
    pub fn from_corners(press: (f64, f64), release: (f64, f64)) -> Self {
        Self {
            x0: press.0,
            y0: press.1,
            x1: release.0,
            y1: release.1,
        }
    }

    /// Horizontal extent as `(left, right)` regardless of drag direction.
    pub fn horizontal_span(&self) -> (f64, f64) {
        if self.x0 <= self.x1 {
            (self.x0, self.x1)
        } else {
            (self.x1, self.x0)
        }
    }
}

/// One selection gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRequest {
    /// Dragged rectangle in canvas pixels.
    pub pixel_rect: PixelRect,
    /// Snap both edges to marker frames.
    pub snap_to_marker: bool,
}

/// Inverse of the renderer's frame -> pixel mapping along the time axis.
pub trait AxisTransform {
    /// Frame coordinate (fractional) at a canvas x position.
    fn pixel_to_frame(&self, pixel: f64) -> f64;
}

impl<F> AxisTransform for F
where
    F: Fn(f64) -> f64,
{
    fn pixel_to_frame(&self, pixel: f64) -> f64 {
        self(pixel)
    }
}

/// Linear axis: `frame = origin + pixel / pixels_per_frame`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearAxis {
    /// Frame at pixel 0.
    pub origin: f64,
    /// Zoom factor.
    pub pixels_per_frame: f64,
}

impl LinearAxis {
    /// Axis matching the current viewport state.
    pub fn from_zoom(state: ZoomState) -> Self {
        Self {
            origin: state.scroll_pos as f64,
            pixels_per_frame: state.zoom_factor,
        }
    }

    /// Forward mapping, frame -> pixel.
    pub fn frame_to_pixel(&self, frame: f64) -> f64 {
        (frame - self.origin) * self.pixels_per_frame
    }
}

impl AxisTransform for LinearAxis {
    fn pixel_to_frame(&self, pixel: f64) -> f64 {
        self.origin + pixel / self.pixels_per_frame
    }
}

/// Converts pixel selections into frame intervals.
///
/// The result is in edge coordinates: frame `f` spans `[f, f + 1)`, so the
/// right bound is one past the last covered frame. Use
/// [`FrameRange::covered_frames`] to get the frames to aggregate.
#[derive(Debug)]
pub struct SelectionMapper<'a, M: MarkerIndex + ?Sized> {
    markers: &'a M,
}

impl<'a, M: MarkerIndex + ?Sized> SelectionMapper<'a, M> {
    /// Mapper snapping against `markers` when requested.
    pub fn new(markers: &'a M) -> Self {
        Self { markers }
    }

    /// Map a selection gesture to a frame interval.
    pub fn map(&self, request: SelectionRequest, transform: &dyn AxisTransform) -> FrameRange {
        let (left_px, right_px) = request.pixel_rect.horizontal_span();
        let left = to_frame(transform.pixel_to_frame(left_px).floor());
        let right = to_frame(transform.pixel_to_frame(right_px).ceil());

        let (start, end) = if request.snap_to_marker {
            let start = self
                .markers
                .closest_marker_frame(left, SnapDirection::AtOrBefore)
                .unwrap_or(left);
            let end = self
                .markers
                .closest_marker_frame(right, SnapDirection::AtOrAfter)
                .map_or(right, |marker| marker.saturating_add(1));
            (start, end)
        } else {
            (left, right)
        };

        FrameRange {
            start,
            end: end.max(start.saturating_add(1)),
        }
    }
}

fn to_frame(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        value as u64
    }
}
