//! Camera framing for force-zoom.
//!
//! When a participant marks ready and force-zoom is on, the local view pans
//! and zooms so every token in play is visible. The math is pure; the host's
//! [`Viewport`](crate::host::Viewport) performs the actual animation.

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use crate::consts::{FRAME_PADDING_PX, FRAME_PAN_MS, MAX_FRAME_SCALE, MIN_FRAME_SCALE};

/// A point in either screen or scene space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    /// Smallest box containing every point, or `None` for an empty set.
    #[must_use]
    pub fn around(points: &[Point]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self { min: *first, max: *first };
        for p in rest {
            bounds.min.x = bounds.min.x.min(p.x);
            bounds.min.y = bounds.min.y.min(p.y);
            bounds.max.x = bounds.max.x.max(p.x);
            bounds.max.y = bounds.max.y.max(p.y);
        }
        Some(bounds)
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::new((self.min.x + self.max.x) * 0.5, (self.min.y + self.max.y) * 0.5)
    }
}

/// Where the view should end up, and how long the pan takes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTarget {
    pub center: Point,
    pub scale: f64,
    pub duration_ms: u64,
}

/// Compute a view that fits all `centers` inside a `viewport_w` x `viewport_h`
/// screen, keeping [`FRAME_PADDING_PX`] free on every side.
///
/// An axis with zero extent does not constrain the scale; if neither axis
/// does, the maximum scale is used.
#[must_use]
pub fn frame_points(centers: &[Point], viewport_w: f64, viewport_h: f64) -> Option<CameraTarget> {
    let bounds = Bounds::around(centers)?;
    let usable_w = (viewport_w - 2.0 * FRAME_PADDING_PX).max(1.0);
    let usable_h = (viewport_h - 2.0 * FRAME_PADDING_PX).max(1.0);

    let fit = |usable: f64, extent: f64| if extent > 0.0 { usable / extent } else { f64::INFINITY };
    let scale = fit(usable_w, bounds.width())
        .min(fit(usable_h, bounds.height()))
        .clamp(MIN_FRAME_SCALE, MAX_FRAME_SCALE);

    Some(CameraTarget { center: bounds.center(), scale, duration_ms: FRAME_PAN_MS })
}
