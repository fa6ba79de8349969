//! Axis-aligned geometry shared by every pipeline stage.
//!
//! All rectangles are top-left origin with y growing downward, in whatever
//! pixel frame the producing stage declares. The pipeline never mixes frames
//! implicitly: moving a rectangle between frames is always an explicit
//! [`Rect::scaled`] or [`Rect::translated`] call, so each transform step is
//! visible (and testable) on its own.
//!
//! [`Rect::from_corners`] normalises arbitrary corner ordering — PDF
//! producers emit annotation rectangles with corners in any order, so every
//! rectangle entering the pipeline goes through min/max normalisation once.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle, top-left origin.
///
/// Invariant: `width >= 0` and `height >= 0`. Constructed through
/// [`Rect::new`] (trusted, already-ordered input) or [`Rect::from_corners`]
/// (arbitrary corner ordering).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from two opposite corners in any order.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1.min(x2),
            y: y1.min(y2),
            width: (x2 - x1).abs(),
            height: (y2 - y1).abs(),
        }
    }

    /// Uniformly scale position and size about the origin.
    #[must_use]
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    /// Shift by `(dx, dy)` without changing size.
    #[must_use]
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// Does this rectangle vertically intersect the band `[0, band_height)`
    /// of its own frame?
    ///
    /// A rectangle touching the band edge exactly (`y == band_height`, or
    /// `y + height == 0`) does not intersect. This is the slicer's inclusion
    /// test: links are kept or dropped whole, never truncated.
    pub fn intersects_band(&self, band_height: f32) -> bool {
        self.y + self.height > 0.0 && self.y < band_height
    }

    /// Length of the vertical overlap with `[top, bottom)`, zero when
    /// disjoint.
    pub fn vertical_overlap(&self, top: f32, bottom: f32) -> f32 {
        ((self.y + self.height).min(bottom) - self.y.max(top)).max(0.0)
    }

    /// Is the point inside (right/bottom edges exclusive)?
    pub fn contains_point(&self, px: f32, py: f32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// A hyperlink rectangle: a [`Rect`] plus its target URL and source page.
///
/// Extraction preserves every annotation with a URL — the scheme allow-list
/// is applied by the serialiser at emission time, never here. `page_index`
/// survives merging so a link can always be traced back to its source page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRegion {
    pub url: String,
    #[serde(flatten)]
    pub rect: Rect,
    /// 0-indexed source page.
    pub page_index: usize,
}

impl LinkRegion {
    pub fn new(url: impl Into<String>, rect: Rect, page_index: usize) -> Self {
        Self {
            url: url.into(),
            rect,
            page_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_corners_normalises_any_ordering() {
        let expected = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(Rect::from_corners(10.0, 20.0, 40.0, 60.0), expected);
        assert_eq!(Rect::from_corners(40.0, 60.0, 10.0, 20.0), expected);
        assert_eq!(Rect::from_corners(40.0, 20.0, 10.0, 60.0), expected);
        assert_eq!(Rect::from_corners(10.0, 60.0, 40.0, 20.0), expected);
    }

    #[test]
    fn scaled_moves_position_and_size_together() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0).scaled(8.0);
        assert_eq!(r, Rect::new(80.0, 80.0, 160.0, 160.0));
    }

    #[test]
    fn translated_keeps_size() {
        let r = Rect::new(5.0, 20.0, 40.0, 10.0).translated(0.0, 100.0);
        assert_eq!(r, Rect::new(5.0, 120.0, 40.0, 10.0));
    }

    #[test]
    fn band_intersection_is_half_open() {
        // Partial overlap at the top: y + height = 5 > 0.
        assert!(Rect::new(0.0, -5.0, 10.0, 10.0).intersects_band(500.0));
        // Touching the bottom edge exactly: y = 500 is not < 500.
        assert!(!Rect::new(0.0, 500.0, 10.0, 10.0).intersects_band(500.0));
        // Touching the top edge exactly: y + height = 0 is not > 0.
        assert!(!Rect::new(0.0, -10.0, 10.0, 10.0).intersects_band(500.0));
        assert!(Rect::new(0.0, 499.0, 10.0, 10.0).intersects_band(500.0));
    }

    #[test]
    fn vertical_overlap_clamps_to_zero() {
        let r = Rect::new(0.0, 10.0, 10.0, 10.0);
        assert_eq!(r.vertical_overlap(0.0, 100.0), 10.0);
        assert_eq!(r.vertical_overlap(15.0, 100.0), 5.0);
        assert_eq!(r.vertical_overlap(50.0, 100.0), 0.0);
        assert_eq!(r.vertical_overlap(0.0, 10.0), 0.0);
    }

    #[test]
    fn contains_point_excludes_far_edges() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains_point(0.0, 0.0));
        assert!(r.contains_point(5.0, 5.0));
        assert!(!r.contains_point(10.0, 5.0));
        assert!(!r.contains_point(5.0, 10.0));
    }

    #[test]
    fn link_region_json_flattens_the_rect() {
        let link = LinkRegion::new("https://example.com", Rect::new(1.0, 2.0, 3.0, 4.0), 7);
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["url"], "https://example.com");
        assert_eq!(json["x"], 1.0);
        assert_eq!(json["height"], 4.0);
        assert_eq!(json["page_index"], 7);

        let back: LinkRegion = serde_json::from_value(json).unwrap();
        assert_eq!(back, link);
    }
}
