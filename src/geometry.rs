//! Shared geometry: axis-aligned rectangles in page space.
//!
//! All coordinates in this crate use the same convention: origin at the
//! top-left corner of the page, x growing right, y growing **down**, units
//! of PDF points (1 pt = 1/72 inch). PDF's native page space is
//! bottom-left-origin; the extractor flips y once at the boundary and
//! everything downstream — JSON snapshots, template geometry, diff
//! reporting — stays in the top-left convention. API consumers relying on
//! the bottom-left convention of some PDF tools must flip y themselves.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle, top-left origin, y down.
///
/// Invariant: `x1 >= x0` and `y1 >= y0`. Constructors and combinators
/// preserve it; [`Rect::intersect`] clamps negative spans to zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// True when the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Overlap of `self` and `other`, with negative spans clamped to zero
    /// (callers intersecting against a page boundary get a degenerate
    /// rectangle rather than an inverted one).
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1).max(x0);
        let y1 = self.y1.min(other.y1).max(y0);
        Rect { x0, y0, x1, y1 }
    }

    /// Vertical overlap with `other` in points; zero when disjoint.
    pub fn vertical_overlap(&self, other: &Rect) -> f32 {
        (self.y1.min(other.y1) - self.y0.max(other.y0)).max(0.0)
    }

    /// Round all coordinates to two decimals, matching the precision the
    /// extraction snapshot is persisted with.
    pub fn rounded(&self) -> Rect {
        Rect {
            x0: round2(self.x0),
            y0: round2(self.y0),
            x1: round2(self.x1),
            y1: round2(self.y1),
        }
    }
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalises_corner_order() {
        let r = Rect::new(10.0, 20.0, 5.0, 8.0);
        assert_eq!(r, Rect::new(5.0, 8.0, 10.0, 20.0));
        assert!(r.x1 >= r.x0 && r.y1 >= r.y0);
    }

    #[test]
    fn union_covers_both() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 20.0, 8.0);
        let u = a.union(&b);
        assert_eq!(u, Rect::new(0.0, 0.0, 20.0, 10.0));
    }

    #[test]
    fn disjoint_intersection_clamps_to_zero_span() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 30.0, 30.0);
        let i = a.intersect(&b);
        assert!(i.is_empty());
        assert!(i.x1 >= i.x0 && i.y1 >= i.y0);
    }

    #[test]
    fn vertical_overlap_measures_shared_span() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(50.0, 6.0, 60.0, 20.0);
        assert_eq!(a.vertical_overlap(&b), 4.0);
        let c = Rect::new(0.0, 30.0, 10.0, 40.0);
        assert_eq!(a.vertical_overlap(&c), 0.0);
    }

    #[test]
    fn rounded_truncates_to_two_decimals() {
        let r = Rect::new(1.005, 2.0049, 3.9999, 4.0);
        let r = r.rounded();
        assert_eq!(r.x1, 4.0);
        assert_eq!(r.y0, 2.0);
    }
}
