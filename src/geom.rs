//! Pixel geometry value types.
//!
//! `Point` and `Rect` are the only geometric vocabulary of the crate: glyph
//! bounding boxes, interpretation bounds and measure-stack bands are all
//! expressed in page pixel coordinates (x grows rightward, y grows
//! downward). The crate never mutates upstream geometry; these types are
//! plain `Copy` values.

use serde::{Deserialize, Serialize};

/// A page position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned pixel rectangle.
///
/// # Invariant
/// `width` and `height` are non-negative. A rectangle with zero area is
/// "degenerate"; degenerate glyph bounds are rejected at the intake
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center of the rectangle, rounded toward the origin.
    #[inline]
    pub const fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2,
            y: self.y + self.height / 2,
        }
    }

    #[inline]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    #[inline]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Whether the rectangle encloses no pixels.
    #[inline]
    pub const fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Whether the two rectangles share a portion of their vertical extent.
    #[inline]
    pub const fn overlaps_vertically(&self, other: &Rect) -> bool {
        self.y < other.bottom() && other.y < self.bottom()
    }
}

/// Horizontal distance between two points, in pixels.
#[inline]
pub fn dx(a: Point, b: Point) -> i32 {
    (a.x - b.x).abs()
}

/// Vertical distance between two points, in pixels.
#[inline]
pub fn dy(a: Point, b: Point) -> i32 {
    (a.y - b.y).abs()
}
