//! Screen-space geometry shared by recording, replay and output selection.

use serde::{Deserialize, Serialize};

/// A point on screen, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// Create a new point.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    pub fn distance_squared(&self, other: Point) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }
}

/// An axis-aligned rectangle given by its edges.
///
/// `right` and `bottom` are exclusive, matching how interface toolkits
/// report element bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    /// Create a rectangle from raw edges without reordering them.
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a rectangle from two arbitrary corners, e.g. the start and end
    /// of a drag. The result always has `left <= right` and `top <= bottom`.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(a.x, a.y, b.x, b.y).normalized()
    }

    /// A zero-size rectangle sitting on `point`.
    pub fn from_point(point: Point) -> Self {
        Self::new(point.x, point.y, point.x, point.y)
    }

    /// Copy with corners swapped where needed so `left <= right` and
    /// `top <= bottom`.
    pub fn normalized(&self) -> Self {
        Self {
            left: self.left.min(self.right),
            top: self.top.min(self.bottom),
            right: self.left.max(self.right),
            bottom: self.top.max(self.bottom),
        }
    }

    /// Integer center, rounded toward the top-left.
    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) >> 1,
            (self.top + self.bottom) >> 1,
        )
    }

    /// Sub-pixel center, used when synthesizing touches.
    pub fn exact_center(&self) -> (f32, f32) {
        (
            (self.left + self.right) as f32 * 0.5,
            (self.top + self.bottom) as f32 * 0.5,
        )
    }

    /// Strict overlap test. Rectangles that only share an edge do not
    /// intersect; a zero-size rectangle intersects when it lies strictly
    /// inside `self`.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_swaps_corners() {
        let rect = Rect::from_corners(Point::new(300, 400), Point::new(100, 50));
        assert_eq!(rect, Rect::new(100, 50, 300, 400));
    }

    #[test]
    fn test_center() {
        assert_eq!(Rect::new(0, 0, 20, 100).center(), Point::new(10, 50));
        assert_eq!(Rect::new(0, 0, 21, 101).exact_center(), (10.5, 50.5));
    }

    #[test]
    fn test_intersects_is_strict() {
        let a = Rect::new(0, 0, 100, 100);
        assert!(a.intersects(&Rect::new(50, 50, 150, 150)));
        assert!(!a.intersects(&Rect::new(100, 0, 200, 100)));
        assert!(a.intersects(&Rect::from_point(Point::new(10, 10))));
        assert!(!a.intersects(&Rect::from_point(Point::new(0, 10))));
    }

    #[test]
    fn test_distance_squared() {
        assert_eq!(Point::new(0, 0).distance_squared(Point::new(3, 4)), 25);
    }
}
