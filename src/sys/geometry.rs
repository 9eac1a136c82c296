//! Screen-space rectangles.
//!
//! Coordinates follow the window server convention: the origin is the top
//! left of the main screen and y grows downward.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self { Self { x, y } }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self { Self { width, height } }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn min_x(&self) -> f64 { self.origin.x }

    pub fn min_y(&self) -> f64 { self.origin.y }

    pub fn max_x(&self) -> f64 { self.origin.x + self.size.width }

    pub fn max_y(&self) -> f64 { self.origin.y + self.size.height }

    pub fn width(&self) -> f64 { self.size.width }

    pub fn height(&self) -> f64 { self.size.height }

    pub fn mid(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    /// Half-open containment: points on the max edges belong to the
    /// neighbouring rectangle, so adjacent screens never both claim a point.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x()
            && point.x < self.max_x()
            && point.y >= self.min_y()
            && point.y < self.max_y()
    }

    /// Length of the shared span on the x axis. Negative when the rectangles
    /// are separated horizontally.
    pub fn overlap_x(&self, other: &Rect) -> f64 {
        self.max_x().min(other.max_x()) - self.min_x().max(other.min_x())
    }

    /// Length of the shared span on the y axis. Negative when the rectangles
    /// are separated vertically.
    pub fn overlap_y(&self, other: &Rect) -> f64 {
        self.max_y().min(other.max_y()) - self.min_y().max(other.min_y())
    }

    /// Largest per-component difference between two frames.
    pub fn max_delta(&self, other: &Rect) -> f64 {
        (self.origin.x - other.origin.x)
            .abs()
            .max((self.origin.y - other.origin.y).abs())
            .max((self.size.width - other.size.width).abs())
            .max((self.size.height - other.size.height).abs())
    }

    /// Sum of per-component differences between two frames.
    pub fn total_delta(&self, other: &Rect) -> f64 {
        (self.origin.x - other.origin.x).abs()
            + (self.origin.y - other.origin.y).abs()
            + (self.size.width - other.size.width).abs()
            + (self.size.height - other.size.height).abs()
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.0},{:.0} {:.0}x{:.0})",
            self.origin.x, self.origin.y, self.size.width, self.size.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_is_negative_for_separated_rects() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(150.0, 20.0, 100.0, 100.0);
        assert_eq!(a.overlap_x(&b), -50.0);
        assert_eq!(a.overlap_y(&b), 80.0);
    }

    #[test]
    fn contains_excludes_max_edges() {
        let r = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(r.contains(Point::new(0.0, 0.0)));
        assert!(r.contains(Point::new(99.9, 50.0)));
        assert!(!r.contains(Point::new(100.0, 50.0)));
    }

    #[test]
    fn deltas() {
        let a = Rect::new(0.0, 0.0, 720.0, 900.0);
        let b = Rect::new(2.0, 0.0, 700.0, 900.0);
        assert_eq!(a.max_delta(&b), 20.0);
        assert_eq!(a.total_delta(&b), 22.0);
    }
}
