use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in the plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates are neither NaN nor infinite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Lexicographic (x, then y) order. Only meaningful for finite points;
    /// `-0.0` and `0.0` compare equal.
    pub fn lexicographic(&self, other: &Self) -> Ordering {
        self.x
            .partial_cmp(&other.x)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.y.partial_cmp(&other.y).unwrap_or(Ordering::Equal))
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Orientation of the turn `o → a → b`.
///
/// Positive for counter-clockwise, negative for clockwise, zero when the
/// three points are collinear. The sign is exact (Shewchuk's adaptive
/// `orient2d`); the magnitude is only an approximation of
/// `(a - o) × (b - o)`.
#[inline]
pub fn cross(o: Point, a: Point, b: Point) -> f64 {
    robust::orient2d(o.into(), a.into(), b.into())
}

impl From<Point> for robust::Coord<f64> {
    fn from(p: Point) -> Self {
        robust::Coord { x: p.x, y: p.y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_sign_follows_turn_direction() {
        let o = Point::new(0.0, 0.0);
        assert!(cross(o, Point::new(1.0, 0.0), Point::new(0.0, 1.0)) > 0.0);
        assert!(cross(o, Point::new(0.0, 1.0), Point::new(1.0, 0.0)) < 0.0);
        assert_eq!(cross(o, Point::new(1.0, 1.0), Point::new(2.0, 2.0)), 0.0);
    }

    #[test]
    fn cross_sign_survives_cancelling_products() {
        // (M-1)^2 and (M-2)*M differ by one but round to the same f64, so a
        // plain determinant reports these points as collinear.
        let m = 2f64.powi(53);
        let o = Point::new(0.0, 0.0);
        let a = Point::new(m - 1.0, m - 2.0);
        let b = Point::new(m, m - 1.0);
        assert_eq!(a.x * b.y - a.y * b.x, 0.0);
        assert!(cross(o, a, b) > 0.0);
        assert!(cross(o, b, a) < 0.0);
    }

    #[test]
    fn signed_zero_is_not_a_distinct_coordinate() {
        let a = Point::new(-0.0, 1.0);
        let b = Point::new(0.0, 1.0);
        assert_eq!(a.lexicographic(&b), Ordering::Equal);
    }

    #[test]
    fn nan_is_not_finite() {
        assert!(!Point::new(f64::NAN, 0.0).is_finite());
        assert!(!Point::new(0.0, f64::INFINITY).is_finite());
        assert!(Point::new(1.0, -1.0).is_finite());
    }
}
