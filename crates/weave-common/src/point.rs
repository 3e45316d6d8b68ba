//! 2D point type used throughout the pipeline.

use serde::{Deserialize, Serialize};

/// A 2D coordinate. Defaults to NaN/NaN, which is the "not yet set" state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2d {
    pub x: f64,
    pub y: f64,
}

impl Default for Point2d {
    fn default() -> Self {
        Self {
            x: f64::NAN,
            y: f64::NAN,
        }
    }
}

impl Point2d {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// A point is valid when neither coordinate is NaN.
    pub fn is_valid(&self) -> bool {
        !self.x.is_nan() && !self.y.is_nan()
    }
}

impl std::ops::Mul<f64> for Point2d {
    type Output = Point2d;

    fn mul(self, scalar: f64) -> Point2d {
        Point2d::new(self.x * scalar, self.y * scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_invalid() {
        assert!(!Point2d::default().is_valid());
        assert!(Point2d::new(1.0, 2.0).is_valid());
        assert!(!Point2d::new(f64::NAN, 2.0).is_valid());
    }

    #[test]
    fn test_scale() {
        let p = Point2d::new(2.0, -3.0) * 0.5;
        assert_eq!(p, Point2d::new(1.0, -1.5));
    }
}
