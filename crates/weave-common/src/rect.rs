//! Axis-aligned rectangle.

use serde::{Deserialize, Serialize};

use crate::Point2d;

/// An axis-aligned rectangle in arbitrary CRS units.
///
/// `Rect::new` normalizes the corners (swapping min/max as needed);
/// `Rect::new_raw` keeps them exactly as given, which some producers rely on
/// (e.g. area-of-use rectangles that cross the antimeridian).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for Rect {
    fn default() -> Self {
        Self {
            min_x: f64::NAN,
            min_y: f64::NAN,
            max_x: f64::NAN,
            max_y: f64::NAN,
        }
    }
}

impl Rect {
    /// Normalizing constructor: guarantees `min_x <= max_x` and `min_y <= max_y`.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        let (min_x, max_x) = if min_x > max_x {
            (max_x, min_x)
        } else {
            (min_x, max_x)
        };
        let (min_y, max_y) = if min_y > max_y {
            (max_y, min_y)
        } else {
            (min_y, max_y)
        };
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Non-normalizing constructor.
    pub fn new_raw(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_corners(min_pt: Point2d, max_pt: Point2d) -> Self {
        Self::new(min_pt.x, min_pt.y, max_pt.x, max_pt.y)
    }

    /// All four coordinates finite and non-negative width/height.
    pub fn is_valid(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
            && self.width() >= 0.0
            && self.height() >= 0.0
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn min_point(&self) -> Point2d {
        Point2d::new(self.min_x, self.min_y)
    }

    pub fn max_point(&self) -> Point2d {
        Point2d::new(self.max_x, self.max_y)
    }

    pub fn center(&self) -> Point2d {
        Point2d::new(
            self.min_x / 2.0 + self.max_x / 2.0,
            self.min_y / 2.0 + self.max_y / 2.0,
        )
    }

    /// Swap X and Y of both corners. Used when a service declares
    /// latitude-first / northing-first axis order.
    pub fn inverted(&self) -> Rect {
        Rect {
            min_x: self.min_y,
            min_y: self.min_x,
            max_x: self.max_y,
            max_y: self.max_x,
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        let max_x = self.max_x.min(other.max_x);
        let max_y = self.max_y.min(other.max_y);
        if min_x > max_x || min_y > max_y {
            return None;
        }
        Some(Rect::new_raw(min_x, min_y, max_x, max_y))
    }

    /// Render as the WMS BBOX parameter form: "minx,miny,maxx,maxy".
    pub fn to_wms_string(&self) -> String {
        format!("{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Parse "minx,miny,maxx,maxy", tolerating comma decimal separators is
    /// the parser's job; this expects dot-decimal input.
    pub fn from_wms_string(s: &str) -> Option<Rect> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return None;
        }
        let mut vals = [0.0f64; 4];
        for (i, p) in parts.iter().enumerate() {
            vals[i] = p.trim().parse().ok()?;
        }
        Some(Rect::new_raw(vals[0], vals[1], vals[2], vals[3]))
    }
}
