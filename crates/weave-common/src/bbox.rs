//! CRS-tagged bounding box.

use serde::{Deserialize, Serialize};

use crate::Rect;

/// A rectangle tagged with an opaque CRS identifier.
///
/// The identifier may be `"EPSG:<n>"`, `"CRS:84"`, raw WKT, a
/// `urn:ogc:def:crs:...` URN, or empty for "unknown". Structural equality
/// compares the raw identifier strings; resolver-aware equivalence lives on
/// the CRS registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub crs_id: String,
    pub rect: Rect,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            crs_id: String::new(),
            rect: Rect::default(),
        }
    }
}

impl BoundingBox {
    pub fn new(crs_id: impl Into<String>, rect: Rect) -> Self {
        Self {
            crs_id: crs_id.into(),
            rect,
        }
    }

    pub fn from_coords(crs_id: impl Into<String>, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(crs_id, Rect::new(min_x, min_y, max_x, max_y))
    }

    /// Valid when the CRS identifier is non-empty and the rectangle is valid.
    /// Whether the identifier actually resolves is the registry's call.
    pub fn is_valid(&self) -> bool {
        !self.crs_id.is_empty() && self.rect.is_valid()
    }

    /// Swap X and Y of both corners in place.
    pub fn invert(&mut self) {
        self.rect = self.rect.inverted();
    }

    /// Overlap of two boxes declared in the same CRS (by identifier).
    /// Returns `None` when the identifiers differ, either box is invalid, or
    /// the rectangles do not meet.
    pub fn overlap(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if self.crs_id.is_empty() || self.crs_id != other.crs_id {
            return None;
        }
        if !self.rect.is_valid() || !other.rect.is_valid() {
            return None;
        }
        let rect = self.rect.intersection(&other.rect)?;
        Some(BoundingBox::new(self.crs_id.clone(), rect))
    }
}
