//! CRS facts the parser needs, behind a trait so parser tests stay hermetic.

use weave_common::{BoundingBox, Rect};
use weave_crs::{transform_bounding_box, CrsRegistry};

/// The four CRS questions capabilities parsing asks. Answers are best-effort:
/// an unresolvable definition yields `None`/`false` and the parser degrades
/// the way the wire formats expect (skip the bbox, keep the declared order).
pub trait CrsAdviser {
    /// Canonical `AUTH:CODE` (e.g. `EPSG:3857`) for a definition.
    fn canonical_code(&self, definition: &str) -> Option<String>;

    /// Whether the authority declares lat/long or northing/easting order.
    fn axis_should_invert(&self, definition: &str) -> bool;

    /// Meters per CRS unit (the geographic per-degree constant for
    /// geographic CRSes, the linear unit otherwise).
    fn meters_per_unit(&self, definition: &str) -> Option<f64>;

    /// Transform a rectangle into CRS:84 (lon/lat) meaning.
    fn rect_to_crs84(&self, bbox: &BoundingBox) -> Option<Rect>;
}

impl CrsAdviser for CrsRegistry {
    fn canonical_code(&self, definition: &str) -> Option<String> {
        CrsRegistry::canonical_code(self, definition)
    }

    fn axis_should_invert(&self, definition: &str) -> bool {
        CrsRegistry::axis_should_invert(self, definition)
    }

    fn meters_per_unit(&self, definition: &str) -> Option<f64> {
        Some(self.resolve(definition).ok()?.meters_per_unit())
    }

    fn rect_to_crs84(&self, bbox: &BoundingBox) -> Option<Rect> {
        let wgs84 = self.resolve("EPSG:4326").ok()?;
        transform_bounding_box(self, bbox, &wgs84, weave_crs::transform::BBOX_SAMPLE_GRID)
            .ok()
            .map(|b| b.rect)
    }
}

/// Table-driven adviser for tests: a fixed set of codes with axis flags and
/// meters-per-unit values, no coordinate transforms.
#[derive(Debug, Default, Clone)]
pub struct StaticAdviser {
    /// (canonical code, authority-lat-first, meters per unit)
    pub entries: Vec<(String, bool, f64)>,
}

impl StaticAdviser {
    /// EPSG:4326 (lat-first geographic) + EPSG:3857 (meter-based Mercator),
    /// which is what most fixtures need.
    pub fn common() -> Self {
        Self {
            entries: vec![
                ("EPSG:4326".into(), true, 111319.49079327358),
                ("CRS:84".into(), false, 111319.49079327358),
                ("EPSG:3857".into(), false, 1.0),
                ("EPSG:900913".into(), false, 1.0),
            ],
        }
    }

    fn lookup(&self, definition: &str) -> Option<&(String, bool, f64)> {
        let canonical = canonicalize_urn(definition);
        self.entries
            .iter()
            .find(|(code, _, _)| code.eq_ignore_ascii_case(&canonical))
    }
}

/// Collapse `urn:ogc:def:crs:EPSG:…:<n>` to `EPSG:<n>` so the static table
/// matches URN fixtures too.
fn canonicalize_urn(definition: &str) -> String {
    let lower = definition.to_ascii_lowercase();
    if lower.starts_with("urn:ogc:def") && lower.contains("epsg") {
        if let Some(last) = definition.rsplit(':').next() {
            if last.parse::<u32>().is_ok() {
                return format!("EPSG:{last}");
            }
        }
    }
    definition.trim().to_string()
}

impl CrsAdviser for StaticAdviser {
    fn canonical_code(&self, definition: &str) -> Option<String> {
        self.lookup(definition).map(|(code, _, _)| code.clone())
    }

    fn axis_should_invert(&self, definition: &str) -> bool {
        self.lookup(definition)
            .map(|(_, invert, _)| *invert)
            .unwrap_or(false)
    }

    fn meters_per_unit(&self, definition: &str) -> Option<f64> {
        self.lookup(definition).map(|(_, _, mpu)| *mpu)
    }

    fn rect_to_crs84(&self, bbox: &BoundingBox) -> Option<Rect> {
        // Good enough for fixtures: degree-based boxes pass through.
        self.lookup(&bbox.crs_id).map(|_| bbox.rect)
    }
}
