//! CRS validity areas.

use weave_common::{BoundingBox, Rect};

use crate::crs::{AreaOfUseBounds, AxisPolicy, Crs, LonLatSegment};
use crate::error::{CrsError, CrsResult};
use crate::registry::CrsRegistry;
use crate::transform;

/// Grid density for projecting a lon/lat area of use into the CRS itself.
const SELF_AREA_GRID: usize = 21;

/// Split authority-declared bounds into 1 or 2 lon/lat segments.
/// Crossing the antimeridian (west > east) yields two segments.
pub(crate) fn segments_from_bounds(bounds: AreaOfUseBounds) -> Vec<LonLatSegment> {
    let west = bounds.west.clamp(-180.0, 180.0);
    let east = bounds.east.clamp(-180.0, 180.0);
    let mut south = bounds.south.clamp(-90.0, 90.0);
    let mut north = bounds.north.clamp(-90.0, 90.0);
    if south > north {
        std::mem::swap(&mut south, &mut north);
    }

    if west <= east {
        return vec![LonLatSegment {
            west,
            south,
            east,
            north,
        }];
    }

    let mut segments = Vec::with_capacity(2);
    if west <= 180.0 {
        segments.push(LonLatSegment {
            west,
            south,
            east: 180.0,
            north,
        });
    }
    if east >= -180.0 {
        segments.push(LonLatSegment {
            west: -180.0,
            south,
            east,
            north,
        });
    }
    segments
}

/// 1 or 2 lon/lat rectangles (CRS:84 axis meaning) covering the CRS's
/// declared area of use.
pub fn lonlat_segments(crs: &Crs) -> Vec<LonLatSegment> {
    match crs.area_of_use() {
        Some(bounds) => segments_from_bounds(bounds),
        None => Vec::new(),
    }
}

/// Single-rectangle lon/lat validity area. When the area crosses the
/// antimeridian this collapses longitude to the conservative [-180, 180].
pub fn valid_area_lonlat(crs: &Crs) -> CrsResult<Rect> {
    let segments = lonlat_segments(crs);
    let Some(first) = segments.first() else {
        return Err(CrsError::Unknown(format!(
            "no area of use for {}",
            crs.uid()
        )));
    };

    let mut west = first.west;
    let mut east = first.east;
    let mut south = first.south;
    let mut north = first.north;
    if segments.len() > 1 {
        west = -180.0;
        east = 180.0;
        for segment in &segments {
            south = south.min(segment.south);
            north = north.max(segment.north);
        }
    }
    Ok(Rect::new_raw(west, south, east, north))
}

/// Validity area expressed in the CRS's own coordinates.
///
/// Geographic CRSes reuse the lon/lat area (swapped when the axis policy is
/// authority-compliant and the authority is lat-first). Projected and local
/// CRSes are estimated by projecting a 21×21 grid over every lon/lat segment
/// from EPSG:4326 and taking the AABB of the finite successes.
pub fn valid_area(registry: &CrsRegistry, crs: &Crs) -> CrsResult<BoundingBox> {
    if crs.is_geographic() {
        let mut rect = valid_area_lonlat(crs)?;
        if crs.axis_policy() == AxisPolicy::AuthorityCompliant && crs.axis_should_invert() {
            rect = rect.inverted();
        }
        return Ok(BoundingBox::new(crs.uid(), rect));
    }

    let segments = lonlat_segments(crs);
    if segments.is_empty() {
        return Err(CrsError::Unknown(format!(
            "no area of use for {}",
            crs.uid()
        )));
    }

    let wgs84 = registry.resolve("EPSG:4326")?;
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut any = false;

    for segment in segments {
        if segment.south > segment.north || segment.west > segment.east {
            continue;
        }
        let rect = Rect::new_raw(segment.west, segment.south, segment.east, segment.north);
        let samples = transform::grid_samples(&rect, SELF_AREA_GRID);
        for point in transform::transform_points_partial(&wgs84, crs, &samples)?
            .into_iter()
            .flatten()
        {
            any = true;
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
    }

    if !any {
        return Err(CrsError::TransformFailure(format!(
            "no valid-area sample projected into {}",
            crs.uid()
        )));
    }

    Ok(BoundingBox::new(
        crs.uid(),
        Rect::new_raw(min_x, min_y, max_x, max_y),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(west: f64, south: f64, east: f64, north: f64) -> AreaOfUseBounds {
        AreaOfUseBounds {
            west,
            south,
            east,
            north,
        }
    }

    #[test]
    fn test_segments_simple() {
        let segments = segments_from_bounds(bounds(-10.0, 40.0, 20.0, 55.0));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].west, -10.0);
        assert_eq!(segments[0].east, 20.0);
    }

    #[test]
    fn test_segments_antimeridian_split() {
        // Fiji-style area of use: west 177, east -178.
        let segments = segments_from_bounds(bounds(177.0, -21.0, -178.0, -12.0));
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].west, 177.0);
        assert_eq!(segments[0].east, 180.0);
        assert_eq!(segments[1].west, -180.0);
        assert_eq!(segments[1].east, -178.0);
        for segment in segments {
            assert!(segment.west <= segment.east);
        }
    }

    #[test]
    fn test_segments_clamp_and_swap() {
        let segments = segments_from_bounds(bounds(-200.0, 50.0, 200.0, -50.0));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].west, -180.0);
        assert_eq!(segments[0].east, 180.0);
        assert_eq!(segments[0].south, -50.0);
        assert_eq!(segments[0].north, 50.0);
    }

    #[test]
    fn test_valid_area_lonlat_collapse() {
        let registry = CrsRegistry::new();
        // EPSG:3857 area of use is the whole world; one segment.
        let mercator = registry.resolve("EPSG:3857").unwrap();
        let rect = valid_area_lonlat(&mercator).unwrap();
        assert!(rect.min_x >= -180.0 && rect.max_x <= 180.0);
    }

    #[test]
    fn test_valid_area_projected_is_finite() {
        let registry = CrsRegistry::new();
        let mercator = registry.resolve("EPSG:3857").unwrap();
        let area = valid_area(&registry, &mercator).unwrap();
        assert!(area.rect.is_valid());
        // Web Mercator spans roughly ±20037508 m in X.
        assert!(area.rect.max_x > 1.9e7 && area.rect.min_x < -1.9e7);
    }
}
