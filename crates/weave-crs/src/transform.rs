//! Point and bounding-box transforms.
//!
//! Transform objects are not thread-safe in the underlying library, so a
//! `thread_local!` memo keyed by `(src_uid, dst_uid)` holds one
//! `CoordTransform` per pair per thread. Both sides are forced to
//! traditional GIS axis order before the transform is built.

use std::cell::RefCell;
use std::collections::HashMap;

use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use weave_common::{BoundingBox, Point2d, Rect};

use crate::crs::Crs;
use crate::error::{CrsError, CrsResult};
use crate::registry::CrsRegistry;
use crate::valid_area;

/// Grid density for bounding-box transforms.
pub const BBOX_SAMPLE_GRID: usize = 11;

thread_local! {
    static TRANSFORM_MEMO: RefCell<HashMap<(String, String), CoordTransform>> =
        RefCell::new(HashMap::new());
}

fn spatial_ref_for(crs: &Crs) -> CrsResult<SpatialRef> {
    let mut srs = SpatialRef::from_wkt(crs.wkt())
        .map_err(|e| CrsError::TransformFailure(format!("rebuild {}: {e}", crs.uid())))?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

/// Run `f` with the memoized transform for `(src, dst)` on this thread.
fn with_transform<R>(
    src: &Crs,
    dst: &Crs,
    f: impl FnOnce(&CoordTransform) -> R,
) -> CrsResult<R> {
    TRANSFORM_MEMO.with(|memo| {
        let key = (src.uid().to_string(), dst.uid().to_string());
        let mut memo = memo.borrow_mut();
        if !memo.contains_key(&key) {
            let src_srs = spatial_ref_for(src)?;
            let dst_srs = spatial_ref_for(dst)?;
            let transform = CoordTransform::new(&src_srs, &dst_srs).map_err(|e| {
                CrsError::TransformFailure(format!("{} -> {}: {e}", src.uid(), dst.uid()))
            })?;
            memo.insert(key.clone(), transform);
        }
        Ok(f(memo.get(&key).expect("transform just inserted")))
    })
}

/// Transform one point. Traditional GIS order on both sides. Fails on
/// non-finite input or transform failure.
pub fn transform_point(src: &Crs, dst: &Crs, point: Point2d) -> CrsResult<Point2d> {
    if !point.x.is_finite() || !point.y.is_finite() {
        return Err(CrsError::TransformFailure(String::from(
            "non-finite input coordinate",
        )));
    }

    let result = with_transform(src, dst, |transform| {
        let mut xs = [point.x];
        let mut ys = [point.y];
        let mut zs: [f64; 0] = [];
        transform
            .transform_coords(&mut xs, &mut ys, &mut zs)
            .map(|_| Point2d::new(xs[0], ys[0]))
    })?;

    let out = result.map_err(|e| {
        CrsError::TransformFailure(format!("{} -> {}: {e}", src.uid(), dst.uid()))
    })?;
    if !out.x.is_finite() || !out.y.is_finite() {
        return Err(CrsError::TransformFailure(String::from(
            "non-finite transform result",
        )));
    }
    Ok(out)
}

/// Transform many points, keeping per-point failures as `None`.
pub fn transform_points_partial(
    src: &Crs,
    dst: &Crs,
    points: &[Point2d],
) -> CrsResult<Vec<Option<Point2d>>> {
    with_transform(src, dst, |transform| {
        points
            .iter()
            .map(|p| {
                if !p.x.is_finite() || !p.y.is_finite() {
                    return None;
                }
                let mut xs = [p.x];
                let mut ys = [p.y];
                let mut zs: [f64; 0] = [];
                match transform.transform_coords(&mut xs, &mut ys, &mut zs) {
                    Ok(_) if xs[0].is_finite() && ys[0].is_finite() => {
                        Some(Point2d::new(xs[0], ys[0]))
                    }
                    _ => None,
                }
            })
            .collect()
    })
}

/// Evenly spaced n×n grid over a rectangle, edges included.
pub(crate) fn grid_samples(rect: &Rect, n: usize) -> Vec<Point2d> {
    let n = n.max(2);
    let mut points = Vec::with_capacity(n * n);
    let step_x = rect.width() / (n - 1) as f64;
    let step_y = rect.height() / (n - 1) as f64;
    for j in 0..n {
        let y = rect.min_y + step_y * j as f64;
        for i in 0..n {
            let x = rect.min_x + step_x * i as f64;
            points.push(Point2d::new(x, y));
        }
    }
    points
}

/// Transform a bounding box into `dst` by grid sampling.
///
/// The source rectangle is first intersected with the source CRS validity
/// area (when known); an empty intersection is `OutsideValidArea`. The
/// intersected rectangle is sampled on an n×n grid, every point is
/// transformed, and the AABB of the finite successes is taken. When the
/// destination is geographic and the resulting longitude span exceeds 180°,
/// longitude collapses to [-180, 180] (antimeridian guard). The result is
/// stamped with the destination UID so callers can compare identities.
pub fn transform_bounding_box(
    registry: &CrsRegistry,
    src_box: &BoundingBox,
    dst: &Crs,
    grid: usize,
) -> CrsResult<BoundingBox> {
    if !src_box.is_valid() {
        return Err(CrsError::TransformFailure(String::from(
            "invalid source bounding box",
        )));
    }
    let src = registry.resolve(&src_box.crs_id)?;
    if src == *dst {
        return Ok(BoundingBox::new(dst.uid(), src_box.rect));
    }

    let clipped = match valid_area::valid_area(registry, &src) {
        Ok(area) if area.rect.is_valid() => src_box
            .rect
            .intersection(&area.rect)
            .ok_or(CrsError::OutsideValidArea)?,
        // No usable validity area: transform the rectangle as given.
        _ => src_box.rect,
    };

    let samples = grid_samples(&clipped, grid);
    let transformed = transform_points_partial(&src, dst, &samples)?;

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut any = false;
    for point in transformed.into_iter().flatten() {
        any = true;
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    if !any {
        return Err(CrsError::TransformFailure(format!(
            "no grid sample survived {} -> {}",
            src.uid(),
            dst.uid()
        )));
    }

    if dst.is_geographic() && (max_x - min_x) > 180.0 {
        min_x = -180.0;
        max_x = 180.0;
    }

    Ok(BoundingBox::new(
        dst.uid(),
        Rect::new_raw(min_x, min_y, max_x, max_y),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_samples_density_and_edges() {
        let rect = Rect::new(0.0, 0.0, 10.0, 20.0);
        let samples = grid_samples(&rect, 11);
        assert_eq!(samples.len(), 121);
        assert_eq!(samples[0], Point2d::new(0.0, 0.0));
        assert_eq!(samples[10], Point2d::new(10.0, 0.0));
        assert_eq!(*samples.last().unwrap(), Point2d::new(10.0, 20.0));
    }

    #[test]
    fn test_transform_point_4326_to_3857() {
        let registry = CrsRegistry::new();
        let wgs84 = registry.resolve("EPSG:4326").unwrap();
        let mercator = registry.resolve("EPSG:3857").unwrap();

        // Traditional GIS order: x = longitude.
        let p = transform_point(&wgs84, &mercator, Point2d::new(0.0, 0.0)).unwrap();
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);

        let p = transform_point(&wgs84, &mercator, Point2d::new(180.0, 0.0)).unwrap();
        assert!((p.x - 20037508.342789244).abs() < 1.0);
    }

    #[test]
    fn test_transform_point_rejects_nan() {
        let registry = CrsRegistry::new();
        let wgs84 = registry.resolve("EPSG:4326").unwrap();
        let mercator = registry.resolve("EPSG:3857").unwrap();
        assert!(transform_point(&wgs84, &mercator, Point2d::default()).is_err());
    }

    #[test]
    fn test_transform_bbox_roundtrip_contains_original() {
        let registry = CrsRegistry::new();
        let mercator = registry.resolve("EPSG:3857").unwrap();
        let wgs84 = registry.resolve("EPSG:4326").unwrap();

        let original = BoundingBox::from_coords("EPSG:4326", -10.0, -10.0, 10.0, 10.0);
        let there =
            transform_bounding_box(&registry, &original, &mercator, BBOX_SAMPLE_GRID).unwrap();
        let back = transform_bounding_box(&registry, &there, &wgs84, BBOX_SAMPLE_GRID).unwrap();

        // Grid-induced expansion stays below one cell per side.
        let cell_x = there.rect.width() / (BBOX_SAMPLE_GRID - 1) as f64;
        assert!(back.rect.min_x <= original.rect.min_x + 1e-6);
        assert!(back.rect.max_x >= original.rect.max_x - 1e-6);
        assert!(back.rect.width() <= original.rect.width() + 2.0 * cell_x);
    }

    #[test]
    fn test_transform_bbox_same_crs_is_identity() {
        let registry = CrsRegistry::new();
        let wgs84 = registry.resolve("EPSG:4326").unwrap();
        let b = BoundingBox::from_coords("EPSG:4326", -10.0, -5.0, 10.0, 5.0);
        let out = transform_bounding_box(&registry, &b, &wgs84, BBOX_SAMPLE_GRID).unwrap();
        assert_eq!(out.rect, b.rect);
        assert_eq!(out.crs_id, "EPSG:4326");
    }
}
