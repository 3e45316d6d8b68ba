//! GDAL implementation of [`RasterBackend`].

use std::path::Path;
use std::sync::Once;

use gdal::raster::Buffer;
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::{Dataset, DriverManager};
use tracing::{debug, warn};

use crate::backend::{RasterBackend, RasterImage};
use crate::error::RasterError;

static REGISTER: Once = Once::new();

/// Boundary sample density when estimating the warped output extent.
const EXTENT_GRID: usize = 21;

#[derive(Debug, Default, Clone, Copy)]
pub struct GdalBackend;

impl GdalBackend {
    pub fn new() -> Self {
        Self
    }
}

fn read_band_u8(dataset: &Dataset, index: usize, w: usize, h: usize) -> Result<Vec<u8>, RasterError> {
    let band = dataset.rasterband(index)?;
    let mut out = vec![0u8; w * h];
    band.read_into_slice::<u8>((0, 0), (w, h), (w, h), &mut out, None)?;
    Ok(out)
}

fn spatial_ref_traditional(wkt: &str) -> Result<SpatialRef, RasterError> {
    let mut srs = SpatialRef::from_definition(wkt)?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

impl RasterBackend for GdalBackend {
    fn register_drivers(&self) {
        REGISTER.call_once(DriverManager::register_all);
    }

    fn raster_size(&self, path: &str) -> Result<(usize, usize), RasterError> {
        let dataset = Dataset::open(Path::new(path))?;
        Ok(dataset.raster_size())
    }

    fn read_rgba(&self, path: &str) -> Result<RasterImage, RasterError> {
        let dataset = Dataset::open(Path::new(path))?;
        let (w, h) = dataset.raster_size();
        let bands = dataset.raster_count();

        let mut image = RasterImage::blank(w, h);
        match bands {
            1 => {
                let values = read_band_u8(&dataset, 1, w, h)?;
                let band = dataset.rasterband(1)?;
                if let Some(table) = band.color_table() {
                    for (i, &index) in values.iter().enumerate() {
                        let Some(entry) = table.entry_as_rgb(index as usize) else {
                            continue;
                        };
                        let at = i * 4;
                        image.rgba[at] = entry.r as u8;
                        image.rgba[at + 1] = entry.g as u8;
                        image.rgba[at + 2] = entry.b as u8;
                        image.rgba[at + 3] = entry.a as u8;
                    }
                } else {
                    for (i, &gray) in values.iter().enumerate() {
                        let at = i * 4;
                        image.rgba[at] = gray;
                        image.rgba[at + 1] = gray;
                        image.rgba[at + 2] = gray;
                        image.rgba[at + 3] = gray;
                    }
                };
            }
            3 | 4 => {
                let r = read_band_u8(&dataset, 1, w, h)?;
                let g = read_band_u8(&dataset, 2, w, h)?;
                let b = read_band_u8(&dataset, 3, w, h)?;
                let a = if bands == 4 {
                    Some(read_band_u8(&dataset, 4, w, h)?)
                } else {
                    None
                };
                for i in 0..w * h {
                    let at = i * 4;
                    image.rgba[at] = r[i];
                    image.rgba[at + 1] = g[i];
                    image.rgba[at + 2] = b[i];
                    image.rgba[at + 3] = a.as_ref().map(|a| a[i]).unwrap_or(255);
                }
            }
            other => return Err(RasterError::UnsupportedBandCount(other)),
        }
        Ok(image)
    }

    fn write_geotiff(
        &self,
        path: &str,
        image: &RasterImage,
        projection_wkt: &str,
        geo_transform: [f64; 6],
    ) -> Result<(), RasterError> {
        let expected = image.width * image.height * 4;
        if image.rgba.len() != expected {
            return Err(RasterError::BufferSizeMismatch {
                expected,
                actual: image.rgba.len(),
            });
        }

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset =
            driver.create_with_band_type::<u8, _>(path, image.width, image.height, 4)?;
        dataset.set_projection(projection_wkt)?;
        dataset.set_geo_transform(&geo_transform)?;

        for band_index in 0..4usize {
            let plane: Vec<u8> = image
                .rgba
                .chunks_exact(4)
                .map(|px| px[band_index])
                .collect();
            let mut buffer = Buffer::new((image.width, image.height), plane);
            let mut band = dataset.rasterband(band_index + 1)?;
            band.write((0, 0), (image.width, image.height), &mut buffer)?;
        }
        Ok(())
    }

    fn geo_transform(&self, path: &str) -> Result<[f64; 6], RasterError> {
        let dataset = Dataset::open(Path::new(path))?;
        Ok(dataset.geo_transform()?)
    }

    fn warp(
        &self,
        in_path: &str,
        out_path: &str,
        src_wkt: &str,
        dst_wkt: &str,
        src_geo_transform: [f64; 6],
    ) -> Result<(), RasterError> {
        let source = self.read_rgba(in_path)?;
        let (w, h) = (source.width, source.height);
        let gt = src_geo_transform;

        let src_srs = spatial_ref_traditional(src_wkt)?;
        let dst_srs = spatial_ref_traditional(dst_wkt)?;
        let forward = CoordTransform::new(&src_srs, &dst_srs)?;
        let inverse = CoordTransform::new(&dst_srs, &src_srs)?;

        // Output extent: AABB of a boundary-inclusive grid over the source
        // extent, transformed forward. Points outside the target's domain
        // are skipped.
        let src_x0 = gt[0];
        let src_x1 = gt[0] + gt[1] * w as f64;
        let src_y0 = gt[3];
        let src_y1 = gt[3] + gt[5] * h as f64;

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        let mut any = false;
        let step_x = (src_x1 - src_x0) / (EXTENT_GRID - 1) as f64;
        let step_y = (src_y1 - src_y0) / (EXTENT_GRID - 1) as f64;
        for j in 0..EXTENT_GRID {
            for i in 0..EXTENT_GRID {
                let mut xs = [src_x0 + step_x * i as f64];
                let mut ys = [src_y0 + step_y * j as f64];
                let mut zs: [f64; 0] = [];
                if forward.transform_coords(&mut xs, &mut ys, &mut zs).is_err() {
                    continue;
                }
                if !xs[0].is_finite() || !ys[0].is_finite() {
                    continue;
                }
                any = true;
                min_x = min_x.min(xs[0]);
                min_y = min_y.min(ys[0]);
                max_x = max_x.max(xs[0]);
                max_y = max_y.max(ys[0]);
            }
        }
        if !any || min_x >= max_x || min_y >= max_y {
            return Err(RasterError::EmptyWarpExtent);
        }

        // Keep the source pixel count; resolution follows the new extent.
        let out_px_x = (max_x - min_x) / w as f64;
        let out_px_y = (max_y - min_y) / h as f64;
        let mut output = RasterImage::blank(w, h);

        let mut row_x = vec![0.0f64; w];
        let mut row_y = vec![0.0f64; w];
        for row in 0..h {
            let dst_y = max_y - (row as f64 + 0.5) * out_px_y;
            for (col, x) in row_x.iter_mut().enumerate() {
                *x = min_x + (col as f64 + 0.5) * out_px_x;
            }
            row_y.fill(dst_y);

            let mut zs: [f64; 0] = [];
            let row_ok = inverse
                .transform_coords(&mut row_x, &mut row_y, &mut zs)
                .is_ok();

            for col in 0..w {
                let (sx, sy) = if row_ok {
                    (row_x[col], row_y[col])
                } else {
                    // Whole-row transform failed (some point out of domain);
                    // fall back to a single-point transform.
                    let mut xs = [min_x + (col as f64 + 0.5) * out_px_x];
                    let mut ys = [dst_y];
                    let mut zs1: [f64; 0] = [];
                    if inverse.transform_coords(&mut xs, &mut ys, &mut zs1).is_err() {
                        continue;
                    }
                    (xs[0], ys[0])
                };
                if !sx.is_finite() || !sy.is_finite() {
                    continue;
                }

                let src_col = ((sx - gt[0]) / gt[1]).floor();
                let src_row = ((sy - gt[3]) / gt[5]).floor();
                if src_col < 0.0
                    || src_row < 0.0
                    || src_col >= w as f64
                    || src_row >= h as f64
                {
                    continue;
                }
                output.set_pixel(col, row, source.pixel(src_col as usize, src_row as usize));
            }
            // Restore the row buffers for the next iteration.
            if !row_ok {
                debug!(row, "row transform fell back to per-pixel sampling");
            }
        }

        let out_gt = [min_x, out_px_x, 0.0, max_y, 0.0, -out_px_y];
        self.write_geotiff(out_path, &output, dst_srs.to_wkt()?.as_str(), out_gt)
    }

    fn ingest_geopackage(
        &self,
        mosaic_path: &str,
        gpkg_path: &str,
        zoom: i32,
    ) -> Result<(), RasterError> {
        use gdal::raster::RasterCreationOptions;

        let dataset = Dataset::open(Path::new(mosaic_path))?;
        let driver = DriverManager::get_driver_by_name("GPKG")?;

        let table = format!("tiles_level_{zoom}");
        let zoom_value = zoom.to_string();
        let mut options = RasterCreationOptions::new();
        options.add_name_value("RASTER_TABLE", &table)?;
        options.add_name_value("TILING_SCHEME", "GoogleMapsCompatible")?;
        options.add_name_value("ZOOM_LEVEL", &zoom_value)?;
        if Path::new(gpkg_path).exists() {
            options.add_name_value("APPEND_SUBDATASET", "YES")?;
        } else {
            warn!(gpkg_path, "creating new GeoPackage");
        }

        dataset.create_copy(&driver, gpkg_path, &options)?;
        Ok(())
    }
}
