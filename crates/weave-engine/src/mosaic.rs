//! Pixel-exact tile mosaic.
//!
//! All tiles of one plan share a CRS and pixel dimensions; each is blitted
//! into the canvas at `((col - min_col) * w, (row - min_row) * h)`. A tile
//! whose file cannot be read is skipped (its area stays transparent) — the
//! mosaic never aborts on individual tiles.

use std::path::Path;

use tracing::{info, warn};
use weave_planner::TileRequest;
use weave_raster::{RasterBackend, RasterImage};

use crate::error::EngineError;

/// File name of the spliced mosaic inside the scratch directory.
const MOSAIC_FILE_NAME: &str = "splice_tile.tiff";

/// Stitch the planned tiles into one GeoTIFF. `projection_wkt` is the tile
/// CRS in WKT. Returns the mosaic path.
pub fn splice(
    backend: &dyn RasterBackend,
    tiles: &[TileRequest],
    projection_wkt: &str,
) -> Result<String, EngineError> {
    let Some(first) = tiles.first() else {
        return Err(EngineError::NoTilesDownloaded);
    };

    let tile_w = first.num_width_pixels as usize;
    let tile_h = first.num_height_pixels as usize;
    if tile_w == 0 || tile_h == 0 {
        return Err(EngineError::MosaicPixelDimensionMismatch);
    }
    if tiles
        .iter()
        .any(|t| t.num_width_pixels as usize != tile_w || t.num_height_pixels as usize != tile_h)
    {
        return Err(EngineError::MosaicPixelDimensionMismatch);
    }

    let min_col = tiles.iter().map(|t| t.col).min().unwrap_or(0);
    let max_col = tiles.iter().map(|t| t.col).max().unwrap_or(0);
    let min_row = tiles.iter().map(|t| t.row).min().unwrap_or(0);
    let max_row = tiles.iter().map(|t| t.row).max().unwrap_or(0);

    let canvas_w = tile_w * (max_col - min_col + 1) as usize;
    let canvas_h = tile_h * (max_row - min_row + 1) as usize;
    let mut canvas = RasterImage::blank(canvas_w, canvas_h);

    let mut placed = 0usize;
    for tile in tiles {
        let image = match backend.read_rgba(&tile.file_path) {
            Ok(image) => image,
            Err(err) => {
                warn!(file = %tile.file_path, error = %err, "skipping unreadable tile");
                continue;
            }
        };
        if image.width != tile_w || image.height != tile_h {
            warn!(
                file = %tile.file_path,
                width = image.width,
                height = image.height,
                "skipping tile with unexpected dimensions"
            );
            continue;
        }

        let offset_x = (tile.col - min_col) as usize * tile_w;
        let offset_y = (tile.row - min_row) as usize * tile_h;
        for row in 0..tile_h {
            let src_start = row * tile_w * 4;
            let dst_start = ((offset_y + row) * canvas_w + offset_x) * 4;
            canvas.rgba[dst_start..dst_start + tile_w * 4]
                .copy_from_slice(&image.rgba[src_start..src_start + tile_w * 4]);
        }
        placed += 1;
    }

    // Geotransform anchored at the top-left of the covered range, with the
    // per-pixel resolution of the first tile.
    let pixel_x = first.bbox.rect.width() / tile_w as f64;
    let pixel_y = first.bbox.rect.height() / tile_h as f64;
    let left = tiles
        .iter()
        .map(|t| t.left_top_x)
        .fold(f64::INFINITY, f64::min);
    let top = tiles
        .iter()
        .map(|t| t.left_top_y)
        .fold(f64::NEG_INFINITY, f64::max);
    let geo_transform = [left, pixel_x, 0.0, top, 0.0, -pixel_y];

    let dir = Path::new(&first.file_path)
        .parent()
        .map(|d| d.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    let mosaic_path = if dir.is_empty() {
        MOSAIC_FILE_NAME.to_string()
    } else {
        format!("{dir}/{MOSAIC_FILE_NAME}")
    };

    backend.write_geotiff(&mosaic_path, &canvas, projection_wkt, geo_transform)?;
    info!(
        path = %mosaic_path,
        tiles = placed,
        of = tiles.len(),
        width = canvas_w,
        height = canvas_h,
        "mosaic written"
    );
    Ok(mosaic_path)
}
