//! Mosaic tests against an in-memory raster backend.

use std::collections::HashMap;
use std::sync::Mutex;

use weave_common::{BoundingBox, Rect};
use weave_engine::mosaic;
use weave_engine::EngineError;
use weave_planner::TileRequest;
use weave_raster::{RasterBackend, RasterError, RasterImage};

/// Backend holding images in memory, recording written GeoTIFFs.
#[derive(Default)]
struct MemoryBackend {
    files: Mutex<HashMap<String, RasterImage>>,
    written: Mutex<Vec<(String, RasterImage, String, [f64; 6])>>,
}

impl MemoryBackend {
    fn put(&self, path: &str, image: RasterImage) {
        self.files.lock().unwrap().insert(path.to_string(), image);
    }

    fn last_written(&self) -> (String, RasterImage, String, [f64; 6]) {
        self.written.lock().unwrap().last().cloned().unwrap()
    }
}

impl RasterBackend for MemoryBackend {
    fn register_drivers(&self) {}

    fn raster_size(&self, path: &str) -> Result<(usize, usize), RasterError> {
        let files = self.files.lock().unwrap();
        let image = files
            .get(path)
            .ok_or_else(|| RasterError::Backend(format!("missing: {path}")))?;
        Ok((image.width, image.height))
    }

    fn read_rgba(&self, path: &str) -> Result<RasterImage, RasterError> {
        let files = self.files.lock().unwrap();
        files
            .get(path)
            .cloned()
            .ok_or_else(|| RasterError::Backend(format!("missing: {path}")))
    }

    fn write_geotiff(
        &self,
        path: &str,
        image: &RasterImage,
        projection_wkt: &str,
        geo_transform: [f64; 6],
    ) -> Result<(), RasterError> {
        self.written.lock().unwrap().push((
            path.to_string(),
            image.clone(),
            projection_wkt.to_string(),
            geo_transform,
        ));
        Ok(())
    }

    fn geo_transform(&self, _path: &str) -> Result<[f64; 6], RasterError> {
        Ok([0.0; 6])
    }

    fn warp(
        &self,
        _in_path: &str,
        _out_path: &str,
        _src_wkt: &str,
        _dst_wkt: &str,
        _src_geo_transform: [f64; 6],
    ) -> Result<(), RasterError> {
        Ok(())
    }

    fn ingest_geopackage(
        &self,
        _mosaic_path: &str,
        _gpkg_path: &str,
        _zoom: i32,
    ) -> Result<(), RasterError> {
        Ok(())
    }
}

fn solid(width: usize, height: usize, color: [u8; 4]) -> RasterImage {
    let mut image = RasterImage::blank(width, height);
    for row in 0..height {
        for col in 0..width {
            image.set_pixel(col, row, color);
        }
    }
    image
}

fn tile(row: i64, col: i64, path: &str) -> TileRequest {
    // 2x2 tile grid, 100 units per tile, top-left of the grid at (0, 200).
    let left = col as f64 * 100.0;
    let top = 200.0 - row as f64 * 100.0;
    TileRequest {
        level: 3,
        row,
        col,
        num_width_pixels: 4,
        num_height_pixels: 4,
        left_top_x: left,
        left_top_y: top,
        bbox: BoundingBox::new("EPSG:3857", Rect::new(left, top - 100.0, left + 100.0, top)),
        layer_name: String::from("img"),
        file_path: path.to_string(),
        ..Default::default()
    }
}

#[test]
fn test_mosaic_places_tiles_row_col() {
    let backend = MemoryBackend::default();
    backend.put("/tmp/a.png", solid(4, 4, [255, 0, 0, 255]));
    backend.put("/tmp/b.png", solid(4, 4, [0, 255, 0, 255]));
    backend.put("/tmp/c.png", solid(4, 4, [0, 0, 255, 255]));
    backend.put("/tmp/d.png", solid(4, 4, [255, 255, 0, 255]));

    let tiles = vec![
        tile(0, 0, "/tmp/a.png"),
        tile(0, 1, "/tmp/b.png"),
        tile(1, 0, "/tmp/c.png"),
        tile(1, 1, "/tmp/d.png"),
    ];

    let path = mosaic::splice(&backend, &tiles, "WKT").unwrap();
    assert_eq!(path, "/tmp/splice_tile.tiff");

    let (_, canvas, wkt, gt) = backend.last_written();
    assert_eq!(wkt, "WKT");
    assert_eq!((canvas.width, canvas.height), (8, 8));

    // Quadrants carry their tile's color.
    assert_eq!(canvas.pixel(0, 0), [255, 0, 0, 255]);
    assert_eq!(canvas.pixel(7, 0), [0, 255, 0, 255]);
    assert_eq!(canvas.pixel(0, 7), [0, 0, 255, 255]);
    assert_eq!(canvas.pixel(7, 7), [255, 255, 0, 255]);

    // Geotransform: top-left of the covered range, 25 units/pixel.
    assert_eq!(gt, [0.0, 25.0, 0.0, 200.0, 0.0, -25.0]);
}

#[test]
fn test_mosaic_skips_missing_tiles_without_aborting() {
    let backend = MemoryBackend::default();
    backend.put("/tmp/a.png", solid(4, 4, [255, 0, 0, 255]));
    // /tmp/gone.png is never stored.

    let tiles = vec![tile(0, 0, "/tmp/a.png"), tile(0, 1, "/tmp/gone.png")];
    mosaic::splice(&backend, &tiles, "WKT").unwrap();

    let (_, canvas, _, _) = backend.last_written();
    assert_eq!((canvas.width, canvas.height), (8, 4));
    assert_eq!(canvas.pixel(0, 0), [255, 0, 0, 255]);
    // Missing tile's area stays fully transparent.
    assert_eq!(canvas.pixel(7, 0), [0, 0, 0, 0]);
}

#[test]
fn test_mosaic_rejects_dimension_mismatch() {
    let backend = MemoryBackend::default();
    let mut odd = tile(0, 1, "/tmp/b.png");
    odd.num_width_pixels = 8;
    let tiles = vec![tile(0, 0, "/tmp/a.png"), odd];
    let err = mosaic::splice(&backend, &tiles, "WKT").unwrap_err();
    assert!(matches!(err, EngineError::MosaicPixelDimensionMismatch));
}

#[test]
fn test_mosaic_empty_plan_is_an_error() {
    let backend = MemoryBackend::default();
    let err = mosaic::splice(&backend, &[], "WKT").unwrap_err();
    assert!(matches!(err, EngineError::NoTilesDownloaded));
}

#[test]
fn test_mosaic_single_tile_offset_range() {
    // Tiles far from the origin: offsets are relative to min row/col.
    let backend = MemoryBackend::default();
    backend.put("/tmp/a.png", solid(4, 4, [9, 9, 9, 255]));
    let tiles = vec![tile(12, 7, "/tmp/a.png")];
    mosaic::splice(&backend, &tiles, "WKT").unwrap();
    let (_, canvas, _, gt) = backend.last_written();
    assert_eq!((canvas.width, canvas.height), (4, 4));
    assert_eq!(canvas.pixel(0, 0), [9, 9, 9, 255]);
    assert_eq!(gt[0], 700.0);
    assert_eq!(gt[3], 200.0 - 1200.0);
}
