//! The planned tile request. Immutable once planning finishes; the engine
//! only observes it and writes the file at `file_path`.

use serde::{Deserialize, Serialize};
use weave_common::BoundingBox;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TileRequest {
    /// Zoom level; 0 for WMS single-frame requests.
    pub level: i32,
    pub row: i64,
    pub col: i64,
    pub num_width_pixels: u32,
    pub num_height_pixels: u32,
    /// Top-left corner of the tile in the tile CRS.
    pub left_top_x: f64,
    pub left_top_y: f64,
    /// Exactly the rectangle spanned by the tile in the tile CRS.
    pub bbox: BoundingBox,
    pub url: String,
    /// Scratch file the engine downloads into.
    pub file_path: String,
    pub layer_title: String,
    pub layer_name: String,
    pub tile_matrix_set: String,
    pub format: String,
    pub style: String,
    pub version: String,
}

impl TileRequest {
    pub fn is_valid(&self) -> bool {
        (0..=25).contains(&self.level)
            && self.row >= 0
            && self.col >= 0
            && !self.layer_name.is_empty()
            && self.bbox.is_valid()
    }

    /// CRS-unit width of one pixel of this tile.
    pub fn pixel_size_x(&self) -> f64 {
        self.bbox.rect.width() / self.num_width_pixels as f64
    }

    pub fn pixel_size_y(&self) -> f64 {
        self.bbox.rect.height() / self.num_height_pixels as f64
    }

    /// Affine geotransform `[left, px, 0, top, 0, -py]` for the tile file.
    pub fn geo_transform(&self) -> [f64; 6] {
        [
            self.left_top_x,
            self.pixel_size_x(),
            0.0,
            self.left_top_y,
            0.0,
            -self.pixel_size_y(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_common::Rect;

    #[test]
    fn test_validity() {
        let mut tile = TileRequest::default();
        assert!(!tile.is_valid());

        tile.layer_name = "img".into();
        tile.bbox = BoundingBox::new("EPSG:3857", Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(tile.is_valid());

        tile.level = 26;
        assert!(!tile.is_valid());
    }

    #[test]
    fn test_geo_transform() {
        let tile = TileRequest {
            level: 3,
            num_width_pixels: 256,
            num_height_pixels: 256,
            left_top_x: -100.0,
            left_top_y: 50.0,
            layer_name: "x".into(),
            bbox: BoundingBox::new("EPSG:3857", Rect::new(-100.0, -206.0, 156.0, 50.0)),
            ..Default::default()
        };
        let gt = tile.geo_transform();
        assert_eq!(gt, [-100.0, 1.0, 0.0, 50.0, 0.0, -1.0]);
    }
}
