//! Planning proper: CRS choice, viewport reprojection, level selection,
//! row/column ranges, request emission.

use std::path::PathBuf;

use tracing::debug;
use weave_capabilities::{ServiceModel, TileMatrix, TileMatrixSet, WmtsTileLayer};
use weave_common::{BoundingBox, Rect};
use weave_crs::{transform_bounding_box, CrsRegistry};

use crate::error::PlanError;
use crate::paths;
use crate::request::TileRequest;
use crate::urls;

/// Density targets: at most this many tiles along the shorter / longer
/// viewport side when choosing a level.
const MAX_TILE_ROWS_IN_VIEW: f64 = 2.0;
const MAX_TILE_COLS_IN_VIEW: f64 = 8.0;

/// Zoom levels are confined to this range; WMTS additionally floors at 2 to
/// avoid single-tile whole-world requests.
const LEVEL_MAX: i32 = 25;
const WMTS_LEVEL_MIN: i32 = 2;

/// Fixed WMS GetMap frame: 1600 px wide at a 16:9 aspect.
const WMS_FRAME_WIDTH: u32 = 1600;
const WMS_FRAME_HEIGHT: u32 = WMS_FRAME_WIDTH * 1080 / 1920;

/// The CRS operations planning needs, as a seam so planner tests run
/// without a PROJ database.
pub trait CrsOps {
    fn canonical_code(&self, definition: &str) -> Option<String>;
    fn axis_should_invert(&self, definition: &str) -> bool;
    fn transform_bbox(&self, src: &BoundingBox, dst_definition: &str) -> Option<BoundingBox>;
}

impl CrsOps for CrsRegistry {
    fn canonical_code(&self, definition: &str) -> Option<String> {
        CrsRegistry::canonical_code(self, definition)
    }

    fn axis_should_invert(&self, definition: &str) -> bool {
        CrsRegistry::axis_should_invert(self, definition)
    }

    fn transform_bbox(&self, src: &BoundingBox, dst_definition: &str) -> Option<BoundingBox> {
        let dst = self.resolve(dst_definition).ok()?;
        transform_bounding_box(self, src, &dst, weave_crs::transform::BBOX_SAMPLE_GRID).ok()
    }
}

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Scratch directory for tile files.
    pub temp_dir: PathBuf,
}

/// Inputs for one planning run.
#[derive(Debug, Clone)]
pub struct PlanParams<'a> {
    pub layer_title: &'a str,
    /// Ignored for WMS layers.
    pub tile_matrix_set: &'a str,
    pub format: &'a str,
    pub style: &'a str,
    /// Viewport in any CRS.
    pub viewport: &'a BoundingBox,
    /// The service URL the user supplied (token source + KVP base).
    pub service_url: &'a str,
    /// Prefer the capability document's DCP endpoint over the user URL.
    pub use_xlink_href: bool,
}

pub struct Planner<'a> {
    model: &'a ServiceModel,
    crs: &'a dyn CrsOps,
    config: PlannerConfig,
}

impl<'a> Planner<'a> {
    pub fn new(model: &'a ServiceModel, crs: &'a dyn CrsOps, config: PlannerConfig) -> Self {
        Self { model, crs, config }
    }

    /// The CRS tiles for this layer live in.
    ///
    /// WMS: the layer's sole declared CRS; else EPSG:4326 when declared;
    /// else EPSG:3857 when CRS:84 or EPSG:3857 is; else the first CRS with a
    /// resolvable authority code; else EPSG:4326. WMTS: the matrix set CRS.
    pub fn layer_crs(&self, layer_title: &str, tile_matrix_set: &str) -> Option<String> {
        if let Some(layer) = self.model.wms_layer_by_title(layer_title) {
            if layer.crs_ids.is_empty() {
                return Some(String::from("EPSG:4326"));
            }
            if layer.crs_ids.len() == 1 {
                return Some(layer.crs_ids[0].clone());
            }
            if layer.crs_ids.iter().any(|c| c == "EPSG:4326") {
                return Some(String::from("EPSG:4326"));
            }
            if layer.crs_ids.iter().any(|c| c == "CRS:84" || c == "EPSG:3857") {
                return Some(String::from("EPSG:3857"));
            }
            for crs_id in &layer.crs_ids {
                if let Some(code) = self.crs.canonical_code(crs_id) {
                    return Some(code);
                }
            }
            return Some(String::from("EPSG:4326"));
        }

        self.model
            .tile_matrix_sets
            .get(tile_matrix_set)
            .map(|set| set.crs_id.clone())
            .filter(|crs_id| !crs_id.is_empty())
    }

    /// Produce the ordered tile plan for a viewport.
    pub fn plan(&self, params: &PlanParams<'_>) -> Result<Vec<TileRequest>, PlanError> {
        let tile_crs = self
            .layer_crs(params.layer_title, params.tile_matrix_set)
            .ok_or(PlanError::CrsUnresolvable)?;

        let viewport = if params.viewport.crs_id == tile_crs {
            params.viewport.clone()
        } else {
            self.crs
                .transform_bbox(params.viewport, &tile_crs)
                .ok_or(PlanError::NoViewportOverlap)?
        };
        if !viewport.rect.is_valid() {
            return Err(PlanError::NoViewportOverlap);
        }

        if self.model.is_wmts_layer(params.layer_title) {
            self.plan_wmts(params, &viewport)
        } else {
            self.plan_wms(params, &viewport)
        }
    }

    /// Pick a level by walking matrices coarsest-first until the viewport
    /// exceeds the tile-count density target.
    fn calculate_level(&self, set: &TileMatrixSet, view: &Rect) -> Result<i32, PlanError> {
        let (short_side, long_side) = if view.width() > view.height() {
            (view.height(), view.width())
        } else {
            (view.width(), view.height())
        };

        for matrix in set.tile_matrices.iter().rev() {
            let rows_span = matrix.pixel_size * matrix.tile_height as f64 * MAX_TILE_ROWS_IN_VIEW;
            let cols_span = matrix.pixel_size * matrix.tile_width as f64 * MAX_TILE_COLS_IN_VIEW;
            if short_side > rows_span || long_side > cols_span {
                let Some(level) = matrix.level_number() else {
                    continue;
                };
                if !(0..=LEVEL_MAX).contains(&level) {
                    continue;
                }
                return Ok(level);
            }
        }
        Err(PlanError::LevelOutOfRange)
    }

    fn plan_wmts(
        &self,
        params: &PlanParams<'_>,
        viewport: &BoundingBox,
    ) -> Result<Vec<TileRequest>, PlanError> {
        let layer = self
            .model
            .wmts_layer_by_title(params.layer_title)
            .ok_or(PlanError::CrsUnresolvable)?;
        if !layer.matrix_set_links.contains_key(params.tile_matrix_set) {
            return Err(PlanError::EmptyPlan);
        }
        let set = self
            .model
            .tile_matrix_sets
            .get(params.tile_matrix_set)
            .ok_or(PlanError::EmptyPlan)?;

        let level = self
            .calculate_level(set, &viewport.rect)?
            .max(WMTS_LEVEL_MIN);
        let matrix = set.matrix_for_level(level).ok_or(PlanError::EmptyPlan)?;

        let (start_col, end_col, start_row, end_row) =
            tile_range(matrix, &viewport.rect, layer, params.tile_matrix_set, level)?;

        debug!(
            layer = params.layer_title,
            level,
            cols = ?(start_col..=end_col),
            rows = ?(start_row..=end_row),
            "planned WMTS tile range"
        );

        let span_x = matrix.tile_span_x();
        let span_y = matrix.tile_span_y();
        let kvp = urls::is_kvp(self.model);

        let mut tiles = Vec::new();
        for row in start_row..=end_row {
            for col in start_col..=end_col {
                let left_top_x = matrix.top_left.x + col as f64 * span_x;
                let left_top_y = matrix.top_left.y - row as f64 * span_y;
                let mut tile = TileRequest {
                    level,
                    row,
                    col,
                    num_width_pixels: matrix.tile_width,
                    num_height_pixels: matrix.tile_height,
                    left_top_x,
                    left_top_y,
                    bbox: BoundingBox::new(
                        set.crs_id.clone(),
                        Rect::new(left_top_x, left_top_y, left_top_x + span_x, left_top_y - span_y),
                    ),
                    layer_title: params.layer_title.to_string(),
                    layer_name: layer.identifier.clone(),
                    tile_matrix_set: set.identifier.clone(),
                    format: params.format.to_string(),
                    style: params.style.to_string(),
                    version: self.model.version.clone(),
                    ..Default::default()
                };
                tile.file_path = paths::wmts_tile_path(&self.config.temp_dir, &tile);
                tile.url = if kvp {
                    urls::wmts_kvp_url(
                        self.model,
                        &tile,
                        params.service_url,
                        params.use_xlink_href,
                        &matrix.identifier,
                    )
                } else {
                    urls::wmts_rest_url(layer, &tile, &matrix.identifier).unwrap_or_default()
                };
                tiles.push(tile);
            }
        }

        if tiles.is_empty() {
            return Err(PlanError::EmptyPlan);
        }
        Ok(tiles)
    }

    /// WMS: one fixed-size frame covering the whole viewport.
    fn plan_wms(
        &self,
        params: &PlanParams<'_>,
        viewport: &BoundingBox,
    ) -> Result<Vec<TileRequest>, PlanError> {
        let layer = self
            .model
            .wms_layer_by_title(params.layer_title)
            .ok_or(PlanError::CrsUnresolvable)?;

        let mut tile = TileRequest {
            level: 0,
            row: 0,
            col: 0,
            num_width_pixels: WMS_FRAME_WIDTH,
            num_height_pixels: WMS_FRAME_HEIGHT,
            left_top_x: viewport.rect.min_x,
            left_top_y: viewport.rect.max_y,
            bbox: viewport.clone(),
            layer_title: params.layer_title.to_string(),
            layer_name: layer.name.clone(),
            format: params.format.to_string(),
            style: params.style.to_string(),
            version: self.model.version.clone(),
            ..Default::default()
        };
        tile.file_path = paths::wms_tile_path(&self.config.temp_dir, &tile);

        let axis_inverted = self.crs.axis_should_invert(&tile.bbox.crs_id);
        tile.url = urls::wms_getmap_url(
            self.model,
            &tile,
            params.service_url,
            params.use_xlink_href,
            axis_inverted,
        );

        Ok(vec![tile])
    }
}

/// Floor-based start index, clamped at 0.
fn tile_index_start(offset: f64, span: f64) -> i64 {
    (offset / span).floor().max(0.0) as i64
}

/// Half-open end index: a viewport edge exactly on a tile boundary does not
/// pull in the neighbor tile.
fn tile_index_end(offset: f64, span: f64) -> i64 {
    let t = offset / span;
    let floored = t.floor();
    if t == floored {
        floored as i64 - 1
    } else {
        floored as i64
    }
}

fn tile_range(
    matrix: &TileMatrix,
    view: &Rect,
    layer: &WmtsTileLayer,
    set_name: &str,
    level: i32,
) -> Result<(i64, i64, i64, i64), PlanError> {
    let span_x = matrix.tile_span_x();
    let span_y = matrix.tile_span_y();
    if span_x <= 0.0 || span_y <= 0.0 {
        return Err(PlanError::EmptyPlan);
    }

    let mut start_col = tile_index_start(view.min_x - matrix.top_left.x, span_x);
    let mut end_col = tile_index_end(view.max_x - matrix.top_left.x, span_x);
    let mut start_row = tile_index_start(matrix.top_left.y - view.max_y, span_y);
    let mut end_row = tile_index_end(matrix.top_left.y - view.min_y, span_y);

    end_col = end_col.min(start_col + matrix.matrix_width as i64 - 1);
    end_row = end_row.min(start_row + matrix.matrix_height as i64 - 1);

    if let Some(limits) = layer
        .matrix_set_links
        .get(set_name)
        .and_then(|link| link.limits.get(&level.to_string()))
    {
        if limits.is_valid() {
            start_col = start_col.max(limits.min_col);
            end_col = end_col.min(limits.max_col);
            start_row = start_row.max(limits.min_row);
            end_row = end_row.min(limits.max_row);
        }
    }

    if start_col > end_col || start_row > end_row || end_col < 0 || end_row < 0 {
        return Err(PlanError::EmptyPlan);
    }
    Ok((start_col, end_col, start_row, end_row))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_helpers_half_open() {
        // Exactly on a boundary: the end index stays on the inner tile.
        assert_eq!(tile_index_start(0.0, 100.0), 0);
        assert_eq!(tile_index_start(-50.0, 100.0), 0);
        assert_eq!(tile_index_start(250.0, 100.0), 2);
        assert_eq!(tile_index_end(100.0, 100.0), 0);
        assert_eq!(tile_index_end(199.0, 100.0), 1);
        assert_eq!(tile_index_end(200.0, 100.0), 1);
    }
}
