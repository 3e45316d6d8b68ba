//! The normalized in-memory service model.
//!
//! One schema for all three dialects. Immutable after parsing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use weave_common::{BoundingBox, Point2d, Rect};

/// Service-level metadata. Informational for the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceMetadata {
    pub title: String,
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub fees: String,
    pub access_constraints: String,
    pub online_resource_href: String,
    pub layer_limit: u32,
    pub max_width: u32,
    pub max_height: u32,
}

/// One HTTP binding of an operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DcpHttp {
    pub get: String,
    pub post: String,
}

/// A service operation: advertised formats, DCP endpoints and (WMTS) the
/// allowed request encodings, uppercased with `"KVP"` canonical.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operation {
    pub formats: Vec<String>,
    pub dcp: Vec<DcpHttp>,
    pub allowed_encodings: Vec<String>,
}

impl Operation {
    /// First advertised GET endpoint, when any.
    pub fn first_get_url(&self) -> Option<&str> {
        self.dcp
            .iter()
            .map(|d| d.get.as_str())
            .find(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationSet {
    pub get_map: Operation,
    pub get_feature_info: Operation,
    pub get_tile: Operation,
    pub get_legend_graphic: Operation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WmsLegendUrl {
    pub format: String,
    pub href: String,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WmsStyle {
    pub name: String,
    pub title: String,
    pub abstract_text: String,
    pub legend_urls: Vec<WmsLegendUrl>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataUrl {
    pub format: String,
    pub r#type: String,
    pub href: String,
}

/// A WMS layer node. Children inherit CRS ids, bounding boxes, the
/// geographic bbox and styles from their parent at parse time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WmsLayer {
    /// Document-order identifier, 1-based.
    pub order_id: u32,
    /// Empty for group layers; only named layers are requestable.
    pub name: String,
    pub title: String,
    pub abstract_text: String,
    pub keywords: Vec<String>,
    /// Declared + inherited CRS identifiers, first-seen order, de-duplicated.
    pub crs_ids: Vec<String>,
    /// Geographic extent in CRS:84 (lon/lat).
    pub ex_geographic_bbox: Rect,
    /// One box per CRS id; a re-declaration replaces the earlier one.
    pub bounding_boxes: Vec<BoundingBox>,
    pub styles: Vec<WmsStyle>,
    pub metadata_urls: Vec<MetadataUrl>,
    pub children: Vec<WmsLayer>,
    pub queryable: bool,
    pub cascaded: u32,
    pub opaque: bool,
    pub no_subsets: bool,
    pub fixed_width: u32,
    pub fixed_height: u32,
}

impl WmsLayer {
    pub fn is_requestable(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn bounding_box_for(&self, crs_id: &str) -> Option<&BoundingBox> {
        self.bounding_boxes.iter().find(|b| b.crs_id == crs_id)
    }

    /// Insert or replace the box for its CRS id (last writer wins).
    pub fn upsert_bounding_box(&mut self, bbox: BoundingBox) {
        if let Some(existing) = self
            .bounding_boxes
            .iter_mut()
            .find(|b| b.crs_id == bbox.crs_id)
        {
            *existing = bbox;
        } else {
            self.bounding_boxes.push(bbox);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WmtsLegendUrl {
    pub format: String,
    pub href: String,
    pub min_scale: f64,
    pub max_scale: f64,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WmtsStyle {
    pub identifier: String,
    pub title: String,
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub is_default: bool,
    pub legend_urls: Vec<WmtsLegendUrl>,
}

/// Per-matrix row/column bounds a layer declares inside a matrix set link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileMatrixLimits {
    pub tile_matrix: String,
    pub min_row: i64,
    pub max_row: i64,
    pub min_col: i64,
    pub max_col: i64,
}

impl Default for TileMatrixLimits {
    fn default() -> Self {
        Self {
            tile_matrix: String::new(),
            min_row: -1,
            max_row: -1,
            min_col: -1,
            max_col: -1,
        }
    }
}

impl TileMatrixLimits {
    pub fn is_valid(&self) -> bool {
        self.min_row >= 0
            && self.min_col >= 0
            && self.min_row <= self.max_row
            && self.min_col <= self.max_col
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatrixSetLink {
    pub tile_matrix_set: String,
    /// Keyed by tile matrix identifier.
    pub limits: HashMap<String, TileMatrixLimits>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WmtsTileLayer {
    pub identifier: String,
    pub title: String,
    pub abstract_text: String,
    pub keywords: Vec<String>,
    /// Unique, first-seen order.
    pub formats: Vec<String>,
    pub info_formats: Vec<String>,
    pub styles: HashMap<String, WmtsStyle>,
    pub default_style: String,
    /// Includes the CRS:84 box derived from WGS84BoundingBox when declared;
    /// never empty after parsing (fallbacks apply).
    pub bounding_boxes: Vec<BoundingBox>,
    pub matrix_set_links: HashMap<String, MatrixSetLink>,
    /// Link names in document order; the map above is unordered.
    pub matrix_set_link_order: Vec<String>,
    /// REST tile templates keyed by format.
    pub get_tile_templates: HashMap<String, String>,
    pub get_feature_info_templates: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TileMatrix {
    pub identifier: String,
    pub title: String,
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub scale_denominator: f64,
    /// CRS units per pixel, derived from the scale denominator.
    pub pixel_size: f64,
    pub top_left: Point2d,
    pub tile_width: u32,
    pub tile_height: u32,
    pub matrix_width: u32,
    pub matrix_height: u32,
}

impl TileMatrix {
    /// CRS-unit span of one tile horizontally.
    pub fn tile_span_x(&self) -> f64 {
        self.pixel_size * self.tile_width as f64
    }

    pub fn tile_span_y(&self) -> f64 {
        self.pixel_size * self.tile_height as f64
    }

    /// Trailing integer of the identifier: `"7"` and `"EPSG:4326:7"` both
    /// yield 7.
    pub fn level_number(&self) -> Option<i32> {
        let id = self.identifier.as_str();
        if id.is_empty() {
            return None;
        }
        let tail = match id.rfind(':') {
            Some(pos) if pos + 1 < id.len() => &id[pos + 1..],
            Some(_) => return None,
            None => id,
        };
        tail.parse().ok()
    }
}

/// An ordered collection of tile matrices sharing one CRS.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TileMatrixSet {
    pub identifier: String,
    pub title: String,
    pub abstract_text: String,
    pub keywords: Vec<String>,
    pub well_known_scale_set: String,
    /// Canonical `AUTH:CODE`.
    pub crs_id: String,
    /// Ascending by `pixel_size` (finest first).
    pub tile_matrices: Vec<TileMatrix>,
}

impl TileMatrixSet {
    /// Insert keeping ascending pixel-size order.
    pub fn insert_matrix(&mut self, matrix: TileMatrix) {
        let at = self
            .tile_matrices
            .partition_point(|m| m.pixel_size < matrix.pixel_size);
        self.tile_matrices.insert(at, matrix);
    }

    pub fn matrix_by_identifier(&self, identifier: &str) -> Option<&TileMatrix> {
        self.tile_matrices.iter().find(|m| m.identifier == identifier)
    }

    /// The matrix whose identifier denotes this level. Accepts the bare
    /// number, an `AUTH:CODE:<n>` suffix form, and a zero-padded number.
    pub fn matrix_for_level(&self, level: i32) -> Option<&TileMatrix> {
        let plain = level.to_string();
        let padded = format!("0{level}");
        self.tile_matrices.iter().find(|m| {
            if m.identifier.is_empty() {
                return false;
            }
            if m.identifier == plain {
                return true;
            }
            let tail = match m.identifier.rfind(':') {
                Some(pos) if pos + 1 < m.identifier.len() => &m.identifier[pos + 1..],
                _ => m.identifier.as_str(),
            };
            tail == plain || tail == padded
        })
    }

    /// Lowest-resolution matrix (largest pixel size).
    pub fn coarsest(&self) -> Option<&TileMatrix> {
        self.tile_matrices.last()
    }
}

/// Parent→children index over the WMS layer forest, by order id, with
/// stable (document) root ordering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerTreeNode {
    pub order_id: u32,
    pub children: Vec<LayerTreeNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerIndex {
    /// child order id → parent order id.
    pub parent: HashMap<u32, u32>,
    pub trees: Vec<LayerTreeNode>,
}

impl LayerIndex {
    pub fn from_forest(roots: &[WmsLayer]) -> Self {
        fn build(layer: &WmsLayer, parent: &mut HashMap<u32, u32>) -> LayerTreeNode {
            let mut node = LayerTreeNode {
                order_id: layer.order_id,
                children: Vec::new(),
            };
            for child in &layer.children {
                parent.insert(child.order_id, layer.order_id);
                node.children.push(build(child, parent));
            }
            node
        }

        let mut parent = HashMap::new();
        let trees = roots.iter().map(|r| build(r, &mut parent)).collect();
        Self { parent, trees }
    }

    /// Order ids of every ancestor, nearest first.
    pub fn ancestors(&self, order_id: u32) -> Vec<u32> {
        let mut result = Vec::new();
        let mut current = order_id;
        while let Some(&p) = self.parent.get(&current) {
            result.push(p);
            current = p;
        }
        result
    }
}

/// The complete parsed service description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceModel {
    /// `"1.1.1"`, `"1.3.0"` (WMS) or `"1.0.0"` (WMTS).
    pub version: String,
    pub service: ServiceMetadata,
    pub request: OperationSet,
    pub exception_formats: Vec<String>,
    /// WMS layer forest roots in document order.
    pub wms_roots: Vec<WmsLayer>,
    /// Flat document-order list: every named layer, plus unnamed roots
    /// (group-only services still need their root titles addressable).
    pub wms_layers: Vec<WmsLayer>,
    pub layer_index: LayerIndex,
    pub wmts_layers: Vec<WmtsTileLayer>,
    pub tile_matrix_sets: HashMap<String, TileMatrixSet>,
    /// GetFeatureInfo support per named WMS layer.
    pub layer_queryable: HashMap<String, bool>,
}

impl ServiceModel {
    pub fn is_wms_version_13(&self) -> bool {
        self.version.starts_with("1.3")
    }

    pub fn wms_layer_by_title(&self, title: &str) -> Option<&WmsLayer> {
        self.wms_layers.iter().find(|l| l.title == title)
    }

    pub fn wms_layer_by_order_id(&self, order_id: u32) -> Option<&WmsLayer> {
        self.wms_layers.iter().find(|l| l.order_id == order_id)
    }

    pub fn wmts_layer_by_title(&self, title: &str) -> Option<&WmtsTileLayer> {
        self.wmts_layers.iter().find(|l| l.title == title)
    }

    pub fn is_wmts_layer(&self, title: &str) -> bool {
        self.wmts_layer_by_title(title).is_some()
    }

    /// The Tianditu provider publishes tile matrices against a 96 dpi pixel
    /// and swaps TopLeftCorner axes; detected from its GetTile endpoint.
    pub fn is_tianditu(&self) -> bool {
        let dcp = &self.request.get_tile.dcp;
        dcp.len() == 1 && dcp[0].get.to_ascii_lowercase().contains("tianditu")
    }
}
