//! Capabilities parser: XML body → [`ServiceModel`].
//!
//! Handles WMS 1.1.1, WMS 1.3.0 and WMTS 1.0.0 documents, with the usual
//! field quirks seen in the wild: comma decimal separators, several CRS
//! codes inside one `<SRS>` element, axis-swapped 1.3.0 bounding boxes, the
//! Tianditu pixel-size and TopLeftCorner deviations, and missing styles or
//! bounding boxes on WMTS layers.

use std::collections::HashMap;

use tracing::{debug, warn};
use weave_common::{urlq, BoundingBox, Point2d, Rect};

use crate::adviser::CrsAdviser;
use crate::error::CapabilitiesError;
use crate::model::*;
use crate::xmltree::{self, Element};

/// OGC standard rendering pixel: 0.28 mm.
const OGC_PIXEL_METERS: f64 = 0.00028;
/// Tianditu publishes scales against a 96 dpi pixel instead.
const TIANDITU_PIXEL_METERS: f64 = 0.0254 / 96.0;

/// Parse a capabilities body. Failures are total; no partial model escapes.
pub fn parse_capabilities(
    body: &str,
    adviser: &dyn CrsAdviser,
) -> Result<ServiceModel, CapabilitiesError> {
    if body.is_empty() {
        return Err(CapabilitiesError::EmptyDocument);
    }
    if body.len() >= 6 && body.as_bytes()[..6].eq_ignore_ascii_case(b"<html>") {
        return Err(CapabilitiesError::NotCapabilities);
    }

    let root = xmltree::parse_document(body)?;
    if !is_capabilities_root(&root.name) {
        return Err(CapabilitiesError::BadRootTag(root.name.clone()));
    }

    let mut ctx = ParseContext {
        adviser,
        version: root.attr("version").unwrap_or_default().to_string(),
        next_order_id: 0,
        model: ServiceModel::default(),
    };
    ctx.model.version = ctx.version.clone();

    // Operations first (Tianditu detection keys off the GetTile endpoint),
    // then Contents, regardless of document order.
    for child in &root.children {
        match child.name.as_str() {
            "Service" | "ServiceProvider" | "ServiceIdentification" => {
                parse_service(child, &mut ctx.model.service);
            }
            "Capability" | "OperationsMetadata" => ctx.parse_capability(child),
            _ => {}
        }
    }
    for child in &root.children {
        if child.name == "Contents" {
            ctx.parse_contents(child);
        }
    }

    ctx.finish();
    Ok(ctx.model)
}

fn is_capabilities_root(name: &str) -> bool {
    name.eq_ignore_ascii_case("WMS_Capabilities")
        || name.eq_ignore_ascii_case("WMT_MS_Capabilities")
        || name.eq_ignore_ascii_case("Capabilities")
}

/// Tolerant decimal parse: comma decimal separators become dots first.
fn parse_coord(text: &str) -> Option<f64> {
    text.trim().replace(',', ".").parse().ok()
}

fn parse_flag(text: &str) -> bool {
    text == "1" || text.eq_ignore_ascii_case("true")
}

fn attr_u32(node: &Element, key: &str) -> u32 {
    node.attr(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn child_u32(node: &Element, name: &str) -> u32 {
    node.child_text(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn keywords_of(node: &Element) -> Vec<String> {
    // WMS uses <KeywordList>, OWS nests <Keywords><Keyword>.
    let list = node
        .child("KeywordList")
        .or_else(|| node.child("Keywords"));
    match list {
        Some(list) => list
            .children_named("Keyword")
            .map(|k| k.text.clone())
            .filter(|k| !k.is_empty())
            .collect(),
        None => Vec::new(),
    }
}

fn parse_service(node: &Element, service: &mut ServiceMetadata) {
    for child in &node.children {
        match child.name.as_str() {
            "Title" => service.title = child.text.clone(),
            "Abstract" => service.abstract_text = child.text.clone(),
            "KeywordList" | "Keywords" => {
                service.keywords = child
                    .children_named("Keyword")
                    .map(|k| k.text.clone())
                    .filter(|k| !k.is_empty())
                    .collect();
            }
            "OnlineResource" => {
                if let Some(href) = child.xlink_href() {
                    service.online_resource_href = href.to_string();
                }
            }
            "Fees" => service.fees = child.text.clone(),
            "AccessConstraints" => service.access_constraints = child.text.clone(),
            "LayerLimit" => service.layer_limit = child.text.parse().unwrap_or(0),
            "MaxWidth" => service.max_width = child.text.parse().unwrap_or(0),
            "MaxHeight" => service.max_height = child.text.parse().unwrap_or(0),
            _ => {}
        }
    }
}

struct ParseContext<'a> {
    adviser: &'a dyn CrsAdviser,
    version: String,
    next_order_id: u32,
    model: ServiceModel,
}

impl ParseContext<'_> {
    fn is_wms_13(&self) -> bool {
        self.version.starts_with("1.3")
    }

    // ---- Capability / OperationsMetadata -------------------------------

    fn parse_capability(&mut self, node: &Element) {
        for child in &node.children {
            match child.name.as_str() {
                "Request" => self.parse_wms_request(child),
                "Layer" => {
                    let root = self.parse_wms_layer(child, WmsLayer::default());
                    self.model.wms_roots.push(root);
                }
                "Exception" => {
                    for format in child.children_named("Format") {
                        if !format.text.is_empty() {
                            self.model.exception_formats.push(format.text.clone());
                        }
                    }
                }
                "Operation" => self.parse_wmts_operation(child),
                _ => {}
            }
        }
    }

    fn parse_wms_request(&mut self, node: &Element) {
        for child in &node.children {
            // Some producers write <Operation name="GetMap"> here too.
            let op_name = if child.name == "Operation" {
                child.attr("name").unwrap_or_default()
            } else {
                child.name.as_str()
            };

            let target = match op_name {
                "GetMap" => &mut self.model.request.get_map,
                "GetFeatureInfo" => &mut self.model.request.get_feature_info,
                "GetLegendGraphic" => &mut self.model.request.get_legend_graphic,
                _ => continue,
            };
            parse_wms_operation(child, target);
        }
    }

    /// OWS `<Operation name="…">` with DCP endpoint and encoding constraint.
    fn parse_wmts_operation(&mut self, node: &Element) {
        let Some(name) = node.attr("name") else {
            return;
        };
        let Some(get_node) = node
            .child("DCP")
            .and_then(|dcp| dcp.child("HTTP"))
            .and_then(|http| http.child("Get"))
        else {
            return;
        };
        let Some(href) = get_node.xlink_href().filter(|h| !h.is_empty()) else {
            return;
        };

        let target = match name {
            "GetTile" => &mut self.model.request.get_tile,
            "GetFeatureInfo" => &mut self.model.request.get_feature_info,
            "GetLegendGraphic" => &mut self.model.request.get_legend_graphic,
            _ => return,
        };

        target.dcp.push(DcpHttp {
            get: href.to_string(),
            post: String::new(),
        });

        target.allowed_encodings.clear();
        if let Some(values) = get_node
            .child("Constraint")
            .and_then(|c| c.child("AllowedValues"))
        {
            for value in values.children_named("Value") {
                if value.text.is_empty() {
                    continue;
                }
                let encoding = if value.text.eq_ignore_ascii_case("kvp") {
                    String::from("KVP")
                } else {
                    value.text.clone()
                };
                target.allowed_encodings.push(encoding);
            }
        }
    }

    // ---- WMS layer forest ----------------------------------------------

    /// Parse one `<Layer>`; `seed` carries the inherited fields.
    fn parse_wms_layer(&mut self, node: &Element, seed: WmsLayer) -> WmsLayer {
        self.next_order_id += 1;

        let mut layer = seed;
        layer.order_id = self.next_order_id;
        layer.queryable = parse_flag(node.attr("queryable").unwrap_or("0"));
        layer.cascaded = attr_u32(node, "cascaded");
        layer.opaque = parse_flag(node.attr("opaque").unwrap_or("0"));
        layer.no_subsets = parse_flag(node.attr("noSubsets").unwrap_or("0"));
        layer.fixed_width = attr_u32(node, "fixedWidth");
        layer.fixed_height = attr_u32(node, "fixedHeight");

        for child in &node.children {
            match child.name.as_str() {
                "Layer" => {
                    let sub = self.parse_wms_layer(child, self.child_seed(&layer, child));
                    self.model
                        .layer_index
                        .parent
                        .insert(sub.order_id, layer.order_id);
                    layer.children.push(sub);
                }
                "Name" => layer.name = child.text.clone(),
                "Title" => layer.title = child.text.clone(),
                "Abstract" => layer.abstract_text = child.text.clone(),
                "KeywordList" | "Keywords" => layer.keywords = keywords_of(node),
                "SRS" | "CRS" => {
                    // WMS 1.1.1 allowed several codes inside one element.
                    for code in urlq::split_whitespace_tokens(&child.text) {
                        if !layer.crs_ids.contains(&code) {
                            layer.crs_ids.push(code);
                        }
                    }
                }
                "LatLonBoundingBox" => self.parse_latlon_bbox(child, &mut layer),
                "EX_GeographicBoundingBox" => {
                    if let Some(rect) = parse_ex_geographic_bbox(child) {
                        layer.ex_geographic_bbox = rect;
                    }
                }
                "BoundingBox" => self.parse_wms_bbox(child, &mut layer),
                "Style" => {
                    let style = parse_wms_style(child);
                    // A style re-declaring an inherited name replaces it;
                    // Mapserver emits such duplicates.
                    layer.styles.retain(|s| s.name != style.name);
                    layer.styles.push(style);
                }
                "MetadataURL" => {
                    let mut url = MetadataUrl {
                        r#type: child.attr("type").unwrap_or_default().to_string(),
                        ..Default::default()
                    };
                    if let Some(format) = child.child_text("Format") {
                        url.format = format.to_string();
                    }
                    if let Some(href) = child.child("OnlineResource").and_then(|o| o.xlink_href())
                    {
                        url.href = href.to_string();
                    }
                    layer.metadata_urls.push(url);
                }
                _ => {}
            }
        }

        if layer.is_requestable() {
            self.model
                .layer_queryable
                .insert(layer.name.clone(), layer.queryable);
        }
        layer
    }

    /// Inherited fields for a child about to be parsed: CRS ids, bounding
    /// boxes, the geographic bbox, and the styles seen so far with legend
    /// URLs re-pointed at the child layer name.
    fn child_seed(&self, parent: &WmsLayer, child_node: &Element) -> WmsLayer {
        let mut styles = parent.styles.clone();
        if let Some(child_name) = child_node.child_text("Name") {
            for style in &mut styles {
                for legend in &mut style.legend_urls {
                    if urlq::query_param(&legend.href, "layer").is_some() {
                        legend.href = urlq::add_query_param(&legend.href, "layer", child_name);
                    }
                }
            }
        }
        WmsLayer {
            crs_ids: parent.crs_ids.clone(),
            bounding_boxes: parent.bounding_boxes.clone(),
            ex_geographic_bbox: parent.ex_geographic_bbox,
            styles,
            ..Default::default()
        }
    }

    /// WMS 1.1.1 `<LatLonBoundingBox>`: nominally CRS:84; some producers
    /// declare another SRS, in which case the rectangle is transformed.
    fn parse_latlon_bbox(&self, node: &Element, layer: &mut WmsLayer) {
        let parsed: Vec<f64> = [
            node.attr_ci("minx"),
            node.attr_ci("miny"),
            node.attr_ci("maxx"),
            node.attr_ci("maxy"),
        ]
        .into_iter()
        .flatten()
        .filter_map(parse_coord_opt)
        .collect();
        if parsed.len() == 4 {
            layer.ex_geographic_bbox = Rect::new(parsed[0], parsed[1], parsed[2], parsed[3]);
        }

        if let Some(srs) = node.attr_ci("SRS") {
            if !srs.is_empty() && srs != "CRS:84" {
                let declared = BoundingBox::new(srs, layer.ex_geographic_bbox);
                match self.adviser.rect_to_crs84(&declared) {
                    Some(rect) => layer.ex_geographic_bbox = rect,
                    None => warn!(srs, "LatLonBoundingBox SRS did not transform to CRS:84"),
                }
            }
        }
    }

    /// `<BoundingBox CRS=… minx=…>` with the 1.3.x axis-order correction.
    fn parse_wms_bbox(&self, node: &Element, layer: &mut WmsLayer) {
        let (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) = (
            node.attr_ci("minx").and_then(parse_coord_opt),
            node.attr_ci("miny").and_then(parse_coord_opt),
            node.attr_ci("maxx").and_then(parse_coord_opt),
            node.attr_ci("maxy").and_then(parse_coord_opt),
        ) else {
            return;
        };

        let Some(crs_id) = node
            .attr_ci("CRS")
            .or_else(|| node.attr_ci("SRS"))
            .filter(|v| !v.is_empty())
        else {
            return;
        };

        let mut bbox = BoundingBox::new(crs_id, Rect::new(min_x, min_y, max_x, max_y));
        if self.is_wms_13() && self.adviser.axis_should_invert(crs_id) {
            bbox.invert();
        }
        layer.upsert_bounding_box(bbox);
    }

    // ---- WMTS Contents ---------------------------------------------------

    fn parse_contents(&mut self, node: &Element) {
        for set_node in node.children_named("TileMatrixSet") {
            if let Some(set) = self.parse_tile_matrix_set(set_node) {
                self.model
                    .tile_matrix_sets
                    .insert(set.identifier.clone(), set);
            }
        }

        for layer_node in node.children_named("Layer") {
            let layer = self.parse_wmts_layer(layer_node);
            self.model.wmts_layers.push(layer);
        }

        self.ensure_wmts_bounding_boxes();
    }

    fn parse_tile_matrix_set(&self, node: &Element) -> Option<TileMatrixSet> {
        let mut set = TileMatrixSet {
            identifier: node.child_text("Identifier").unwrap_or_default().to_string(),
            title: node.child_text("Title").unwrap_or_default().to_string(),
            abstract_text: node.child_text("Abstract").unwrap_or_default().to_string(),
            keywords: keywords_of(node),
            well_known_scale_set: node
                .child_text("WellKnownScaleSet")
                .unwrap_or_default()
                .to_string(),
            ..Default::default()
        };

        let supported_crs = node.child_text("SupportedCRS")?;
        let Some(canonical) = self.adviser.canonical_code(supported_crs) else {
            warn!(
                matrix_set = %set.identifier,
                supported_crs, "skipping TileMatrixSet with unresolvable CRS"
            );
            return None;
        };
        let meters_per_unit = self.adviser.meters_per_unit(supported_crs)?;
        let axis_inverted = self.adviser.axis_should_invert(supported_crs);
        set.crs_id = canonical;

        let tianditu = self.model.is_tianditu();
        let pixel_meters = if tianditu {
            TIANDITU_PIXEL_METERS
        } else {
            OGC_PIXEL_METERS
        };

        for matrix_node in node.children_named("TileMatrix") {
            let mut matrix = TileMatrix {
                identifier: matrix_node
                    .child_text("Identifier")
                    .unwrap_or_default()
                    .to_string(),
                title: matrix_node.child_text("Title").unwrap_or_default().to_string(),
                abstract_text: matrix_node
                    .child_text("Abstract")
                    .unwrap_or_default()
                    .to_string(),
                keywords: keywords_of(matrix_node),
                scale_denominator: matrix_node
                    .child_text("ScaleDenominator")
                    .and_then(parse_coord_opt)
                    .unwrap_or(0.0),
                tile_width: child_u32(matrix_node, "TileWidth"),
                tile_height: child_u32(matrix_node, "TileHeight"),
                matrix_width: child_u32(matrix_node, "MatrixWidth"),
                matrix_height: child_u32(matrix_node, "MatrixHeight"),
                ..Default::default()
            };

            if let Some(top_left) = matrix_node.child_text("TopLeftCorner") {
                let parts = urlq::split_whitespace_tokens(top_left);
                if parts.len() == 2 {
                    let a = parse_coord(&parts[0]).unwrap_or(f64::NAN);
                    let b = parse_coord(&parts[1]).unwrap_or(f64::NAN);
                    let (mut x, mut y) = if axis_inverted { (b, a) } else { (a, b) };
                    if tianditu {
                        // Tianditu swaps the corner axes regardless of what
                        // the authority says.
                        std::mem::swap(&mut x, &mut y);
                    }
                    matrix.top_left = Point2d::new(x, y);
                }
            }

            matrix.pixel_size = matrix.scale_denominator * pixel_meters / meters_per_unit;
            set.insert_matrix(matrix);
        }

        Some(set)
    }

    fn parse_wmts_layer(&mut self, node: &Element) -> WmtsTileLayer {
        let mut layer = WmtsTileLayer {
            identifier: node.child_text("Identifier").unwrap_or_default().to_string(),
            title: node.child_text("Title").unwrap_or_default().to_string(),
            abstract_text: node.child_text("Abstract").unwrap_or_default().to_string(),
            keywords: keywords_of(node),
            ..Default::default()
        };

        if let Some(rect) = node.child("WGS84BoundingBox").and_then(parse_corner_rect) {
            layer
                .bounding_boxes
                .push(BoundingBox::new("CRS:84", rect));
        }

        for bbox_node in node.children_named("BoundingBox") {
            let Some(rect) = parse_corner_rect(bbox_node) else {
                continue;
            };
            let Some(declared) = bbox_node
                .attr_ci("crs")
                .or_else(|| bbox_node.attr_ci("srs"))
                .filter(|v| !v.is_empty())
            else {
                continue;
            };
            let crs_id = self
                .adviser
                .canonical_code(declared)
                .unwrap_or_else(|| declared.to_string());
            let mut bbox = BoundingBox::new(crs_id, rect);
            if self.adviser.axis_should_invert(declared) {
                bbox.invert();
            }
            layer.bounding_boxes.push(bbox);
        }

        for style_node in node.children_named("Style") {
            let style = parse_wmts_style(style_node);
            if style.is_default {
                layer.default_style = style.identifier.clone();
            }
            layer.styles.insert(style.identifier.clone(), style);
        }
        if layer.styles.is_empty() {
            let style = WmtsStyle {
                identifier: String::from("default"),
                title: String::from("Generated default style"),
                abstract_text: String::from("Style was missing in capabilities"),
                ..Default::default()
            };
            layer.styles.insert(style.identifier.clone(), style);
        }

        for format_node in node.children_named("Format") {
            if !format_node.text.is_empty() && !layer.formats.contains(&format_node.text) {
                layer.formats.push(format_node.text.clone());
            }
        }
        for info_node in node.children_named("InfoFormat") {
            if !info_node.text.is_empty() {
                layer.info_formats.push(info_node.text.clone());
            }
        }

        for link_node in node.children_named("TileMatrixSetLink") {
            let Some(set_name) = link_node.child_text("TileMatrixSet") else {
                continue;
            };
            // A link must reference a matrix set the document declared.
            let Some(set) = self.model.tile_matrix_sets.get(set_name) else {
                debug!(set_name, "TileMatrixSetLink references unknown TileMatrixSet");
                continue;
            };

            let mut link = MatrixSetLink {
                tile_matrix_set: set_name.to_string(),
                limits: HashMap::new(),
            };
            for limits_node in link_node.children_named("TileMatrixSetLimits") {
                for limit_node in limits_node.children_named("TileMatrixLimits") {
                    if let Some(limit) = parse_matrix_limits(limit_node, set) {
                        link.limits.insert(limit.tile_matrix.clone(), limit);
                    }
                }
            }
            if !layer.matrix_set_link_order.iter().any(|n| n == set_name) {
                layer.matrix_set_link_order.push(set_name.to_string());
            }
            layer.matrix_set_links.insert(set_name.to_string(), link);
        }

        for resource_node in node.children_named("ResourceURL") {
            let format = resource_node.attr("format").unwrap_or_default();
            let resource_type = resource_node.attr("resourceType").unwrap_or_default();
            let template = resource_node.attr("template").unwrap_or_default();
            if format.is_empty() || resource_type.is_empty() || template.is_empty() {
                continue;
            }
            if resource_type.eq_ignore_ascii_case("tile") {
                layer
                    .get_tile_templates
                    .insert(format.to_string(), template.to_string());
            } else if resource_type.eq_ignore_ascii_case("FeatureInfo") {
                layer
                    .get_feature_info_templates
                    .insert(format.to_string(), template.to_string());
            }
        }

        layer
    }

    /// Every WMTS layer ends up with exactly one fallback bounding box when
    /// none was declared: the extent of the coarsest matrix of the *first*
    /// linked matrix set (document order), or the whole world.
    fn ensure_wmts_bounding_boxes(&mut self) {
        for layer in &mut self.model.wmts_layers {
            if !layer.bounding_boxes.is_empty() {
                continue;
            }

            let fallback = layer.matrix_set_link_order.iter().find_map(|name| {
                let set = self.model.tile_matrix_sets.get(name)?;
                if set.crs_id.is_empty() {
                    return None;
                }
                let matrix = set.coarsest()?;
                let bottom_right = Point2d::new(
                    matrix.top_left.x + matrix.tile_span_x() * matrix.matrix_width as f64,
                    matrix.top_left.y - matrix.tile_span_y() * matrix.matrix_height as f64,
                );
                Some(BoundingBox::new(
                    set.crs_id.clone(),
                    Rect::from_corners(matrix.top_left, bottom_right),
                ))
            });

            match fallback {
                Some(bbox) => layer.bounding_boxes.push(bbox),
                None => layer.bounding_boxes.push(BoundingBox::from_coords(
                    "CRS:84", -180.0, -90.0, 180.0, 90.0,
                )),
            }
        }
    }

    // ---- finish ----------------------------------------------------------

    fn finish(&mut self) {
        // Flat list: every named layer in document order, plus unnamed roots
        // so group-only services keep their root titles addressable.
        let mut flat = Vec::new();
        fn collect(layer: &WmsLayer, flat: &mut Vec<WmsLayer>) {
            if layer.is_requestable() {
                flat.push(layer.clone());
            }
            for child in &layer.children {
                collect(child, flat);
            }
        }
        for root in &self.model.wms_roots {
            collect(root, &mut flat);
            if !root.is_requestable() {
                flat.push(root.clone());
            }
        }
        flat.sort_by_key(|l| l.order_id);
        self.model.wms_layers = flat;

        let parent = std::mem::take(&mut self.model.layer_index.parent);
        self.model.layer_index = LayerIndex::from_forest(&self.model.wms_roots);
        // Keep any parent edges recorded during parsing (they agree with the
        // forest; the forest rebuild is authoritative).
        for (child, p) in parent {
            self.model.layer_index.parent.entry(child).or_insert(p);
        }

        // Backfill WMTS titles/abstracts from same-named WMS layers.
        if !self.model.wmts_layers.is_empty() {
            let mut titles = HashMap::new();
            let mut abstracts = HashMap::new();
            for layer in &self.model.wms_layers {
                if layer.name.is_empty() {
                    continue;
                }
                if !layer.title.is_empty() {
                    titles.insert(layer.name.clone(), layer.title.clone());
                }
                if !layer.abstract_text.is_empty() {
                    abstracts.insert(layer.name.clone(), layer.abstract_text.clone());
                }
            }
            for tile_layer in &mut self.model.wmts_layers {
                if tile_layer.title.is_empty() {
                    if let Some(title) = titles.get(&tile_layer.identifier) {
                        tile_layer.title = title.clone();
                    }
                }
                if tile_layer.abstract_text.is_empty() {
                    if let Some(abstract_text) = abstracts.get(&tile_layer.identifier) {
                        tile_layer.abstract_text = abstract_text.clone();
                    }
                }
            }
        }
    }
}

fn parse_coord_opt(text: &str) -> Option<f64> {
    parse_coord(text)
}

/// WMS 1.3.0 `<EX_GeographicBoundingBox>` with the four bound angles.
fn parse_ex_geographic_bbox(node: &Element) -> Option<Rect> {
    Some(Rect::new(
        parse_coord(node.child_text("westBoundLongitude")?)?,
        parse_coord(node.child_text("southBoundLatitude")?)?,
        parse_coord(node.child_text("eastBoundLongitude")?)?,
        parse_coord(node.child_text("northBoundLatitude")?)?,
    ))
}

fn parse_wms_operation(node: &Element, operation: &mut Operation) {
    for child in &node.children {
        match child.name.as_str() {
            "Format" => {
                if !child.text.is_empty() {
                    operation.formats.push(child.text.clone());
                }
            }
            "DCPType" => {
                let mut dcp = DcpHttp::default();
                if let Some(http) = child.child("HTTP") {
                    if let Some(href) = http
                        .child("Get")
                        .and_then(|g| g.child("OnlineResource"))
                        .and_then(|o| o.xlink_href())
                    {
                        dcp.get = href.to_string();
                    }
                    if let Some(href) = http
                        .child("Post")
                        .and_then(|p| p.child("OnlineResource"))
                        .and_then(|o| o.xlink_href())
                    {
                        dcp.post = href.to_string();
                    }
                }
                operation.dcp.push(dcp);
            }
            _ => {}
        }
    }
}

fn parse_wms_style(node: &Element) -> WmsStyle {
    let mut style = WmsStyle {
        name: node.child_text("Name").unwrap_or_default().to_string(),
        title: node.child_text("Title").unwrap_or_default().to_string(),
        abstract_text: node.child_text("Abstract").unwrap_or_default().to_string(),
        ..Default::default()
    };

    for legend_node in node.children_named("LegendURL") {
        let mut legend = WmsLegendUrl {
            width: legend_node
                .attr("width")
                .and_then(|v| v.parse().ok())
                .unwrap_or(-1),
            height: legend_node
                .attr("height")
                .and_then(|v| v.parse().ok())
                .unwrap_or(-1),
            ..Default::default()
        };
        if let Some(format) = legend_node.child_text("Format") {
            legend.format = format.to_string();
        }
        if let Some(href) = legend_node
            .child("OnlineResource")
            .and_then(|o| o.xlink_href())
        {
            legend.href = href.to_string();
        }
        style.legend_urls.push(legend);
    }
    style
}

fn parse_wmts_style(node: &Element) -> WmtsStyle {
    let mut style = WmtsStyle {
        identifier: node.child_text("Identifier").unwrap_or_default().to_string(),
        title: node.child_text("Title").unwrap_or_default().to_string(),
        abstract_text: node.child_text("Abstract").unwrap_or_default().to_string(),
        keywords: keywords_of(node),
        is_default: node
            .attr("isDefault")
            .map(|v| v == "true")
            .unwrap_or(false),
        ..Default::default()
    };

    // Element form: <legendURL><format>…</format><href>…</href>…</legendURL>
    for legend_node in node.children_named("legendURL") {
        style.legend_urls.push(WmtsLegendUrl {
            format: legend_node.child_text("format").unwrap_or_default().to_string(),
            href: legend_node.child_text("href").unwrap_or_default().to_string(),
            min_scale: legend_node
                .child_text("minScale")
                .and_then(parse_coord_opt)
                .unwrap_or(0.0),
            max_scale: legend_node
                .child_text("maxScale")
                .and_then(parse_coord_opt)
                .unwrap_or(0.0),
            width: legend_node
                .child_text("width")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            height: legend_node
                .child_text("height")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        });
    }

    // Attribute form: <LegendURL format="…" xlink:href="…" …/>
    if let Some(legend_node) = node.child("LegendURL") {
        style.legend_urls.push(WmtsLegendUrl {
            format: legend_node.attr("format").unwrap_or_default().to_string(),
            href: legend_node.xlink_href().unwrap_or_default().to_string(),
            min_scale: legend_node
                .attr("minScaleDenominator")
                .and_then(parse_coord_opt)
                .unwrap_or(0.0),
            max_scale: legend_node
                .attr("maxScaleDenominator")
                .and_then(parse_coord_opt)
                .unwrap_or(0.0),
            width: legend_node
                .attr("width")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            height: legend_node
                .attr("height")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        });
    }

    style
}

/// `<LowerCorner>x y</LowerCorner><UpperCorner>x y</UpperCorner>`.
fn parse_corner_rect(node: &Element) -> Option<Rect> {
    let lower = urlq::split_whitespace_tokens(node.child_text("LowerCorner")?);
    let upper = urlq::split_whitespace_tokens(node.child_text("UpperCorner")?);
    if lower.len() != 2 || upper.len() != 2 {
        return None;
    }
    Some(Rect::new(
        parse_coord(&lower[0])?,
        parse_coord(&lower[1])?,
        parse_coord(&upper[0])?,
        parse_coord(&upper[1])?,
    ))
}

/// Limits are only kept when they fit inside the declared matrix dimensions.
fn parse_matrix_limits(node: &Element, set: &TileMatrixSet) -> Option<TileMatrixLimits> {
    let id = node.child_text("TileMatrix")?;
    let matrix = set.matrix_by_identifier(id)?;

    let limit = TileMatrixLimits {
        tile_matrix: id.to_string(),
        min_row: node.child_text("MinTileRow")?.parse().ok()?,
        max_row: node.child_text("MaxTileRow")?.parse().ok()?,
        min_col: node.child_text("MinTileCol")?.parse().ok()?,
        max_col: node.child_text("MaxTileCol")?.parse().ok()?,
    };

    let width = matrix.matrix_width as i64;
    let height = matrix.matrix_height as i64;
    let in_range = limit.min_col >= 0
        && limit.min_col < width
        && limit.max_col >= 0
        && limit.max_col < width
        && limit.min_col <= limit.max_col
        && limit.min_row >= 0
        && limit.min_row < height
        && limit.max_row >= 0
        && limit.max_row < height
        && limit.min_row <= limit.max_row;
    in_range.then_some(limit)
}
