//! Request URL synthesis: WMTS KVP, WMTS REST template substitution, and
//! WMS GetMap.

use weave_capabilities::{ServiceModel, WmtsTileLayer};
use weave_common::urlq;

use crate::request::TileRequest;

const DPI: u32 = 96;

/// KVP is usable iff GetTile advertises a DCP endpoint and the allowed
/// encodings are either unconstrained or include `KVP`.
pub fn is_kvp(model: &ServiceModel) -> bool {
    let get_tile = &model.request.get_tile;
    if get_tile.dcp.is_empty() {
        return false;
    }
    get_tile.allowed_encodings.is_empty()
        || get_tile.allowed_encodings.iter().any(|e| e == "KVP")
}

/// Build the WMTS KVP GetTile URL. `matrix_identifier` is the matrix's own
/// identifier (e.g. `EPSG:4326:5`), not the extracted level number. A
/// `token`/`tk` parameter on the service URL is forwarded as `tk`.
pub fn wmts_kvp_url(
    model: &ServiceModel,
    tile: &TileRequest,
    service_url: &str,
    use_xlink_href: bool,
    matrix_identifier: &str,
) -> String {
    let base = if use_xlink_href {
        model
            .request
            .get_tile
            .first_get_url()
            .unwrap_or_else(|| urlq::base_url(service_url))
            .to_string()
    } else {
        urlq::base_url(service_url).to_string()
    };

    let mut url = urlq::add_query_param(&base, "SERVICE", "WMTS");
    url = urlq::add_query_param(&url, "REQUEST", "GetTile");
    url = urlq::add_query_param(&url, "VERSION", &tile.version);
    url = urlq::add_query_param(&url, "LAYER", &urlq::escape(&tile.layer_name));
    if !tile.style.is_empty() {
        url = urlq::add_query_param(&url, "STYLE", &urlq::escape(&tile.style));
    }
    url = urlq::add_query_param(&url, "FORMAT", &urlq::escape(&tile.format));
    url = urlq::add_query_param(&url, "TILEMATRIXSET", &urlq::escape(&tile.tile_matrix_set));
    url = urlq::add_query_param(&url, "TILEMATRIX", &urlq::escape(matrix_identifier));
    url = urlq::add_query_param(&url, "TILEROW", &tile.row.to_string());
    url = urlq::add_query_param(&url, "TILECOL", &tile.col.to_string());

    if let Some(token) = urlq::extract_token(service_url) {
        url = urlq::add_query_param(&url, "tk", &token);
    }
    url
}

/// Substitute a REST GetTile template for the tile. Placeholders are
/// matched case-insensitively; values are URL-escaped.
pub fn wmts_rest_url(
    layer: &WmtsTileLayer,
    tile: &TileRequest,
    matrix_identifier: &str,
) -> Option<String> {
    let template = layer.get_tile_templates.get(&tile.format)?;

    let mut url = urlq::replace_placeholder(template, "{layer}", &urlq::escape(&tile.layer_name));
    url = urlq::replace_placeholder(&url, "{style}", &urlq::escape(&tile.style));
    url = urlq::replace_placeholder(
        &url,
        "{tilematrixset}",
        &urlq::escape(&tile.tile_matrix_set),
    );
    url = urlq::replace_placeholder(&url, "{tilematrix}", &urlq::escape(matrix_identifier));
    url = urlq::replace_placeholder(&url, "{tilerow}", &tile.row.to_string());
    url = urlq::replace_placeholder(&url, "{tilecol}", &tile.col.to_string());
    Some(url)
}

/// Build the WMS GetMap URL for the single planned frame.
///
/// For 1.3.x services whose CRS is declared lat/long or northing/easting,
/// the BBOX components are emitted in the authority order (Y,X). The
/// `TRANSPARENT=TRUE` trigger keys off the *style* string, matching
/// long-observed behavior; see the release notes.
pub fn wms_getmap_url(
    model: &ServiceModel,
    tile: &TileRequest,
    service_url: &str,
    use_xlink_href: bool,
    axis_inverted: bool,
) -> String {
    let base = if use_xlink_href {
        model
            .request
            .get_map
            .first_get_url()
            .unwrap_or_else(|| urlq::base_url(service_url))
            .to_string()
    } else {
        urlq::base_url(service_url).to_string()
    };

    let mut url = urlq::add_query_param(&base, "SERVICE", "WMS");
    url = urlq::add_query_param(&url, "VERSION", &tile.version);
    url = urlq::add_query_param(&url, "REQUEST", "GetMap");

    let bbox_rect = if axis_inverted {
        tile.bbox.rect.inverted()
    } else {
        tile.bbox.rect
    };
    url = urlq::add_query_param(&url, "BBOX", &bbox_rect.to_wms_string());

    let crs_key = if model.is_wms_version_13() { "CRS" } else { "SRS" };
    url = urlq::add_query_param(&url, crs_key, &tile.bbox.crs_id);

    url = urlq::add_query_param(&url, "WIDTH", &tile.num_width_pixels.to_string());
    url = urlq::add_query_param(&url, "HEIGHT", &tile.num_height_pixels.to_string());
    url = urlq::add_query_param(&url, "LAYERS", &urlq::escape(&tile.layer_name));
    if !tile.style.is_empty() {
        url = urlq::add_query_param(&url, "STYLES", &urlq::escape(&tile.style));
    }
    url = urlq::add_query_param(&url, "FORMAT", &urlq::escape(&tile.format));

    url = urlq::add_query_param(&url, "DPI", &DPI.to_string());
    url = urlq::add_query_param(&url, "MAP_RESOLUTION", &DPI.to_string());
    url = urlq::add_query_param(&url, "FORMAT_OPTIONS", &format!("dpi:{DPI}"));

    let style_lower = tile.style.to_ascii_lowercase();
    if tile.style == "image/x-jpegorpng"
        || (!style_lower.contains("jpeg") && !style_lower.contains("jpg"))
    {
        url = urlq::add_query_param(&url, "TRANSPARENT", "TRUE");
    }
    url
}
