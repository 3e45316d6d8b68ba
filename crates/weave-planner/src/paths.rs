//! Scratch file naming: `<fingerprint>_<level>_<row>_<col>.<ext>` under the
//! temp directory, with an MD5 content fingerprint so repeated plans of the
//! same layer reuse the same names.

use std::path::Path;

use md5::{Digest, Md5};

use crate::request::TileRequest;

pub fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// File extension chosen by substring match on the MIME format.
pub fn extension_for_format(format: &str) -> &'static str {
    if format.contains("webp") {
        ".webp"
    } else if format.contains("jpg") || format.contains("jpeg") {
        ".jpg"
    } else if format.contains("tif") {
        ".tif"
    } else {
        ".png"
    }
}

fn join_forward_slash(dir: &Path, file_name: &str) -> String {
    let joined = dir.join(file_name);
    joined.to_string_lossy().replace('\\', "/")
}

/// WMTS tiles are keyed by layer title + matrix set.
pub fn wmts_tile_path(temp_dir: &Path, tile: &TileRequest) -> String {
    let fingerprint = md5_hex(&format!("{}_{}", tile.layer_title, tile.tile_matrix_set));
    let file_name = format!(
        "{fingerprint}_{}_{}_{}{}",
        tile.level,
        tile.row,
        tile.col,
        extension_for_format(&tile.format)
    );
    join_forward_slash(temp_dir, &file_name)
}

/// WMS frames are keyed by layer title + name + the exact request extent.
pub fn wms_tile_path(temp_dir: &Path, tile: &TileRequest) -> String {
    let fingerprint = md5_hex(&format!(
        "{}_{}{}",
        tile.layer_title,
        tile.layer_name,
        tile.bbox.rect.to_wms_string()
    ));
    let file_name = format!(
        "{fingerprint}_{}_{}_{}{}",
        tile.level,
        tile.row,
        tile.col,
        extension_for_format(&tile.format)
    );
    join_forward_slash(temp_dir, &file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use weave_common::{BoundingBox, Rect};

    #[test]
    fn test_md5_hex_known_value() {
        // RFC 1321 test vector.
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_extension_selection() {
        assert_eq!(extension_for_format("image/png"), ".png");
        assert_eq!(extension_for_format("image/jpeg"), ".jpg");
        assert_eq!(extension_for_format("image/webp"), ".webp");
        assert_eq!(extension_for_format("image/tiff"), ".tif");
        assert_eq!(extension_for_format("application/octet-stream"), ".png");
    }

    #[test]
    fn test_wmts_path_shape() {
        let tile = TileRequest {
            level: 5,
            row: 12,
            col: 7,
            layer_title: "Imagery".into(),
            layer_name: "img".into(),
            tile_matrix_set: "GoogleMapsCompatible".into(),
            format: "image/png".into(),
            ..Default::default()
        };
        let path = wmts_tile_path(&PathBuf::from("/tmp/weave"), &tile);
        let expected_fp = md5_hex("Imagery_GoogleMapsCompatible");
        assert_eq!(path, format!("/tmp/weave/{expected_fp}_5_12_7.png"));
    }

    #[test]
    fn test_wms_path_depends_on_extent() {
        let mut tile = TileRequest {
            layer_title: "Topo".into(),
            layer_name: "topo".into(),
            format: "image/jpeg".into(),
            bbox: BoundingBox::new("EPSG:4326", Rect::new(0.0, 0.0, 10.0, 10.0)),
            ..Default::default()
        };
        let a = wms_tile_path(&PathBuf::from("/tmp/weave"), &tile);
        tile.bbox.rect = Rect::new(0.0, 0.0, 20.0, 10.0);
        let b = wms_tile_path(&PathBuf::from("/tmp/weave"), &tile);
        assert_ne!(a, b);
        assert!(a.ends_with("_0_0_0.jpg"));
    }
}
