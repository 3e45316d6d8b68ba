//! Per-tile download task: fetch with proxy fallback, sniff the body,
//! write atomically, reproject.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::fs;
use tracing::debug;
use weave_common::TransportError;
use weave_crs::CrsRegistry;
use weave_http::HttpClient;
use weave_planner::TileRequest;
use weave_raster::RasterBackend;

use crate::error::EngineError;

/// Body longer than this cannot be a terse HTML error page.
const HTML_SNIFF_MAX: usize = 1024;

/// Validate a 2xx body before accepting it as image data.
pub fn sniff_body(bytes: &[u8], declared_content_length: Option<u64>) -> Result<(), TransportError> {
    if bytes.is_empty() {
        return Err(TransportError::EmptyBody);
    }
    if bytes.len() <= HTML_SNIFF_MAX
        && (bytes.starts_with(b"<html") || bytes.starts_with(b"<!DOCTYPE"))
    {
        return Err(TransportError::ServerHtmlError);
    }
    if bytes.starts_with(b"<?xml") {
        return Err(TransportError::ReceivedXmlInsteadOfImage);
    }
    if let Some(declared) = declared_content_length {
        if declared != bytes.len() as u64 {
            return Err(TransportError::ContentLengthMismatch {
                declared,
                received: bytes.len() as u64,
            });
        }
    }
    Ok(())
}

/// Download one tile body, retrying through the proxy on a classified
/// network failure. Honors the cancel flag between connection attempts.
async fn download_tile_body(
    http: &HttpClient,
    url: &str,
    cancel: &AtomicBool,
) -> Result<Vec<u8>, TransportError> {
    if cancel.load(Ordering::Acquire) {
        return Err(TransportError::SendRecvError);
    }

    let first = match http.get_binary_once(url, false).await {
        Ok(body) => {
            sniff_body(&body.bytes, body.declared_content_length)?;
            return Ok(body.bytes);
        }
        Err(err) => err,
    };

    if !(first.is_network() && http.has_proxy()) {
        return Err(first);
    }
    if cancel.load(Ordering::Acquire) {
        return Err(first);
    }

    debug!(url, error = %first, "direct download failed, retrying through proxy");
    let body = http.get_binary_once(url, true).await?;
    sniff_body(&body.bytes, body.declared_content_length)?;
    Ok(body.bytes)
}

/// Write the body atomically: temp file in the same directory, then rename.
async fn write_atomic(path: &str, bytes: &[u8]) -> Result<(), EngineError> {
    let partial = format!("{path}.partial");
    fs::write(&partial, bytes)
        .await
        .map_err(|e| EngineError::FileWrite(format!("{partial}: {e}")))?;
    fs::rename(&partial, path)
        .await
        .map_err(|e| EngineError::FileWrite(format!("{path}: {e}")))?;
    Ok(())
}

/// Path of the reprojected companion file.
pub fn reprojected_path(file_path: &str) -> String {
    let path = Path::new(file_path);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = path
        .parent()
        .map(|d| d.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    if dir.is_empty() {
        format!("{stem}_reproj.tiff")
    } else {
        format!("{dir}/{stem}_reproj.tiff")
    }
}

/// Download and reproject one tile. On success the raw body sits at
/// `tile.file_path` and the reprojected rendition next to it.
pub async fn run_tile_task(
    http: Arc<HttpClient>,
    registry: CrsRegistry,
    backend: Arc<dyn RasterBackend>,
    tile: TileRequest,
    target_crs: String,
    cancel: Arc<AtomicBool>,
) -> Result<String, EngineError> {
    let bytes = download_tile_body(&http, &tile.url, &cancel).await?;
    write_atomic(&tile.file_path, &bytes).await?;

    let src = registry.resolve(&tile.bbox.crs_id)?;
    let dst = registry.resolve(&target_crs)?;
    let out_path = reprojected_path(&tile.file_path);

    let src_wkt = src.wkt().to_string();
    let dst_wkt = dst.wkt().to_string();
    let in_path = tile.file_path.clone();
    let geo_transform = tile.geo_transform();
    let warp_out = out_path.clone();

    // The warp is CPU/IO bound library work; keep it off the async workers.
    tokio::task::spawn_blocking(move || {
        backend.warp(&in_path, &warp_out, &src_wkt, &dst_wkt, geo_transform)
    })
    .await
    .map_err(|e| EngineError::FileWrite(e.to_string()))??;

    debug!(
        tile = %tile.file_path,
        level = tile.level,
        row = tile.row,
        col = tile.col,
        "tile downloaded and reprojected"
    );
    Ok(out_path)
}

/// Outcome of one tile task, kept per index so partial failures stay
/// isolated.
pub struct TileRun {
    pub index: usize,
    pub tile: TileRequest,
    pub result: Result<String, EngineError>,
}

impl TileRun {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn is_xml_failure(&self) -> bool {
        matches!(
            self.result,
            Err(EngineError::Transport(TransportError::ReceivedXmlInsteadOfImage))
        )
    }
}

/// The one-shot replan policy: only when *every* task failed with an XML
/// body does the plan get rebuilt against the capability DCP endpoint.
pub fn should_replan_with_xlink(runs: &[TileRun]) -> bool {
    !runs.is_empty() && runs.iter().all(TileRun::is_xml_failure)
}

impl std::fmt::Debug for TileRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileRun")
            .field("index", &self.index)
            .field("ok", &self.succeeded())
            .finish()
    }
}
