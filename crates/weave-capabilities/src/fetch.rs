//! Capabilities document fetching.

use tracing::{debug, info};
use weave_common::urlq;
use weave_http::HttpClient;

use crate::error::CapabilitiesError;

/// Whether the URL already targets a WMTS capabilities endpoint.
fn is_wmts_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains("service=wmts") || lower.contains("/wmtscapabilities.xml")
}

/// Ensure the URL asks for a capabilities document: WMTS endpoints pass
/// through untouched, everything else gets `Service=WMS` and
/// `Request=GetCapabilities` appended (replacing existing values).
pub fn normalize_capabilities_url(url: &str) -> String {
    if is_wmts_url(url) {
        return url.to_string();
    }
    let with_service = urlq::add_query_param(url, "Service", "WMS");
    urlq::add_query_param(&with_service, "Request", "GetCapabilities")
}

/// Download the capabilities XML. The client retries through its proxy on a
/// failed direct attempt. Some proxies wrap the document in an HTML page;
/// when the body starts with `<html>` the embedded `<Capabilities` element
/// is recovered by cutting the prefix.
pub async fn fetch_capabilities_xml(
    client: &HttpClient,
    url: &str,
) -> Result<String, CapabilitiesError> {
    let request_url = normalize_capabilities_url(url);
    debug!(url = %request_url, "fetching capabilities");

    let mut body = client.get_text(&request_url).await?;

    if body.len() >= 6 && body.as_bytes()[..6].eq_ignore_ascii_case(b"<html>") {
        if let Some(start) = body.find("<Capabilities") {
            info!("capabilities body was HTML-wrapped; recovering embedded document");
            body = body.split_off(start);
        }
    }

    Ok(body)
}
