//! Parse error taxonomy. All failures are total: no partial model escapes.

use thiserror::Error;
use weave_common::TransportError;

#[derive(Debug, Error)]
pub enum CapabilitiesError {
    #[error("empty capabilities document")]
    EmptyDocument,

    /// The body is an HTML page, not a capabilities document.
    #[error("not a capabilities document (HTML body)")]
    NotCapabilities,

    #[error("malformed XML: {0}")]
    MalformedXml(String),

    #[error("unrecognized root tag: {0}")]
    BadRootTag(String),

    #[error("unsupported capabilities version: {0}")]
    UnsupportedVersion(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
