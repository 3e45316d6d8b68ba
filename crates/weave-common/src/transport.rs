//! Transport error taxonomy and proxy configuration.
//!
//! The HTTP module classifies failures into these variants; the engine keys
//! its proxy-retry policy off [`TransportError::is_network`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified transport failure. The display strings double as the short
/// user-facing tags surfaced by the CLI.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connect failed")]
    CouldNotConnect,

    #[error("Operation timeout")]
    ConnectTimeout,

    #[error("Operation timeout")]
    ReadTimeout,

    #[error("Wrong URL")]
    DnsResolveFailure,

    #[error("Proxy resolve failure")]
    ProxyResolveFailure,

    #[error("SSL connect error")]
    SslHandshakeFailure,

    #[error("Network error")]
    SendRecvError,

    #[error("Unsupported protocol")]
    UnsupportedProtocol,

    #[error("Wrong URL")]
    BadUrl,

    #[error("Empty url")]
    EmptyUrl,

    #[error("HTTP error")]
    HttpNon2xx(u16),

    #[error("Error image data length")]
    ContentLengthMismatch { declared: u64, received: u64 },

    #[error("Received XML instead of image data")]
    ReceivedXmlInsteadOfImage,

    #[error("Network error")]
    ServerHtmlError,

    #[error("Empty image data")]
    EmptyBody,

    #[error("Unknown error")]
    Unknown(String),
}

impl TransportError {
    /// Whether the failure is a *network* error: only these license the
    /// second attempt through the configured proxy. Bad URLs, unsupported
    /// protocols and TLS handshake failures do not.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            TransportError::CouldNotConnect
                | TransportError::ConnectTimeout
                | TransportError::ReadTimeout
                | TransportError::DnsResolveFailure
                | TransportError::ProxyResolveFailure
                | TransportError::SendRecvError
        )
    }
}

/// Proxy endpoint with optional basic-auth credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    pub user_name: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_name: None,
            password: None,
        }
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user_name = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.url.is_empty()
    }
}
