//! HTTP transport for capabilities documents and tile bodies.
//!
//! One client without a proxy, one with the configured proxy; the caller
//! decides which attempt to make. Redirects are followed, certificate
//! verification is off (map services routinely present broken chains), and
//! body reads are guarded by a low-speed floor instead of a total timeout so
//! large mosaics on slow links still complete.

use std::time::{Duration, Instant};

use futures::StreamExt;
use reqwest::{Client, Proxy, Response};
use tracing::{debug, warn};
use weave_common::{ProxyConfig, TransportError};

/// Connect timeout, seconds.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Low-speed floor: abort when fewer than this many bytes move per second...
const LOW_SPEED_LIMIT: u64 = 5000;
/// ...sustained over this window.
const LOW_SPEED_TIME: Duration = Duration::from_secs(10);

/// A downloaded binary body plus the length the server declared, when known.
#[derive(Debug, Clone)]
pub struct BinaryBody {
    pub bytes: Vec<u8>,
    pub declared_content_length: Option<u64>,
}

/// HTTP client pair (direct + optional proxy).
#[derive(Debug, Clone)]
pub struct HttpClient {
    direct: Client,
    proxied: Option<Client>,
}

impl HttpClient {
    pub fn new(proxy: Option<&ProxyConfig>) -> Result<Self, TransportError> {
        let direct = base_builder()
            .build()
            .map_err(|e| TransportError::Unknown(e.to_string()))?;

        let proxied = match proxy {
            Some(cfg) if cfg.is_configured() => {
                let mut p = Proxy::all(&cfg.url)
                    .map_err(|_| TransportError::ProxyResolveFailure)?;
                if let (Some(user), Some(password)) = (&cfg.user_name, &cfg.password) {
                    p = p.basic_auth(user, password);
                }
                Some(
                    base_builder()
                        .proxy(p)
                        .build()
                        .map_err(|e| TransportError::Unknown(e.to_string()))?,
                )
            }
            _ => None,
        };

        Ok(Self { direct, proxied })
    }

    pub fn has_proxy(&self) -> bool {
        self.proxied.is_some()
    }

    /// One GET attempt returning the body as UTF-8 text.
    pub async fn get_text_once(
        &self,
        url: &str,
        use_proxy: bool,
    ) -> Result<String, TransportError> {
        let body = self.get_binary_once(url, use_proxy).await?;
        Ok(String::from_utf8_lossy(&body.bytes).into_owned())
    }

    /// GET with automatic proxy fallback on any first-attempt failure.
    /// Used for capabilities documents.
    pub async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        match self.get_text_once(url, false).await {
            Ok(body) => Ok(body),
            Err(first) if self.proxied.is_some() => {
                debug!(url, error = %first, "direct fetch failed, retrying through proxy");
                self.get_text_once(url, true).await
            }
            Err(first) => Err(first),
        }
    }

    /// One GET attempt returning the raw body. `use_proxy` selects the
    /// proxied client; it is an error to ask for a proxy when none is
    /// configured.
    pub async fn get_binary_once(
        &self,
        url: &str,
        use_proxy: bool,
    ) -> Result<BinaryBody, TransportError> {
        if url.is_empty() {
            return Err(TransportError::EmptyUrl);
        }
        let client = if use_proxy {
            self.proxied
                .as_ref()
                .ok_or(TransportError::ProxyResolveFailure)?
        } else {
            &self.direct
        };

        let response = client.get(url).send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "non-2xx response");
            return Err(TransportError::HttpNon2xx(status.as_u16()));
        }

        read_body(response).await
    }
}

fn base_builder() -> reqwest::ClientBuilder {
    Client::builder()
        .danger_accept_invalid_certs(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(10))
}

/// Stream the body with the low-speed guard: any 10 s window moving fewer
/// than `LOW_SPEED_LIMIT * 10` bytes aborts with a read timeout.
async fn read_body(response: Response) -> Result<BinaryBody, TransportError> {
    let declared_content_length = response.content_length();
    let mut stream = response.bytes_stream();

    let mut bytes = Vec::new();
    let mut window_start = Instant::now();
    let mut window_bytes: u64 = 0;
    let floor = LOW_SPEED_LIMIT * LOW_SPEED_TIME.as_secs();

    loop {
        let chunk = match tokio::time::timeout(LOW_SPEED_TIME, stream.next()).await {
            Err(_) => return Err(TransportError::ReadTimeout),
            Ok(None) => break,
            Ok(Some(Err(e))) => return Err(classify(e)),
            Ok(Some(Ok(chunk))) => chunk,
        };

        bytes.extend_from_slice(&chunk);
        window_bytes += chunk.len() as u64;
        if window_start.elapsed() >= LOW_SPEED_TIME {
            if window_bytes < floor {
                return Err(TransportError::ReadTimeout);
            }
            window_start = Instant::now();
            window_bytes = 0;
        }
    }

    Ok(BinaryBody {
        bytes,
        declared_content_length,
    })
}

/// Fold a reqwest error into the transport taxonomy.
pub fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        return if error.is_connect() {
            TransportError::ConnectTimeout
        } else {
            TransportError::ReadTimeout
        };
    }

    let chain = error_chain_text(&error);
    if error.is_connect() {
        if chain.contains("dns") || chain.contains("resolve") {
            return TransportError::DnsResolveFailure;
        }
        if chain.contains("certificate")
            || chain.contains("handshake")
            || chain.contains("tls")
            || chain.contains("ssl")
        {
            return TransportError::SslHandshakeFailure;
        }
        return TransportError::CouldNotConnect;
    }
    if error.is_builder() {
        return TransportError::BadUrl;
    }
    if let Some(url) = error.url() {
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return TransportError::UnsupportedProtocol;
        }
    }
    if error.is_body() || error.is_decode() || error.is_request() {
        return TransportError::SendRecvError;
    }
    TransportError::Unknown(error.to_string())
}

fn error_chain_text(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string().to_ascii_lowercase();
    let mut source = error.source();
    while let Some(inner) = source {
        text.push(' ');
        text.push_str(&inner.to_string().to_ascii_lowercase());
        source = inner.source();
    }
    text
}
