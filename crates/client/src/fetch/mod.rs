//! HTTP fetcher for the cache worker.
//!
//! ### Request forwarding
//! - Method, headers and body are forwarded as given
//! - Hop-by-hop headers, `host`, `content-length` and `accept-encoding`
//!   are left to the HTTP client
//!
//! ### Responses
//! - Any status is a response; only transport failures are errors
//! - Bodies are decompressed (gzip, brotli, deflate) and capped at
//!   `max_bytes`
//! - Max redirects: 5 (configurable)

pub mod url;

use async_trait::async_trait;
use mcap_core::http::is_hop_by_hop;
use mcap_core::{CachedRequest, CachedResponse, Error, Fetcher};
use reqwest::{Client, Method, Url};
use std::time::{Duration, Instant};

pub use url::{UrlError, parse_origin, resolve_asset, resolve_target};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "mcap-cache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 15s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "mcap-cache/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(15_000),
            max_redirects: 5,
        }
    }
}

impl From<&mcap_core::AppConfig> for FetchConfig {
    fn from(config: &mcap_core::AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// HTTP client bound to one site origin.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
    origin: Url,
}

impl FetchClient {
    /// Create a fetch client for `origin` with the given configuration.
    pub fn new(origin: &str, config: FetchConfig) -> Result<Self, Error> {
        let origin = parse_origin(origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config, origin })
    }

    /// The origin manifest paths resolve against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn forwardable(name: &str) -> bool {
    !(is_hop_by_hop(name)
        || name.eq_ignore_ascii_case("host")
        || name.eq_ignore_ascii_case("content-length")
        || name.eq_ignore_ascii_case("accept-encoding"))
}

fn network_error(url: &str, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Network(format!("timeout fetching {url}"))
    } else {
        Error::Network(format!("network error fetching {url}: {err}"))
    }
}

#[async_trait]
impl Fetcher for FetchClient {
    fn resolve(&self, path: &str) -> Result<String, Error> {
        resolve_asset(&self.origin, path)
            .map(String::from)
            .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
    }

    fn resolve_target(&self, target: &str) -> Result<String, Error> {
        resolve_target(&self.origin, target)
            .map(String::from)
            .map_err(|e| Error::InvalidUrl(format!("{target}: {e}")))
    }

    async fn fetch(&self, request: &CachedRequest) -> Result<CachedResponse, Error> {
        let start = Instant::now();
        let url = Url::parse(&request.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", request.url)))?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {}", request.method)))?;

        let mut builder = self.http.request(method, url);
        for (name, value) in request.headers.iter().filter(|(name, _)| forwardable(name)) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| network_error(&request.url, &e))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()) && name.as_str() != "content-length")
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| network_error(&request.url, &e))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(CachedResponse { status: status.as_u16(), headers, body })
    }
}
