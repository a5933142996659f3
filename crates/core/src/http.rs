//! Request and response snapshots exchanged between the worker, the
//! network fetcher and the cache store.
//!
//! Bodies are [`Bytes`], so handing one copy to the caller and another to
//! the cache is a reference-count bump rather than a second read of the
//! stream.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A request as seen by the worker.
///
/// Header names are stored lowercased; the method is stored uppercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedRequest {
    /// Build a request with the given method and absolute URL.
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self { method: method.as_ref().to_ascii_uppercase(), url: url.into(), headers: Vec::new(), body: Bytes::new() }
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Append a header, lowercasing its name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Replace the request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of the named header, if any.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Only `GET` requests can be stored in or matched against the cache.
    pub fn is_cacheable(&self) -> bool {
        self.method == "GET"
    }
}

/// A response snapshot: status, headers and the full body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    /// Append a header, lowercasing its name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// First value of the named header, if any.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Header names listed in `Vary`, lowercased and trimmed.
    pub fn vary(&self) -> Vec<String> {
        self.headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("vary"))
            .flat_map(|(_, value)| value.split(','))
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

/// Request header values recorded alongside an entry for `Vary` matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaryRecord {
    /// `Vary: *` was present; the entry can never be matched.
    pub wildcard: bool,
    /// (header name, request value at store time)
    pub headers: Vec<(String, Option<String>)>,
}

impl VaryRecord {
    /// Capture the request values for every header the response varies on.
    pub fn capture(request: &CachedRequest, response: &CachedResponse) -> Option<Self> {
        let names = response.vary();
        if names.is_empty() {
            return None;
        }

        let wildcard = names.iter().any(|n| n == "*");
        let headers = names
            .into_iter()
            .filter(|n| n != "*")
            .map(|n| {
                let value = request.header(&n).map(str::to_string);
                (n, value)
            })
            .collect();

        Some(Self { wildcard, headers })
    }

    /// Whether a new request selects the same variant.
    pub fn matches(&self, request: &CachedRequest) -> bool {
        if self.wildcard {
            return false;
        }
        self.headers
            .iter()
            .all(|(name, value)| request.header(name) == value.as_deref())
    }
}

/// Connection-scoped headers that must not be forwarded or stored.
pub fn is_hop_by_hop(name: &str) -> bool {
    const HOP_BY_HOP: &[&str] = &[
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailer",
        "transfer-encoding",
        "upgrade",
    ];
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
