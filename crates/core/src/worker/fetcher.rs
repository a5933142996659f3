//! The network seam used by [`CacheWorker`](super::CacheWorker).

use crate::Error;
use crate::http::{CachedRequest, CachedResponse};
use async_trait::async_trait;

/// Performs live network requests on behalf of the worker.
///
/// Implementations return `Ok` for any response the network produced,
/// whatever its status, and `Err` only when no response arrived
/// (unreachable host, DNS failure, timeout, oversized body).
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Resolve a manifest path to the absolute URL it is fetched from.
    fn resolve(&self, path: &str) -> Result<String, Error>;

    /// Resolve an intercepted request target (`/path?query`) to the URL it
    /// is forwarded to. Defaults to [`resolve`](Fetcher::resolve).
    fn resolve_target(&self, target: &str) -> Result<String, Error> {
        self.resolve(target)
    }

    /// Perform the request.
    async fn fetch(&self, request: &CachedRequest) -> Result<CachedResponse, Error>;
}
