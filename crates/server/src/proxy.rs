//! Request interception.
//!
//! Every path is routed through [`CacheWorker::on_fetch`]: the request is
//! replayed against the origin and the answer relayed unchanged. Responses
//! served from the cache during an outage carry `x-mcap-cache: hit`.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::Response,
};
use mcap_core::http::is_hop_by_hop;
use mcap_core::{CacheWorker, CachedRequest, ResponseSource};

use crate::error::ProxyError;

/// Header marking a response served from the cache.
pub const CACHE_HEADER: &str = "x-mcap-cache";

/// Shared state for the interception handler.
#[derive(Clone)]
pub struct ProxyState {
    worker: Arc<CacheWorker>,
    max_body_bytes: usize,
}

impl ProxyState {
    pub fn new(worker: Arc<CacheWorker>, max_body_bytes: usize) -> Self {
        Self { worker, max_body_bytes }
    }
}

/// Build the router: a single fallback that intercepts everything.
///
/// Request bodies are capped at the state's `max_body_bytes`.
pub fn router(state: ProxyState) -> Router {
    let limit = state.max_body_bytes;
    Router::new()
        .fallback(intercept)
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

async fn intercept(
    State(state): State<ProxyState>, method: Method, uri: Uri, headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ProxyError> {
    let body = body.map_err(|rejection| match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ProxyError::PayloadTooLarge(rejection.body_text()),
        _ => ProxyError::BadRequest(format!("failed to read request body: {}", rejection.body_text())),
    })?;

    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = state.worker.resolve_target(target)?;

    let mut cached = CachedRequest::new(method.as_str(), url).with_body(body);
    for (name, value) in &headers {
        if let Ok(value) = value.to_str() {
            cached = cached.with_header(name.as_str(), value);
        }
    }

    let outcome = state.worker.on_fetch(&cached).await?;

    let mut builder = Response::builder().status(outcome.response.status);
    for (name, value) in outcome
        .response
        .headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
    {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if outcome.source == ResponseSource::Cache {
        builder = builder.header(CACHE_HEADER, "hit");
    }

    builder
        .body(Body::from(outcome.response.body))
        .map_err(|e| ProxyError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::Request as HttpRequest;
    use mcap_core::{AssetManifest, CacheDb, CachedResponse, Error, Fetcher};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    #[derive(Default)]
    struct SiteFetcher {
        offline: AtomicBool,
    }

    #[async_trait]
    impl Fetcher for SiteFetcher {
        fn resolve(&self, path: &str) -> Result<String, Error> {
            Ok(format!("https://mcap.example/{}", path.trim_start_matches('/')))
        }

        async fn fetch(&self, request: &CachedRequest) -> Result<CachedResponse, Error> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Network("offline".into()));
            }
            Ok(CachedResponse::new(200, format!("{} {}", request.method, request.url))
                .with_header("content-type", "text/plain"))
        }
    }

    async fn app() -> (Router, Arc<SiteFetcher>) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(SiteFetcher::default());
        let worker = CacheWorker::new("v1", AssetManifest::default(), fetcher.clone(), db).unwrap();
        worker.on_install().await.unwrap();
        worker.on_activate().await.unwrap();

        (router(ProxyState::new(Arc::new(worker), 1024 * 1024)), fetcher)
    }

    fn get(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_online_request_is_relayed() {
        let (app, _) = app().await;

        let response = app.oneshot(get("/index.html?lang=en")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(CACHE_HEADER).is_none());
        assert_eq!(body_text(response).await, "GET https://mcap.example/index.html?lang=en");
    }

    #[tokio::test]
    async fn test_offline_serves_cached_copy() {
        let (app, fetcher) = app().await;
        fetcher.offline.store(true, Ordering::SeqCst);

        let response = app.oneshot(get("/style.css")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CACHE_HEADER).unwrap(), "hit");
        assert_eq!(body_text(response).await, "GET https://mcap.example/style.css");
    }

    #[tokio::test]
    async fn test_offline_miss_is_gateway_timeout() {
        let (app, fetcher) = app().await;
        fetcher.offline.store(true, Ordering::SeqCst);

        let response = app.oneshot(get("/api/never-fetched")).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(body_text(response).await.contains("OFFLINE_MISS"));
    }

    #[tokio::test]
    async fn test_query_holding_a_url_is_forwarded() {
        let (app, _) = app().await;

        let response = app.oneshot(get("/share?url=https://x.com/post")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "GET https://mcap.example/share?url=https://x.com/post");
    }

    #[tokio::test]
    async fn test_oversized_body_is_payload_too_large() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fetcher = Arc::new(SiteFetcher::default());
        let worker = CacheWorker::new("v1", AssetManifest::default(), fetcher, db).unwrap();
        worker.on_install().await.unwrap();
        worker.on_activate().await.unwrap();
        let app = router(ProxyState::new(Arc::new(worker), 16));

        let post = HttpRequest::builder()
            .method("POST")
            .uri("/predict")
            .body(Body::from(vec![b'x'; 64]))
            .unwrap();
        let response = app.oneshot(post).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body_text(response).await.contains("PAYLOAD_TOO_LARGE"));
    }

    #[tokio::test]
    async fn test_post_is_forwarded_not_cached() {
        let (app, fetcher) = app().await;
        let post = HttpRequest::builder()
            .method("POST")
            .uri("/predict")
            .body(Body::from("0xabc"))
            .unwrap();

        let response = app.clone().oneshot(post).await.unwrap();
        assert_eq!(body_text(response).await, "POST https://mcap.example/predict");

        fetcher.offline.store(true, Ordering::SeqCst);
        let post = HttpRequest::builder()
            .method("POST")
            .uri("/predict")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(post).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
