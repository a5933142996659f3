//! HTTP-facing errors for the local front.
//!
//! Cache manager errors map onto gateway statuses so clients see the
//! failure a real network would have produced, never a fake success.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mcap_core::Error;
use serde::Serialize;

/// Errors returned by the proxy handler.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Error from the cache worker or fetcher.
    #[error(transparent)]
    Cache(#[from] Error),

    /// The request body exceeds the configured limit.
    #[error("PAYLOAD_TOO_LARGE: {0}")]
    PayloadTooLarge(String),

    /// The incoming request could not be read.
    #[error("BAD_REQUEST: {0}")]
    BadRequest(String),

    /// A response could not be assembled.
    #[error("INTERNAL_ERROR: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ProxyError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ProxyError::Cache(err) => {
                let status = match err {
                    Error::OfflineMiss(_) | Error::Network(_) => StatusCode::GATEWAY_TIMEOUT,
                    Error::FetchTooLarge(_) => StatusCode::BAD_GATEWAY,
                    Error::InvalidUrl(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    Error::InvalidState(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.code())
            }
            ProxyError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ProxyError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ProxyError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        }

        let body = ErrorResponse { error: ErrorBody { code, message: self.to_string() } };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_miss_is_gateway_timeout() {
        let err = ProxyError::from(Error::OfflineMiss("https://mcap.example/x".into()));
        assert_eq!(err.status_and_code(), (StatusCode::GATEWAY_TIMEOUT, "OFFLINE_MISS"));
    }

    #[test]
    fn test_invalid_url_is_bad_request() {
        let err = ProxyError::from(Error::InvalidUrl("nope".into()));
        assert_eq!(err.status_and_code().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_payload_too_large_status() {
        let err = ProxyError::PayloadTooLarge("length limit exceeded".into());
        assert_eq!(err.status_and_code(), (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"));
    }

    #[test]
    fn test_database_error_is_internal() {
        let err = ProxyError::from(Error::CorruptEntry("bad json".into()));
        assert_eq!(err.status_and_code(), (StatusCode::INTERNAL_SERVER_ERROR, "CACHE_ERROR"));
    }
}
