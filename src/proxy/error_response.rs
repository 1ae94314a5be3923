//! Uniform error responses for the proxy surface
//!
//! Callers see either the backend's own error semantics (pass-through,
//! handled in the hot path) or one of these synthesized failures. Logging
//! trouble never appears here; it is isolated from the response path.

use crate::proxy::types::ProxyError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Unique error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Extension trait for consistent error formatting
pub trait ErrorResponseExt {
    /// Convert to standardized error response
    fn to_error_response(&self) -> ErrorResponse;

    /// Get the appropriate HTTP status code
    fn status_code(&self) -> StatusCode;
}

impl ErrorResponseExt for ProxyError {
    fn to_error_response(&self) -> ErrorResponse {
        use ProxyError::*;

        match self {
            MalformedRequest(msg) => ErrorResponse::new("MALFORMED_REQUEST", msg.clone()),
            RequestTooLarge { size, max_size } => ErrorResponse::new(
                "REQUEST_TOO_LARGE",
                format!("Request size {size} exceeds maximum {max_size}"),
            ),
            BackendTimeout(duration) => ErrorResponse::new(
                "BACKEND_TIMEOUT",
                format!("Prediction backend did not respond within {duration:?}"),
            ),
            BackendUnreachable(msg) => ErrorResponse::new(
                "BACKEND_UNREACHABLE",
                format!("Prediction backend unreachable: {msg}"),
            ),
            InvalidBackendUrl(url) => {
                ErrorResponse::new("INVALID_BACKEND_URL", format!("Invalid backend URL: {url}"))
            }
            Internal(msg) => ErrorResponse::new("INTERNAL_ERROR", msg.clone()),
        }
    }

    fn status_code(&self) -> StatusCode {
        use ProxyError::*;

        match self {
            MalformedRequest(_) => StatusCode::BAD_REQUEST,
            RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            BackendUnreachable(_) => StatusCode::BAD_GATEWAY,
            InvalidBackendUrl(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.to_error_response())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn malformed_request_maps_to_400() {
        let error = ProxyError::MalformedRequest("body must be a JSON object".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(error.to_error_response().code, "MALFORMED_REQUEST");
    }

    #[test]
    fn timeout_maps_to_504() {
        let error = ProxyError::BackendTimeout(Duration::from_secs(5));
        assert_eq!(error.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(error.to_error_response().code, "BACKEND_TIMEOUT");
    }

    #[test]
    fn transport_failure_maps_to_502() {
        let error = ProxyError::BackendUnreachable("connection refused".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(error.to_error_response().code, "BACKEND_UNREACHABLE");
    }

    #[test]
    fn oversized_request_maps_to_413() {
        let error = ProxyError::RequestTooLarge {
            size: crate::proxy::types::BodySize::from(2048),
            max_size: crate::proxy::types::RequestSizeLimit::try_new(1024).unwrap(),
        };
        assert_eq!(error.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn error_body_is_json_with_code_and_message() {
        let error = ProxyError::MalformedRequest("bad body".to_string());
        let body = error.to_error_response();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "MALFORMED_REQUEST");
        assert_eq!(json["message"], "bad body");
    }
}
