use crate::error::CanvasError;
use axum::extract::multipart::MultipartError;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Error type for HTTP handlers
///
/// Produces `{"error": message, "code": CODE}` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Pipeline error
    #[error(transparent)]
    Canvas(#[from] CanvasError),

    /// Malformed or oversized multipart body
    #[error("Invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    /// Daily quota exhausted
    #[error("Daily limit of {limit} requests reached")]
    RateLimited { limit: u32 },
}

/// Convenience type alias for handler return values
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            Self::Canvas(err) => match err {
                CanvasError::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
                },
                CanvasError::UnsupportedFormat(msg) => (
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "UNSUPPORTED_FORMAT",
                    format!("Unsupported image format: {msg}"),
                ),
                CanvasError::PayloadTooLarge { .. } => {
                    (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", err.to_string())
                },
                CanvasError::Removal(msg) => {
                    tracing::warn!(error = %msg, "Background removal failed");
                    (StatusCode::BAD_GATEWAY, "REMOVAL_FAILED", err.to_string())
                },
                other => {
                    tracing::error!(error = %other, "Internal processing error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                },
            },
            Self::Multipart(err) => {
                let status = err.status();
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "PAYLOAD_TOO_LARGE"
                } else {
                    "INVALID_MULTIPART"
                };
                (status, code, err.body_text())
            },
            Self::RateLimited { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", self.to_string())
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.classify();
        let body = json!({
            "error": message,
            "code": code,
        });

        let mut response = (status, axum::Json(body)).into_response();
        if let Self::RateLimited { limit } = self {
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(CanvasError::invalid_input("bad").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CanvasError::unsupported_format("bmp").into()),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            status_of(CanvasError::PayloadTooLarge { size: 2, limit: 1 }.into()),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_of(CanvasError::removal("down").into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(CanvasError::inference("nan").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ApiError::RateLimited { limit: 5 }),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_internal_message_is_sanitized() {
        let (_, code, message) =
            ApiError::from(CanvasError::internal("secret path /srv/x")).classify();
        assert_eq!(code, "INTERNAL_ERROR");
        assert!(!message.contains("/srv/x"));
    }

    #[test]
    fn test_rate_limit_headers() {
        let response = ApiError::RateLimited { limit: 7 }.into_response();
        assert_eq!(response.headers()["x-ratelimit-limit"], "7");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    }
}
