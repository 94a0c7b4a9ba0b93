//! Application router and middleware stack

use super::error::ApiError;
use super::handlers;
use super::state::AppState;
use crate::config::ServiceConfig;
use crate::rate_limit::client_key;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{warn, Level};

/// Room for multipart boundaries and text fields on top of the file bytes
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the full application [`Router`] with all middleware layers
///
/// Layers, innermost first:
///
/// 1. Rate limit (processing routes only)
/// 2. Body size limit
/// 3. Panic recovery
/// 4. Request timeout
/// 5. Request id propagation, tracing and assignment
/// 6. CORS
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let request_id_header = HeaderName::from_static("x-request-id");

    let processing = Router::new()
        .route("/process", post(handlers::process))
        .route("/process/preview", post(handlers::preview))
        .route("/process/validate", post(handlers::validate))
        .route("/process/batch", post(handlers::batch))
        .route("/process/custom", post(handlers::custom))
        .route("/process/listing-pack", post(handlers::listing_pack))
        .route_layer(middleware::from_fn_with_state(state.clone(), enforce_rate_limit));

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .merge(processing)
        .layer(DefaultBodyLimit::max(body_limit(&config)))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(build_cors_layer(&config))
        .with_state(state)
}

/// Largest request body accepted: a full batch plus multipart framing
#[must_use]
pub fn body_limit(config: &ServiceConfig) -> usize {
    config
        .max_upload_bytes
        .saturating_mul(config.max_batch_files.max(1))
        .saturating_add(MULTIPART_OVERHEAD)
}

/// Build the CORS layer; `*` allows any origin
///
/// Origins that fail to parse are logged and skipped.
pub fn build_cors_layer(config: &ServiceConfig) -> CorsLayer {
    let allow_origin = if config.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                    None
                },
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-api-key")])
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static("x-background-removal"),
            HeaderName::from_static("x-processing-time-ms"),
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
        ])
        .max_age(Duration::from_secs(3600))
}

/// Count the request against the client's daily quota
async fn enforce_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let key = client_key(request.headers(), peer, state.config.trust_forwarded_for);
    let decision = state
        .limiter
        .check(&key, chrono::Utc::now().date_naive());

    if !decision.allowed {
        warn!(client = %key, limit = decision.limit, "rate limit exceeded");
        return ApiError::RateLimited {
            limit: decision.limit,
        }
        .into_response();
    }

    let mut response = next.run(request).await;
    if decision.limit > 0 {
        let headers = response.headers_mut();
        headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_limit_covers_full_batch() {
        let config = ServiceConfig {
            max_upload_bytes: 1000,
            max_batch_files: 3,
            ..ServiceConfig::default()
        };
        assert_eq!(body_limit(&config), 3000 + MULTIPART_OVERHEAD);
    }

    #[test]
    fn test_cors_layer_accepts_mixed_origins() {
        let config = ServiceConfig {
            cors_origins: vec!["https://shop.example".to_string(), "bad\norigin".to_string()],
            ..ServiceConfig::default()
        };
        // Invalid entries are skipped rather than aborting startup
        let _layer = build_cors_layer(&config);
    }
}
