//! Cross-origin policy.
//!
//! The ordering API is called from a browser app on another origin with a
//! bearer token, never with cookies, so any origin is allowed.

use axum::http::{HeaderName, Method, header};
use tower_http::cors::{Any, CorsLayer};

/// CORS layer for the `/api` routes.
#[must_use]
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
        ])
        .expose_headers([
            HeaderName::from_static(super::request_id::REQUEST_ID_HEADER),
            header::RETRY_AFTER,
        ])
}
