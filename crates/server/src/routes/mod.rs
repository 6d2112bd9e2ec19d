//! HTTP routes for the ordering server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health               - Liveness check
//! GET  /health/ready         - Readiness check (database ping)
//!
//! # Ordering API (CORS enabled)
//! POST /api/orders           - Submit an order          -> { order_id }
//! POST /api/orders/lookup    - Fetch one of your orders -> { order }
//! POST /api/orders/history   - Your recent orders       -> { orders }
//! GET  /api/schedule         - Ordering window status
//! ```
//!
//! Errors are JSON: `{ "error": <message>, "kind": <kind>, "retry_after"?: <seconds> }`.

pub mod health;
pub mod orders;
pub mod schedule;

use axum::{
    Router,
    extract::Request,
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::{cors_layer, request_id_middleware};
use crate::state::AppState;

/// Create the ordering API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(orders::submit))
        .route("/orders/lookup", post(orders::lookup))
        .route("/orders/history", post(orders::history))
        .route("/schedule", get(schedule::status))
        .layer(cors_layer())
}

/// Build the complete application with middleware and state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes())
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
