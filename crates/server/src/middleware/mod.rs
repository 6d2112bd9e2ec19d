//! HTTP middleware and extractors for the ordering server.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with `request_id` field)
//! 3. Request ID (record in span, echo in response)
//! 4. CORS (on `/api` routes)
//!
//! # Extractors
//!
//! - [`BearerCredential`] - unverified bearer token
//! - [`ClientIp`] - client address from proxy headers or the socket peer

pub mod auth;
pub mod client_ip;
pub mod cors;
pub mod request_id;

pub use auth::BearerCredential;
pub use client_ip::ClientIp;
pub use cors::cors_layer;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
