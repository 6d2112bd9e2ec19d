//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side failures to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`, rendered as
//! `{ "error": <message>, "kind": <kind>, "retry_after"?: <seconds> }`.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::OrderError;

/// Application-level error type for the ordering server.
#[derive(Debug, Error)]
pub enum AppError {
    /// The order pipeline rejected the request.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The request body could not be read.
    #[error("{0}")]
    BadRequest(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Order(err) => match err {
                OrderError::Unauthenticated => StatusCode::UNAUTHORIZED,
                OrderError::InvalidInput(_)
                | OrderError::InvalidItem(_)
                | OrderError::EmptyOrder
                | OrderError::InvalidId => StatusCode::BAD_REQUEST,
                OrderError::ProfileRequired | OrderError::OrderingClosed => StatusCode::FORBIDDEN,
                OrderError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                OrderError::DuplicateSubmission => StatusCode::CONFLICT,
                OrderError::NotFound => StatusCode::NOT_FOUND,
                OrderError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Order(err) => err.kind(),
            Self::BadRequest(_) => "invalid_input",
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(self, Self::Order(OrderError::Store { .. }))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                source = ?std::error::Error::source(&self),
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Store failures display only their context, never the source
        let message = self.to_string();

        let retry_after = match &self {
            Self::Order(err) => err.retry_after(),
            _ => None,
        };

        let body = ErrorBody {
            error: &message,
            kind: self.kind(),
            retry_after,
        };

        let mut response = (self.status(), Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;

    use super::*;
    use crate::db::RepositoryError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: impl Into<AppError>) -> StatusCode {
            err.into().into_response().status()
        }

        assert_eq!(
            get_status(OrderError::Unauthenticated),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(get_status(OrderError::EmptyOrder), StatusCode::BAD_REQUEST);
        assert_eq!(get_status(OrderError::InvalidId), StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status(OrderError::ProfileRequired),
            StatusCode::FORBIDDEN
        );
        assert_eq!(get_status(OrderError::OrderingClosed), StatusCode::FORBIDDEN);
        assert_eq!(
            get_status(OrderError::RateLimited { retry_after: 5 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(OrderError::DuplicateSubmission),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(OrderError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            get_status(AppError::BadRequest("Invalid JSON".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_rate_limited_body_has_retry_after() {
        let response = AppError::from(OrderError::RateLimited { retry_after: 87 }).into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "87"
        );
        let body = body_json(response).await;
        assert_eq!(
            body["error"],
            "Too many requests. Please wait before trying again."
        );
        assert_eq!(body["kind"], "rate_limited");
        assert_eq!(body["retry_after"], 87);
    }

    #[tokio::test]
    async fn test_store_failure_hides_source() {
        let err = OrderError::store("Failed to create order")(RepositoryError::DataCorruption(
            "orders row 42 is garbage".to_string(),
        ));
        let body = body_json(AppError::from(err).into_response()).await;
        assert_eq!(body["error"], "Failed to create order");
        assert_eq!(body["kind"], "store_failure");
        assert!(body.get("retry_after").is_none());
        assert!(!body.to_string().contains("garbage"));
    }
}
