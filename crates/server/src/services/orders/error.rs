//! Order pipeline error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Every way an order request can fail.
///
/// The display text is what the client sees; `kind()` is the stable
/// machine-readable name.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Missing or invalid bearer credential. Not retryable.
    #[error("Authentication required")]
    Unauthenticated,

    /// Malformed or missing request fields. Resubmit with a new token.
    #[error("{0}")]
    InvalidInput(String),

    /// A line item has an unusable price or quantity.
    #[error("{0}")]
    InvalidItem(String),

    /// No line item has a product name.
    #[error("Items required")]
    EmptyOrder,

    /// The order id is not shaped like a UUID.
    #[error("Invalid order id")]
    InvalidId,

    /// The member has not completed a profile.
    #[error("Member profile required")]
    ProfileRequired,

    /// Submitted again within the cooldown.
    #[error("Too many requests. Please wait before trying again.")]
    RateLimited { retry_after: u64 },

    /// Outside the ordering window, or no window is configured.
    #[error("Ordering is closed now")]
    OrderingClosed,

    /// The idempotency token is already bound to another member's order.
    #[error("Duplicate submission")]
    DuplicateSubmission,

    /// No such order for this member.
    #[error("Order not found")]
    NotFound,

    /// A backing store failed; safe to retry with the same token.
    #[error("{context}")]
    Store {
        context: &'static str,
        #[source]
        source: RepositoryError,
    },
}

impl OrderError {
    /// Wrap a repository failure with the message shown to the client.
    pub fn store(context: &'static str) -> impl FnOnce(RepositoryError) -> Self {
        move |source| Self::Store { context, source }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidItem(_) => "invalid_item",
            Self::EmptyOrder => "empty_order",
            Self::InvalidId => "invalid_id",
            Self::ProfileRequired => "profile_required",
            Self::RateLimited { .. } => "rate_limited",
            Self::OrderingClosed => "ordering_closed",
            Self::DuplicateSubmission => "duplicate_submission",
            Self::NotFound => "not_found",
            Self::Store { .. } => "store_failure",
        }
    }

    /// Seconds the caller should wait before resubmitting, if any.
    #[must_use]
    pub const fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
