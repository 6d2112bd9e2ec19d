//! Identity verification error types.

use thiserror::Error;

/// Errors that can occur while verifying a bearer credential.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The identity provider rejected the credential.
    #[error("credential rejected (status {0})")]
    Rejected(u16),

    /// The identity provider answered with something other than a user.
    #[error("malformed identity response: {0}")]
    MalformedResponse(String),

    /// The identity provider could not be reached.
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

impl IdentityError {
    /// Whether the failure says nothing about the credential itself.
    ///
    /// Server errors and throttling from the provider count as outages.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::MalformedResponse(_) | Self::Rejected(429 | 500..=599)
        )
    }
}
