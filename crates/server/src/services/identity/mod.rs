//! Bearer credential verification.
//!
//! Registration, login and passwords live with an external identity provider.
//! This service only exchanges an opaque access token for the member id it was
//! issued to, by calling the provider's user endpoint:
//!
//! ```text
//! GET <IDENTITY_URL>
//! Authorization: Bearer <token>
//! apikey: <IDENTITY_API_KEY>
//!
//! 200 { "id": "<uuid>", ... }
//! ```

mod error;

pub use error::IdentityError;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use group_order_core::MemberId;

use crate::config::IdentityConfig;

/// Longest credential accepted for verification, in characters.
pub const MAX_CREDENTIAL_CHARS: usize = 5000;

/// Exchanges a bearer credential for a verified member id.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token` and return the member it belongs to.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the token is not valid or cannot be checked.
    async fn verify(&self, token: &str) -> Result<MemberId, IdentityError>;
}

/// Trim and bound a raw credential; `None` if nothing usable remains.
#[must_use]
pub fn normalize_credential(raw: Option<&str>) -> Option<String> {
    let token: String = raw?.trim().chars().take(MAX_CREDENTIAL_CHARS).collect();
    (!token.is_empty()).then_some(token)
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: MemberId,
}

/// [`IdentityVerifier`] backed by the identity provider's HTTP user endpoint.
#[derive(Clone)]
pub struct HttpIdentityVerifier {
    inner: Arc<HttpIdentityVerifierInner>,
}

struct HttpIdentityVerifierInner {
    client: reqwest::Client,
    user_url: Url,
    api_key: SecretString,
}

impl HttpIdentityVerifier {
    /// Create a verifier from configuration.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpIdentityVerifierInner {
                client,
                user_url: config.user_url.clone(),
                api_key: config.api_key.clone(),
            }),
        })
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<MemberId, IdentityError> {
        let response = self
            .inner
            .client
            .get(self.inner.user_url.clone())
            .bearer_auth(token)
            .header("apikey", self.inner.api_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Rejected(status.as_u16()));
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::MalformedResponse(e.to_string()))?;

        Ok(user.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_credential_trims() {
        assert_eq!(
            normalize_credential(Some("  abc.def  ")),
            Some("abc.def".to_string())
        );
    }

    #[test]
    fn test_normalize_credential_blank_is_none() {
        assert_eq!(normalize_credential(Some("   ")), None);
        assert_eq!(normalize_credential(None), None);
    }

    #[test]
    fn test_normalize_credential_is_bounded() {
        let long = "x".repeat(MAX_CREDENTIAL_CHARS + 100);
        let token = normalize_credential(Some(&long));
        assert_eq!(token.map(|t| t.chars().count()), Some(MAX_CREDENTIAL_CHARS));
    }

    #[test]
    fn test_infrastructure_errors() {
        assert!(!IdentityError::Rejected(401).is_infrastructure());
        assert!(!IdentityError::Rejected(403).is_infrastructure());
        assert!(IdentityError::MalformedResponse("html".to_string()).is_infrastructure());
    }

    #[test]
    fn test_provider_outage_statuses_are_infrastructure() {
        assert!(IdentityError::Rejected(503).is_infrastructure());
        assert!(IdentityError::Rejected(500).is_infrastructure());
        assert!(IdentityError::Rejected(429).is_infrastructure());
    }
}
