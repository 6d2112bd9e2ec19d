//! Bearer credential extraction.
//!
//! Extraction never rejects: a missing or malformed header yields
//! `BearerCredential(None)`, and the order pipeline decides what that means.
//! Verification happens in the pipeline so every endpoint reports
//! authentication failures the same way.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

/// The raw token from `Authorization: Bearer <token>`, if any.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(BearerCredential(token): BearerCredential) -> impl IntoResponse {
///     // token: Option<String>, not yet verified
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BearerCredential(pub Option<String>);

impl BearerCredential {
    /// Prefer the header token, else the one from the request body.
    #[must_use]
    pub fn or_body(self, body_token: Option<String>) -> Option<String> {
        self.0.or(body_token)
    }
}

/// Token from an `Authorization` header with the `Bearer` scheme.
///
/// The scheme is matched case-insensitively; an empty token counts as absent.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

impl<S> FromRequestParts<S> for BearerCredential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(bearer_token(&parts.headers)))
    }
}
