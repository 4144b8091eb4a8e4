//! Token authentication.
//!
//! [`StdAuthenticator`] is the production entry point: it decodes a raw
//! token, checks the time claims, picks the verifier registered for the
//! token's issuer and returns the verified claims.
//!
//! # Security
//!
//! - Time claims are checked before any trust decision, with 1s leeway
//! - Issuers are matched exactly against the registry built at startup
//! - Verifier errors are returned unchanged so their codes survive

use crate::claims::Claims;
use crate::errors::AuthError;
use crate::token::{TimeClaims, UnverifiedToken};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Clock leeway, in seconds, applied to `exp`, `nbf` and `iat`.
pub const TIME_LEEWAY_SECONDS: i64 = 1;

/// Turns a raw bearer token into verified claims.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// # Errors
    ///
    /// Returns an `AuthError` whose code says why the token was refused.
    async fn authenticate(&self, raw_token: &str) -> Result<Claims, AuthError>;
}

#[async_trait]
impl<T: Authenticator + ?Sized> Authenticator for Arc<T> {
    async fn authenticate(&self, raw_token: &str) -> Result<Claims, AuthError> {
        (**self).authenticate(raw_token).await
    }
}

/// Checks a decoded token's signature for one issuer.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// # Errors
    ///
    /// `UntrustedSource` when no trusted key matches, `BadSignature` when
    /// the matching key rejects the signature, `Unknown` for internal
    /// failures.
    async fn verify(&self, token: &UnverifiedToken<'_>) -> Result<Claims, AuthError>;
}

/// Time-claim failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("token is expired")]
    Expired,
    #[error("token is not valid yet")]
    NotYetValid,
    #[error("token was issued in the future")]
    IssuedInFuture,
}

/// Validate `exp`, `nbf` and `iat` against `now` (Unix seconds).
///
/// # Errors
///
/// Returns the first failing check.
pub fn validate_time_claims(claims: TimeClaims, now: i64, leeway: i64) -> Result<(), TimeError> {
    if claims.exp.is_some_and(|exp| now - leeway > exp) {
        return Err(TimeError::Expired);
    }
    if claims.nbf.is_some_and(|nbf| now + leeway < nbf) {
        return Err(TimeError::NotYetValid);
    }
    if claims.iat.is_some_and(|iat| now + leeway < iat) {
        return Err(TimeError::IssuedInFuture);
    }
    Ok(())
}

/// Authenticator backed by a fixed registry of per-issuer verifiers.
#[derive(Clone, Default)]
pub struct StdAuthenticator {
    verifiers: HashMap<String, Arc<dyn Verifier>>,
}

impl StdAuthenticator {
    pub fn new(verifiers: HashMap<String, Arc<dyn Verifier>>) -> Self {
        Self { verifiers }
    }

    /// Register `verifier` for tokens whose `iss` equals `issuer`.
    pub fn with_verifier(mut self, issuer: impl Into<String>, verifier: Arc<dyn Verifier>) -> Self {
        self.verifiers.insert(issuer.into(), verifier);
        self
    }

    pub fn issuers(&self) -> impl Iterator<Item = &str> {
        self.verifiers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for StdAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdAuthenticator")
            .field("issuers", &self.verifiers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl Authenticator for StdAuthenticator {
    #[instrument(skip_all, name = "jwtauth.authenticate")]
    async fn authenticate(&self, raw_token: &str) -> Result<Claims, AuthError> {
        let token = UnverifiedToken::parse(raw_token).map_err(|e| {
            tracing::debug!(target: "jwtauth.authenticate", error = %e, "Token decoding failed");
            AuthError::invalid_token(e)
        })?;

        let times = token.time_claims().map_err(|e| {
            tracing::debug!(target: "jwtauth.authenticate", error = %e, "Token time claims unreadable");
            AuthError::invalid_token(e)
        })?;
        validate_time_claims(times, Utc::now().timestamp(), TIME_LEEWAY_SECONDS).map_err(|e| {
            tracing::debug!(target: "jwtauth.authenticate", error = %e, "Token time validation failed");
            AuthError::invalid_token(e)
        })?;

        let issuer = token.unverified_claims().issuer().unwrap_or_default();
        let Some(verifier) = self.verifiers.get(issuer) else {
            tracing::debug!(target: "jwtauth.authenticate", issuer = %issuer, "Issuer not registered");
            return Err(AuthError::untrusted_source(format!(
                "issuer not registered: {issuer}"
            )));
        };

        let claims = verifier.verify(&token).await?;
        tracing::debug!(target: "jwtauth.authenticate", issuer = %issuer, "Token authenticated");
        Ok(claims)
    }
}

/// Authenticator that decodes tokens without checking signatures or time
/// claims. Test use only.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct InsecureAuthenticator;

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Authenticator for InsecureAuthenticator {
    async fn authenticate(&self, raw_token: &str) -> Result<Claims, AuthError> {
        UnverifiedToken::parse(raw_token)
            .map(|token| token.unverified_claims().clone())
            .map_err(AuthError::invalid_token)
    }
}
