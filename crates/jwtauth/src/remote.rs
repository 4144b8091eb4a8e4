//! Verifier backed by an issuer's remote JWKS endpoint.
//!
//! Keys are fetched over HTTP and kept in a [`KeyCache`]. A verification
//! that misses the cache (nothing stored, or the set expired) refreshes it
//! synchronously once; an optional background task keeps the cache warm so
//! that request-path refreshes are rare.
//!
//! # Security
//!
//! - The signing key is chosen by `kid` from the issuer's own key set only
//! - The token's `alg` must match the key's declared `alg`, if any
//! - A key that fails to verify is a bad signature, never a lookup miss
//!
//! # Graceful Shutdown
//!
//! The refresh task watches a child of the cancellation token passed at
//! construction and exits when either is cancelled. [`RemoteJwksVerifier::shutdown`]
//! cancels it and waits for it to finish.

use crate::authenticator::Verifier;
use crate::cache::{keys_with_kid, KeyCache};
use crate::claims::Claims;
use crate::config::ConfigError;
use crate::errors::AuthError;
use crate::token::UnverifiedToken;
use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::jwk::KeyAlgorithm;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Timeout applied by [`default_http_client`].
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client suitable for JWKS fetching.
pub fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(target: "jwtauth.remote", error = %e, "Failed to build HTTP client with custom config, using defaults");
            reqwest::Client::new()
        })
}

/// Failures while fetching a key set.
#[derive(Debug, Error)]
pub enum JwksError {
    #[error("unable to refresh jwks: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unable to refresh jwks: endpoint returned status {0}")]
    Status(u16),

    #[error("unable to refresh jwks: {0}")]
    Document(String),
}

/// Fetches one issuer's key set into its cache.
#[derive(Clone)]
struct JwksFetcher {
    issuer: Arc<str>,
    url: reqwest::Url,
    client: reqwest::Client,
    cache: Arc<KeyCache>,
}

impl JwksFetcher {
    /// Fetch the key set, store it and hand back what was fetched.
    #[instrument(skip_all, fields(issuer = %self.issuer))]
    async fn refresh(&self) -> Result<JwkSet, JwksError> {
        tracing::debug!(target: "jwtauth.remote", url = %self.url, "Fetching JWKS");

        let response = self.client.get(self.url.clone()).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(JwksError::Status(status.as_u16()));
        }

        let body: Value = response.json().await?;
        let keys = parse_key_set(&self.issuer, body)?;
        let key_count = keys.keys.len();
        self.cache.put(keys.clone()).await;

        tracing::info!(
            target: "jwtauth.remote",
            issuer = %self.issuer,
            key_count,
            "JWKS cache refreshed"
        );
        Ok(keys)
    }
}

/// Parse a JWKS document, skipping keys this crate cannot use.
fn parse_key_set(issuer: &str, body: Value) -> Result<JwkSet, JwksError> {
    let Value::Object(mut document) = body else {
        return Err(JwksError::Document("response is not a JSON object".to_string()));
    };
    let Some(Value::Array(entries)) = document.remove("keys") else {
        return Err(JwksError::Document("response has no keys array".to_string()));
    };

    let keys = entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Jwk>(entry) {
            Ok(jwk) => Some(jwk),
            Err(e) => {
                tracing::warn!(target: "jwtauth.remote", issuer = %issuer, error = %e, "Skipping unsupported JWK");
                None
            }
        })
        .collect();
    Ok(JwkSet { keys })
}

/// [`Verifier`] for one issuer, backed by its JWKS endpoint.
pub struct RemoteJwksVerifier {
    fetcher: JwksFetcher,
    cancel: CancellationToken,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteJwksVerifier {
    /// Create a verifier and fetch the key set once.
    ///
    /// A failed initial fetch is logged and tolerated; the first
    /// verification retries it. When `cache_refresh` is non-zero a
    /// background task refreshes the cache at that interval until `cancel`
    /// is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidJwksUrl` if `jwks_url` does not parse and
    /// `ConfigError::ZeroCacheTtl` if `cache_ttl` is zero.
    pub async fn new(
        issuer: &str,
        jwks_url: &str,
        client: reqwest::Client,
        cache_ttl: Duration,
        cache_refresh: Duration,
        cancel: CancellationToken,
    ) -> Result<Self, ConfigError> {
        let url = reqwest::Url::parse(jwks_url).map_err(|e| ConfigError::InvalidJwksUrl {
            issuer: issuer.to_string(),
            reason: e.to_string(),
        })?;
        if cache_ttl.is_zero() {
            return Err(ConfigError::ZeroCacheTtl(issuer.to_string()));
        }

        let fetcher = JwksFetcher {
            issuer: Arc::from(issuer),
            url,
            client,
            cache: Arc::new(KeyCache::new(cache_ttl)),
        };

        if let Err(e) = fetcher.refresh().await {
            tracing::warn!(
                target: "jwtauth.remote",
                issuer = %issuer,
                error = %e,
                "Initial JWKS fetch failed, will retry on first verification"
            );
        }

        let cancel = cancel.child_token();
        let refresh_task = (!cache_refresh.is_zero())
            .then(|| tokio::spawn(run_refresh(fetcher.clone(), cache_refresh, cancel.clone())));

        Ok(Self {
            fetcher,
            cancel,
            refresh_task: Mutex::new(refresh_task),
        })
    }

    /// Whether the background refresh task is still running.
    pub fn is_refreshing(&self) -> bool {
        self.refresh_task
            .lock()
            .map(|task| task.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    /// Stop the background refresh task and wait for it to exit.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.refresh_task.lock().ok().and_then(|mut task| task.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(target: "jwtauth.remote", error = %e, "JWKS refresh task ended abnormally");
            }
        }
    }
}

impl Drop for RemoteJwksVerifier {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl Verifier for RemoteJwksVerifier {
    #[instrument(skip_all, fields(issuer = %self.fetcher.issuer))]
    async fn verify(&self, token: &UnverifiedToken<'_>) -> Result<Claims, AuthError> {
        let Some(kid) = token.kid() else {
            tracing::debug!(target: "jwtauth.remote", "Token has no kid");
            return Err(AuthError::untrusted_source("token header has no kid"));
        };

        let keys = match self.fetcher.cache.get(kid).await {
            Some(keys) => keys,
            None => {
                let fresh = self.fetcher.refresh().await.map_err(|e| {
                    tracing::error!(target: "jwtauth.remote", error = %e, "JWKS refresh failed");
                    AuthError::unknown(e)
                })?;
                keys_with_kid(&fresh, kid)
            }
        };

        let Some(jwk) = keys.first() else {
            tracing::debug!(target: "jwtauth.remote", kid = %kid, "No matching key id");
            return Err(AuthError::untrusted_source(format!(
                "no matching key id: {kid}"
            )));
        };

        verify_signature(token, jwk)
    }
}

/// Signature algorithm named by a JWK `alg`. Encryption algorithms have none.
fn signing_algorithm(key_alg: &KeyAlgorithm) -> Option<Algorithm> {
    match key_alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

/// Verify the token signature with `jwk` and decode its claims.
///
/// Time claims are checked by the authenticator, so only the signature and
/// algorithm are validated here.
fn verify_signature(token: &UnverifiedToken<'_>, jwk: &Jwk) -> Result<Claims, AuthError> {
    let alg = token.header().alg;
    if let Some(key_alg) = &jwk.common.key_algorithm {
        if signing_algorithm(key_alg) != Some(alg) {
            tracing::debug!(target: "jwtauth.remote", key_alg = ?key_alg, alg = ?alg, "Token algorithm does not match key");
            return Err(AuthError::bad_signature(format!(
                "token algorithm {alg:?} does not match key algorithm {key_alg:?}"
            )));
        }
    }

    let key = DecodingKey::from_jwk(jwk).map_err(|e| {
        tracing::debug!(target: "jwtauth.remote", error = %e, "Unusable JWK");
        AuthError::bad_signature(e)
    })?;

    let mut validation = Validation::new(alg);
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let data = decode::<Claims>(token.raw(), &key, &validation).map_err(|e| {
        tracing::debug!(target: "jwtauth.remote", error = %e, "Token verification failed");
        AuthError::bad_signature(e)
    })?;
    Ok(data.claims)
}

#[instrument(skip_all, name = "jwtauth.remote.refresh_task", fields(issuer = %fetcher.issuer))]
async fn run_refresh(fetcher: JwksFetcher, every: Duration, cancel: CancellationToken) {
    tracing::info!(
        target: "jwtauth.remote",
        refresh_interval_ms = u64::try_from(every.as_millis()).unwrap_or(u64::MAX),
        "Starting JWKS refresh task"
    );

    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = fetcher.refresh().await {
                    tracing::warn!(target: "jwtauth.remote", error = %e, "Background JWKS refresh failed");
                }
            }
            () = cancel.cancelled() => {
                tracing::info!(target: "jwtauth.remote", "JWKS refresh task received shutdown signal, exiting");
                break;
            }
        }
    }
}
