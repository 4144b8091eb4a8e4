//! Trusted issuer configuration.
//!
//! Configuration is plain serde data; loading it from files or the
//! environment is left to the embedding service. [`auth_from_config`] turns
//! it into a ready [`StdAuthenticator`], rejecting bad input before any
//! request is served.
//!
//! ```json
//! {"issuers": [{"name": "ac", "jwksUrl": "https://ac/.well-known/jwks.json",
//!               "cacheTTL": "1m", "cacheRefresh": "30s"}]}
//! ```

use crate::authenticator::{StdAuthenticator, Verifier};
use crate::remote::RemoteJwksVerifier;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Configuration errors. Raised at startup only.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("issuer name must not be empty")]
    EmptyIssuerName,

    #[error("duplicate issuer name: {0}")]
    DuplicateIssuer(String),

    #[error("issuer {0} has no jwksUrl")]
    MissingJwksUrl(String),

    #[error("issuer {issuer} has an invalid jwksUrl: {reason}")]
    InvalidJwksUrl { issuer: String, reason: String },

    #[error("issuer {0} must have a non-zero cache ttl")]
    ZeroCacheTtl(String),
}

/// All trusted issuers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub issuers: Vec<IssuerConfig>,
}

/// One trusted issuer and where to fetch its keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerConfig {
    /// Exact value of the `iss` claim.
    pub name: String,

    #[serde(default)]
    pub jwks_url: String,

    /// How long a fetched key set is trusted.
    #[serde(
        rename = "cacheTTL",
        default = "default_cache_ttl",
        with = "humantime_duration"
    )]
    pub cache_ttl: Duration,

    /// Background refresh interval; zero disables the refresh task.
    #[serde(default, with = "humantime_duration")]
    pub cache_refresh: Duration,
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

mod humantime_duration {
    use super::{Deserialize, Deserializer, Duration, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

impl Config {
    /// Check issuer names and URLs.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found, in issuer order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for issuer in &self.issuers {
            if issuer.name.is_empty() {
                return Err(ConfigError::EmptyIssuerName);
            }
            if !seen.insert(issuer.name.as_str()) {
                return Err(ConfigError::DuplicateIssuer(issuer.name.clone()));
            }
            if issuer.jwks_url.is_empty() {
                return Err(ConfigError::MissingJwksUrl(issuer.name.clone()));
            }
        }
        Ok(())
    }
}

/// Build an authenticator with one remote verifier per configured issuer.
///
/// `client_for` supplies the HTTP client used for each issuer's JWKS
/// endpoint. Background refresh tasks stop when `cancel` is cancelled.
///
/// # Errors
///
/// Returns `ConfigError` for empty or duplicate names, missing or invalid
/// URLs, and zero TTLs.
pub async fn auth_from_config<F>(
    config: &Config,
    client_for: F,
    cancel: CancellationToken,
) -> Result<StdAuthenticator, ConfigError>
where
    F: Fn(&str) -> reqwest::Client,
{
    config.validate()?;

    let mut verifiers: HashMap<String, Arc<dyn Verifier>> = HashMap::new();
    for issuer in &config.issuers {
        let verifier = RemoteJwksVerifier::new(
            &issuer.name,
            &issuer.jwks_url,
            client_for(&issuer.name),
            issuer.cache_ttl,
            issuer.cache_refresh,
            cancel.clone(),
        )
        .await?;
        verifiers.insert(issuer.name.clone(), Arc::new(verifier));
    }

    tracing::info!(
        target: "jwtauth.config",
        issuer_count = verifiers.len(),
        "Authenticator configured"
    );
    Ok(StdAuthenticator::new(verifiers))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issuer(name: &str, url: &str) -> IssuerConfig {
        IssuerConfig {
            name: name.to_string(),
            jwks_url: url.to_string(),
            cache_ttl: Duration::from_secs(60),
            cache_refresh: Duration::ZERO,
        }
    }

    #[test]
    fn test_deserialize_camel_case_with_durations() {
        let config: Config = serde_json::from_value(json!({
            "issuers": [
                {"name": "ac", "jwksUrl": "http://ac/jwks", "cacheTTL": "1m", "cacheRefresh": "30s"},
                {"name": "idp", "jwksUrl": "http://idp/jwks"}
            ]
        }))
        .unwrap();

        let ac = &config.issuers[0];
        assert_eq!(ac.cache_ttl, Duration::from_secs(60));
        assert_eq!(ac.cache_refresh, Duration::from_secs(30));

        let idp = &config.issuers[1];
        assert_eq!(idp.cache_ttl, DEFAULT_CACHE_TTL);
        assert_eq!(idp.cache_refresh, Duration::ZERO);
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let result: Result<Config, _> = serde_json::from_value(json!({
            "issuers": [{"name": "ac", "jwksUrl": "http://ac", "cacheTTL": "soon"}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_round_trips() {
        let config = Config {
            issuers: vec![issuer("ac", "http://ac/jwks")],
        };
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["issuers"][0]["cacheTTL"], json!("1m"));
        assert_eq!(value["issuers"][0]["jwksUrl"], json!("http://ac/jwks"));
        assert_eq!(serde_json::from_value::<Config>(value).unwrap(), config);
    }

    #[test]
    fn test_validate() {
        let ok = Config {
            issuers: vec![issuer("a", "http://a"), issuer("b", "http://b")],
        };
        assert!(ok.validate().is_ok());

        let empty_name = Config {
            issuers: vec![issuer("", "http://a")],
        };
        assert!(matches!(empty_name.validate(), Err(ConfigError::EmptyIssuerName)));

        let duplicate = Config {
            issuers: vec![issuer("a", "http://a"), issuer("a", "http://b")],
        };
        assert!(matches!(
            duplicate.validate(),
            Err(ConfigError::DuplicateIssuer(name)) if name == "a"
        ));

        let missing_url = Config {
            issuers: vec![issuer("a", "")],
        };
        assert!(matches!(
            missing_url.validate(),
            Err(ConfigError::MissingJwksUrl(name)) if name == "a"
        ));
    }

    #[tokio::test]
    async fn test_auth_from_config_rejects_zero_ttl() {
        let mut bad = issuer("a", "http://127.0.0.1:9/jwks");
        bad.cache_ttl = Duration::ZERO;
        let config = Config { issuers: vec![bad] };

        let result =
            auth_from_config(&config, |_| reqwest::Client::new(), CancellationToken::new()).await;
        assert!(matches!(result, Err(ConfigError::ZeroCacheTtl(_))));
    }

    #[tokio::test]
    async fn test_auth_from_config_rejects_invalid_url() {
        let config = Config {
            issuers: vec![issuer("a", "not a url")],
        };
        let result =
            auth_from_config(&config, |_| reqwest::Client::new(), CancellationToken::new()).await;
        assert!(matches!(result, Err(ConfigError::InvalidJwksUrl { .. })));
    }

    #[tokio::test]
    async fn test_empty_config_builds_empty_authenticator() {
        let auth = auth_from_config(
            &Config::default(),
            |_| reqwest::Client::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(auth.issuers().count(), 0);
    }
}
