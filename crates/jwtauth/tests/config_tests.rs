//! Building an authenticator from issuer configuration.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use jwtauth::{auth_from_config, AuthErrorCode, Authenticator, Config, ConfigError};
use jwtauth_test_utils::{TestClaimsBuilder, TestIssuer};
use serde_json::json;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

#[tokio::test]
async fn test_auth_from_config_trusts_each_issuer() -> Result<()> {
    let ac_server = MockServer::start().await;
    let idp_server = MockServer::start().await;
    let ac = TestIssuer::new("ac", 1, "ac-key");
    let idp = TestIssuer::new("idp", 2, "idp-key");
    let ac_url = ac.mount_jwks(&ac_server).await;
    let idp_url = idp.mount_jwks(&idp_server).await;

    let config: Config = serde_json::from_value(json!({
        "issuers": [
            {"name": "ac", "jwksUrl": ac_url, "cacheTTL": "1m"},
            {"name": "idp", "jwksUrl": idp_url, "cacheTTL": "5m", "cacheRefresh": "1m"}
        ]
    }))?;

    let requested = Mutex::new(Vec::new());
    let cancel = CancellationToken::new();
    let auth = auth_from_config(
        &config,
        |name| {
            requested.lock().unwrap().push(name.to_string());
            jwtauth::default_http_client()
        },
        cancel.clone(),
    )
    .await?;
    assert_eq!(*requested.lock().unwrap(), vec!["ac", "idp"]);

    let claims = auth
        .authenticate(&ac.issue(TestClaimsBuilder::new().with_scope("a").build()))
        .await?;
    assert!(claims.has_scope("a"));

    let claims = auth
        .authenticate(&idp.issue(TestClaimsBuilder::new().with_scope("b").build()))
        .await?;
    assert!(claims.has_scope("b"));

    // An issuer's key does not vouch for another issuer's tokens.
    let cross = ac.issue(TestClaimsBuilder::new().with_issuer("idp").build());
    let err = auth.authenticate(&cross).await.unwrap_err();
    assert_eq!(err.code(), AuthErrorCode::UntrustedSource);

    cancel.cancel();
    Ok(())
}

#[tokio::test]
async fn test_config_errors_raised_before_any_fetch() {
    let server = MockServer::start().await;
    let url = format!("{}/jwks", server.uri());

    let cases = [
        (json!([{"name": "", "jwksUrl": url}]), "empty"),
        (
            json!([{"name": "a", "jwksUrl": url}, {"name": "a", "jwksUrl": url}]),
            "duplicate",
        ),
        (json!([{"name": "a"}]), "missing url"),
    ];

    for (issuers, label) in cases {
        let config: Config = serde_json::from_value(json!({ "issuers": issuers })).unwrap();
        let result = auth_from_config(
            &config,
            |_| jwtauth::default_http_client(),
            CancellationToken::new(),
        )
        .await;
        let err = result.unwrap_err();
        match label {
            "empty" => assert!(matches!(err, ConfigError::EmptyIssuerName)),
            "duplicate" => assert!(matches!(err, ConfigError::DuplicateIssuer(_))),
            _ => assert!(matches!(err, ConfigError::MissingJwksUrl(_))),
        }
    }

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}
