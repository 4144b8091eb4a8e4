//! Test token issuer with a mock JWKS endpoint.
//!
//! A [`TestIssuer`] signs tokens the way a real identity provider would and
//! publishes its public key through a wiremock server, so verifiers under
//! test fetch keys over real HTTP.

use crate::crypto_fixtures::TestKeypair;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the issuer's JWKS is mounted at by default.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Signs tokens for one issuer name with one Ed25519 key.
#[derive(Debug, Clone)]
pub struct TestIssuer {
    pub name: String,
    pub keypair: TestKeypair,
}

impl TestIssuer {
    pub fn new(name: &str, seed: u8, kid: &str) -> Self {
        Self {
            name: name.to_string(),
            keypair: TestKeypair::new(seed, kid),
        }
    }

    /// Same issuer name and `kid`, different private key. Tokens it signs
    /// look trusted but must fail signature verification.
    pub fn impostor(&self, seed: u8) -> Self {
        Self::new(&self.name, seed, &self.keypair.kid)
    }

    pub fn kid(&self) -> &str {
        &self.keypair.kid
    }

    /// Sign `claims`, setting `iss` to this issuer when it is absent or empty.
    pub fn issue(&self, mut claims: Value) -> String {
        if let Value::Object(map) = &mut claims {
            let missing = map
                .get("iss")
                .and_then(Value::as_str)
                .map_or(true, str::is_empty);
            if missing {
                map.insert("iss".to_string(), Value::from(self.name.as_str()));
            }
        }
        self.keypair.sign(&claims)
    }

    pub fn jwk_json(&self) -> Value {
        self.keypair.jwk_json()
    }

    pub fn jwks_json(&self) -> Value {
        json!({ "keys": [self.jwk_json()] })
    }

    /// Serve this issuer's JWKS at [`JWKS_PATH`] and return its URL.
    pub async fn mount_jwks(&self, server: &MockServer) -> String {
        mount_jwks_body(server, self.jwks_json(), None).await
    }

    /// Like [`TestIssuer::mount_jwks`], asserting the endpoint is hit
    /// exactly `times` times when `server` is dropped.
    pub async fn mount_jwks_expect(&self, server: &MockServer, times: u64) -> String {
        mount_jwks_body(server, self.jwks_json(), Some(times)).await
    }
}

/// Serve an arbitrary body at [`JWKS_PATH`] and return its URL.
pub async fn mount_jwks_body(server: &MockServer, body: Value, times: Option<u64>) -> String {
    let mock = Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    let mock = match times {
        Some(n) => mock.expect(n),
        None => mock,
    };
    mock.mount(server).await;
    jwks_url(server)
}

/// Serve `status` with an empty body at [`JWKS_PATH`] and return its URL.
pub async fn mount_jwks_status(server: &MockServer, status: u16) -> String {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
    jwks_url(server)
}

pub fn jwks_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), JWKS_PATH)
}
