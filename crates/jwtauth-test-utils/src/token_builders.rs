//! Builder patterns for test token claims.

use chrono::{Duration, Utc};
use serde_json::{Map, Value};

/// Builder for test JWT claims.
///
/// # Example
/// ```rust,ignore
/// let claims = TestClaimsBuilder::new()
///     .for_subject("alice")
///     .with_scope("meeting:create meeting:read")
///     .expires_in(3600)
///     .build();
/// let token = issuer.issue(claims);
/// ```
#[derive(Debug, Clone)]
pub struct TestClaimsBuilder {
    claims: Map<String, Value>,
}

impl Default for TestClaimsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClaimsBuilder {
    /// Defaults: subject `test-subject`, issued now, expires in one hour, no scope.
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), Value::from("test-subject"));
        claims.insert("iat".to_string(), Value::from(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            Value::from((now + Duration::seconds(3600)).timestamp()),
        );
        Self { claims }
    }

    pub fn for_subject(self, subject: &str) -> Self {
        self.with_claim("sub", subject)
    }

    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", issuer)
    }

    /// Space-separated scope string.
    pub fn with_scope(self, scope: &str) -> Self {
        self.with_claim("scope", scope)
    }

    /// Set expiration in seconds from now.
    pub fn expires_in(self, seconds: i64) -> Self {
        self.with_claim("exp", (Utc::now() + Duration::seconds(seconds)).timestamp())
    }

    /// Expired one minute ago.
    pub fn expired(self) -> Self {
        self.expires_in(-60)
    }

    /// Not valid until `seconds` from now.
    pub fn not_before_in(self, seconds: i64) -> Self {
        self.with_claim("nbf", (Utc::now() + Duration::seconds(seconds)).timestamp())
    }

    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", timestamp)
    }

    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    pub fn with_claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(name.to_string(), value.into());
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}
