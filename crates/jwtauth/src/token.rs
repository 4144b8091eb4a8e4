//! Compact JWS parsing without verification.
//!
//! The authenticator needs the issuer and time claims before it knows which
//! key to trust, so tokens are decoded in two passes: this module reads the
//! header and payload as-is, and the verifier checks the signature later.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any decoding
//! - Only the compact serialization (one signature) is accepted
//! - Nothing read here is trusted until a verifier has checked the signature

use crate::claims::Claims;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::Header;
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum allowed JWT size in bytes (8KB).
///
/// Larger tokens are rejected before base64 decoding or any cryptographic
/// work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Reasons a token could not be decoded.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is {size} bytes, exceeds maximum of {MAX_JWT_SIZE_BYTES}")]
    TooLarge { size: usize },

    #[error("JSON serialized tokens are not supported")]
    JsonSerialization,

    #[error("token must have exactly 3 dot-separated segments, found {0}")]
    SegmentCount(usize),

    #[error("invalid token header: {0}")]
    Header(#[source] jsonwebtoken::errors::Error),

    #[error("invalid token payload: {0}")]
    Payload(String),

    #[error("claim `{0}` must be a number")]
    NonNumericClaim(&'static str),
}

/// A compact token whose header and payload have been decoded but whose
/// signature has not been checked.
#[derive(Debug, Clone)]
pub struct UnverifiedToken<'a> {
    raw: &'a str,
    header: Header,
    claims: Claims,
}

impl<'a> UnverifiedToken<'a> {
    /// Decode a compact token.
    ///
    /// # Errors
    ///
    /// Returns `TokenError` if the token is too large, is not a compact
    /// serialization, or has an undecodable header or payload.
    pub fn parse(raw: &'a str) -> Result<Self, TokenError> {
        if raw.len() > MAX_JWT_SIZE_BYTES {
            return Err(TokenError::TooLarge { size: raw.len() });
        }
        if raw.trim_start().starts_with('{') {
            return Err(TokenError::JsonSerialization);
        }

        let segments: Vec<&str> = raw.split('.').collect();
        let [_, payload, _] = segments.as_slice() else {
            return Err(TokenError::SegmentCount(segments.len()));
        };

        let header = jsonwebtoken::decode_header(raw).map_err(TokenError::Header)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| TokenError::Payload(e.to_string()))?;
        let claims = match serde_json::from_slice::<Value>(&payload) {
            Ok(Value::Object(map)) => Claims::new(map),
            Ok(_) => return Err(TokenError::Payload("payload is not a JSON object".to_string())),
            Err(e) => return Err(TokenError::Payload(e.to_string())),
        };

        Ok(Self {
            raw,
            header,
            claims,
        })
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Key id from the header, if any.
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Claims as sent. Do not make trust decisions on these.
    pub fn unverified_claims(&self) -> &Claims {
        &self.claims
    }

    /// Read `exp`, `nbf` and `iat`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::NonNumericClaim` when one is present but not a
    /// number.
    pub fn time_claims(&self) -> Result<TimeClaims, TokenError> {
        let map = self.claims.as_map();
        Ok(TimeClaims {
            exp: numeric_claim(map, "exp")?,
            nbf: numeric_claim(map, "nbf")?,
            iat: numeric_claim(map, "iat")?,
        })
    }
}

/// Registered time claims, in Unix epoch seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeClaims {
    pub exp: Option<i64>,
    pub nbf: Option<i64>,
    pub iat: Option<i64>,
}

fn numeric_claim(map: &Map<String, Value>, name: &'static str) -> Result<Option<i64>, TokenError> {
    match map.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.floor() as i64))
            .map(Some)
            .ok_or(TokenError::NonNumericClaim(name)),
        Some(_) => Err(TokenError::NonNumericClaim(name)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(value: &Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    fn token(header: Value, payload: Value) -> String {
        format!("{}.{}.c2ln", encode(&header), encode(&payload))
    }

    #[test]
    fn test_parse_reads_header_and_claims() {
        let raw = token(
            json!({"alg": "EdDSA", "typ": "JWT", "kid": "key-01"}),
            json!({"iss": "ac", "exp": 2000, "iat": 1000, "scope": "read"}),
        );

        let parsed = UnverifiedToken::parse(&raw).unwrap();
        assert_eq!(parsed.kid(), Some("key-01"));
        assert_eq!(parsed.header().alg, jsonwebtoken::Algorithm::EdDSA);
        assert_eq!(parsed.unverified_claims().issuer(), Some("ac"));
        assert_eq!(
            parsed.time_claims().unwrap(),
            TimeClaims {
                exp: Some(2000),
                nbf: None,
                iat: Some(1000),
            }
        );
        assert_eq!(parsed.raw(), raw);
    }

    #[test]
    fn test_missing_kid_is_not_a_parse_error() {
        let raw = token(json!({"alg": "EdDSA"}), json!({}));
        assert_eq!(UnverifiedToken::parse(&raw).unwrap().kid(), None);
    }

    #[test]
    fn test_oversized_token_rejected_before_decoding() {
        let raw = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert!(matches!(
            UnverifiedToken::parse(&raw),
            Err(TokenError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_wrong_segment_count() {
        for raw in ["", "single", "only.two", "not.a.valid.jwt.format"] {
            assert!(
                matches!(UnverifiedToken::parse(raw), Err(TokenError::SegmentCount(_))),
                "{raw:?}"
            );
        }
    }

    #[test]
    fn test_json_serialization_rejected() {
        let raw = r#"{"payload":"e30","signatures":[{"protected":"e30","signature":"c2ln"}]}"#;
        assert!(matches!(
            UnverifiedToken::parse(raw),
            Err(TokenError::JsonSerialization)
        ));
    }

    #[test]
    fn test_invalid_header() {
        let raw = format!("!!!invalid!!!.{}.c2ln", encode(&json!({})));
        assert!(matches!(
            UnverifiedToken::parse(&raw),
            Err(TokenError::Header(_))
        ));

        let raw = token(json!({"typ": "JWT"}), json!({}));
        assert!(matches!(
            UnverifiedToken::parse(&raw),
            Err(TokenError::Header(_))
        ));
    }

    #[test]
    fn test_payload_must_be_object() {
        let raw = token(json!({"alg": "EdDSA"}), json!(["not", "an", "object"]));
        assert!(matches!(
            UnverifiedToken::parse(&raw),
            Err(TokenError::Payload(_))
        ));

        let header = encode(&json!({"alg": "EdDSA"}));
        let raw = format!("{header}.{}.c2ln", URL_SAFE_NO_PAD.encode(b"not json"));
        assert!(matches!(
            UnverifiedToken::parse(&raw),
            Err(TokenError::Payload(_))
        ));
    }

    #[test]
    fn test_non_numeric_time_claim() {
        let raw = token(json!({"alg": "EdDSA"}), json!({"exp": "tomorrow"}));
        let parsed = UnverifiedToken::parse(&raw).unwrap();
        assert!(matches!(
            parsed.time_claims(),
            Err(TokenError::NonNumericClaim("exp"))
        ));
    }

    #[test]
    fn test_fractional_time_claims_are_floored() {
        let raw = token(json!({"alg": "EdDSA"}), json!({"exp": 1500.9}));
        let parsed = UnverifiedToken::parse(&raw).unwrap();
        assert_eq!(parsed.time_claims().unwrap().exp, Some(1500));
    }

    #[test]
    fn test_max_jwt_size_constant() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }
}
