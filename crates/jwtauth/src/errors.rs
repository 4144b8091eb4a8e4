//! Authentication error types.
//!
//! Every failure on the request path is an [`AuthError`]: a closed code that
//! callers branch on, plus the underlying cause for logs. The cause is never
//! meant for clients; transport layers render the code only.

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed cause carried by an [`AuthError`].
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Closed set of authentication / authorization outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AuthErrorCode {
    /// Internal failure, e.g. the key set could not be fetched.
    Unknown = 0,
    /// The token is malformed, expired or not yet valid.
    InvalidToken = 1,
    /// The issuer or key id is not trusted.
    UntrustedSource = 2,
    /// The signature does not verify against the trusted key.
    BadSignature = 3,
    /// Authenticated, but the rule denied access.
    InsufficientPermissions = 4,
}

impl AuthErrorCode {
    /// HTTP status code for this outcome.
    pub fn status_code(self) -> u16 {
        match self {
            AuthErrorCode::Unknown => 500,
            AuthErrorCode::InvalidToken => 401,
            AuthErrorCode::UntrustedSource
            | AuthErrorCode::BadSignature
            | AuthErrorCode::InsufficientPermissions => 403,
        }
    }

    /// Stable numeric value of the code.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthErrorCode::Unknown => "UNKNOWN",
            AuthErrorCode::InvalidToken => "INVALID_TOKEN",
            AuthErrorCode::UntrustedSource => "UNTRUSTED_SOURCE",
            AuthErrorCode::BadSignature => "BAD_SIGNATURE",
            AuthErrorCode::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication error: a code plus the cause that produced it.
#[derive(Debug, Error)]
#[error("jwtauth err {}: {cause}", .code.as_u8())]
pub struct AuthError {
    code: AuthErrorCode,
    #[source]
    cause: BoxError,
}

impl AuthError {
    pub fn new(code: AuthErrorCode, cause: impl Into<BoxError>) -> Self {
        Self {
            code,
            cause: cause.into(),
        }
    }

    pub fn unknown(cause: impl Into<BoxError>) -> Self {
        Self::new(AuthErrorCode::Unknown, cause)
    }

    pub fn invalid_token(cause: impl Into<BoxError>) -> Self {
        Self::new(AuthErrorCode::InvalidToken, cause)
    }

    pub fn untrusted_source(cause: impl Into<BoxError>) -> Self {
        Self::new(AuthErrorCode::UntrustedSource, cause)
    }

    pub fn bad_signature(cause: impl Into<BoxError>) -> Self {
        Self::new(AuthErrorCode::BadSignature, cause)
    }

    pub fn insufficient_permissions(cause: impl Into<BoxError>) -> Self {
        Self::new(AuthErrorCode::InsufficientPermissions, cause)
    }

    pub fn code(&self) -> AuthErrorCode {
        self.code
    }

    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.cause.as_ref()
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }
}
