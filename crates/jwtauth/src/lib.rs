//! Bearer token authentication against remotely published key sets.
//!
//! A [`StdAuthenticator`] holds one [`Verifier`] per trusted issuer. For the
//! common case each verifier is a [`RemoteJwksVerifier`] that fetches the
//! issuer's JWKS, caches it in a [`KeyCache`] and checks token signatures
//! against it. [`auth_from_config`] builds the whole thing from a
//! serde-deserializable [`Config`].
//!
//! All request-path failures are [`AuthError`]s carrying an
//! [`AuthErrorCode`] that maps onto HTTP and gRPC status codes.

pub mod authenticator;
pub mod authorise;
pub mod cache;
pub mod claims;
pub mod config;
pub mod errors;
pub mod remote;
pub mod token;

#[cfg(any(test, feature = "test-utils"))]
pub use authenticator::InsecureAuthenticator;
pub use authenticator::{Authenticator, StdAuthenticator, Verifier};
pub use authorise::Authoriser;
pub use cache::KeyCache;
pub use claims::Claims;
pub use config::{auth_from_config, Config, ConfigError, IssuerConfig};
pub use errors::{AuthError, AuthErrorCode, BoxError};
pub use remote::{default_http_client, JwksError, RemoteJwksVerifier};
pub use token::{UnverifiedToken, MAX_JWT_SIZE_BYTES};
