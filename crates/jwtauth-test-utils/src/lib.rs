//! Test utilities for token authentication.
//!
//! - [`crypto_fixtures`]: deterministic Ed25519 keypairs that sign tokens
//! - [`issuer`]: a test issuer that publishes its JWKS through wiremock
//! - [`token_builders`]: fluent claim construction
//! - [`init_test_tracing`]: log output for failing tests (`RUST_LOG=debug`)

pub mod crypto_fixtures;
pub mod issuer;
pub mod token_builders;

pub use crypto_fixtures::TestKeypair;
pub use issuer::{jwks_url, mount_jwks_body, mount_jwks_status, TestIssuer, JWKS_PATH};
pub use token_builders::TestClaimsBuilder;

/// Install a test subscriber honoring `RUST_LOG`. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}
