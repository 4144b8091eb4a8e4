//! Authorization decision point for HTTP and gRPC services.
//!
//! A [`Rule`] is either a compiled claims expression paired with an
//! [`Authenticator`](jwtauth::Authenticator), or an explicit
//! [`Rule::InsecureAlwaysGrant`]. The axum middleware ([`require_auth`],
//! [`allow_anonymous`] and the shorthand [`require_rule`]) and the gRPC helper
//! [`authorize_request`] apply it to incoming requests and attach the
//! authorized [`Claims`](jwtauth::Claims) to request extensions. [`HttpAuth`]
//! adds the header list, chained authorisers and the rejection handler.
//!
//! # Security
//!
//! - Rules are compiled once at startup; a rule that fails to compile is a
//!   startup error, not a runtime deny.
//! - Clients receive the error code and a generic message. Causes are only
//!   logged.
//! - Evaluation failures surface as internal errors rather than denials.

pub mod bearer;
pub mod grpc;
pub mod http;
pub mod rule;

pub use bearer::{from_header_list, from_headers, from_metadata, parse_bearer};
pub use grpc::{authorize_request, grpc_code, status_for};
pub use http::{
    allow_anonymous, default_unauth_handler, hidden_endpoint, require_auth, require_rule,
    AuthRejection, ClaimsExt, HttpAuth, HttpAuthConfig, UnauthHandler,
};
pub use rule::{authorize, JwtClaimsRule, Rule};
