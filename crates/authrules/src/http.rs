//! Authorization middleware for axum routes.
//!
//! [`HttpAuth`] extracts the bearer token, runs the route's [`Rule`] plus any
//! chained [`Authoriser`]s and stores the resulting claims in request
//! extensions for handlers. Two middleware functions apply it:
//!
//! - [`require_auth`]: every request must pass.
//! - [`allow_anonymous`]: requests without a bearer token pass through
//!   untouched; requests with one are checked like [`require_auth`].
//!
//! Claims already present in the extensions (from an earlier layer) are
//! reused instead of authenticating the token again, so an outer
//! [`allow_anonymous`] layer and per-route [`require_auth`] layers compose.
//!
//! # Security
//!
//! - Reused claims are still checked against the rule and every authoriser
//! - Refusals go through the configured [`UnauthHandler`]; the default one
//!   exposes only the error code and a generic message

use crate::bearer;
use crate::rule::Rule;
use axum::{
    extract::{Request, State},
    http::{
        header::{InvalidHeaderName, AUTHORIZATION},
        HeaderMap, HeaderName, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jwtauth::{AuthError, AuthErrorCode, Authoriser, Claims};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// An authorization failure rendered as an HTTP response.
///
/// Clients see the code and a generic message only; the cause is logged.
#[derive(Debug)]
pub struct AuthRejection(pub AuthError);

impl From<AuthError> for AuthRejection {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: &'static str,
}

fn client_message(code: AuthErrorCode) -> &'static str {
    match code {
        AuthErrorCode::Unknown => "An internal error occurred",
        AuthErrorCode::InvalidToken => "The access token is invalid or expired",
        AuthErrorCode::UntrustedSource | AuthErrorCode::BadSignature => {
            "The access token is not trusted"
        }
        AuthErrorCode::InsufficientPermissions => "Insufficient permissions",
    }
}

fn log_rejection(err: &AuthError) {
    if err.code() == AuthErrorCode::Unknown {
        tracing::error!(target: "authrules.http", error = %err, "Authorization failed");
    } else {
        tracing::debug!(target: "authrules.http", error = %err, "Request rejected");
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        log_rejection(&self.0);

        let code = self.0.code();
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.as_str(),
                message: client_message(code),
            },
        };

        let mut response = (status, Json(body)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

/// Renders a refused request.
pub type UnauthHandler = Arc<dyn Fn(AuthError) -> Response + Send + Sync>;

/// Status from the error code with a JSON error body.
pub fn default_unauth_handler(err: AuthError) -> Response {
    AuthRejection(err).into_response()
}

/// Bare 404 for every refusal, hiding that the route exists.
pub fn hidden_endpoint(err: AuthError) -> Response {
    log_rejection(&err);
    StatusCode::NOT_FOUND.into_response()
}

/// Trusted issuers plus the headers searched for a bearer token.
///
/// ```json
/// {"issuers": [{"name": "ac", "jwksUrl": "https://ac/.well-known/jwks.json"}],
///  "headers": ["X-Forwarded-Authorization", "Authorization"]}
/// ```
///
/// Build the authenticator from `auth` with [`jwtauth::auth_from_config`],
/// then the middleware with [`HttpAuth::from_config`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpAuthConfig {
    #[serde(flatten)]
    pub auth: jwtauth::Config,

    /// Header names tried in order. Empty means `Authorization` only.
    #[serde(default)]
    pub headers: Vec<String>,
}

/// Authentication and authorization settings for a set of routes.
///
/// ```rust,ignore
/// let auth = HttpAuth::new(rule)
///     .with_authorisers([Arc::new(tenant_check) as Arc<dyn Authoriser>])
///     .with_unauth_handler(hidden_endpoint);
/// let app = Router::new()
///     .route("/meetings", get(list_meetings))
///     .layer(middleware::from_fn_with_state(Arc::new(auth), require_auth));
/// ```
#[derive(Clone)]
pub struct HttpAuth {
    rule: Arc<Rule>,
    headers: Vec<HeaderName>,
    authorisers: Vec<Arc<dyn Authoriser>>,
    unauth_handler: UnauthHandler,
}

impl HttpAuth {
    /// Reads `Authorization`, has no extra authorisers and rejects with
    /// [`default_unauth_handler`].
    pub fn new(rule: Rule) -> Self {
        Self::shared(Arc::new(rule))
    }

    pub fn shared(rule: Arc<Rule>) -> Self {
        Self {
            rule,
            headers: vec![AUTHORIZATION],
            authorisers: Vec::new(),
            unauth_handler: Arc::new(default_unauth_handler),
        }
    }

    /// Apply the header list from `config`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeaderName` for a configured name that is not a valid
    /// header name.
    pub fn from_config(config: &HttpAuthConfig, rule: Rule) -> Result<Self, InvalidHeaderName> {
        Self::new(rule).with_headers(&config.headers)
    }

    /// Search `names`, in order, for the bearer token. An empty list keeps
    /// the current headers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHeaderName` if any name is not a valid header name.
    pub fn with_headers<I, S>(mut self, names: I) -> Result<Self, InvalidHeaderName>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|name| HeaderName::from_bytes(name.as_ref().as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        if !names.is_empty() {
            self.headers = names;
        }
        Ok(self)
    }

    /// Append authorisers run, in order, after the rule has passed.
    pub fn with_authorisers<I>(mut self, authorisers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Authoriser>>,
    {
        self.authorisers.extend(authorisers);
        self
    }

    pub fn with_unauth_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(AuthError) -> Response + Send + Sync + 'static,
    {
        self.unauth_handler = Arc::new(handler);
        self
    }

    /// Bearer token from the configured headers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if none of them carries one.
    pub fn bearer<'a>(&self, headers: &'a HeaderMap) -> Result<&'a str, AuthError> {
        bearer::from_header_list(headers, &self.headers)
    }

    #[instrument(skip_all, name = "authrules.middleware")]
    async fn guard(&self, mut req: Request, next: Next, allow_anonymous: bool) -> Response {
        let existing = req.extensions().get::<Claims>().cloned();
        let decision = match existing {
            Some(claims) => {
                tracing::debug!(target: "authrules.http", "Reusing claims from an earlier layer");
                self.rule.authorise(&claims).map(|()| Some(claims))
            }
            None => {
                let bearer = self.bearer(req.headers()).map(str::to_owned);
                if allow_anonymous && bearer.is_err() {
                    tracing::debug!(target: "authrules.http", "No bearer token, continuing anonymously");
                    return next.run(req).await;
                }
                self.rule.check(bearer).await
            }
        };

        let claims = match decision {
            Ok(claims) => claims,
            Err(e) => return (self.unauth_handler)(e),
        };
        if let Some(claims) = claims {
            if let Err(e) = self.authorise(&claims) {
                return (self.unauth_handler)(e);
            }
            req.extensions_mut().insert(claims);
        }
        next.run(req).await
    }
}

/// Runs the chained authorisers in the order they were added.
impl Authoriser for HttpAuth {
    fn authorise(&self, claims: &Claims) -> Result<(), AuthError> {
        self.authorisers
            .iter()
            .try_for_each(|authoriser| authoriser.authorise(claims))
    }
}

impl fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAuth")
            .field("rule", &self.rule)
            .field("headers", &self.headers)
            .field("authorisers", &self.authorisers.len())
            .finish_non_exhaustive()
    }
}

/// Middleware refusing any request that does not pass `auth`.
///
/// # Response
///
/// Refusals are rendered by the configured [`UnauthHandler`]. With the
/// default handler:
///
/// - 401 with `WWW-Authenticate` if the token is missing or invalid
/// - 403 if the token is untrusted or access is denied
/// - 500 if the decision could not be made
///
/// Otherwise the next handler runs with a copy of the claims in extensions.
pub async fn require_auth(
    State(auth): State<Arc<HttpAuth>>,
    req: Request,
    next: Next,
) -> Response {
    auth.guard(req, next, false).await
}

/// Middleware that lets requests without a bearer token through
/// unauthenticated and checks the rest like [`require_auth`].
pub async fn allow_anonymous(
    State(auth): State<Arc<HttpAuth>>,
    req: Request,
    next: Next,
) -> Response {
    auth.guard(req, next, true).await
}

/// [`require_auth`] with the default settings of [`HttpAuth::new`].
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/meetings", get(list_meetings))
///     .layer(middleware::from_fn_with_state(Arc::new(rule), require_rule));
/// ```
pub async fn require_rule(
    State(rule): State<Arc<Rule>>,
    req: Request,
    next: Next,
) -> Response {
    HttpAuth::shared(rule).guard(req, next, false).await
}

/// Extension trait for extracting claims from a request.
pub trait ClaimsExt {
    /// Get the authorized claims from request extensions.
    ///
    /// Returns `None` if the middleware was not applied, the rule grants
    /// access without a token, or the request passed anonymously.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::http::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}
