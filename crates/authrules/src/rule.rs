//! Authorization rules and the decision point.
//!
//! A rule is compiled from text once, at startup, and evaluated against the
//! claims of every authenticated request. Compilation errors are
//! configuration errors; evaluation errors are surfaced as internal
//! failures, never as a silent deny.

use authexpr::{ClaimsScopeContext, Expr, ExprError, ExprParser};
use jwtauth::{AuthError, Authenticator, Authoriser, Claims};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Compiled claims-based rule, e.g. `all(jwtHasScope("read"), not(jwtHasScope("guest")))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtClaimsRule {
    expr: Expr,
}

impl JwtClaimsRule {
    /// Parse and validate `text`.
    ///
    /// # Errors
    ///
    /// Returns `ExprError::ParseFailed` or `ExprError::ValidationFailed`.
    pub fn compile(parser: &ExprParser, text: &str) -> Result<Self, ExprError> {
        let expr = parser.compile(text)?;
        tracing::debug!(target: "authrules", rule = %expr, "Compiled authorization rule");
        Ok(Self { expr })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Whether `claims` satisfy the rule.
    ///
    /// # Errors
    ///
    /// Returns `ExprError::EvalFailed` if evaluation could not complete.
    pub fn evaluate(&self, claims: &Claims) -> Result<bool, ExprError> {
        self.expr
            .evaluate(&ClaimsScopeContext::new(claims.as_map()))
    }
}

impl fmt::Display for JwtClaimsRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.expr, f)
    }
}

impl Authoriser for JwtClaimsRule {
    fn authorise(&self, claims: &Claims) -> Result<(), AuthError> {
        match self.evaluate(claims) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::insufficient_permissions(format!(
                "claims do not satisfy rule {}",
                self.expr
            ))),
            Err(e) => Err(AuthError::unknown(e)),
        }
    }
}

/// Authenticate `raw_token` and check the resulting claims against `rule`.
///
/// On success the caller receives its own copy of the claims to attach to
/// the request.
///
/// # Errors
///
/// Authentication errors are returned as-is. A denial is
/// `InsufficientPermissions`; an evaluation failure is `Unknown` carrying
/// the expression error.
#[instrument(skip_all, name = "authrules.authorize")]
pub async fn authorize(
    raw_token: &str,
    rule: &JwtClaimsRule,
    authenticator: &dyn Authenticator,
) -> Result<Claims, AuthError> {
    let claims = authenticator.authenticate(raw_token).await?;
    if let Err(e) = rule.authorise(&claims) {
        tracing::debug!(target: "authrules", error = %e, "Authorization denied");
        return Err(e);
    }
    Ok(claims)
}

/// How requests to a protected surface are authorized.
#[derive(Clone)]
pub enum Rule {
    /// Bearer token checked by `authenticator`, claims checked by `rule`.
    Jwt {
        rule: Arc<JwtClaimsRule>,
        authenticator: Arc<dyn Authenticator>,
    },
    /// Every request is allowed and no claims are attached.
    InsecureAlwaysGrant,
}

impl Rule {
    pub fn jwt(rule: JwtClaimsRule, authenticator: Arc<dyn Authenticator>) -> Self {
        Rule::Jwt {
            rule: Arc::new(rule),
            authenticator,
        }
    }

    /// Compile `text` with `parser` and pair it with `authenticator`.
    ///
    /// # Errors
    ///
    /// Returns the compilation error; nothing is served with a bad rule.
    pub fn from_text(
        parser: &ExprParser,
        text: &str,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self, ExprError> {
        Ok(Self::jwt(JwtClaimsRule::compile(parser, text)?, authenticator))
    }

    /// Explicit opt-out of authorization.
    pub fn insecure_always_grant() -> Self {
        tracing::warn!(
            target: "authrules",
            "Authorization disabled: every request will be granted access"
        );
        Rule::InsecureAlwaysGrant
    }

    /// Decide on a request given its bearer token lookup.
    ///
    /// `InsecureAlwaysGrant` ignores the token entirely and yields no claims.
    ///
    /// # Errors
    ///
    /// See [`authorize`]; a missing bearer token is returned unchanged.
    pub async fn check<T: AsRef<str>>(
        &self,
        bearer: Result<T, AuthError>,
    ) -> Result<Option<Claims>, AuthError> {
        match self {
            Rule::InsecureAlwaysGrant => Ok(None),
            Rule::Jwt {
                rule,
                authenticator,
            } => {
                let token = bearer?;
                authorize(token.as_ref(), rule, authenticator.as_ref())
                    .await
                    .map(Some)
            }
        }
    }
}

/// Re-checks claims authenticated earlier in the request's life.
///
/// `InsecureAlwaysGrant` accepts any claims.
impl Authoriser for Rule {
    fn authorise(&self, claims: &Claims) -> Result<(), AuthError> {
        match self {
            Rule::Jwt { rule, .. } => rule.authorise(claims),
            Rule::InsecureAlwaysGrant => Ok(()),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Jwt { rule, .. } => f
                .debug_struct("Jwt")
                .field("rule", &rule.to_string())
                .finish(),
            Rule::InsecureAlwaysGrant => f.write_str("InsecureAlwaysGrant"),
        }
    }
}
