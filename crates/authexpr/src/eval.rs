//! Evaluation of expressions against a capability context.
//!
//! The tree itself carries no claims; atoms are answered by an
//! [`EvaluationContext`] the caller supplies per evaluation. `any` and `all`
//! short-circuit left to right, so later atoms are never consulted once the
//! result is known.

use crate::errors::{BoxError, ExprError};
use crate::expr::{Atom, Expr, OpExpr, ATOM_JWT_HAS_SCOPE, OP_ALL, OP_ANY, OP_NOT};
use serde_json::{Map, Value};

/// Capabilities an expression can call into.
pub trait EvaluationContext {
    /// Whether the token grants `scope`.
    ///
    /// # Errors
    ///
    /// Any error aborts evaluation and is returned as `ExprError::EvalFailed`.
    fn jwt_has_scope(&self, scope: &str) -> Result<bool, BoxError>;
}

impl<F> EvaluationContext for F
where
    F: Fn(&str) -> Result<bool, BoxError>,
{
    fn jwt_has_scope(&self, scope: &str) -> Result<bool, BoxError> {
        self(scope)
    }
}

impl Expr {
    /// Evaluate the expression.
    ///
    /// # Errors
    ///
    /// Returns `ExprError::EvalFailed` when a capability fails or when the
    /// tree contains a node that validation would have rejected.
    pub fn evaluate(&self, ctx: &dyn EvaluationContext) -> Result<bool, ExprError> {
        match self {
            Expr::Op(op) => op.evaluate(ctx),
            Expr::Atom(atom) => atom.evaluate(ctx),
        }
    }
}

impl OpExpr {
    fn evaluate(&self, ctx: &dyn EvaluationContext) -> Result<bool, ExprError> {
        match self.name.as_str() {
            OP_NOT => match self.args.as_slice() {
                [arg] => Ok(!arg.evaluate(ctx)?),
                _ => Err(ExprError::eval_failed(format!(
                    "not(...) called with {} arguments",
                    self.args.len()
                ))),
            },
            OP_ANY => {
                for arg in &self.args {
                    if arg.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            OP_ALL => {
                for arg in &self.args {
                    if !arg.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            other => Err(ExprError::eval_failed(format!(
                "cannot evaluate undefined OpExpr: {other}"
            ))),
        }
    }
}

impl Atom {
    fn evaluate(&self, ctx: &dyn EvaluationContext) -> Result<bool, ExprError> {
        match self.name.as_str() {
            ATOM_JWT_HAS_SCOPE => {
                let scope = match self.args.as_slice() {
                    [literal] => literal.as_str(),
                    _ => None,
                };
                let Some(scope) = scope else {
                    return Err(ExprError::eval_failed(
                        "jwtHasScope(...) requires exactly one string literal",
                    ));
                };
                ctx.jwt_has_scope(scope).map_err(|cause| ExprError::EvalFailed {
                    message: format!("jwtHasScope({scope:?}) failed"),
                    cause: Some(cause),
                })
            }
            other => Err(ExprError::eval_failed(format!(
                "cannot evaluate undefined Atom: {other}"
            ))),
        }
    }
}

/// Standard scope check over a claims object.
///
/// The `scope` claim is a single space-separated string. A missing claim, a
/// non-string claim or an empty string grants nothing. Matching is exact and
/// case-sensitive.
#[derive(Debug, Clone, Copy)]
pub struct ClaimsScopeContext<'a> {
    claims: &'a Map<String, Value>,
}

impl<'a> ClaimsScopeContext<'a> {
    pub fn new(claims: &'a Map<String, Value>) -> Self {
        Self { claims }
    }
}

impl EvaluationContext for ClaimsScopeContext<'_> {
    fn jwt_has_scope(&self, scope: &str) -> Result<bool, BoxError> {
        let Some(Value::String(granted)) = self.claims.get("scope") else {
            return Ok(false);
        };
        Ok(granted
            .split(' ')
            .filter(|s| !s.is_empty())
            .any(|s| s == scope))
    }
}
