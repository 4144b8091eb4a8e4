//! Boolean rule language for claim-based authorization.
//!
//! Rules are small prefix expressions:
//!
//! ```text
//! all(any(jwtHasScope("fizz"), jwtHasScope("buzz")), not(jwtHasScope("test")))
//! ```
//!
//! They are compiled once with an [`ExprParser`] (parse + validate) and then
//! evaluated per request against an [`EvaluationContext`]. Compilation
//! failures are configuration errors; evaluation failures are surfaced to the
//! caller and never folded into a denial.

pub mod errors;
pub mod eval;
pub mod expr;
mod lexer;
pub mod parser;
mod validate;

pub use errors::{BoxError, ExprError, SyntaxError};
pub use eval::{ClaimsScopeContext, EvaluationContext};
pub use expr::{Atom, Expr, Literal, OpExpr};
pub use parser::ExprParser;

/// Compile a rule with a default parser.
///
/// # Errors
///
/// See [`ExprParser::compile`].
pub fn compile_expression(input: &str) -> Result<Expr, ExprError> {
    ExprParser::new().compile(input)
}
