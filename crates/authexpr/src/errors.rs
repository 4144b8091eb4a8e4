//! Expression error types.
//!
//! Parse and validation failures are expected at configuration time only.
//! Evaluation failures happen per request and are always surfaced to the
//! caller rather than being folded into a "deny".

use std::fmt;
use thiserror::Error;

/// Boxed error type returned by evaluation capabilities.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while building, parsing, validating or evaluating an
/// authorization expression.
#[derive(Debug, Error)]
pub enum ExprError {
    /// The rule language itself was set up incorrectly.
    #[error("auth expression error: configuration failure: {0}")]
    ConfigFailed(String),

    /// The grammar rejected the input.
    #[error("auth expression error: expression parse error: {message}; cause: {cause}")]
    ParseFailed {
        message: String,
        #[source]
        cause: SyntaxError,
    },

    /// The input parsed but is not a meaningful rule (wrong arity, unknown name).
    #[error("auth expression error: expression is invalid: {0}")]
    ValidationFailed(String),

    /// A capability the evaluator delegated to failed, or the tree was not
    /// evaluable.
    #[error("auth expression error: evaluation failure: {message}")]
    EvalFailed {
        message: String,
        #[source]
        cause: Option<BoxError>,
    },
}

impl ExprError {
    pub(crate) fn parse_failed(cause: SyntaxError) -> Self {
        ExprError::ParseFailed {
            message: "failed to parse auth expression".to_string(),
            cause,
        }
    }

    pub(crate) fn eval_failed(message: impl Into<String>) -> Self {
        ExprError::EvalFailed {
            message: message.into(),
            cause: None,
        }
    }
}

/// Grammar diagnostic: what went wrong and at which byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

impl SyntaxError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}
