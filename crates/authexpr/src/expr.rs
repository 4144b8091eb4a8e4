//! Abstract syntax tree for authorization expressions.
//!
//! An expression is either an operator applied to one or more
//! sub-expressions (`all(...)`, `any(...)`, `not(...)`) or an atom: a named
//! check applied to zero or more literals (`jwtHasScope("read")`).
//!
//! `Display` renders the canonical form: no whitespace, no trailing commas,
//! double-quoted literals. Rendering and re-parsing is a fixed point.

use crate::lexer::quote;
use std::fmt;

/// Operator names understood by the validator and evaluator.
pub const OP_NOT: &str = "not";
pub const OP_ANY: &str = "any";
pub const OP_ALL: &str = "all";

/// Atom names understood by the validator and evaluator.
pub const ATOM_JWT_HAS_SCOPE: &str = "jwtHasScope";

/// A parsed authorization expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Op(OpExpr),
    Atom(Atom),
}

/// Operator applied to sub-expressions. The grammar guarantees at least one
/// argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpExpr {
    pub name: String,
    pub args: Vec<Expr>,
}

/// Named check applied to literal arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub name: String,
    pub args: Vec<Literal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    String(String),
}

impl Expr {
    /// Canonical rendering, safe to log.
    pub fn repr(&self) -> String {
        self.to_string()
    }
}

impl Literal {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(value) => Some(value),
        }
    }
}

fn write_call<T: fmt::Display>(f: &mut fmt::Formatter<'_>, name: &str, args: &[T]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{arg}")?;
    }
    f.write_str(")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Op(op) => fmt::Display::fmt(op, f),
            Expr::Atom(atom) => fmt::Display::fmt(atom, f),
        }
    }
}

impl fmt::Display for OpExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_call(f, &self.name, &self.args)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_call(f, &self.name, &self.args)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(value) => f.write_str(&quote(value)),
        }
    }
}
