//! Structural validation of parsed expressions.

use crate::errors::ExprError;
use crate::expr::{Atom, Expr, OpExpr, ATOM_JWT_HAS_SCOPE, OP_ALL, OP_ANY, OP_NOT};

impl Expr {
    /// Check that every operator and atom is known and has the right arity.
    ///
    /// Runs after parsing so that a rule which compiles cannot fail
    /// evaluation for structural reasons.
    ///
    /// # Errors
    ///
    /// Returns `ExprError::ValidationFailed` naming the first offending node.
    pub fn validate(&self) -> Result<(), ExprError> {
        match self {
            Expr::Op(op) => op.validate(),
            Expr::Atom(atom) => atom.validate(),
        }
    }
}

impl OpExpr {
    fn validate(&self) -> Result<(), ExprError> {
        match self.name.as_str() {
            OP_NOT => {
                if self.args.len() != 1 {
                    return Err(not_arity());
                }
            }
            OP_ANY | OP_ALL => {
                if self.args.is_empty() {
                    return Err(ExprError::ValidationFailed(format!(
                        "{}(...) OpExpr must be called with at least one argument",
                        self.name
                    )));
                }
            }
            other => {
                return Err(ExprError::ValidationFailed(format!(
                    "undefined OpExpr for name: {other}"
                )))
            }
        }
        self.args.iter().try_for_each(Expr::validate)
    }
}

impl Atom {
    fn validate(&self) -> Result<(), ExprError> {
        match self.name.as_str() {
            ATOM_JWT_HAS_SCOPE => {
                if self.args.len() != 1 {
                    return Err(ExprError::ValidationFailed(
                        "jwtHasScope(...) Atom must be called with exactly one string literal argument"
                            .to_string(),
                    ));
                }
                Ok(())
            }
            // `not()` and `not("x")` parse as atoms; report them as the
            // operator misuse they are.
            OP_NOT => Err(not_arity()),
            OP_ANY | OP_ALL => Err(ExprError::ValidationFailed(format!(
                "{}(...) OpExpr must be called with sub-expression arguments",
                self.name
            ))),
            other => Err(ExprError::ValidationFailed(format!(
                "undefined Atom for name: {other}"
            ))),
        }
    }
}

fn not_arity() -> ExprError {
    ExprError::ValidationFailed(
        "not(...) OpExpr must be called with exactly one argument".to_string(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use crate::{ExprError, ExprParser};

    fn validation_message(input: &str) -> String {
        match ExprParser::new().compile(input) {
            Err(ExprError::ValidationFailed(message)) => message,
            other => panic!("expected validation failure for {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_expressions() {
        let parser = ExprParser::new();
        for input in [
            r#"jwtHasScope("a")"#,
            r#"not(jwtHasScope("a"))"#,
            r#"any(jwtHasScope("a"),jwtHasScope("b"))"#,
            r#"all(any(jwtHasScope("fizz"),jwtHasScope("buzz")),not(jwtHasScope("test")))"#,
        ] {
            parser.compile(input).unwrap();
        }
    }

    #[test]
    fn test_not_arity() {
        let expected = "not(...) OpExpr must be called with exactly one argument";
        assert_eq!(validation_message("not()"), expected);
        assert_eq!(
            validation_message(r#"not(jwtHasScope("x"),jwtHasScope("y"))"#),
            expected
        );
        assert_eq!(validation_message(r#"not("x")"#), expected);
    }

    #[test]
    fn test_jwt_has_scope_arity() {
        let expected =
            "jwtHasScope(...) Atom must be called with exactly one string literal argument";
        assert_eq!(validation_message("jwtHasScope()"), expected);
        assert_eq!(validation_message(r#"jwtHasScope("a","b")"#), expected);
    }

    #[test]
    fn test_jwt_has_scope_with_sub_expression_is_unknown_operator() {
        assert_eq!(
            validation_message(r#"jwtHasScope(other("x"))"#),
            "undefined OpExpr for name: jwtHasScope"
        );
    }

    #[test]
    fn test_undefined_names() {
        assert_eq!(
            validation_message(r#"xor(jwtHasScope("a"),jwtHasScope("b"))"#),
            "undefined OpExpr for name: xor"
        );
        assert_eq!(
            validation_message(r#"jwtHasRole("admin")"#),
            "undefined Atom for name: jwtHasRole"
        );
        assert_eq!(
            validation_message(r#"any(jwtHasScope("a"),jwtHasRole("admin"))"#),
            "undefined Atom for name: jwtHasRole"
        );
    }

    #[test]
    fn test_literal_arguments_to_any() {
        assert!(validation_message(r#"any("a")"#).starts_with("any(...)"));
    }
}
