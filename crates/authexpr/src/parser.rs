//! Recursive-descent parser for the rule language.
//!
//! ```text
//! Expr     := OpExpr | Atom
//! OpExpr   := Name "(" Expr ("," Expr)* ","? ")"
//! Atom     := Name "(" (Literal ("," Literal)* ","?)? ")"
//! Literal  := QuotedString
//! ```
//!
//! `OpExpr` and `Atom` share the `Name "("` prefix. The parser looks at the
//! token after the opening parenthesis and tries `OpExpr` first; it only
//! commits to `OpExpr` when that token is a name, otherwise it falls back to
//! `Atom`.
//!
//! The parser is a plain value owned by whoever compiles rules. It holds the
//! limits applied to every input and nothing else, so one instance can be
//! shared freely.

use crate::errors::{ExprError, SyntaxError};
use crate::expr::{Atom, Expr, Literal, OpExpr, OP_ALL, OP_ANY};
use crate::lexer::{tokenize, Token, TokenKind};
use tracing::instrument;

/// Default maximum nesting depth of operator expressions.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default maximum rule length in bytes.
pub const DEFAULT_MAX_LEN: usize = 4096;

/// Parser and compiler for authorization expressions.
#[derive(Debug, Clone)]
pub struct ExprParser {
    max_depth: usize,
    max_len: usize,
}

impl Default for ExprParser {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_len: DEFAULT_MAX_LEN,
        }
    }
}

impl ExprParser {
    /// Create a parser with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with custom limits.
    ///
    /// # Errors
    ///
    /// Returns `ExprError::ConfigFailed` if either limit is zero.
    pub fn with_limits(max_depth: usize, max_len: usize) -> Result<Self, ExprError> {
        if max_depth == 0 {
            return Err(ExprError::ConfigFailed(
                "maximum expression depth must be greater than 0".to_string(),
            ));
        }
        if max_len == 0 {
            return Err(ExprError::ConfigFailed(
                "maximum expression length must be greater than 0".to_string(),
            ));
        }
        Ok(Self { max_depth, max_len })
    }

    /// Parse an expression without validating it.
    ///
    /// # Errors
    ///
    /// Returns `ExprError::ParseFailed` wrapping the grammar diagnostic.
    pub fn parse(&self, input: &str) -> Result<Expr, ExprError> {
        self.parse_syntax(input).map_err(|cause| {
            tracing::debug!(target: "authexpr", error = %cause, "Failed to parse auth expression");
            ExprError::parse_failed(cause)
        })
    }

    /// Parse and validate an expression.
    ///
    /// This is the step rule owners run once at startup; a rule that
    /// compiles can be evaluated any number of times.
    ///
    /// # Errors
    ///
    /// Returns `ExprError::ParseFailed` or `ExprError::ValidationFailed`.
    #[instrument(skip_all, name = "authexpr.compile")]
    pub fn compile(&self, input: &str) -> Result<Expr, ExprError> {
        let expr = self.parse(input)?;
        expr.validate()?;
        tracing::debug!(target: "authexpr", expr = %expr, "Compiled auth expression");
        Ok(expr)
    }

    fn parse_syntax(&self, input: &str) -> Result<Expr, SyntaxError> {
        if input.len() > self.max_len {
            return Err(SyntaxError::new(
                self.max_len,
                format!("expression exceeds {} bytes", self.max_len),
            ));
        }

        let tokens = tokenize(input)?;
        let mut cursor = Cursor {
            tokens: &tokens,
            pos: 0,
            end: input.len(),
            max_depth: self.max_depth,
        };

        let expr = cursor.parse_expr(1)?;
        if let Some(token) = cursor.peek(0) {
            return Err(SyntaxError::new(
                token.offset,
                format!("unexpected {} after expression", token.kind),
            ));
        }
        Ok(expr)
    }
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: usize,
    max_depth: usize,
}

impl Cursor<'_> {
    fn peek(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead)
    }

    fn peek_kind(&self, ahead: usize) -> Option<&TokenKind> {
        self.peek(ahead).map(|t| &t.kind)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        match self.peek(0) {
            Some(token) => SyntaxError::new(
                token.offset,
                format!("unexpected {}, expected {expected}", token.kind),
            ),
            None => SyntaxError::new(
                self.end,
                format!("unexpected end of input, expected {expected}"),
            ),
        }
    }

    fn expect_ident(&mut self) -> Result<(String, usize), SyntaxError> {
        match self.peek(0) {
            Some(Token {
                kind: TokenKind::Ident(name),
                offset,
            }) => {
                let found = (name.clone(), *offset);
                self.pos += 1;
                Ok(found)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), SyntaxError> {
        if self.peek_kind(0) == Some(kind) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    /// Consume `,` or `)` after an argument. Returns true once the closing
    /// parenthesis has been consumed, including after a trailing comma.
    fn argument_separator(&mut self) -> Result<bool, SyntaxError> {
        match self.peek_kind(0) {
            Some(TokenKind::RParen) => {
                self.next();
                Ok(true)
            }
            Some(TokenKind::Comma) => {
                self.next();
                if self.peek_kind(0) == Some(&TokenKind::RParen) {
                    self.next();
                    return Ok(true);
                }
                Ok(false)
            }
            _ => Err(self.unexpected("`,` or `)`")),
        }
    }

    fn parse_expr(&mut self, depth: usize) -> Result<Expr, SyntaxError> {
        if depth > self.max_depth {
            let offset = self.peek(0).map_or(self.end, |t| t.offset);
            return Err(SyntaxError::new(
                offset,
                format!("expression nests deeper than {} levels", self.max_depth),
            ));
        }

        if let Some(op) = self.try_op_expr(depth)? {
            return Ok(Expr::Op(op));
        }
        self.parse_atom().map(Expr::Atom)
    }

    /// `Name "(" Name ...` can only be an operator expression; anything else
    /// after the parenthesis leaves the cursor untouched for `parse_atom`.
    fn try_op_expr(&mut self, depth: usize) -> Result<Option<OpExpr>, SyntaxError> {
        let is_op = matches!(
            (self.peek_kind(0), self.peek_kind(1), self.peek_kind(2)),
            (
                Some(TokenKind::Ident(_)),
                Some(TokenKind::LParen),
                Some(TokenKind::Ident(_))
            )
        );
        if !is_op {
            return Ok(None);
        }

        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;

        let mut args = vec![self.parse_expr(depth + 1)?];
        while !self.argument_separator()? {
            args.push(self.parse_expr(depth + 1)?);
        }

        Ok(Some(OpExpr { name, args }))
    }

    fn parse_atom(&mut self) -> Result<Atom, SyntaxError> {
        let (name, offset) = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;

        let mut args = Vec::new();
        if self.peek_kind(0) == Some(&TokenKind::RParen) {
            self.next();
        } else {
            loop {
                args.push(self.parse_literal()?);
                if self.argument_separator()? {
                    break;
                }
            }
        }

        if args.is_empty() && (name == OP_ANY || name == OP_ALL) {
            return Err(SyntaxError::new(
                offset,
                format!("operator `{name}` requires at least one sub-expression"),
            ));
        }

        Ok(Atom { name, args })
    }

    fn parse_literal(&mut self) -> Result<Literal, SyntaxError> {
        match self.peek_kind(0) {
            Some(TokenKind::Str(value)) => {
                let literal = Literal::String(value.clone());
                self.next();
                Ok(literal)
            }
            _ => Err(self.unexpected("string literal or `)`")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Expr, ExprError> {
        ExprParser::new().parse(input)
    }

    fn syntax_error(input: &str) -> SyntaxError {
        match parse(input) {
            Err(ExprError::ParseFailed { cause, .. }) => cause,
            other => panic!("expected parse failure for {input:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_atom() {
        let expr = parse(r#"jwtHasScope("read")"#).unwrap();
        assert_eq!(
            expr,
            Expr::Atom(Atom {
                name: "jwtHasScope".to_string(),
                args: vec![Literal::String("read".to_string())],
            })
        );
    }

    #[test]
    fn test_parse_atom_without_args() {
        let expr = parse("alwaysTrue()").unwrap();
        assert_eq!(
            expr,
            Expr::Atom(Atom {
                name: "alwaysTrue".to_string(),
                args: vec![],
            })
        );
    }

    #[test]
    fn test_parse_op_expr_prefers_sub_expressions() {
        let expr = parse(r#"not(jwtHasScope("x"))"#).unwrap();
        let Expr::Op(op) = expr else {
            panic!("expected OpExpr");
        };
        assert_eq!(op.name, "not");
        assert_eq!(op.args.len(), 1);
        assert!(matches!(op.args.first(), Some(Expr::Atom(_))));
    }

    #[test]
    fn test_literal_argument_falls_back_to_atom() {
        // Same prefix as an operator, but a literal argument makes it an atom.
        let expr = parse(r#"not("x")"#).unwrap();
        assert!(matches!(expr, Expr::Atom(ref atom) if atom.name == "not"));
    }

    #[test]
    fn test_trailing_commas_are_insignificant() {
        let pairs = [
            (r#"f("a",)"#, r#"f("a")"#),
            (r#"any(g("a"),)"#, r#"any(g("a"))"#),
            (
                r#"all(any(jwtHasScope("fizz",),jwtHasScope("buzz",),),not(jwtHasScope("test",),),)"#,
                r#"all(any(jwtHasScope("fizz"),jwtHasScope("buzz")),not(jwtHasScope("test")))"#,
            ),
        ];
        for (with, without) in pairs {
            assert_eq!(parse(with).unwrap(), parse(without).unwrap(), "{with}");
        }
    }

    #[test]
    fn test_whitespace_is_insignificant() {
        assert_eq!(
            parse(" any ( jwtHasScope ( \"foo\" ) ,\n jwtHasScope(\"barr\") ) ").unwrap(),
            parse(r#"any(jwtHasScope("foo"),jwtHasScope("barr"))"#).unwrap()
        );
    }

    #[test]
    fn test_zero_argument_any_and_all_fail_to_parse() {
        for input in ["any()", "all()", r#"not(all())"#] {
            let err = syntax_error(input);
            assert!(err.message.contains("at least one"), "{input}: {err}");
        }
    }

    #[test]
    fn test_lone_comma_is_rejected() {
        syntax_error("f(,)");
        syntax_error(r#"f("a",,)"#);
        syntax_error(r#"any(f("a"),,)"#);
    }

    #[test]
    fn test_mixed_arguments_are_rejected() {
        // Once committed to OpExpr, literal arguments are a syntax error.
        let err = syntax_error(r#"any(f("a"),"b")"#);
        assert!(err.message.contains("identifier"), "{err}");
        // And an atom cannot take sub-expressions after a literal.
        syntax_error(r#"f("a",g("b"))"#);
    }

    #[test]
    fn test_unbalanced_input() {
        let err = syntax_error(r#"all(jwtHasScope("a")"#);
        assert_eq!(err.offset, 20);
        assert!(err.message.contains("end of input"));

        let err = syntax_error(r#"jwtHasScope("a"))"#);
        assert_eq!(err.offset, 16);
        assert!(err.message.contains("after expression"));
    }

    #[test]
    fn test_empty_input() {
        let err = syntax_error("");
        assert_eq!(err.offset, 0);
        syntax_error("   ");
    }

    #[test]
    fn test_bare_name_is_rejected() {
        syntax_error("jwtHasScope");
    }

    #[test]
    fn test_depth_limit() {
        let parser = ExprParser::with_limits(3, DEFAULT_MAX_LEN).unwrap();
        assert!(parser.parse(r#"not(not(f("a")))"#).is_ok());
        let err = parser.parse(r#"not(not(not(f("a"))))"#).unwrap_err();
        assert!(err.to_string().contains("deeper than 3"), "{err}");
    }

    #[test]
    fn test_length_limit() {
        let parser = ExprParser::with_limits(DEFAULT_MAX_DEPTH, 10).unwrap();
        let err = parser.parse(r#"jwtHasScope("abcdef")"#).unwrap_err();
        assert!(matches!(err, ExprError::ParseFailed { .. }));
    }

    #[test]
    fn test_zero_limits_are_config_failures() {
        assert!(matches!(
            ExprParser::with_limits(0, 10),
            Err(ExprError::ConfigFailed(_))
        ));
        assert!(matches!(
            ExprParser::with_limits(10, 0),
            Err(ExprError::ConfigFailed(_))
        ));
    }

    #[test]
    fn test_deeply_nested_input_does_not_overflow() {
        let depth = 10_000;
        let input = format!("{}f(\"a\"){}", "not(".repeat(depth), ")".repeat(depth));
        let parser = ExprParser::with_limits(DEFAULT_MAX_DEPTH, usize::MAX).unwrap();
        assert!(matches!(
            parser.parse(&input),
            Err(ExprError::ParseFailed { .. })
        ));
    }
}
