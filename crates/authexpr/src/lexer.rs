//! Tokenizer for the rule language.
//!
//! Produces identifiers, punctuation and string literals. String literals may
//! be double-quoted or single-quoted (both support backslash escapes) or
//! back-quoted (raw, no escapes).

use crate::errors::SyntaxError;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier `{name}`"),
            TokenKind::Str(_) => write!(f, "string literal"),
            TokenKind::LParen => write!(f, "`(`"),
            TokenKind::RParen => write!(f, "`)`"),
            TokenKind::Comma => write!(f, "`,`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        let kind = match ch {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '(' => {
                chars.next();
                TokenKind::LParen
            }
            ')' => {
                chars.next();
                TokenKind::RParen
            }
            ',' => {
                chars.next();
                TokenKind::Comma
            }
            '"' | '\'' => {
                chars.next();
                TokenKind::Str(lex_quoted(&mut chars, ch, offset)?)
            }
            '`' => {
                chars.next();
                TokenKind::Str(lex_raw(&mut chars, offset)?)
            }
            c if is_ident_start(c) => TokenKind::Ident(lex_ident(&mut chars)),
            other => {
                return Err(SyntaxError::new(
                    offset,
                    format!("unexpected character {other:?}"),
                ))
            }
        };
        tokens.push(Token { kind, offset });
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn lex_ident(chars: &mut Peekable<CharIndices<'_>>) -> String {
    let mut name = String::new();
    while let Some(&(_, c)) = chars.peek() {
        if !is_ident_continue(c) {
            break;
        }
        name.push(c);
        chars.next();
    }
    name
}

fn lex_raw(chars: &mut Peekable<CharIndices<'_>>, start: usize) -> Result<String, SyntaxError> {
    let mut value = String::new();
    for (_, c) in chars.by_ref() {
        if c == '`' {
            return Ok(value);
        }
        value.push(c);
    }
    Err(SyntaxError::new(start, "unterminated raw string literal"))
}

fn lex_quoted(
    chars: &mut Peekable<CharIndices<'_>>,
    quote: char,
    start: usize,
) -> Result<String, SyntaxError> {
    let mut value = String::new();
    while let Some((offset, c)) = chars.next() {
        match c {
            c if c == quote => return Ok(value),
            '\n' => return Err(SyntaxError::new(offset, "newline in string literal")),
            '\\' => value.push(lex_escape(chars, offset)?),
            c => value.push(c),
        }
    }
    Err(SyntaxError::new(start, "unterminated string literal"))
}

fn lex_escape(chars: &mut Peekable<CharIndices<'_>>, offset: usize) -> Result<char, SyntaxError> {
    let Some((_, c)) = chars.next() else {
        return Err(SyntaxError::new(offset, "unterminated escape sequence"));
    };
    match c {
        'n' => Ok('\n'),
        'r' => Ok('\r'),
        't' => Ok('\t'),
        '0' => Ok('\0'),
        '\\' => Ok('\\'),
        '"' => Ok('"'),
        '\'' => Ok('\''),
        'u' => lex_unicode_escape(chars, offset),
        other => Err(SyntaxError::new(
            offset,
            format!("unknown escape sequence \\{other}"),
        )),
    }
}

/// Accepts both `\u{1F600}` and `\u00e9`.
fn lex_unicode_escape(
    chars: &mut Peekable<CharIndices<'_>>,
    offset: usize,
) -> Result<char, SyntaxError> {
    let mut digits = String::new();
    if matches!(chars.peek(), Some(&(_, '{'))) {
        chars.next();
        loop {
            match chars.next() {
                Some((_, '}')) => break,
                Some((_, c)) if c.is_ascii_hexdigit() && digits.len() < 6 => digits.push(c),
                _ => return Err(SyntaxError::new(offset, "malformed \\u{...} escape")),
            }
        }
    } else {
        for _ in 0..4 {
            match chars.next() {
                Some((_, c)) if c.is_ascii_hexdigit() => digits.push(c),
                _ => return Err(SyntaxError::new(offset, "malformed \\uXXXX escape")),
            }
        }
    }

    u32::from_str_radix(&digits, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| SyntaxError::new(offset, "escape is not a valid unicode scalar value"))
}

/// Render a string as a double-quoted literal the lexer reads back unchanged.
pub(crate) fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_call() {
        assert_eq!(
            kinds(r#"not( jwtHasScope("a") , )"#),
            vec![
                TokenKind::Ident("not".to_string()),
                TokenKind::LParen,
                TokenKind::Ident("jwtHasScope".to_string()),
                TokenKind::LParen,
                TokenKind::Str("a".to_string()),
                TokenKind::RParen,
                TokenKind::Comma,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_token_offsets() {
        let tokens = tokenize("  any(x").unwrap();
        assert_eq!(tokens[0].offset, 2);
        assert_eq!(tokens[1].offset, 5);
        assert_eq!(tokens[2].offset, 6);
    }

    #[test]
    fn test_single_quoted_and_raw_strings() {
        assert_eq!(kinds("'test'"), vec![TokenKind::Str("test".to_string())]);
        assert_eq!(
            kinds(r"`a\nb`"),
            vec![TokenKind::Str(r"a\nb".to_string())]
        );
    }

    #[test]
    fn test_escapes() {
        assert_eq!(
            kinds(r#""te'''\"st""#),
            vec![TokenKind::Str("te'''\"st".to_string())]
        );
        assert_eq!(
            kinds(r#""\u00e9\u{1F600}\t""#),
            vec![TokenKind::Str("é😀\t".to_string())]
        );
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let err = tokenize(r#"jwtHasScope("abc"#).unwrap_err();
        assert_eq!(err.offset, 12);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_unknown_escape_is_error() {
        assert!(tokenize(r#""\q""#).is_err());
        assert!(tokenize(r#""\u{110000}""#).is_err());
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("all(x) && y").unwrap_err();
        assert_eq!(err.offset, 7);
    }

    #[test]
    fn test_quote_round_trips() {
        for value in ["plain", "te'''\"st", "back\\slash", "line\nbreak", "bell\u{7}", "é"] {
            let quoted = quote(value);
            assert_eq!(kinds(&quoted), vec![TokenKind::Str(value.to_string())]);
        }
    }
}
