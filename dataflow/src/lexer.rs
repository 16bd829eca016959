// Lexer for literal argument text.
//
// Tokenizes the restricted literal language accepted for constants and
// fixed keyword values: numbers, strings, booleans, qualified names such as
// `tf.int32`, and list/tuple punctuation. Uses the `logos` crate.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Literal token types.
///
/// Names carry no value; the span locates their text in the source.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // ── Keywords ──
    #[token("True")]
    True,
    #[token("False")]
    False,

    // ── Symbols ──
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,

    // ── Literals ──
    //
    // A float needs a point or an exponent, so a bare digit run is an Int.
    /// Floating-point literal (`1.`, `.5`, `2.5e-3`, `1e3`).
    #[regex(r"-?([0-9]+\.[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+", parse_float)]
    Float(f64),
    /// Integer literal, optionally negative.
    #[regex(r"-?[0-9]+", parse_int)]
    Int(i64),
    /// Single- or double-quoted string with backslash escapes.
    #[regex(r#"'([^'\\]|\\.)*'"#, parse_string)]
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    Str(String),

    // ── Names ──
    /// Dotted name, e.g. `tf.float32`.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*")]
    Name,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::True => write!(f, "True"),
            Token::False => write!(f, "False"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Float(v) => write!(f, "{v}"),
            Token::Int(v) => write!(f, "{v}"),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Name => write!(f, "<name>"),
        }
    }
}

// ── Callbacks ──

fn parse_float(lex: &mut logos::Lexer<'_, Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1]; // strip quotes
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => result.push('\n'),
                't' => result.push('\t'),
                other @ ('\'' | '"' | '\\') => result.push(other),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

// ── Public API ──

/// Lex literal text into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn numbers() {
        assert_eq!(
            lex_ok("1 -2 3.5 .5 1. 1e3 -2.5e-1"),
            vec![
                Token::Int(1),
                Token::Int(-2),
                Token::Float(3.5),
                Token::Float(0.5),
                Token::Float(1.0),
                Token::Float(1000.0),
                Token::Float(-0.25),
            ]
        );
    }

    #[test]
    fn nested_list() {
        assert_eq!(
            lex_ok("[[1, 2], (True,)]"),
            vec![
                Token::LBracket,
                Token::LBracket,
                Token::Int(1),
                Token::Comma,
                Token::Int(2),
                Token::RBracket,
                Token::Comma,
                Token::LParen,
                Token::True,
                Token::Comma,
                Token::RParen,
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn strings_both_quotes() {
        assert_eq!(
            lex_ok(r#"'left' "DESCENDING" 'it\'s'"#),
            vec![
                Token::Str("left".into()),
                Token::Str("DESCENDING".into()),
                Token::Str("it's".into()),
            ]
        );
    }

    #[test]
    fn qualified_names_and_keywords() {
        let result = lex("tf.int32 True Trueish");
        let spans: Vec<&str> = result
            .tokens
            .iter()
            .map(|(_, s)| &"tf.int32 True Trueish"[s.start..s.end])
            .collect();
        assert_eq!(spans, vec!["tf.int32", "True", "Trueish"]);
        assert_eq!(result.tokens[0].0, Token::Name);
        assert_eq!(result.tokens[1].0, Token::True);
        assert_eq!(result.tokens[2].0, Token::Name);
    }

    #[test]
    fn bad_character_reports_error() {
        let result = lex("1 + 2");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.tokens.len(), 2);
    }
}
