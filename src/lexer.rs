use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::source::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")] // Skip whitespace
#[logos(skip r";[^\n\r]*")] // Skip comments
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("true", |_| true)]
    #[token("false", |_| false)]
    Boolean(bool),
    #[regex(r"-?[0-9]+", priority = 3, callback = |lex| {
        let slice = lex.slice();
        slice
            .parse::<i64>()
            .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
    })]
    Integer(i64),
    #[regex(r"-?[0-9]+\.[0-9]+", priority = 3, callback = |lex| {
        let slice = lex.slice();
        slice
            .parse::<f64>()
            .map_err(|_| LexerErrorKind::InvalidNumberFormat(slice.to_string()))
    })]
    Float(f64),
    #[regex(r"[a-zA-Z!$%&*/:<=>?~_^+\-][a-zA-Z0-9!$%&*/:<=>?~_^+\-.]*", |lex| lex.slice().to_string())]
    Symbol(String),
    #[regex(r#""([^"\\]|\\.)*.?"#, |lex| {
        let slice = lex.slice();
        let len = slice.len();
        // make sure string was terminated
        if len == 1 || !slice.ends_with('"') {
            return Err(LexerErrorKind::UnterminatedString);
        }
        unescape(&slice[1..len - 1])
    })]
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

// Characters allowed after a backslash, and what they stand for
fn escaped(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        'r' => Some('\r'),
        't' => Some('\t'),
        '\\' | '"' => Some(c),
        _ => None,
    }
}

fn unescape(body: &str) -> LexerResult<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let next = chars.next().ok_or(LexerErrorKind::UnterminatedString)?;
        out.push(escaped(next).ok_or(LexerErrorKind::UnknownEscapeSequence(next))?);
    }
    Ok(out)
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Boolean(b) => write!(f, "{}", b),
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::Symbol(s) => write!(f, "{}", s),
            TokenKind::String(s) => write!(f, "\"{}\"", s), // Display with quotes for clarity
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexerErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid number format: '{0}'")]
    InvalidNumberFormat(String),
    #[error("unknown escape sequence: '\\{0}'")]
    UnknownEscapeSequence(char),
    #[default]
    #[error("invalid token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

type LexerResult<T> = Result<T, LexerErrorKind>;

/// Tokenizes the whole input, stopping at the first lexical error.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| {
            let span = Span::new(range.start, range.end);
            match result {
                Ok(kind) => Ok(Token { kind, span }),
                Err(error) => Err(LexerError { error, span }),
            }
        })
        .collect()
}
