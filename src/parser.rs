use crate::lexer::{LexerError, Token, TokenKind};
use crate::source::Span;
use crate::types::{Call, Value};
use std::iter::Peekable;
use std::vec::IntoIter;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected token '{}' at {}, expected {expected}", .found.kind, .found.span)]
    UnexpectedToken { found: Token, expected: String },
    #[error("unexpected end of input, expected {0}")]
    UnexpectedEof(String),
    #[error(transparent)]
    LexerError(#[from] LexerError),
}

impl ParseError {
    /// Where the error happened; end-of-input errors point past the last byte.
    pub fn span(&self, source_len: usize) -> Span {
        match self {
            ParseError::UnexpectedToken { found, .. } => found.span,
            ParseError::UnexpectedEof(_) => Span::new(source_len, source_len),
            ParseError::LexerError(err) => err.span,
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter().peekable(),
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    /// Parses a single expression starting with `token`.
    pub fn parse_expr_with_token(&mut self, token: Option<Token>) -> ParseResult<Value> {
        match token {
            Some(Token {
                kind: TokenKind::LParen,
                span,
            }) => self.parse_call(span),
            Some(Token {
                kind: TokenKind::LBracket,
                span,
            }) => self.parse_vector(span),
            Some(atom) => self.parse_atom(atom),
            None => Err(ParseError::UnexpectedEof("an expression".to_string())),
        }
    }

    pub fn parse_expr(&mut self) -> ParseResult<Value> {
        let token = self.next_token();
        self.parse_expr_with_token(token)
    }

    fn parse_atom(&mut self, token: Token) -> ParseResult<Value> {
        Ok(match token.kind {
            TokenKind::Integer(n) => Value::Integer(n),
            TokenKind::Float(n) => Value::Float(n),
            TokenKind::Boolean(b) => Value::Boolean(b),
            TokenKind::String(s) => Value::string(&s),
            TokenKind::Symbol(s) => Value::symbol(&s),
            _ => {
                return Err(ParseError::UnexpectedToken {
                    found: token,
                    expected: "an expression".to_string(),
                });
            }
        })
    }

    /// Parses `(callee arg ...)` after its opening parenthesis.
    fn parse_call(&mut self, open: Span) -> ParseResult<Value> {
        let callee = match self.next_token() {
            // Lists are built with `cons`, there is no empty list literal
            Some(
                found @ Token {
                    kind: TokenKind::RParen,
                    ..
                },
            ) => {
                return Err(ParseError::UnexpectedToken {
                    found,
                    expected: "a callee".to_string(),
                });
            }
            token => self.parse_expr_with_token(token)?,
        };
        let mut args = Vec::new();
        loop {
            match self.next_token() {
                Some(Token {
                    kind: TokenKind::RParen,
                    span,
                }) => return Ok(Call::new(callee, args, open.merge(span)).into()),
                None => return Err(ParseError::UnexpectedEof("')'".to_string())),
                token => args.push(self.parse_expr_with_token(token)?),
            }
        }
    }

    /// Parses `[item ...]` after its opening bracket.
    fn parse_vector(&mut self, _open: Span) -> ParseResult<Value> {
        let mut items = Vec::new();
        loop {
            match self.next_token() {
                Some(Token {
                    kind: TokenKind::RBracket,
                    ..
                }) => return Ok(Value::vector(items)),
                None => return Err(ParseError::UnexpectedEof("']'".to_string())),
                token => items.push(self.parse_expr_with_token(token)?),
            }
        }
    }

    /// Parses exactly one top-level expression.
    pub fn parse(mut self) -> ParseResult<Value> {
        let expr = self.parse_expr()?;
        if let Some(found) = self.next_token() {
            Err(ParseError::UnexpectedToken {
                found,
                expected: "end of input".to_string(),
            })
        } else {
            Ok(expr)
        }
    }
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Value> {
    let tokens = crate::lexer::tokenize(input)?;
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::LexerErrorKind;

    fn assert_parse(input: &str, expected: Value) {
        match parse_str(input) {
            Ok(result) => assert_eq!(result, expected, "Input: '{}'", input),
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    // Helper for asserting parse errors
    fn assert_parse_error(input: &str, expected_error_variant: ParseError) {
        match parse_str(input) {
            Ok(result) => panic!(
                "Expected parsing to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => {
                assert_eq!(
                    std::mem::discriminant(&e),
                    std::mem::discriminant(&expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    fn assert_parsed_string(input: &str, expected_output: &str) {
        let value = match parse_str(input) {
            Ok(result) => result,
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        };
        assert_eq!(value.to_string(), expected_output, "Input: '{}'", input);
    }

    fn unexpected_token() -> ParseError {
        ParseError::UnexpectedToken {
            found: Token {
                kind: TokenKind::RParen,
                span: Span::default(),
            },
            expected: String::new(),
        }
    }

    fn call(parsed: Value) -> std::rc::Rc<Call> {
        match parsed {
            Value::Call(call) => call,
            other => panic!("expected a call, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_atoms() {
        assert_parse("42", Value::Integer(42));
        assert_parse("-2.5", Value::Float(-2.5));
        assert_parse("true", Value::Boolean(true));
        assert_parse(r#""hi there""#, Value::string("hi there"));
        assert_parse("foo", Value::symbol("foo"));
    }

    #[test]
    fn test_parse_call() {
        let parsed = call(parse_str("(+ 1 2)").unwrap());
        assert_eq!(parsed.callee, Value::symbol("+"));
        assert_eq!(&*parsed.args, &[Value::Integer(1), Value::Integer(2)]);
        assert_eq!(parsed.span, Span::new(0, 7));
    }

    #[test]
    fn test_parse_call_without_args() {
        let parsed = call(parse_str("(cons)").unwrap());
        assert_eq!(parsed.callee, Value::symbol("cons"));
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn test_parse_nested_spans() {
        let outer = call(parse_str("(+ 1 (first 2))").unwrap());
        let inner = call(outer.args[1].clone());
        assert_eq!(inner.span, Span::new(5, 14));
        assert_eq!(outer.span, Span::new(0, 15));
    }

    #[test]
    fn test_parse_vector() {
        assert_parse(
            "[a b]",
            Value::vector(vec![Value::symbol("a"), Value::symbol("b")]),
        );
        assert_parse("[]", Value::vector(vec![]));
    }

    #[test]
    fn test_parse_call_in_callee_position() {
        assert_parsed_string("((fn [a] (+ 1 a)) 5)", "((fn [a] (+ 1 a)) 5)");
    }

    #[test]
    fn test_parse_preserves_argument_order() {
        assert_parsed_string(
            "(def add1 (fn [a] (+ 1 a)))",
            "(def add1 (fn [a] (+ 1 a)))",
        );
    }

    #[test]
    fn test_parse_empty_call_is_error() {
        assert_parse_error("()", unexpected_token());
    }

    #[test]
    fn test_parse_errors_unexpected_token() {
        assert_parse_error(")", unexpected_token());
        assert_parse_error("(+ 1 ]", unexpected_token());
        assert_parse_error("1 2", unexpected_token());
    }

    #[test]
    fn test_parse_errors_eof() {
        assert_parse_error("", ParseError::UnexpectedEof(String::new()));
        assert_parse_error("(+ 1", ParseError::UnexpectedEof(String::new()));
        assert_parse_error("[a", ParseError::UnexpectedEof(String::new()));
    }

    #[test]
    fn test_parse_lexer_error_propagation() {
        let err = parse_str(r#"(print "oops)"#).unwrap_err();
        match err {
            ParseError::LexerError(LexerError { error, .. }) => {
                assert_eq!(error, LexerErrorKind::UnterminatedString)
            }
            other => panic!("expected a lexer error, got {:?}", other),
        }
    }

    #[test]
    fn test_error_spans() {
        let source = "(+ 1 2";
        let err = parse_str(source).unwrap_err();
        assert_eq!(err.span(source.len()), Span::new(6, 6));

        let err = parse_str("1 )").unwrap_err();
        assert_eq!(err.span(3), Span::new(2, 3));
    }

    #[test]
    fn test_whitespace_and_comments() {
        assert_parsed_string(
            "; leading comment\n(do\n  (def x 1) ; bind\n  x)",
            "(do (def x 1) x)",
        );
    }
}
