// Declare modules publicly so they are part of the library interface
pub mod closure;
pub mod environment;
pub mod evaluator;
pub mod lazy;
pub mod lexer;
pub mod logging;
pub mod numeric;
pub mod parser;
pub mod prelude;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod special_forms;
pub mod types;

pub use environment::{Env, Environment};
pub use evaluator::{ErrorKind, EvalError, EvalResult, evaluate};
pub use lexer::{LexerError, Token, tokenize};
pub use parser::{ParseError, Parser, parse_str};
pub use prelude::load_prelude;
pub use source::Span;
pub use types::Value;

/// Anything that can stop a program from producing a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Parses `source` as a single expression and evaluates it in `env`.
pub fn run(source: &str, env: &Env) -> Result<Value, Error> {
    let program = parse_str(source)?;
    Ok(evaluate(&program, env)?)
}
