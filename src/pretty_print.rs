use crate::Error;
use crate::evaluator::EvalError;
use crate::parser::ParseError;
use crate::source::Span;
use ariadne::{Label, Report, ReportKind, Source};
use std::io;
use std::ops::Range;

type Diagnostic<'a> = Report<'a, (&'a str, Range<usize>)>;

fn emit<'a>(report: Diagnostic<'a>, name: &'a str, input: &str) -> io::Result<()> {
    report.eprint((name, Source::from(input)))
}

impl EvalError {
    /// The part of `input` the report points at. Calls built at runtime
    /// (by `apply` or `range`) carry no source position of their own.
    fn report_span(&self, input: &str) -> Span {
        match self.span() {
            Some(span) if span.end > span.start && span.end <= input.len() => span,
            _ => Span::new(0, input.len()),
        }
    }

    /// Writes a diagnostic for this error to stderr.
    pub fn pretty_print(&self, name: &str, input: &str) -> io::Result<()> {
        let range = self.report_span(input).to_range();
        let label = match &self.call {
            Some(context) => format!("failed in {}", context.describe()),
            None => "while evaluating this expression".to_string(),
        };
        let report = Report::build(ReportKind::Error, (name, range.clone()))
            .with_message(self.kind.to_string())
            .with_label(Label::new((name, range)).with_message(label))
            .finish();
        emit(report, name, input)
    }
}

impl ParseError {
    /// Writes a diagnostic for this error to stderr.
    pub fn pretty_print(&self, name: &str, input: &str) -> io::Result<()> {
        let range = self.span(input.len()).to_range();
        let report = match self {
            ParseError::UnexpectedToken { found, expected } => {
                Report::build(ReportKind::Error, (name, range.clone()))
                    .with_message(format!("Unexpected token: {}", found.kind))
                    .with_label(Label::new((name, range)).with_message(format!("Expected {expected}")))
            }
            ParseError::UnexpectedEof(expected) => {
                Report::build(ReportKind::Error, (name, range.clone()))
                    .with_message("Unexpected end of input")
                    .with_label(Label::new((name, range)).with_message(format!("Expected {expected}")))
            }
            ParseError::LexerError(lex_err) => Report::build(ReportKind::Error, (name, range.clone()))
                .with_message("Lexer error")
                .with_label(Label::new((name, range)).with_message(lex_err.error.to_string())),
        };
        emit(report.finish(), name, input)
    }
}

impl Error {
    pub fn pretty_print(&self, name: &str, input: &str) -> io::Result<()> {
        match self {
            Error::Parse(err) => err.pretty_print(name, input),
            Error::Eval(err) => err.pretty_print(name, input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::evaluator::tests::eval_str;
    use crate::parser::parse_str;

    #[test]
    fn test_eval_report_span_uses_call() {
        let env = Environment::new();
        let source = "(+ 1 (first 2))";
        let err = eval_str(source, &env).unwrap_err();
        assert_eq!(err.report_span(source), Span::new(5, 14));
    }

    #[test]
    fn test_eval_report_span_for_applied_primitive() {
        let env = Environment::new();
        let source = "(apply + (cons true))";
        let err = eval_str(source, &env).unwrap_err();
        assert_eq!(err.report_span(source), Span::new(0, source.len()));
    }

    #[test]
    fn test_pretty_print_succeeds() {
        let source = "(+ 1";
        let err = parse_str(source).unwrap_err();
        assert!(err.pretty_print("test", source).is_ok());

        let env = Environment::new();
        let source = "(first 1)";
        let err = eval_str(source, &env).unwrap_err();
        assert!(err.pretty_print("test", source).is_ok());
    }
}
