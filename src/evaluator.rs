use crate::closure;
use crate::environment::{EnvError, Env};
use crate::primitives::{self, Policy};
use crate::source::Span;
use crate::types::{Call, Value};
use std::rc::Rc;
use thiserror::Error;
use tracing::trace;

// --- Evaluation Error ---

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    /// An operand lacks a capability the operation needs.
    #[error("type error: {0}")]
    TypeError(String),
    /// Wrong number of arguments to a closure, macro or fixed-arity primitive.
    #[error("arity error: {0}")]
    ArityError(String),
    #[error("unresolved reference '{0}'")]
    UnresolvedReference(String),
    #[error("not callable: {0}")]
    NotCallable(String),
    /// Division or modulo by zero, integer overflow.
    #[error("arithmetic error: {0}")]
    ArithmeticError(String),
}

/// The innermost call an error surfaced from.
#[derive(Debug, Clone, PartialEq)]
pub struct CallContext {
    pub name: String,
    pub args: Vec<Value>,
    pub span: Span,
}

impl CallContext {
    pub fn describe(&self) -> String {
        let mut text = format!("({}", self.name);
        for arg in &self.args {
            text.push(' ');
            text.push_str(&arg.to_string());
        }
        text.push(')');
        text
    }
}

fn describe_call(call: &Option<CallContext>) -> String {
    match call {
        Some(context) => format!(" in {}", context.describe()),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}{}", describe_call(.call))]
pub struct EvalError {
    pub kind: ErrorKind,
    pub call: Option<CallContext>,
}

impl EvalError {
    pub fn new(kind: ErrorKind) -> Self {
        EvalError { kind, call: None }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        EvalError::new(ErrorKind::TypeError(message.into()))
    }

    pub fn arity(message: impl Into<String>) -> Self {
        EvalError::new(ErrorKind::ArityError(message.into()))
    }

    pub fn not_callable(message: impl Into<String>) -> Self {
        EvalError::new(ErrorKind::NotCallable(message.into()))
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        EvalError::new(ErrorKind::ArithmeticError(message.into()))
    }

    /// Records the failing call unless a more deeply nested call already did.
    pub fn in_call(mut self, name: &str, args: &[Value], span: Span) -> Self {
        if self.call.is_none() {
            self.call = Some(CallContext {
                name: name.to_string(),
                args: args.to_vec(),
                span,
            });
        }
        self
    }

    pub fn span(&self) -> Option<Span> {
        self.call.as_ref().map(|context| context.span)
    }
}

// Allow easy conversion from EnvError
impl From<EnvError> for EvalError {
    fn from(err: EnvError) -> Self {
        match err {
            EnvError::UnresolvedReference(name) => {
                EvalError::new(ErrorKind::UnresolvedReference(name))
            }
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// One step of evaluation: either a finished value, or the next expression
/// and the scope it must be evaluated in.
#[derive(Debug)]
pub enum Trampoline {
    Value(Value),
    Eval(Value, Env),
}

// --- Evaluate Function ---

/// Evaluates an expression within the given environment.
///
/// Runs as a loop: primitives and closure application hand back the next
/// expression instead of recursing, so chains of `if`, `do` and closure
/// bodies do not grow the host stack.
pub fn evaluate(expr: &Value, env: &Env) -> EvalResult {
    let mut current = expr.clone();
    let mut scope = env.clone();
    loop {
        match step(&current, &scope)? {
            Trampoline::Value(value) => return Ok(value),
            Trampoline::Eval(next, next_scope) => {
                current = next;
                scope = next_scope;
            }
        }
    }
}

fn step(expr: &Value, env: &Env) -> EvalResult<Trampoline> {
    match expr {
        Value::Symbol(symbol) => Ok(Trampoline::Value(env.borrow().get(symbol.name())?)),
        Value::Call(call) => evaluate_call(call, env),
        // Literals and already-evaluated values
        _ => Ok(Trampoline::Value(expr.clone())),
    }
}

/// Evaluates every argument left to right in the caller's scope.
pub fn evaluate_args(args: &[Value], env: &Env) -> EvalResult<Vec<Value>> {
    args.iter().map(|arg| evaluate(arg, env)).collect()
}

fn evaluate_call(call: &Rc<Call>, env: &Env) -> EvalResult<Trampoline> {
    trace!(call = %call, "evaluating call");
    let name = call.name();
    let fail = |err: EvalError, args: &[Value]| err.in_call(&name, args, call.span);

    if let Value::Symbol(symbol) = &call.callee
        && let Some(primitive) = primitives::lookup(symbol.name())
    {
        return match primitive.policy {
            Policy::Eager => {
                let args = evaluate_args(&call.args, env).map_err(|err| fail(err, &call.args))?;
                (primitive.func)(&args, env).map_err(|err| fail(err, &args))
            }
            Policy::Special => (primitive.func)(&call.args, env).map_err(|err| fail(err, &call.args)),
        };
    }

    let callee = match &call.callee {
        Value::Closure(_) | Value::Macro(_) => call.callee.clone(),
        other => evaluate(other, env).map_err(|err| fail(err, &call.args))?,
    };

    match callee {
        Value::Closure(closure) => {
            let args = evaluate_args(&call.args, env).map_err(|err| fail(err, &call.args))?;
            let scope = closure.bind(&args).map_err(|err| fail(err, &args))?;
            Ok(Trampoline::Eval(closure.body.clone(), scope))
        }
        Value::Macro(mac) => {
            let expansion = mac.expand(&call.args, call.span).map_err(|err| fail(err, &call.args))?;
            Ok(Trampoline::Eval(expansion, env.clone()))
        }
        other => Err(fail(
            EvalError::not_callable(format!("{} is a {}", other, other.type_name())),
            &call.args,
        )),
    }
}

/// Calls a closure with already-evaluated arguments and runs it to a value.
pub fn call_closure(closure: &closure::Closure, args: &[Value]) -> EvalResult {
    let scope = closure.bind(args)?;
    evaluate(&closure.body, &scope)
}

// --- Unit Tests ---
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::environment::Environment;
    use crate::parser::parse_str;

    pub(crate) fn eval_str(input: &str, env: &Env) -> EvalResult {
        match parse_str(input) {
            Ok(expr) => evaluate(&expr, env),
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    // Helper to evaluate input string in a fresh global scope and check the result
    pub(crate) fn assert_eval(input: &str, expected: Value) {
        let env = Environment::new();
        match eval_str(input, &env) {
            Ok(result) => assert_eq!(result, expected, "Input: '{}'", input),
            Err(e) => panic!("Evaluation failed for input '{}': {}", input, e),
        }
    }

    // Helper to assert evaluation errors by variant
    pub(crate) fn assert_eval_error(input: &str, expected_kind: &ErrorKind) {
        let env = Environment::new();
        match eval_str(input, &env) {
            Ok(result) => panic!(
                "Expected evaluation to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => assert_eq!(
                std::mem::discriminant(&e.kind),
                std::mem::discriminant(expected_kind),
                "Input: '{}', Expected error variant like {:?}, got: {:?}",
                input,
                expected_kind,
                e
            ),
        }
    }

    pub(crate) fn type_error() -> ErrorKind {
        ErrorKind::TypeError(String::new())
    }

    pub(crate) fn arity_error() -> ErrorKind {
        ErrorKind::ArityError(String::new())
    }

    #[test]
    fn test_eval_self_evaluating() {
        assert_eval("123", Value::Integer(123));
        assert_eval("-4.5", Value::Float(-4.5));
        assert_eval("true", Value::Boolean(true));
        assert_eval("false", Value::Boolean(false));
        assert_eval(r#""hello""#, Value::string("hello"));
    }

    #[test]
    fn test_eval_symbol_lookup_ok() {
        let env = Environment::new();
        env.borrow_mut().define("x".into(), Value::Integer(100));
        assert_eq!(eval_str("x", &env), Ok(Value::Integer(100)));
    }

    #[test]
    fn test_eval_symbol_lookup_unbound() {
        assert_eval_error("y", &ErrorKind::UnresolvedReference(String::new()));
        assert_eval_error("(+ 1 y)", &ErrorKind::UnresolvedReference(String::new()));
    }

    #[test]
    fn test_eval_nested_calls() {
        assert_eval("(+ 1 (* 2 3))", Value::Integer(7));
        assert_eval("(- (+ 5 5) (* 2 3))", Value::Integer(4));
    }

    #[test]
    fn test_not_callable() {
        assert_eval_error("(1 2 3)", &ErrorKind::NotCallable(String::new()));
        assert_eval_error("(do (def x 5) (x 1))", &ErrorKind::NotCallable(String::new()));
    }

    #[test]
    fn test_unknown_callee_is_unresolved() {
        assert_eval_error("(nothing 1)", &ErrorKind::UnresolvedReference(String::new()));
    }

    #[test]
    fn test_error_carries_innermost_call() {
        let env = Environment::new();
        let err = eval_str("(+ 1 (first 2))", &env).unwrap_err();
        let context = err.call.expect("call context");
        assert_eq!(context.name, "first");
        assert_eq!(context.args, vec![Value::Integer(2)]);
        assert_eq!(context.span, Span::new(5, 14));
    }

    #[test]
    fn test_error_display_mentions_call() {
        let env = Environment::new();
        let err = eval_str("(% 5 2.0)", &env).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type error: '%' expects integers, got integer and float in (% 5 2.0)"
        );
    }

    #[test]
    fn test_closure_body_is_trampolined() {
        // Deep self-recursion through `if` in tail position
        let program = "(do
            (def count-down (fn [n] (if (= n 0) 0 (count-down (- n 1)))))
            (count-down 100000))";
        assert_eval(program, Value::Integer(0));
    }

    #[test]
    fn test_inline_closure_in_callee_position() {
        assert_eval("((fn [a] (+ 1 a)) 5)", Value::Integer(6));
    }
}
