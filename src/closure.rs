use crate::environment::{Env, Environment};
use crate::evaluator::{EvalError, EvalResult};
use crate::source::Span;
use crate::types::{Call, Symbol, Value};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// A user-defined function. The body is evaluated in a child of the scope
/// the closure was built in, with the parameters bound to the arguments.
pub struct Closure {
    pub params: Vec<Symbol>,
    pub body: Value,
    pub env: Env,
}

impl Closure {
    pub fn new(params: Vec<Symbol>, body: Value, env: Env) -> Self {
        Closure { params, body, env }
    }

    /// Creates the call frame for one application of this closure.
    pub fn bind(&self, args: &[Value]) -> EvalResult<Env> {
        check_params(&self.params, args.len(), "closure")?;
        let scope = Environment::new_enclosed(self.env.clone());
        {
            let mut frame = scope.borrow_mut();
            for (param, arg) in self.params.iter().zip(args) {
                frame.define(param.clone(), arg.clone());
            }
        }
        Ok(scope)
    }
}

// Closures reference their scope, which may reference them back.
// Identity is the only equality that terminates.
impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("params", &self.params)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", ParamList(&self.params))
    }
}

/// A syntactic abstraction: called with raw argument forms, which are
/// substituted for its parameters before the expansion is evaluated.
#[derive(Debug, PartialEq)]
pub struct Macro {
    pub params: Vec<Symbol>,
    pub body: Value,
}

impl Macro {
    pub fn new(params: Vec<Symbol>, body: Value) -> Self {
        Macro { params, body }
    }

    /// Calls in the body take `span`, the span of the invoking call, so
    /// diagnostics point at the invocation rather than the definition.
    pub fn expand(&self, args: &[Value], span: Span) -> EvalResult {
        check_params(&self.params, args.len(), "macro")?;
        let bindings: HashMap<&str, &Value> = self
            .params
            .iter()
            .map(Symbol::name)
            .zip(args.iter())
            .collect();
        let expansion = substitute(&self.body, &bindings, span);
        debug!(expansion = %expansion, "expanded macro");
        Ok(expansion)
    }
}

impl fmt::Display for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<macro {}>", ParamList(&self.params))
    }
}

struct ParamList<'a>(&'a [Symbol]);

impl fmt::Display for ParamList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, param) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, "]")
    }
}

fn check_params(params: &[Symbol], given: usize, what: &str) -> EvalResult<()> {
    if params.len() != given {
        return Err(EvalError::arity(format!(
            "{} expects {} arguments, got {}",
            what,
            params.len(),
            given
        )));
    }
    Ok(())
}

// Replacement forms are inserted as-is and not substituted again.
fn substitute(form: &Value, bindings: &HashMap<&str, &Value>, span: Span) -> Value {
    match form {
        Value::Symbol(symbol) => match bindings.get(symbol.name()) {
            Some(replacement) => (*replacement).clone(),
            None => form.clone(),
        },
        Value::Call(call) => Value::Call(Rc::new(Call {
            callee: substitute(&call.callee, bindings, span),
            args: call
                .args
                .iter()
                .map(|arg| substitute(arg, bindings, span))
                .collect(),
            span,
        })),
        Value::Vector(items) => {
            Value::Vector(items.iter().map(|item| substitute(item, bindings, span)).collect())
        }
        _ => form.clone(),
    }
}

/// Reads a parameter vector such as `[a b]`.
pub fn parse_params(form: &Value) -> EvalResult<Vec<Symbol>> {
    match form {
        Value::Vector(items) => items
            .iter()
            .map(|item| match item {
                Value::Symbol(symbol) => Ok(symbol.clone()),
                other => Err(EvalError::type_error(format!(
                    "parameter names must be symbols, got {}",
                    other.type_name()
                ))),
            })
            .collect(),
        other => Err(EvalError::type_error(format!(
            "expected a parameter vector, got {}",
            other.type_name()
        ))),
    }
}
