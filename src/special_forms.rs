//! Primitives with the `Special` policy that shape control flow and scope.
//! Each receives its argument forms unevaluated.

use crate::closure::{Closure, Macro, parse_params};
use crate::environment::{Env, Environment};
use crate::evaluator::{EvalError, EvalResult, Trampoline, evaluate};
use crate::primitives::{self, Policy, check_arity};
use crate::types::{Symbol, Value};
use std::rc::Rc;
use tracing::debug;

/// `(if cond then else)`: only the chosen branch is evaluated.
pub fn prim_if(args: &[Value], env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 3, "if");
    match evaluate(&args[0], env)? {
        Value::Boolean(true) => Ok(Trampoline::Eval(args[1].clone(), env.clone())),
        Value::Boolean(false) => Ok(Trampoline::Eval(args[2].clone(), env.clone())),
        other => Err(EvalError::type_error(format!(
            "'if' expects a boolean condition, got {}",
            other.type_name()
        ))),
    }
}

/// `(def name value)`: binds in the global environment wherever it appears.
pub fn prim_def(args: &[Value], env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 2, "def");
    let Value::Symbol(name) = &args[0] else {
        return Err(EvalError::type_error(format!(
            "'def' expects a symbol to bind, got {}",
            args[0].type_name()
        )));
    };
    let value = evaluate(&args[1], &Environment::new_enclosed(env.clone()))?;
    debug!(name = %name, value = %value, "defined global");
    Environment::root(env).borrow_mut().define(name.clone(), value);
    Ok(Trampoline::Value(args[0].clone()))
}

/// `(do form ...)`: every form runs in its own child of the caller's scope.
pub fn prim_do(args: &[Value], env: &Env) -> EvalResult<Trampoline> {
    let Some((last, rest)) = args.split_last() else {
        return Ok(Trampoline::Value(Value::Nil));
    };
    for form in rest {
        evaluate(form, &Environment::new_enclosed(env.clone()))?;
    }
    Ok(Trampoline::Eval(
        last.clone(),
        Environment::new_enclosed(env.clone()),
    ))
}

// A parameter list is written as a vector, or names a variable holding one.
fn read_params(form: &Value, env: &Env) -> EvalResult<Vec<Symbol>> {
    match form {
        Value::Symbol(_) => parse_params(&evaluate(form, env)?),
        other => parse_params(other),
    }
}

/// `(fn [params] body)`
pub fn prim_fn(args: &[Value], env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 2, "fn");
    let params = read_params(&args[0], env)?;
    let closure = Closure::new(params, args[1].clone(), env.clone());
    Ok(Trampoline::Value(Value::Closure(Rc::new(closure))))
}

/// `(macro [params] body)`
pub fn prim_macro(args: &[Value], env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 2, "macro");
    let params = read_params(&args[0], env)?;
    Ok(Trampoline::Value(Value::Macro(Rc::new(Macro::new(
        params,
        args[1].clone(),
    )))))
}

/// `(apply f seq)`: calls `f` with the elements of `seq` as its arguments.
///
/// The sequence is fully materialized first, so applying an unbounded
/// sequence never returns.
pub fn prim_apply(args: &[Value], env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 2, "apply");
    let sequence = if args[1].is_unevaluated() {
        evaluate(&args[1], &Environment::new_enclosed(env.clone()))?
    } else {
        args[1].clone()
    };
    let Some(items) = sequence.iter_sequence() else {
        return Err(EvalError::type_error(format!(
            "'apply' expects a sequence, got {}",
            sequence.type_name()
        )));
    };
    let values = items.collect::<EvalResult<Vec<_>>>()?;

    if let Value::Symbol(symbol) = &args[0]
        && let Some(primitive) = primitives::lookup(symbol.name())
    {
        return match primitive.policy {
            Policy::Eager => (primitive.func)(&values, env),
            Policy::Special => Err(EvalError::not_callable(format!(
                "'{}' takes unevaluated forms and cannot be applied",
                primitive.name
            ))),
        };
    }

    let callee = if args[0].is_unevaluated() {
        evaluate(&args[0], env)?
    } else {
        args[0].clone()
    };
    match callee {
        // The values are bound directly and never evaluated a second time
        Value::Closure(closure) => {
            let scope = closure.bind(&values)?;
            Ok(Trampoline::Eval(closure.body.clone(), scope))
        }
        other => Err(EvalError::not_callable(format!(
            "'apply' expects a function, got {}",
            other.type_name()
        ))),
    }
}
