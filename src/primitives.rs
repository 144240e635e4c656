use crate::closure::Closure;
use crate::environment::Env;
use crate::evaluator::{EvalError, EvalResult, Trampoline, call_closure};
use crate::lazy;
use crate::numeric::Number;
use crate::special_forms;
use crate::types::{Pair, Value};
use std::cmp::Ordering;
use std::rc::Rc;

// Checks the number of arguments
macro_rules! check_arity {
    // Variant for minimum number of args
    ($args:expr, min $expected:expr, $name:expr) => {
        if $args.len() < $expected {
            return Err($crate::evaluator::EvalError::arity(format!(
                "'{}' expects at least {} arguments, got {}",
                $name,
                $expected,
                $args.len()
            )));
        }
    };
    // Variant for range of args (inclusive)
    ($args:expr, $min:expr, $max:expr, $name:expr) => {
        if !($min..=$max).contains(&$args.len()) {
            return Err($crate::evaluator::EvalError::arity(format!(
                "'{}' expects between {} and {} arguments, got {}",
                $name,
                $min,
                $max,
                $args.len()
            )));
        }
    };
    ($args:expr, $expected:expr, $name:expr) => {
        if $args.len() != $expected {
            return Err($crate::evaluator::EvalError::arity(format!(
                "'{}' expects exactly {} arguments, got {}",
                $name,
                $expected,
                $args.len()
            )));
        }
    };
}

pub(crate) use check_arity;

/// How a primitive's arguments reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Arguments are evaluated left to right in the caller's scope first.
    Eager,
    /// The raw argument forms are passed along with the caller's scope.
    Special,
}

pub type PrimitiveFunc = fn(&[Value], &Env) -> EvalResult<Trampoline>;

pub struct Primitive {
    pub name: &'static str,
    pub policy: Policy,
    pub func: PrimitiveFunc,
}

const fn eager(name: &'static str, func: PrimitiveFunc) -> Primitive {
    Primitive {
        name,
        policy: Policy::Eager,
        func,
    }
}

const fn special(name: &'static str, func: PrimitiveFunc) -> Primitive {
    Primitive {
        name,
        policy: Policy::Special,
        func,
    }
}

static PRIMITIVES: &[Primitive] = &[
    eager("+", prim_add),
    eager("-", prim_sub),
    eager("*", prim_mul),
    eager("/", prim_div),
    eager("%", prim_rem),
    eager("=", prim_eq),
    eager("<", prim_lt),
    eager("<=", prim_le),
    eager(">", prim_gt),
    eager(">=", prim_ge),
    eager("cons", prim_cons),
    eager("first", prim_first),
    eager("tail", prim_tail),
    eager("empty", prim_empty),
    eager("filter", prim_filter),
    eager("map", prim_map),
    eager("print", prim_print),
    eager("range", lazy::prim_range),
    eager("take", lazy::prim_take),
    special("lazypair", lazy::prim_lazypair),
    special("if", special_forms::prim_if),
    special("def", special_forms::prim_def),
    special("do", special_forms::prim_do),
    special("fn", special_forms::prim_fn),
    special("macro", special_forms::prim_macro),
    special("apply", special_forms::prim_apply),
];

/// Primitives shadow every binding: they are resolved before the
/// environment is consulted.
pub fn lookup(name: &str) -> Option<&'static Primitive> {
    PRIMITIVES.iter().find(|primitive| primitive.name == name)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    PRIMITIVES.iter().map(|primitive| primitive.name)
}

// --- Argument helpers ---

fn expect_number(value: &Value, operator: &str, position: usize) -> EvalResult<Number> {
    Number::from_value(value).ok_or_else(|| {
        EvalError::type_error(format!(
            "'{}' expects a number for argument {}, got {}",
            operator,
            position,
            value.type_name()
        ))
    })
}

fn expect_closure<'a>(value: &'a Value, operator: &str) -> EvalResult<&'a Rc<Closure>> {
    match value {
        Value::Closure(closure) => Ok(closure),
        other => Err(EvalError::type_error(format!(
            "'{}' expects a function as its first argument, got {}",
            operator,
            other.type_name()
        ))),
    }
}

fn expect_pair<'a>(value: &'a Value, operator: &str) -> EvalResult<&'a Rc<Pair>> {
    match value {
        Value::Pair(pair) => Ok(pair),
        other => Err(EvalError::type_error(format!(
            "'{}' expects a pair, got {}",
            operator,
            other.type_name()
        ))),
    }
}

// --- Arithmetic ---

// The first argument seeds the fold; there is no identity element.
fn fold_numbers(
    args: &[Value],
    operator: &str,
    op: fn(Number, Number) -> EvalResult<Number>,
) -> EvalResult<Trampoline> {
    check_arity!(args, min 1, operator);
    let mut acc = expect_number(&args[0], operator, 1)?;
    for (i, arg) in args.iter().enumerate().skip(1) {
        acc = op(acc, expect_number(arg, operator, i + 1)?)?;
    }
    Ok(Trampoline::Value(acc.into()))
}

fn prim_add(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    fold_numbers(args, "+", Number::add)
}

fn prim_sub(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    fold_numbers(args, "-", Number::sub)
}

fn prim_mul(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    fold_numbers(args, "*", Number::mul)
}

fn prim_div(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    fold_numbers(args, "/", Number::div)
}

fn prim_rem(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 2, "%");
    let a = expect_number(&args[0], "%", 1)?;
    let b = expect_number(&args[1], "%", 2)?;
    Ok(Trampoline::Value(a.rem(b)?.into()))
}

// --- Comparison ---

fn prim_eq(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 2, "=");
    Ok(Trampoline::Value(args[0].equals(&args[1])?.into()))
}

fn compare(args: &[Value], operator: &str, test: fn(Ordering) -> bool) -> EvalResult<Trampoline> {
    check_arity!(args, 2, operator);
    let ordering = args[0].compare_to(&args[1])?;
    Ok(Trampoline::Value(test(ordering).into()))
}

fn prim_lt(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    compare(args, "<", Ordering::is_lt)
}

fn prim_le(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    compare(args, "<=", Ordering::is_le)
}

fn prim_gt(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    compare(args, ">", Ordering::is_gt)
}

fn prim_ge(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    compare(args, ">=", Ordering::is_ge)
}

// --- Pairs ---

fn prim_cons(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    let pair = match args {
        [] => Pair::Empty,
        [head] | [head, Value::End] => Pair::cons(head.clone(), None),
        [head, Value::Pair(tail)] if tail.is_empty() => Pair::cons(head.clone(), None),
        [head, Value::Pair(tail)] => Pair::cons(head.clone(), Some(tail.clone())),
        [_, other] => {
            return Err(EvalError::type_error(format!(
                "'cons' expects a pair as its second argument, got {}",
                other.type_name()
            )));
        }
        _ => {
            return Err(EvalError::arity(format!(
                "'cons' expects at most 2 arguments, got {}",
                args.len()
            )));
        }
    };
    Ok(Trampoline::Value(pair.into()))
}

fn prim_first(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 1, "first");
    match &args[0] {
        Value::LazySequence(sequence) => Ok(Trampoline::Value(sequence.head.clone())),
        other => expect_pair(other, "first")?
            .head()
            .cloned()
            .map(Trampoline::Value)
            .ok_or_else(|| EvalError::type_error("'first' of an empty pair")),
    }
}

fn prim_tail(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 1, "tail");
    match &args[0] {
        Value::LazySequence(sequence) => sequence.force_tail().map(Trampoline::Value),
        other => {
            let tail = match expect_pair(other, "tail")?.tail() {
                Some(tail) => Value::Pair(tail.clone()),
                None => Value::End,
            };
            Ok(Trampoline::Value(tail))
        }
    }
}

fn prim_empty(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 1, "empty");
    let empty = match &args[0] {
        Value::End => true,
        Value::Pair(pair) => pair.is_empty(),
        Value::LazySequence(_) => false,
        other => {
            return Err(EvalError::type_error(format!(
                "'empty' expects a sequence, got {}",
                other.type_name()
            )));
        }
    };
    Ok(Trampoline::Value(empty.into()))
}

fn prim_filter(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 2, "filter");
    let predicate = expect_closure(&args[0], "filter")?;
    let pair = expect_pair(&args[1], "filter")?;
    let mut kept = Vec::new();
    for item in pair.iter() {
        match call_closure(predicate, std::slice::from_ref(item))? {
            Value::Boolean(true) => kept.push(item.clone()),
            Value::Boolean(false) => {}
            other => {
                return Err(EvalError::type_error(format!(
                    "'filter' predicate must return a boolean, got {}",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Trampoline::Value(Value::list(kept)))
}

fn prim_map(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 2, "map");
    let func = expect_closure(&args[0], "map")?;
    let pair = expect_pair(&args[1], "map")?;
    let mapped = pair
        .iter()
        .map(|item| call_closure(func, std::slice::from_ref(item)))
        .collect::<EvalResult<Vec<_>>>()?;
    Ok(Trampoline::Value(Value::list(mapped)))
}

fn prim_print(args: &[Value], _env: &Env) -> EvalResult<Trampoline> {
    let line = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", line);
    Ok(Trampoline::Value(Value::Nil))
}
