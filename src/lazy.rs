use crate::environment::{Env, Environment};
use crate::evaluator::{EvalError, EvalResult, Trampoline, evaluate};
use crate::primitives::check_arity;
use crate::types::{Call, Value};
use crate::source::Span;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// An unevaluated expression bundled with the scope it was written in.
///
/// Forcing always evaluates against the stored scope, never the scope of
/// whoever happens to force it.
pub struct DeferredTail {
    expression: Value,
    env: Env,
}

impl DeferredTail {
    pub fn new(expression: Value, env: Env) -> Self {
        DeferredTail { expression, env }
    }

    pub fn expression(&self) -> &Value {
        &self.expression
    }

    pub fn force(&self) -> EvalResult {
        debug!(tail = %self.expression, "forcing deferred tail");
        let value = evaluate(&self.expression, &self.env)?;
        match value {
            Value::LazySequence(_) | Value::Pair(_) | Value::End => Ok(value),
            other => Err(EvalError::type_error(format!(
                "lazy tail must produce a sequence, got {}",
                other.type_name()
            ))),
        }
    }
}

/// A cons cell whose tail is produced on demand.
pub struct LazySequence {
    pub head: Value,
    tail: Option<DeferredTail>,
}

impl LazySequence {
    pub fn new(head: Value, tail: Option<DeferredTail>) -> Self {
        LazySequence { head, tail }
    }

    pub fn has_tail(&self) -> bool {
        self.tail.is_some()
    }

    pub fn tail(&self) -> Option<&DeferredTail> {
        self.tail.as_ref()
    }

    /// The next cell, or the terminal marker when there is no tail.
    pub fn force_tail(&self) -> EvalResult {
        match &self.tail {
            Some(tail) => tail.force(),
            None => Ok(Value::End),
        }
    }

    /// A finite sequence over already computed values. Each tail is the next
    /// cell itself, so forcing it evaluates nothing.
    pub fn from_values(values: Vec<Value>, env: &Env) -> Value {
        let mut values = values;
        let mut current: Option<Rc<LazySequence>> = None;
        while let Some(head) = values.pop() {
            let tail = current
                .take()
                .map(|next| DeferredTail::new(Value::LazySequence(next), env.clone()));
            current = Some(Rc::new(LazySequence::new(head, tail)));
        }
        current.map(Value::LazySequence).unwrap_or(Value::End)
    }
}

// Chains built by `take` drop iteratively rather than one frame per cell.
impl Drop for LazySequence {
    fn drop(&mut self) {
        let mut next = self.tail.take();
        while let Some(tail) = next {
            next = match tail.expression {
                Value::LazySequence(sequence) => Rc::try_unwrap(sequence)
                    .ok()
                    .and_then(|mut sequence| sequence.tail.take()),
                _ => None,
            };
        }
    }
}

impl PartialEq for LazySequence {
    fn eq(&self, other: &Self) -> bool {
        self.head == other.head
            && match (&self.tail, &other.tail) {
                (None, None) => true,
                (Some(a), Some(b)) => a.expression == b.expression,
                _ => false,
            }
    }
}

impl fmt::Debug for LazySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySequence")
            .field("head", &self.head)
            .field("tail", &self.tail.as_ref().map(DeferredTail::expression))
            .finish()
    }
}

impl fmt::Display for LazySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.head)?;
        let mut tail = self.tail.as_ref();
        // Cells that are already values print in full; pending work prints as `...`
        while let Some(next) = tail {
            match &next.expression {
                Value::LazySequence(sequence) => {
                    write!(f, " {}", sequence.head)?;
                    tail = sequence.tail.as_ref();
                }
                _ => {
                    write!(f, " ...")?;
                    break;
                }
            }
        }
        write!(f, ")")
    }
}

enum Cursor {
    Ready(Value),
    Pending(Rc<LazySequence>),
}

/// Walks a pair chain or lazy sequence in order, forcing deferred tails
/// only when the element after them is requested.
pub struct SequenceIter {
    cursor: Option<Cursor>,
}

impl SequenceIter {
    pub fn new(sequence: Value) -> Self {
        SequenceIter {
            cursor: Some(Cursor::Ready(sequence)),
        }
    }
}

impl Iterator for SequenceIter {
    type Item = EvalResult;

    fn next(&mut self) -> Option<Self::Item> {
        let value = match self.cursor.take()? {
            Cursor::Ready(value) => value,
            Cursor::Pending(sequence) => match sequence.force_tail() {
                Ok(value) => value,
                Err(err) => return Some(Err(err)),
            },
        };
        match value {
            Value::Pair(pair) => {
                let head = pair.head()?.clone();
                self.cursor = pair.tail().map(|tail| Cursor::Ready(Value::Pair(tail.clone())));
                Some(Ok(head))
            }
            Value::LazySequence(sequence) => {
                let head = sequence.head.clone();
                if sequence.has_tail() {
                    self.cursor = Some(Cursor::Pending(sequence));
                }
                Some(Ok(head))
            }
            Value::End => None,
            other => Some(Err(EvalError::type_error(format!(
                "expected a sequence, got {}",
                other.type_name()
            )))),
        }
    }
}

// --- Sequence primitives ---

fn expect_integer(value: &Value, operator: &str, position: usize) -> EvalResult<i64> {
    match value {
        Value::Integer(n) => Ok(*n),
        other => Err(EvalError::type_error(format!(
            "'{}' expects an integer for argument {}, got {}",
            operator,
            position,
            other.type_name()
        ))),
    }
}

/// `(range a b)`: `a` followed by a deferred `(range a+1 b)`, ending at `b`.
pub fn prim_range(args: &[Value], env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 2, "range");
    let start = expect_integer(&args[0], "range", 1)?;
    let end = expect_integer(&args[1], "range", 2)?;
    let sequence = if start < end {
        let next = Call::new(
            Value::symbol("range"),
            vec![Value::Integer(start + 1), Value::Integer(end)],
            Span::default(),
        );
        // The arguments are literals, so the global scope is all the tail needs
        LazySequence::new(
            Value::Integer(start),
            Some(DeferredTail::new(next.into(), Environment::root(env))),
        )
    } else {
        LazySequence::new(Value::Integer(end), None)
    };
    Ok(Trampoline::Value(sequence.into()))
}

/// `(lazypair head [tail])`: the head is evaluated now, the tail is
/// captured together with the current scope.
pub fn prim_lazypair(args: &[Value], env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 1, 2, "lazypair");
    let head = evaluate(&args[0], env)?;
    let tail = match args.get(1) {
        None => None,
        Some(tail) if tail.is_unevaluated() => Some(DeferredTail::new(tail.clone(), env.clone())),
        Some(other) => {
            return Err(EvalError::type_error(format!(
                "'lazypair' expects an expression for its tail, got {}",
                other.type_name()
            )));
        }
    };
    Ok(Trampoline::Value(LazySequence::new(head, tail).into()))
}

/// `(take n seq)`: forces the first `n` elements into a finite sequence.
pub fn prim_take(args: &[Value], env: &Env) -> EvalResult<Trampoline> {
    check_arity!(args, 2, "take");
    let count = expect_integer(&args[0], "take", 1)?;
    let count = usize::try_from(count).map_err(|_| {
        EvalError::type_error(format!("'take' expects a non-negative count, got {}", count))
    })?;
    let Some(items) = args[1].iter_sequence() else {
        return Err(EvalError::type_error(format!(
            "'take' expects a sequence, got {}",
            args[1].type_name()
        )));
    };
    let values = items.take(count).collect::<EvalResult<Vec<_>>>()?;
    Ok(Trampoline::Value(LazySequence::from_values(
        values,
        &Environment::root(env),
    )))
}
