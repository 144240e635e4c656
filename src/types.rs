use crate::closure::{Closure, Macro};
use crate::evaluator::{EvalError, EvalResult};
use crate::lazy::{LazySequence, SequenceIter};
use crate::numeric::Number;
use crate::source::Span;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// An interned identifier naming a variable or a primitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(Rc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

// Lets environments be queried with a plain &str
impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A call expression `(callee arg ...)`.
///
/// Built once by the parser (or by `apply`) and never mutated afterwards:
/// every evaluation of a call works on its own argument vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub callee: Value,
    pub args: Rc<[Value]>,
    pub span: Span,
}

impl Call {
    pub fn new(callee: Value, args: Vec<Value>, span: Span) -> Self {
        Call {
            callee,
            args: args.into(),
            span,
        }
    }

    /// The name used for this call in diagnostics.
    pub fn name(&self) -> String {
        match &self.callee {
            Value::Symbol(symbol) => symbol.to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.callee)?;
        for arg in self.args.iter() {
            write!(f, " {}", arg)?;
        }
        write!(f, ")")
    }
}

/// A cons cell. The tail is either another cell or absent, which is the
/// properly-ended terminal marker (`Value::End` when surfaced by `tail`).
#[derive(Debug, Clone, PartialEq)]
pub enum Pair {
    /// The canonical empty pair produced by `(cons)`.
    Empty,
    Cell { head: Value, tail: Option<Rc<Pair>> },
}

impl Pair {
    pub fn cons(head: Value, tail: Option<Rc<Pair>>) -> Self {
        Pair::Cell { head, tail }
    }

    /// Builds a properly ended chain holding `values` in order.
    pub fn from_values(values: Vec<Value>) -> Pair {
        let mut tail: Option<Rc<Pair>> = None;
        let mut values = values;
        while let Some(head) = values.pop() {
            tail = Some(Rc::new(Pair::cons(head, tail)));
        }
        match tail {
            Some(pair) => Rc::try_unwrap(pair).unwrap_or_else(|shared| (*shared).clone()),
            None => Pair::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Pair::Empty)
    }

    pub fn head(&self) -> Option<&Value> {
        match self {
            Pair::Empty => None,
            Pair::Cell { head, .. } => Some(head),
        }
    }

    pub fn tail(&self) -> Option<&Rc<Pair>> {
        match self {
            Pair::Empty => None,
            Pair::Cell { tail, .. } => tail.as_ref(),
        }
    }

    pub fn iter(&self) -> PairIter<'_> {
        PairIter { next: Some(self) }
    }
}

// Long chains would otherwise be dropped recursively, one stack frame per cell.
impl Drop for Pair {
    fn drop(&mut self) {
        let mut next = match self {
            Pair::Cell { tail, .. } => tail.take(),
            Pair::Empty => None,
        };
        while let Some(pair) = next {
            next = match Rc::try_unwrap(pair) {
                Ok(mut pair) => match &mut pair {
                    Pair::Cell { tail, .. } => tail.take(),
                    Pair::Empty => None,
                },
                Err(_) => None,
            };
        }
    }
}

pub struct PairIter<'a> {
    next: Option<&'a Pair>,
}

impl<'a> Iterator for PairIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next.take()? {
            Pair::Empty => None,
            Pair::Cell { head, tail } => {
                self.next = tail.as_deref();
                Some(head)
            }
        }
    }
}

/// Every value the language can produce, plus the AST forms the parser
/// emits (`Symbol` references and `Call` expressions).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(Rc<str>),
    Vector(Rc<[Value]>),
    Pair(Rc<Pair>),
    /// Terminal marker of a properly ended pair chain.
    End,
    /// Result of side-effecting primitives such as `print`.
    Nil,
    Symbol(Symbol),
    Closure(Rc<Closure>),
    Macro(Rc<Macro>),
    LazySequence(Rc<LazySequence>),
    Call(Rc<Call>),
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    pub fn symbol(name: &str) -> Value {
        Value::Symbol(Symbol::new(name))
    }

    pub fn vector(items: Vec<Value>) -> Value {
        Value::Vector(items.into())
    }

    pub fn empty_pair() -> Value {
        Value::Pair(Rc::new(Pair::Empty))
    }

    pub fn list(values: Vec<Value>) -> Value {
        Value::Pair(Rc::new(Pair::from_values(values)))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Vector(_) => "vector",
            Value::Pair(_) => "pair",
            Value::End => "end",
            Value::Nil => "nil",
            Value::Symbol(_) => "symbol",
            Value::Closure(_) => "closure",
            Value::Macro(_) => "macro",
            Value::LazySequence(_) => "lazy sequence",
            Value::Call(_) => "call",
        }
    }

    /// Symbol references and call expressions still need evaluating.
    pub fn is_unevaluated(&self) -> bool {
        matches!(self, Value::Symbol(_) | Value::Call(_))
    }

    /// Pairs, lazy sequences and the terminal marker can be walked in order.
    pub fn iter_sequence(&self) -> Option<SequenceIter> {
        match self {
            Value::Pair(_) | Value::LazySequence(_) | Value::End => {
                Some(SequenceIter::new(self.clone()))
            }
            _ => None,
        }
    }

    /// Language-level equality used by `=`.
    ///
    /// Integers and floats compare after widening. The terminal marker equals
    /// any pair with no elements. Values of variants with no equality
    /// relation between them are a type error, never `false`.
    pub fn equals(&self, other: &Value) -> EvalResult<bool> {
        if let (Some(left), Some(right)) = (Number::from_value(self), Number::from_value(other)) {
            return Ok(left.equals(right));
        }
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a == b),
            (Value::String(a), Value::String(b)) => Ok(a == b),
            (Value::End, Value::End) => Ok(true),
            (Value::End, Value::Pair(pair)) | (Value::Pair(pair), Value::End) => Ok(pair.is_empty()),
            (Value::Vector(a), Value::Vector(b)) => all_equal(a.iter(), b.iter(), a.len(), b.len()),
            (Value::Pair(a), Value::Pair(b)) => {
                all_equal(a.iter(), b.iter(), a.iter().count(), b.iter().count())
            }
            _ => Err(EvalError::type_error(format!(
                "cannot test {} and {} for equality",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Ordering used by `< <= > >=`.
    pub fn compare_to(&self, other: &Value) -> EvalResult<Ordering> {
        if let (Some(left), Some(right)) = (Number::from_value(self), Number::from_value(other)) {
            return left.compare(right).ok_or_else(|| {
                EvalError::type_error(format!("cannot order {} and {}", self, other))
            });
        }
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
            _ => Err(EvalError::type_error(format!(
                "cannot compare {} to {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }
}

fn all_equal<'a>(
    left: impl Iterator<Item = &'a Value>,
    right: impl Iterator<Item = &'a Value>,
    left_len: usize,
    right_len: usize,
) -> EvalResult<bool> {
    if left_len != right_len {
        return Ok(false);
    }
    for (a, b) in left.zip(right) {
        if !a.equals(b)? {
            return Ok(false);
        }
    }
    Ok(true)
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Pair> for Value {
    fn from(pair: Pair) -> Self {
        Value::Pair(Rc::new(pair))
    }
}

impl From<LazySequence> for Value {
    fn from(sequence: LazySequence) -> Self {
        Value::LazySequence(Rc::new(sequence))
    }
}

impl From<Call> for Value {
    fn from(call: Call) -> Self {
        Value::Call(Rc::new(call))
    }
}

fn write_separated<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    let mut first = true;
    for item in items {
        if !first {
            write!(f, " ")?;
        }
        write!(f, "{}", item)?;
        first = false;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 => write!(f, "{:.1}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Vector(items) => {
                write!(f, "[")?;
                write_separated(f, items.iter())?;
                write!(f, "]")
            }
            Value::Pair(pair) => {
                write!(f, "(")?;
                write_separated(f, pair.iter())?;
                write!(f, ")")
            }
            Value::End => write!(f, "<END>"),
            Value::Nil => write!(f, "<NIL>"),
            Value::Symbol(symbol) => write!(f, "{}", symbol),
            Value::Closure(closure) => write!(f, "{}", closure),
            Value::Macro(mac) => write!(f, "{}", mac),
            Value::LazySequence(sequence) => write!(f, "{}", sequence),
            Value::Call(call) => write!(f, "{}", call),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::tests::assert_eval;

    fn ints(values: &[i64]) -> Value {
        Value::list(values.iter().copied().map(Value::Integer).collect())
    }

    #[test]
    fn test_display_atoms() {
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        assert_eq!(Value::string("hi").to_string(), "hi");
        assert_eq!(Value::End.to_string(), "<END>");
        assert_eq!(Value::Nil.to_string(), "<NIL>");
    }

    #[test]
    fn test_display_collections() {
        assert_eq!(ints(&[1, 2, 3]).to_string(), "(1 2 3)");
        assert_eq!(Value::empty_pair().to_string(), "()");
        assert_eq!(
            Value::vector(vec![Value::symbol("a"), Value::symbol("b")]).to_string(),
            "[a b]"
        );
    }

    #[test]
    fn test_pair_from_values_preserves_order() {
        let pair = Pair::from_values(vec![Value::Integer(1), Value::Integer(2)]);
        let items: Vec<&Value> = pair.iter().collect();
        assert_eq!(items, vec![&Value::Integer(1), &Value::Integer(2)]);
        assert!(Pair::from_values(vec![]).is_empty());
    }

    #[test]
    fn test_long_chain_drops_without_overflow() {
        let values = (0..200_000).map(Value::Integer).collect();
        let pair = Pair::from_values(values);
        assert_eq!(pair.iter().count(), 200_000);
        drop(pair);
    }

    #[test]
    fn test_equals_widens_numbers() {
        assert!(Value::Integer(2).equals(&Value::Float(2.0)).unwrap());
        assert!(!Value::Float(2.5).equals(&Value::Integer(2)).unwrap());
    }

    #[test]
    fn test_equals_pairs_structurally() {
        assert!(ints(&[1, 2]).equals(&ints(&[1, 2])).unwrap());
        assert!(!ints(&[1, 2]).equals(&ints(&[1])).unwrap());
    }

    #[test]
    fn test_end_equals_empty_pair() {
        assert!(Value::End.equals(&Value::empty_pair()).unwrap());
        assert!(Value::empty_pair().equals(&Value::End).unwrap());
        assert!(!Value::End.equals(&ints(&[1])).unwrap());
        assert_eval("(= (tail (cons 1)) (cons))", Value::Boolean(true));
        assert_eval("(= (cons) (tail (cons 2)))", Value::Boolean(true));
    }

    #[test]
    fn test_equals_incompatible_is_type_error() {
        let err = Value::empty_pair().equals(&Value::Integer(1)).unwrap_err();
        assert!(matches!(err.kind, crate::evaluator::ErrorKind::TypeError(_)));
        assert!(Value::Boolean(true).equals(&Value::Integer(1)).is_err());
    }

    #[test]
    fn test_compare_to() {
        assert_eq!(
            Value::Integer(1).compare_to(&Value::Float(1.5)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::string("b").compare_to(&Value::string("a")).unwrap(),
            Ordering::Greater
        );
        assert!(Value::Boolean(true).compare_to(&Value::Boolean(false)).is_err());
    }
}
