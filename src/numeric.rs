use crate::evaluator::{EvalError, EvalResult};
use crate::types::Value;
use std::cmp::Ordering;

/// The numeric tower: Integer widens to Float whenever the two meet,
/// Float never narrows back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn from_value(value: &Value) -> Option<Number> {
        match value {
            Value::Integer(n) => Some(Number::Integer(*n)),
            Value::Float(n) => Some(Number::Float(*n)),
            _ => None,
        }
    }

    fn widen(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(n) => n,
        }
    }

    fn combine(
        self,
        other: Number,
        integer_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
        operator: &str,
    ) -> EvalResult<Number> {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => integer_op(a, b)
                .map(Number::Integer)
                .ok_or_else(|| {
                    EvalError::arithmetic(format!("integer overflow in ({} {} {})", operator, a, b))
                }),
            (a, b) => Ok(Number::Float(float_op(a.widen(), b.widen()))),
        }
    }

    pub fn add(self, other: Number) -> EvalResult<Number> {
        self.combine(other, i64::checked_add, |a, b| a + b, "+")
    }

    pub fn sub(self, other: Number) -> EvalResult<Number> {
        self.combine(other, i64::checked_sub, |a, b| a - b, "-")
    }

    pub fn mul(self, other: Number) -> EvalResult<Number> {
        self.combine(other, i64::checked_mul, |a, b| a * b, "*")
    }

    /// Integer division truncates; any zero divisor is an error.
    pub fn div(self, other: Number) -> EvalResult<Number> {
        if other.widen() == 0.0 {
            return Err(EvalError::arithmetic("division by zero"));
        }
        self.combine(other, i64::checked_div, |a, b| a / b, "/")
    }

    /// Remainder is only defined between integers.
    pub fn rem(self, other: Number) -> EvalResult<Number> {
        match (self, other) {
            (Number::Integer(_), Number::Integer(0)) => {
                Err(EvalError::arithmetic("modulo by zero"))
            }
            (Number::Integer(a), Number::Integer(b)) => a
                .checked_rem(b)
                .map(Number::Integer)
                .ok_or_else(|| EvalError::arithmetic(format!("integer overflow in (% {} {})", a, b))),
            (a, b) => Err(EvalError::type_error(format!(
                "'%' expects integers, got {} and {}",
                Value::from(a).type_name(),
                Value::from(b).type_name()
            ))),
        }
    }

    pub fn equals(self, other: Number) -> bool {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => a == b,
            (a, b) => a.widen() == b.widen(),
        }
    }

    /// `None` only when a NaN is involved.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(&b)),
            (a, b) => a.widen().partial_cmp(&b.widen()),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(n) => Value::Integer(n),
            Number::Float(n) => Value::Float(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn test_integer_arithmetic_stays_integer() {
        let a = Number::Integer(7);
        let b = Number::Integer(2);
        assert_eq!(a.add(b).unwrap(), Number::Integer(9));
        assert_eq!(a.sub(b).unwrap(), Number::Integer(5));
        assert_eq!(a.mul(b).unwrap(), Number::Integer(14));
        assert_eq!(a.div(b).unwrap(), Number::Integer(3));
        assert_eq!(a.rem(b).unwrap(), Number::Integer(1));
    }

    #[test]
    fn test_mixed_arithmetic_widens() {
        assert_eq!(
            Number::Integer(1).add(Number::Float(0.5)).unwrap(),
            Number::Float(1.5)
        );
        assert_eq!(
            Number::Float(3.0).div(Number::Integer(2)).unwrap(),
            Number::Float(1.5)
        );
    }

    #[test]
    fn test_division_by_zero() {
        let err = Number::Integer(1).div(Number::Integer(0)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ArithmeticError(_)));
        assert!(Number::Float(1.0).div(Number::Float(0.0)).is_err());
        assert!(Number::Integer(1).rem(Number::Integer(0)).is_err());
    }

    #[test]
    fn test_overflow_is_reported() {
        let err = Number::Integer(i64::MAX).add(Number::Integer(1)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ArithmeticError(_)));
    }

    #[test]
    fn test_rem_requires_integers() {
        let err = Number::Float(5.0).rem(Number::Integer(2)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeError(_)));
    }

    #[test]
    fn test_compare_across_tower() {
        assert_eq!(
            Number::Integer(2).compare(Number::Float(2.5)),
            Some(Ordering::Less)
        );
        assert!(Number::Integer(2).equals(Number::Float(2.0)));
        assert_eq!(Number::Float(f64::NAN).compare(Number::Integer(1)), None);
    }

    proptest! {
        #[test]
        fn prop_integer_addition_commutes(a in -1_000_000i64..1_000_000, b in -1_000_000i64..1_000_000) {
            let (x, y) = (Number::Integer(a), Number::Integer(b));
            prop_assert_eq!(x.add(y).unwrap(), y.add(x).unwrap());
        }

        #[test]
        fn prop_float_addition_commutes(a in -1.0e6f64..1.0e6, b in -1.0e6f64..1.0e6) {
            let (x, y) = (Number::Float(a), Number::Float(b));
            prop_assert_eq!(x.add(y).unwrap(), y.add(x).unwrap());
        }

        #[test]
        fn prop_widening_commutes(a in -1_000_000i64..1_000_000, b in -1.0e6f64..1.0e6) {
            let mixed = Number::Integer(a).add(Number::Float(b)).unwrap();
            let widened = Number::Float(a as f64).add(Number::Float(b)).unwrap();
            prop_assert_eq!(mixed, widened);
        }
    }
}
