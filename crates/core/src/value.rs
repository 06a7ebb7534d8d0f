//! Value type definitions for the rill engine.
//!
//! This module defines the `Value` enum which represents any literal that can
//! be stored in a record field or appear as a query clause operand.

use alloc::string::{String, ToString};
use core::cmp::Ordering;

/// A literal value stored in a record field.
#[derive(Clone, Debug)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point
    Float(f64),
    /// UTF-8 string
    Str(String),
}

impl Value {
    /// Returns true if this value is Null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean value if this is a Bool, None otherwise.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the i64 value if this is an Int, None otherwise.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the f64 value if this is a Float, None otherwise.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a Str, None otherwise.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Strict (`===`) equality: same variant with equal payload.
    ///
    /// `Float` NaN is never strictly equal to anything, itself included.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }

    /// Loose (`==`) equality: strict equality plus cross-variant numeric
    /// comparison between Int and Float. Strings are never loosely equal to
    /// numbers.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            _ => self.strict_eq(other),
        }
    }

    /// Partial ordering used by the ordering operators (`<`, `>`, `<=`, `>=`).
    ///
    /// Defined for same-variant pairs and Int/Float cross pairs; `None` for
    /// any other combination (an ordering clause over incomparable operands
    /// matches nothing).
    pub fn partial_cmp_ord(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total ordering used for sorting materialized views.
    ///
    /// Null sorts first, numeric variants compare numerically across Int and
    /// Float with NaN greater than every other number, and incomparable
    /// variants fall back to a fixed variant rank.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Int(a), Value::Float(b)) => {
                if b.is_nan() {
                    Ordering::Less
                } else {
                    (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal)
                }
            }
            (Value::Float(a), Value::Int(b)) => {
                if a.is_nan() {
                    Ordering::Greater
                } else {
                    a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal)
                }
            }
            (Value::Float(a), Value::Float(b)) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            },
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => self.variant_rank().cmp(&other.variant_rank()),
        }
    }

    /// Returns a rank for ordering values of incomparable variants.
    fn variant_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Str(_) => 4,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // NaN compares equal to itself here so Value can be used as plain
            // data; operator semantics go through strict_eq/loose_eq instead.
            (Value::Float(a), Value::Float(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            _ => self.strict_eq(other),
        }
    }
}

impl Eq for Value {}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_eq_same_variant() {
        assert!(Value::Int(1).strict_eq(&Value::Int(1)));
        assert!(Value::Str("1".into()).strict_eq(&Value::Str("1".into())));
        assert!(!Value::Int(1).strict_eq(&Value::Int(2)));
    }

    #[test]
    fn test_strict_eq_cross_variant() {
        assert!(!Value::Int(1).strict_eq(&Value::Float(1.0)));
        assert!(!Value::Int(1).strict_eq(&Value::Str("1".into())));
        assert!(!Value::Null.strict_eq(&Value::Bool(false)));
    }

    #[test]
    fn test_strict_eq_nan() {
        assert!(!Value::Float(f64::NAN).strict_eq(&Value::Float(f64::NAN)));
    }

    #[test]
    fn test_loose_eq_numeric() {
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(Value::Float(2.0).loose_eq(&Value::Int(2)));
        assert!(!Value::Int(1).loose_eq(&Value::Float(1.5)));
    }

    #[test]
    fn test_loose_eq_no_string_coercion() {
        assert!(!Value::Int(1).loose_eq(&Value::Str("1".into())));
        assert!(!Value::Str("1".into()).loose_eq(&Value::Int(1)));
    }

    #[test]
    fn test_partial_cmp_ord() {
        assert_eq!(
            Value::Int(2).partial_cmp_ord(&Value::Int(1)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Int(1).partial_cmp_ord(&Value::Float(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Str("1".into()).partial_cmp_ord(&Value::Int(1)), None);
        assert_eq!(Value::Null.partial_cmp_ord(&Value::Int(1)), None);
    }

    #[test]
    fn test_total_cmp_null_first() {
        assert_eq!(Value::Null.total_cmp(&Value::Int(-100)), Ordering::Less);
        assert_eq!(Value::Int(0).total_cmp(&Value::Null), Ordering::Greater);
    }

    #[test]
    fn test_total_cmp_cross_numeric() {
        assert_eq!(Value::Int(1).total_cmp(&Value::Float(1.5)), Ordering::Less);
        assert_eq!(Value::Float(2.5).total_cmp(&Value::Int(2)), Ordering::Greater);
    }

    #[test]
    fn test_total_cmp_variant_rank() {
        assert_eq!(
            Value::Int(100).total_cmp(&Value::Str("a".into())),
            Ordering::Less
        );
    }

    #[test]
    fn test_from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Int(42));
        assert_eq!(Value::from("abc"), Value::Str("abc".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }
}
