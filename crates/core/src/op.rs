//! Comparison operators for query clauses.
//!
//! The engine compiles `where` clauses down to a closed set of operator
//! variants evaluated by pattern matching, preserving the loose-vs-strict
//! equality distinction without any runtime code synthesis.

use crate::value::Value;
use core::cmp::Ordering;

/// A comparison operator appearing in a `where` clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    /// Loose equality (`==`): numeric across Int/Float, no string coercion.
    Eq,
    /// Strict equality (`===`): same variant, equal payload.
    StrictEq,
    /// Less-than (`<`).
    Lt,
    /// Greater-than (`>`).
    Gt,
    /// Less-than-or-equal (`<=`).
    Lte,
    /// Greater-than-or-equal (`>=`).
    Gte,
}

impl Op {
    /// Evaluates the operator against an item's property value (`lhs`) and a
    /// clause literal (`rhs`).
    ///
    /// A missing property (`lhs == None`) fails every operator except loose
    /// equality against `Null`. Ordering operators over incomparable operand
    /// variants evaluate to false rather than panicking.
    pub fn eval(&self, lhs: Option<&Value>, rhs: &Value) -> bool {
        match self {
            Op::Eq => match lhs {
                Some(v) => v.loose_eq(rhs),
                None => rhs.is_null(),
            },
            Op::StrictEq => lhs.map_or(false, |v| v.strict_eq(rhs)),
            Op::Lt => Self::ord(lhs, rhs).map_or(false, |o| o == Ordering::Less),
            Op::Gt => Self::ord(lhs, rhs).map_or(false, |o| o == Ordering::Greater),
            Op::Lte => Self::ord(lhs, rhs).map_or(false, |o| o != Ordering::Greater),
            Op::Gte => Self::ord(lhs, rhs).map_or(false, |o| o != Ordering::Less),
        }
    }

    fn ord(lhs: Option<&Value>, rhs: &Value) -> Option<Ordering> {
        lhs.and_then(|v| v.partial_cmp_ord(rhs))
    }

    /// Returns the source-form symbol, used in structural cursor keys.
    pub fn symbol(&self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::StrictEq => "===",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Lte => "<=",
            Op::Gte => ">=",
        }
    }
}
