//! Rill Core - Value model for the rill reactive engine.
//!
//! This crate provides the foundational types shared by the query compiler
//! and the reactive runtime:
//!
//! - `Value`: literal values stored in record fields and query clauses
//! - `Op`: the closed set of comparison operators (`==`, `===`, `<`, `>`, `<=`, `>=`)
//! - `FieldAccess`: the trait through which predicates and comparators read
//!   item properties without knowing the storage representation
//!
//! The engine distinguishes loose (`==`) from strict (`===`) equality: loose
//! equality compares integers and floats numerically across variants, strict
//! equality requires the same variant. Neither coerces between strings and
//! numbers, so `Value::Int(1)` never equals `Value::Str("1")`.
//!
//! # Example
//!
//! ```rust
//! use rill_core::{Op, Value};
//!
//! assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
//! assert!(!Value::Int(1).strict_eq(&Value::Float(1.0)));
//! assert!(Op::Gt.eval(Some(&Value::Int(2)), &Value::Int(1)));
//! assert!(!Op::Gt.eval(Some(&Value::Str("2".into())), &Value::Int(1)));
//! ```

#![no_std]

extern crate alloc;

mod fields;
mod op;
mod value;

pub use fields::FieldAccess;
pub use op::Op;
pub use value::Value;
