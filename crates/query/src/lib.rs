//! Rill Query - Query compiler for the rill reactive engine.
//!
//! This crate turns a chain of `where`/`orderBy`/`limit` clauses into a
//! compiled, memoized `Cursor`:
//!
//! - `clause`: clause types and the structural key fragments they contribute
//! - `compile`: the compiled cursor: predicate, comparator, dependency
//!   property set, full materialization (`init`) and the O(log n)
//!   incremental insert (`push_into`)
//! - `cache`: structural-key memoization guaranteeing that identical chains
//!   resolve to the same `Rc<Cursor>` instance
//!
//! Cursors are pure: they never mutate a source collection and never
//! establish dependencies; the reactive runtime layers subscription tracking
//! on top.
//!
//! # Example
//!
//! ```rust
//! use rill_query::{CursorCache, QueryData, WhereClause};
//! use rill_core::{Op, Value};
//!
//! let mut cache = CursorCache::new();
//! let data = QueryData::new().with_filter(WhereClause::new("id", Op::Gt, Value::Int(1)));
//! let key = data.structural_key();
//! let cursor = cache.resolve(&key, || data.clone());
//!
//! // an identical chain resolves to the same instance
//! let again = cache.resolve(&key, || data);
//! assert!(std::rc::Rc::ptr_eq(&cursor, &again));
//! ```

#![no_std]

extern crate alloc;

pub mod cache;
pub mod clause;
pub mod compile;

pub use cache::CursorCache;
pub use clause::{Direction, OrderByClause, QueryData, WhereClause};
pub use compile::{sorted_index_of, Cursor, CursorId};

// Re-export commonly used types from dependencies
pub use rill_core::{FieldAccess, Op, Value};
