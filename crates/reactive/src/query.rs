//! The chainable query surface.
//!
//! `Engine::query()` returns the root of a chain; `filter`, `order_by` and
//! `limit` each resolve the accumulated clauses against the engine's cursor
//! cache, so two independently built identical chains carry the *same*
//! compiled cursor and therefore share views. `apply` materializes the
//! cursor's view over a collection.

use crate::engine::Engine;
use crate::observable::List;
use alloc::rc::Rc;
use rill_core::{Op, Value};
use rill_query::{Cursor, Direction, OrderByClause, QueryData, WhereClause};

/// One step of a query chain, holding its memoized compiled cursor.
#[derive(Clone)]
pub struct Query {
    engine: Engine,
    data: QueryData,
    cursor: Option<Rc<Cursor>>,
}

impl Engine {
    /// Returns the root query: no clauses, applies as an identity view.
    pub fn query(&self) -> Query {
        Query {
            engine: self.clone(),
            data: QueryData::new(),
            cursor: None,
        }
    }
}

impl Query {
    /// Adds a `where` clause with an explicit operator.
    pub fn filter(&self, property: &str, op: Op, value: impl Into<Value>) -> Query {
        self.resolve(self.data.with_filter(WhereClause::new(property, op, value)))
    }

    /// Adds a loose-equality (`==`) `where` clause.
    pub fn filter_eq(&self, property: &str, value: impl Into<Value>) -> Query {
        self.filter(property, Op::Eq, value)
    }

    /// Sets the `orderBy` clause.
    pub fn order_by(&self, property: &str, direction: Direction) -> Query {
        self.resolve(self.data.with_order_by(OrderByClause::new(property, direction)))
    }

    /// Sets the `limit` clause.
    pub fn limit(&self, count: usize) -> Query {
        self.resolve(self.data.with_limit(count))
    }

    fn resolve(&self, data: QueryData) -> Query {
        let key = data.structural_key();
        let cursor = self
            .engine
            .inner
            .borrow_mut()
            .cursors
            .resolve(&key, || data.clone());
        Query {
            engine: self.engine.clone(),
            data,
            cursor: Some(cursor),
        }
    }

    /// Returns the compiled cursor; `None` only on the root.
    pub fn cursor(&self) -> Option<&Rc<Cursor>> {
        self.cursor.as_ref()
    }

    /// Materializes this chain's view over `collection`.
    ///
    /// The view is cached per (collection, cursor) pair and maintained
    /// incrementally; the active computation is subscribed to the view's
    /// invalidation event.
    pub fn apply(&self, collection: &List) -> List {
        let cursor = match &self.cursor {
            Some(cursor) => cursor.clone(),
            None => self
                .engine
                .inner
                .borrow_mut()
                .cursors
                .resolve(&QueryData::new().structural_key(), QueryData::new),
        };
        self.engine.apply_cursor(collection.id(), cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::Op;

    #[test]
    fn test_identical_chains_resolve_to_same_cursor() {
        let engine = Engine::new();

        let a = engine.query().filter("id", Op::Gt, 1i64).limit(3);
        let b = engine.query().filter("id", Op::Gt, 1i64).limit(3);

        let a_cursor = a.cursor().expect("compiled chain");
        let b_cursor = b.cursor().expect("compiled chain");
        assert!(Rc::ptr_eq(a_cursor, b_cursor));
        assert_eq!(engine.cursor_count(), 2); // the intermediate step and the full chain
    }

    #[test]
    fn test_two_argument_filter_defaults_to_loose_eq() {
        let engine = Engine::new();

        let implicit = engine.query().filter_eq("id", 1i64);
        let explicit = engine.query().filter("id", Op::Eq, 1i64);

        assert!(Rc::ptr_eq(
            implicit.cursor().expect("compiled"),
            explicit.cursor().expect("compiled")
        ));
    }

    #[test]
    fn test_clause_order_distinguishes_cursors() {
        let engine = Engine::new();

        let a = engine.query().filter("id", Op::Gt, 1i64).filter("id", Op::Lt, 9i64);
        let b = engine.query().filter("id", Op::Lt, 9i64).filter("id", Op::Gt, 1i64);

        assert!(!Rc::ptr_eq(
            a.cursor().expect("compiled"),
            b.cursor().expect("compiled")
        ));
    }

    #[test]
    fn test_literal_type_distinguishes_cursors() {
        let engine = Engine::new();

        let by_int = engine.query().filter_eq("id", 1i64);
        let by_str = engine.query().filter_eq("id", "1");

        assert!(!Rc::ptr_eq(
            by_int.cursor().expect("compiled"),
            by_str.cursor().expect("compiled")
        ));
    }

    #[test]
    fn test_root_apply_is_identity_view() {
        let engine = Engine::new();
        let a = engine.record([("id", Value::Int(1))]);
        let b = engine.record([("id", Value::Int(2))]);
        let collection = engine.list([a.clone(), b.clone()]);

        let view = engine.query().apply(&collection);
        assert_eq!(view.len(), 2);
        assert_eq!(view.get(0), Some(a));
        assert_eq!(view.get(1), Some(b));
    }
}
