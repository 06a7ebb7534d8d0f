//! The compiled cursor.
//!
//! A `Cursor` is the immutable compiled form of one query chain: a predicate
//! (conjunction of the `where` clauses), an optional comparator (the single
//! `orderBy` clause), an optional limit, and the set of property names the
//! predicate or comparator depend on. Cursors materialize a view with
//! `init` and maintain it under appends with `push_into`.

use crate::clause::{Direction, QueryData};
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use rill_core::{FieldAccess, Value};

/// Dense identifier assigned to a cursor by the memoization cache.
///
/// Views are keyed by (collection identity, cursor id), so cursor identity
/// sharing is what makes independently built identical chains share views.
pub type CursorId = u32;

/// Binary search for the insertion position of `item` in a sorted `list`.
///
/// Returns the index of an equal element if one exists, otherwise the index
/// at which `item` would keep the list sorted.
pub fn sorted_index_of<T, F>(list: &[T], item: &T, mut compare: F) -> usize
where
    F: FnMut(&T, &T) -> Ordering,
{
    let mut min = 0;
    let mut max = list.len();

    while min < max {
        let middle = (min + max) / 2;

        match compare(&list[middle], item) {
            Ordering::Less => min = middle + 1,
            Ordering::Greater => max = middle,
            Ordering::Equal => return middle,
        }
    }

    min
}

/// The compiled, memoized form of one `where*`/`orderBy?`/`limit?` chain.
#[derive(Debug)]
pub struct Cursor {
    id: CursorId,
    key: String,
    data: QueryData,
    properties: Vec<String>,
}

impl Cursor {
    /// Compiles the accumulated clauses of a chain.
    ///
    /// Normally called by `CursorCache::resolve`, which assigns the id and
    /// guarantees one instance per structural key.
    pub fn new(id: CursorId, key: impl Into<String>, data: QueryData) -> Self {
        let mut properties: Vec<String> = Vec::new();
        for clause in &data.filters {
            if !properties.contains(&clause.property) {
                properties.push(clause.property.clone());
            }
        }
        if let Some(order_by) = &data.order_by {
            if !properties.contains(&order_by.property) {
                properties.push(order_by.property.clone());
            }
        }

        Self {
            id,
            key: key.into(),
            data,
            properties,
        }
    }

    /// Returns the cursor's dense id.
    #[inline]
    pub fn id(&self) -> CursorId {
        self.id
    }

    /// Returns the structural key this cursor was compiled from.
    #[inline]
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Returns the compiled clause data.
    #[inline]
    pub fn data(&self) -> &QueryData {
        &self.data
    }

    /// Returns the property names the predicate or comparator depend on, in
    /// first-reference order.
    #[inline]
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    /// Returns true if any dependency property matches `property`.
    #[inline]
    pub fn depends_on(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }

    /// Returns true if this cursor carries an `orderBy` comparator.
    #[inline]
    pub fn has_comparator(&self) -> bool {
        self.data.order_by.is_some()
    }

    /// Evaluates the predicate: the conjunction of all `where` clauses.
    pub fn matches<T: FieldAccess>(&self, item: &T) -> bool {
        self.data
            .filters
            .iter()
            .all(|clause| clause.op.eval(item.field_value(&clause.property).as_ref(), &clause.value))
    }

    /// Compares two items under the `orderBy` clause.
    ///
    /// Items missing the ordered property sort as `Null`. Without an
    /// `orderBy` clause every pair compares equal.
    pub fn compare<T: FieldAccess>(&self, a: &T, b: &T) -> Ordering {
        let Some(order_by) = &self.data.order_by else {
            return Ordering::Equal;
        };

        let a_val = a.field_value(&order_by.property).unwrap_or(Value::Null);
        let b_val = b.field_value(&order_by.property).unwrap_or(Value::Null);
        let ordering = a_val.total_cmp(&b_val);

        match order_by.direction {
            Direction::Asc => ordering,
            Direction::Desc => ordering.reverse(),
        }
    }

    /// Materializes the view from scratch: filter, stable sort, truncate.
    ///
    /// Always returns a new vec and never mutates the source. Establishes no
    /// dependencies; callers evaluate against raw snapshots.
    pub fn init<T: FieldAccess + Clone>(&self, items: &[T]) -> Vec<T> {
        let mut next: Vec<T> = items.iter().filter(|i| self.matches(*i)).cloned().collect();

        if !next.is_empty() {
            if self.has_comparator() {
                next.sort_by(|a, b| self.compare(a, b));
            }
            if let Some(count) = self.data.limit {
                next.truncate(count);
            }
        }

        next
    }

    /// Incrementally maintains a materialized view for one appended element.
    ///
    /// A candidate failing the predicate is a no-op. Without a comparator the
    /// candidate is appended if the view is under its limit. With a
    /// comparator the sorted insertion position is found by binary search;
    /// inserting into a full view evicts the element that overflowed past the
    /// limit, and a candidate sorting past the current end is appended only
    /// if the view is under its limit.
    ///
    /// Returns whether the view was structurally mutated.
    pub fn push_into<T: FieldAccess>(&self, view: &mut Vec<T>, item: T) -> bool {
        if !self.matches(&item) {
            return false;
        }

        let length = view.len();
        let under_limit = self.data.limit.map_or(true, |count| length < count);

        if self.has_comparator() {
            let idx = sorted_index_of(view, &item, |a, b| self.compare(a, b));

            if idx < length {
                view.insert(idx, item);
                if self.data.limit == Some(length) {
                    view.pop();
                }
                true
            } else if under_limit {
                view.push(item);
                true
            } else {
                false
            }
        } else if under_limit {
            view.push(item);
            true
        } else {
            false
        }
    }
}
