//! Clause types for the query chain.
//!
//! A query is built as a chain of `where`/`orderBy`/`limit` steps. Each step
//! contributes a structural key fragment; the accumulated key identifies the
//! compiled cursor in the memoization cache, so two chains built
//! independently from the same clause literals share one cursor.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use rill_core::{Op, Value};

/// Sort direction of an `orderBy` clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Returns the source-form name, used in structural cursor keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `where` clause: `property <op> value`.
#[derive(Clone, Debug, PartialEq)]
pub struct WhereClause {
    pub property: String,
    pub op: Op,
    pub value: Value,
}

impl WhereClause {
    /// Creates a new clause.
    pub fn new(property: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    /// Returns this clause's structural key fragment.
    pub fn key_segment(&self) -> String {
        format!("where:{}:{}:{:?}", self.property, self.op.symbol(), self.value)
    }
}

/// The single `orderBy` clause of a chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderByClause {
    pub property: String,
    pub direction: Direction,
}

impl OrderByClause {
    /// Creates a new clause.
    pub fn new(property: impl Into<String>, direction: Direction) -> Self {
        Self {
            property: property.into(),
            direction,
        }
    }

    /// Returns this clause's structural key fragment.
    pub fn key_segment(&self) -> String {
        format!("orderBy:{}:{}", self.property, self.direction)
    }
}

/// The accumulated clauses of one query chain.
///
/// `where` clauses accumulate; `orderBy` and `limit` are single slots that a
/// later step overwrites.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryData {
    pub filters: Vec<WhereClause>,
    pub order_by: Option<OrderByClause>,
    pub limit: Option<usize>,
}

impl QueryData {
    /// Creates an empty chain (the root query).
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this chain with one more `where` clause.
    pub fn with_filter(&self, clause: WhereClause) -> Self {
        let mut next = self.clone();
        next.filters.push(clause);
        next
    }

    /// Returns a copy of this chain with the `orderBy` slot set.
    pub fn with_order_by(&self, clause: OrderByClause) -> Self {
        let mut next = self.clone();
        next.order_by = Some(clause);
        next
    }

    /// Returns a copy of this chain with the `limit` slot set.
    pub fn with_limit(&self, count: usize) -> Self {
        let mut next = self.clone();
        next.limit = Some(count);
        next
    }

    /// Builds the full structural key for this chain, starting from the root.
    pub fn structural_key(&self) -> String {
        let mut key = String::from("root");
        for clause in &self.filters {
            key = format!("{}->{}", key, clause.key_segment());
        }
        if let Some(order_by) = &self.order_by {
            key = format!("{}->{}", key, order_by.key_segment());
        }
        if let Some(count) = self.limit {
            key = format!("{}->limit:{}", key, count);
        }
        key
    }
}
