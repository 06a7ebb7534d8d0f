//! Rill Reactive - fine-grained reactivity for the rill engine.
//!
//! This crate implements the runtime half of rill: a dependency-tracking
//! computation graph over observable records and lists, plus cached,
//! incrementally maintained live views of query chains.
//!
//! # Core Concepts
//!
//! - `Engine`: owns every arena, the active-computation stack, the batch
//!   window and the cursor/view caches; all handles are cheap clones of it
//! - `Computation`: a re-runnable unit of work that implicitly records which
//!   observables it read and re-runs when they change
//! - `Record` / `List`: observable values; reads subscribe the active
//!   computation, writes emit batched change notifications
//! - `Query`: a chainable `filter`/`order_by`/`limit` builder whose compiled
//!   cursors are memoized; `apply` materializes a cached live view
//!
//! # Batching
//!
//! The outermost mutation on the call stack opens a batch window. Computation
//! subscribers affected by emits inside the window are deduplicated and run
//! once after it closes, so a computation depending on several mutated
//! sources re-runs exactly once and never observes intermediate state.
//! `Engine::batch` opens a window explicitly around several mutations.
//!
//! # Example
//!
//! ```rust
//! use rill_reactive::Engine;
//! use rill_core::Value;
//!
//! let engine = Engine::new();
//! let todos = engine.list([
//!     engine.record([("id", Value::Int(1)), ("done", Value::Bool(false))]),
//! ]);
//!
//! let open = engine.query().filter_eq("done", false);
//!
//! let engine2 = engine.clone();
//! let todos2 = todos.clone();
//! let count = std::rc::Rc::new(std::cell::Cell::new(0usize));
//! let seen = count.clone();
//! engine.autorun(move || {
//!     seen.set(open.apply(&todos2).len());
//! });
//! assert_eq!(count.get(), 1);
//!
//! todos.push(&engine2.record([("id", Value::Int(2)), ("done", Value::Bool(false))]));
//! assert_eq!(count.get(), 2);
//! ```

#![no_std]

extern crate alloc;

mod arena;
mod computation;
mod engine;
mod observable;
mod query;
mod view;

pub use computation::{Computation, ComputationId, ComputationOptions, SlaveRegistration};
pub use engine::{Engine, EngineOptions};
pub use observable::{Event, FieldData, List, ObservableId, Payload, Record, SubscriptionId};
pub use query::Query;

// Re-export commonly used types from dependencies
pub use rill_core::{Op, Value};
pub use rill_query::{Cursor, Direction};
