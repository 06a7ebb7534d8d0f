//! View cache and invalidation.
//!
//! A view is the materialized result of one (collection, cursor) pair. Its
//! data is itself an observable list: dependent computations subscribe to the
//! data's `Invalidate` event while the view subscribes three maintenance
//! hooks to the base collection:
//!
//! - `Change` invalidates only when the mutated property is one the cursor
//!   depends on
//! - `Push` patches the cached data in place through the cursor's O(log n)
//!   incremental insert; a successful patch notifies dependents without
//!   marking the view stale, because the data already equals the recompute
//! - `Splice` always invalidates: interior removals cannot be patched
//!   incrementally in general
//!
//! Invalidation is lazy. It never recomputes eagerly; it emits `Invalidate`
//! so dependents re-run and re-materialize on their next access. When an
//! invalidation pass leaves the data's `Invalidate` subscriber list empty,
//! the view unhooks itself from the collection and evicts itself from the
//! cache -- a reference-counted lifetime inferred from the subscriber list.

use crate::arena::Arena;
use crate::engine::Engine;
use crate::observable::{
    Event, List, ObservableId, ObservableKind, ObservableState, Payload, Subscriber,
};
use alloc::rc::Rc;
use alloc::vec::Vec;
use rill_core::{FieldAccess, Value};
use rill_query::{Cursor, CursorId};

/// Views are keyed by (base collection, cursor identity).
pub(crate) type ViewKey = (ObservableId, CursorId);

/// Which base-collection event a view hook subscription handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ViewHookKind {
    Change,
    Push,
    Splice,
}

pub(crate) struct ViewState {
    pub(crate) cursor: Rc<Cursor>,
    /// The derived observable list holding the materialized result.
    pub(crate) data: ObservableId,
    pub(crate) invalidated: bool,
}

/// A borrowed member of a collection, giving cursors field access without
/// copying record contents out of the arena.
#[derive(Clone, Copy)]
pub(crate) struct MemberRef<'a> {
    arena: &'a Arena<ObservableState>,
    pub(crate) id: ObservableId,
}

impl FieldAccess for MemberRef<'_> {
    fn field_value(&self, property: &str) -> Option<Value> {
        self.arena.get(self.id.0).and_then(|state| state.field_value(property))
    }
}

impl Engine {
    /// Materializes (or reuses) the view of `cursor` over `collection` and
    /// subscribes the active computation to its invalidation event.
    pub(crate) fn apply_cursor(&self, collection: ObservableId, cursor: Rc<Cursor>) -> List {
        let key = (collection, cursor.id());

        let data_id = {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;

            if !inner.views.contains_key(&key) {
                let data = ObservableId(
                    inner
                        .observables
                        .insert(ObservableState::new(ObservableKind::List { members: Vec::new() })),
                );
                inner.views.insert(
                    key,
                    ViewState {
                        cursor: cursor.clone(),
                        data,
                        invalidated: true,
                    },
                );
                inner.subscribe(collection, Event::Change, Subscriber::ViewHook(key, ViewHookKind::Change));
                inner.subscribe(collection, Event::Push, Subscriber::ViewHook(key, ViewHookKind::Push));
                inner.subscribe(collection, Event::Splice, Subscriber::ViewHook(key, ViewHookKind::Splice));
            }

            let (data_id, invalidated) = {
                let view = inner.views.get(&key).expect("view ensured above");
                (view.data, view.invalidated)
            };

            if invalidated {
                let member_ids: Vec<ObservableId> = inner
                    .observables
                    .get(collection.0)
                    .map(|state| state.members().to_vec())
                    .unwrap_or_default();

                let result: Vec<ObservableId> = {
                    let arena = &inner.observables;
                    let items: Vec<MemberRef> = member_ids
                        .iter()
                        .map(|id| MemberRef { arena, id: *id })
                        .collect();
                    cursor.init(&items).iter().map(|member| member.id).collect()
                };

                if let Some(state) = inner.observables.get_mut(data_id.0) {
                    if let ObservableKind::List { members } = &mut state.kind {
                        *members = result;
                    }
                }
                if let Some(view) = inner.views.get_mut(&key) {
                    view.invalidated = false;
                }
            }

            if let Some(active) = inner.active.last().copied().flatten() {
                inner.subscribe(data_id, Event::Invalidate, Subscriber::Computation(active));
            }

            data_id
        };

        List {
            engine: self.clone(),
            id: data_id,
        }
    }

    /// Runs one view maintenance hook in response to a base-collection event.
    pub(crate) fn dispatch_view_hook(&self, key: ViewKey, kind: ViewHookKind, payload: &Payload) {
        match kind {
            ViewHookKind::Change => {
                let affected = {
                    let inner = self.inner.borrow();
                    match (inner.views.get(&key), payload) {
                        (Some(view), Payload::Change { property, .. }) => {
                            view.cursor.depends_on(property)
                        }
                        _ => false,
                    }
                };
                if affected {
                    self.invalidate_view(key, true);
                }
            }
            ViewHookKind::Push => {
                let Payload::Push { item, .. } = payload else {
                    return;
                };

                let changed = {
                    let mut inner = self.inner.borrow_mut();
                    let inner = &mut *inner;

                    let Some((cursor, data_id)) = inner
                        .views
                        .get(&key)
                        .map(|view| (view.cursor.clone(), view.data))
                    else {
                        return;
                    };

                    let member_ids: Vec<ObservableId> = inner
                        .observables
                        .get(data_id.0)
                        .map(|state| state.members().to_vec())
                        .unwrap_or_default();

                    let (changed, next) = {
                        let arena = &inner.observables;
                        let mut items: Vec<MemberRef> = member_ids
                            .iter()
                            .map(|id| MemberRef { arena, id: *id })
                            .collect();
                        let changed = cursor.push_into(&mut items, MemberRef { arena, id: *item });
                        (changed, items.iter().map(|member| member.id).collect::<Vec<_>>())
                    };

                    if changed {
                        if let Some(state) = inner.observables.get_mut(data_id.0) {
                            if let ObservableKind::List { members } = &mut state.kind {
                                *members = next;
                            }
                        }
                    }

                    changed
                };

                // the data was patched in place to the correct answer, so
                // dependents are notified without marking the view stale
                if changed {
                    self.invalidate_view(key, false);
                }
            }
            ViewHookKind::Splice => {
                self.invalidate_view(key, true);
            }
        }
    }

    /// Notifies a view's dependents, optionally marking its data stale, and
    /// tears the view down if no dependents remain afterwards.
    pub(crate) fn invalidate_view(&self, key: ViewKey, mark: bool) {
        let data_id = {
            let mut inner = self.inner.borrow_mut();
            let Some(view) = inner.views.get_mut(&key) else {
                return;
            };
            if mark {
                view.invalidated = true;
            }
            view.data
        };

        self.emit(data_id, Event::Invalidate, Payload::Invalidate { target: data_id });

        let orphaned = {
            let inner = self.inner.borrow();
            inner
                .observables
                .get(data_id.0)
                .map_or(true, |state| state.subscriber_count(&Event::Invalidate) == 0)
        };
        if orphaned {
            self.teardown_view(key);
        }
    }

    fn teardown_view(&self, key: ViewKey) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let Some(view) = inner.views.remove(&key) else {
            return;
        };
        let (collection, _) = key;
        inner.unsubscribe(collection, &Event::Change, &Subscriber::ViewHook(key, ViewHookKind::Change));
        inner.unsubscribe(collection, &Event::Push, &Subscriber::ViewHook(key, ViewHookKind::Push));
        inner.unsubscribe(collection, &Event::Splice, &Subscriber::ViewHook(key, ViewHookKind::Splice));
        inner.observables.remove(view.data.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use alloc::vec::Vec;
    use core::cell::Cell;
    use rill_core::Op;
    use rill_query::Direction;

    fn ids(list: &crate::observable::List) -> Vec<ObservableId> {
        list.records().iter().map(|record| record.id()).collect()
    }

    #[test]
    fn test_view_is_cached_between_applies() {
        let engine = Engine::new();
        let collection = engine.list([
            engine.record([("id", Value::Int(1))]),
            engine.record([("id", Value::Int(2))]),
        ]);

        let query = engine.query().filter("id", Op::Gt, 1i64);
        let first = query.apply(&collection);
        let second = query.apply(&collection);

        assert_eq!(first.id(), second.id());
        assert_eq!(engine.view_count(), 1);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_identical_chains_share_one_view() {
        let engine = Engine::new();
        let collection = engine.list([engine.record([("id", Value::Int(1))])]);

        let first = engine.query().filter("id", Op::Gte, 1i64).apply(&collection);
        let second = engine.query().filter("id", Op::Gte, 1i64).apply(&collection);

        assert_eq!(first.id(), second.id());
        assert_eq!(engine.view_count(), 1);
    }

    #[test]
    fn test_unobserved_view_tears_down_on_mutation() {
        let engine = Engine::new();
        let collection = engine.list([engine.record([("id", Value::Int(1))])]);

        let query = engine.query().filter("id", Op::Gte, 1i64);
        let view = query.apply(&collection);
        assert_eq!(view.len(), 1);
        assert_eq!(engine.view_count(), 1);

        // nothing observes the view, so the invalidation pass evicts it
        collection.push(&engine.record([("id", Value::Int(2))]));
        assert_eq!(engine.view_count(), 0);

        // re-applying rebuilds it from the full collection
        let rebuilt = query.apply(&collection);
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(engine.view_count(), 1);
    }

    #[test]
    fn test_observed_view_survives_incremental_patch() {
        let engine = Engine::new();
        let collection = engine.list([engine.record([("id", Value::Int(1))])]);

        let query = engine.query().filter("id", Op::Gte, 1i64);
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let query_handle = query.clone();
        let collection_handle = collection.clone();
        engine.autorun(move || {
            runs_clone.set(runs_clone.get() + 1);
            query_handle.apply(&collection_handle).len()
        });
        assert_eq!(runs.get(), 1);

        collection.push(&engine.record([("id", Value::Int(2))]));
        assert_eq!(runs.get(), 2);
        assert_eq!(engine.view_count(), 1);
        assert_eq!(query.apply(&collection).len(), 2);
    }

    #[test]
    fn test_change_outside_dependency_set_is_ignored() {
        let engine = Engine::new();
        let record = engine.record([("id", Value::Int(1)), ("name", Value::Str("a".into()))]);
        let collection = engine.list([record.clone()]);

        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let query = engine.query().filter("id", Op::Gte, 1i64);
        let collection_handle = collection.clone();
        engine.autorun(move || {
            runs_clone.set(runs_clone.get() + 1);
            query.apply(&collection_handle).len()
        });
        assert_eq!(runs.get(), 1);

        record.set("name", "b");
        assert_eq!(runs.get(), 1);

        record.set("id", 5i64);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_splice_invalidates_to_full_recompute() {
        let engine = Engine::new();
        let a = engine.record([("id", Value::Int(1))]);
        let b = engine.record([("id", Value::Int(2))]);
        let c = engine.record([("id", Value::Int(3))]);
        let collection = engine.list([a, b.clone(), c.clone()]);

        let seen: Rc<Cell<usize>> = Rc::new(Cell::new(0));
        let seen_clone = seen.clone();
        let query = engine.query().filter("id", Op::Gt, 1i64);
        let query_handle = query.clone();
        let collection_handle = collection.clone();
        engine.autorun(move || {
            seen_clone.set(query_handle.apply(&collection_handle).len());
        });
        assert_eq!(seen.get(), 2);

        collection.splice(1, 1); // removes b
        assert_eq!(seen.get(), 1);

        let view = query.apply(&collection);
        assert_eq!(ids(&view), alloc::vec![c.id()]);
    }

    #[test]
    fn test_sorted_limited_view_patches_incrementally() {
        let engine = Engine::new();
        let collection = engine.list([]);
        let query = engine
            .query()
            .filter("id", Op::Gt, 0i64)
            .order_by("id", Direction::Asc)
            .limit(2);

        let lengths: Rc<Cell<usize>> = Rc::new(Cell::new(0));
        let lengths_clone = lengths.clone();
        let query_handle = query.clone();
        let collection_handle = collection.clone();
        engine.autorun(move || {
            lengths_clone.set(query_handle.apply(&collection_handle).len());
        });

        let by_id = |id: i64| engine.record([("id", Value::Int(id))]);
        collection.push(&by_id(5));
        collection.push(&by_id(3));
        collection.push(&by_id(4));

        let view = query.apply(&collection);
        let sorted: Vec<Option<Value>> =
            view.records().iter().map(|record| engine.isolate(|| record.get("id"))).collect();
        assert_eq!(sorted, alloc::vec![Some(Value::Int(3)), Some(Value::Int(4))]);
        assert_eq!(lengths.get(), 2);
    }
}
