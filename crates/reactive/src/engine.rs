//! The engine: arenas, the active-computation stack and the batch window.
//!
//! All state lives behind one shared handle. The engine is strictly
//! single-threaded: every operation runs synchronously to completion, and
//! nested computation runs are modeled as an explicit save/restore stack of
//! active-computation frames (a `None` frame suspends dependency tracking).

use crate::arena::Arena;
use crate::computation::{ComputationId, ComputationState, SlaveRegistration};
use crate::observable::{Event, ObservableId, ObservableState, Subscriber, SubscriptionId};
use crate::view::{ViewKey, ViewState};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::{HashMap, HashSet};
use rill_query::CursorCache;

/// Engine construction options.
#[derive(Clone, Copy, Debug, Default)]
pub struct EngineOptions {
    /// How nested runs record slave edges; see `SlaveRegistration`.
    pub slave_registration: SlaveRegistration,
}

/// One batch window: computations queued for re-run, deduplicated by id.
///
/// Each entry records the computation's tick at enqueue time; a queued
/// computation whose tick has advanced by the time the drain reaches it
/// already re-ran through another path (typically nested under a parent that
/// drained earlier) and is skipped.
pub(crate) struct Batch {
    pub(crate) queue: Vec<(ComputationId, u64)>,
    pub(crate) next: usize,
    pub(crate) seen: HashSet<ComputationId>,
}

impl Batch {
    fn new() -> Self {
        Self {
            queue: Vec::new(),
            next: 0,
            seen: HashSet::new(),
        }
    }
}

pub(crate) struct EngineInner {
    pub(crate) options: EngineOptions,
    pub(crate) computations: Arena<ComputationState>,
    pub(crate) observables: Arena<ObservableState>,
    /// Save/restore stack of active computations; `None` frames isolate.
    pub(crate) active: Vec<Option<ComputationId>>,
    pub(crate) batch: Option<Batch>,
    pub(crate) cursors: CursorCache,
    pub(crate) views: HashMap<ViewKey, ViewState>,
    pub(crate) next_subscription: SubscriptionId,
}

impl EngineInner {
    /// Adds a subscriber to `(target, event)`, idempotently.
    ///
    /// Computation subscribers also record the tick they observed the target
    /// at; the recorded tick going out of date is what lets `emit` prune the
    /// subscription later.
    pub(crate) fn subscribe(&mut self, target: ObservableId, event: Event, subscriber: Subscriber) {
        if let Subscriber::Computation(cid) = subscriber {
            let Some(tick) = self.computations.get(cid.0).map(|state| state.tick) else {
                return;
            };
            if let Some(state) = self.observables.get_mut(target.0) {
                state.observer_ticks.insert(cid, tick);
            }
        }
        if let Some(state) = self.observables.get_mut(target.0) {
            let list = state.listeners.entry(event).or_default();
            if !list.contains(&subscriber) {
                list.push(subscriber);
            }
        }
    }

    /// Removes a subscriber from `(target, event)`. Redundant calls no-op.
    pub(crate) fn unsubscribe(
        &mut self,
        target: ObservableId,
        event: &Event,
        subscriber: &Subscriber,
    ) {
        if let Some(state) = self.observables.get_mut(target.0) {
            if let Some(list) = state.listeners.get_mut(event) {
                list.retain(|s| s != subscriber);
            }
            // drop the tick entry once the computation is off every list
            if let Subscriber::Computation(cid) = subscriber {
                let still_listed = state
                    .listeners
                    .values()
                    .any(|list| list.iter().any(|s| s == subscriber));
                if !still_listed {
                    state.observer_ticks.remove(cid);
                }
            }
        }
    }
}

/// Shared handle to one reactive engine.
///
/// Cloning is cheap; every clone refers to the same arenas, active stack and
/// batch state. Handles returned by the engine (`Computation`, `Record`,
/// `List`, `Query`) carry their own clone.
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Rc<RefCell<EngineInner>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine with default options.
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// Creates an engine with explicit options.
    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            inner: Rc::new(RefCell::new(EngineInner {
                options,
                computations: Arena::new(),
                observables: Arena::new(),
                active: Vec::new(),
                batch: None,
                cursors: CursorCache::new(),
                views: HashMap::new(),
                next_subscription: 1,
            })),
        }
    }

    /// Runs `f` with dependency tracking suspended: reads performed inside
    /// establish no subscriptions.
    pub fn isolate<T>(&self, f: impl FnOnce() -> T) -> T {
        self.inner.borrow_mut().active.push(None);
        let result = f();
        self.inner.borrow_mut().active.pop();
        result
    }

    /// Runs `f` inside one batch window.
    ///
    /// Every mutation performed by `f` joins the same window, so a
    /// computation depending on several of the mutated sources re-runs
    /// exactly once, after all of them have taken effect. Nested calls join
    /// the existing window.
    pub fn batch<T>(&self, f: impl FnOnce() -> T) -> T {
        let is_root = self.open_batch();
        let result = f();
        if is_root {
            self.flush();
        }
        result
    }

    /// Opens the batch window if none is open. Returns whether this call
    /// became the window's root.
    pub(crate) fn open_batch(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.batch.is_none() {
            inner.batch = Some(Batch::new());
            true
        } else {
            false
        }
    }

    /// Drains the batch queue, then closes the window.
    ///
    /// Re-runs happen under an isolation frame so they are roots rather than
    /// slaves of whoever triggered the flush; emits they raise join the still
    /// open window and extend the queue.
    pub(crate) fn flush(&self) {
        loop {
            let next = {
                let mut inner = self.inner.borrow_mut();
                let inner = &mut *inner;
                let mut next = None;
                while let Some(batch) = inner.batch.as_mut() {
                    if batch.next >= batch.queue.len() {
                        break;
                    }
                    let (id, enqueued_tick) = batch.queue[batch.next];
                    batch.next += 1;
                    // skip entries that re-ran through another path or went
                    // stale while queued
                    let runnable = inner
                        .computations
                        .get(id.0)
                        .map_or(false, |state| !state.invalidated && state.tick == enqueued_tick);
                    if runnable {
                        next = Some(id);
                        break;
                    }
                }
                next
            };

            let Some(id) = next else {
                break;
            };

            self.inner.borrow_mut().active.push(None);
            self.notify_computation(id);
            self.inner.borrow_mut().active.pop();
        }

        self.inner.borrow_mut().batch = None;
    }

    /// Returns the number of live computations.
    pub fn computation_count(&self) -> usize {
        self.inner.borrow().computations.len()
    }

    /// Returns the number of live observables (views' derived lists
    /// included).
    pub fn observable_count(&self) -> usize {
        self.inner.borrow().observables.len()
    }

    /// Returns the number of cached views.
    pub fn view_count(&self) -> usize {
        self.inner.borrow().views.len()
    }

    /// Returns the number of compiled cursors.
    pub fn cursor_count(&self) -> usize {
        self.inner.borrow().cursors.len()
    }
}
