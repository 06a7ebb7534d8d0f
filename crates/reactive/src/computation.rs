//! Computations: re-runnable units of work with implicit dependency tracking.
//!
//! A computation records its dependencies by running: while it executes it
//! sits on top of the engine's active stack and every observable read
//! subscribes it to the matching change event. Nested computations invoked
//! during a run become *slaves* of the outer computation; a slave that the
//! next run no longer invokes is marked invalidated, which causes every
//! subscriber list that still carries it to drop it lazily.

use crate::arena::RawId;
use crate::engine::Engine;
use alloc::rc::Rc;
use core::any::Any;
use core::cell::RefCell;
use hashbrown::HashSet;

/// Generational identity of a computation in the engine's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComputationId(pub(crate) RawId);

pub(crate) type ExecutorFn = Rc<RefCell<dyn FnMut() -> Rc<dyn Any>>>;
pub(crate) type NotifyFn = Rc<RefCell<dyn FnMut(&Rc<dyn Any>)>>;

/// Which runs register a nested computation as a slave of the active one.
///
/// The engine historically shipped two variants of this rule; the scenarios
/// they produce differ observably, so both are kept selectable. `Always` is
/// the default: every nested run records a slave edge, so stale slaves are
/// invalidated when their parent stops invoking them and `destroy` can
/// cascade. `OnlyWhenPresent` records an edge only when one already exists,
/// which in practice records nothing and leaves nested computations
/// independently subscribed until their own subscriptions go stale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlaveRegistration {
    #[default]
    Always,
    OnlyWhenPresent,
}

pub(crate) struct ComputationState {
    pub(crate) tick: u64,
    pub(crate) executor: Option<ExecutorFn>,
    pub(crate) on_notify: Option<NotifyFn>,
    pub(crate) slaves: HashSet<ComputationId>,
    pub(crate) last_result: Option<Rc<dyn Any>>,
    pub(crate) invalidated: bool,
}

/// Options applied when creating a computation.
#[derive(Default)]
pub struct ComputationOptions {
    pub(crate) on_notify: Option<NotifyFn>,
}

impl ComputationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoked with the fresh result after every `notify()`-triggered run.
    pub fn on_notify<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Rc<dyn Any>) + 'static,
    {
        let hook: NotifyFn = Rc::new(RefCell::new(f));
        self.on_notify = Some(hook);
        self
    }
}

/// Handle to a computation stored in the engine.
///
/// Handles are cheap clones of (engine, id); the computation itself lives in
/// the engine arena until destroyed.
#[derive(Clone)]
pub struct Computation {
    pub(crate) engine: Engine,
    pub(crate) id: ComputationId,
}

impl Computation {
    /// Returns this computation's identity.
    #[inline]
    pub fn id(&self) -> ComputationId {
        self.id
    }

    /// Runs the executor, re-recording dependencies.
    ///
    /// If another computation is active this one is registered as its slave
    /// (subject to the engine's `SlaveRegistration` rule) and a pending
    /// invalidation on this one is cancelled. Returns the produced result, or
    /// `None` if the computation was destroyed.
    pub fn run(&self) -> Option<Rc<dyn Any>> {
        self.engine.run_computation(self.id)
    }

    /// Re-runs and feeds the fresh result to the `on_notify` hook.
    ///
    /// This is the entry point used by the batching emitter.
    pub fn notify(&self) {
        self.engine.notify_computation(self.id);
    }

    /// Destroys the computation: current slaves are marked invalidated and
    /// all captured state is released. Idempotent.
    pub fn destroy(&self) {
        self.engine.destroy_computation(self.id);
    }

    /// Returns true once the computation has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        !self.engine.computation_exists(self.id)
    }

    /// Returns true while the computation carries a pending invalidation.
    pub fn is_invalidated(&self) -> bool {
        self.engine.computation_invalidated(self.id)
    }

    /// Returns the run counter.
    pub fn tick(&self) -> u64 {
        self.engine.computation_tick(self.id)
    }

    /// Returns the result of the most recent run, if any.
    pub fn last_result(&self) -> Option<Rc<dyn Any>> {
        self.engine.computation_last_result(self.id)
    }
}

impl Engine {
    /// Creates a computation without running it.
    pub fn computation<T, F>(&self, f: F) -> Computation
    where
        T: 'static,
        F: FnMut() -> T + 'static,
    {
        self.computation_with(f, ComputationOptions::new())
    }

    /// Creates a computation with options, without running it.
    pub fn computation_with<T, F>(&self, mut f: F, options: ComputationOptions) -> Computation
    where
        T: 'static,
        F: FnMut() -> T + 'static,
    {
        let executor: ExecutorFn = Rc::new(RefCell::new(move || -> Rc<dyn Any> { Rc::new(f()) }));
        let state = ComputationState {
            tick: 0,
            executor: Some(executor),
            on_notify: options.on_notify,
            slaves: HashSet::new(),
            last_result: None,
            invalidated: false,
        };
        let id = ComputationId(self.inner.borrow_mut().computations.insert(state));
        Computation {
            engine: self.clone(),
            id,
        }
    }

    /// Creates a computation, runs it once and returns the initial result,
    /// leaving it reactive to whatever it subscribed to during the run.
    pub fn autorun<T, F>(&self, f: F) -> Rc<T>
    where
        T: 'static,
        F: FnMut() -> T + 'static,
    {
        self.autorun_with(f, ComputationOptions::new())
    }

    /// `autorun` with options.
    pub fn autorun_with<T, F>(&self, f: F, options: ComputationOptions) -> Rc<T>
    where
        T: 'static,
        F: FnMut() -> T + 'static,
    {
        let computation = self.computation_with(f, options);
        let result = computation.run().expect("fresh computation always runs");
        result.downcast::<T>().ok().expect("executor result type")
    }

    pub(crate) fn run_computation(&self, id: ComputationId) -> Option<Rc<dyn Any>> {
        let (executor, old_slaves) = {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;

            if !inner.computations.contains(id.0) {
                return None;
            }

            if let Some(active) = inner.active.last().copied().flatten() {
                if active != id {
                    let register = match inner.options.slave_registration {
                        SlaveRegistration::Always => true,
                        SlaveRegistration::OnlyWhenPresent => inner
                            .computations
                            .get(active.0)
                            .map_or(false, |master| master.slaves.contains(&id)),
                    };
                    if register {
                        if let Some(master) = inner.computations.get_mut(active.0) {
                            master.slaves.insert(id);
                        }
                    }
                }
                // re-observation cancels a pending invalidation
                if let Some(state) = inner.computations.get_mut(id.0) {
                    state.invalidated = false;
                }
            }

            inner.active.push(Some(id));

            match inner.computations.get_mut(id.0) {
                Some(state) => {
                    state.tick += 1;
                    let old_slaves = core::mem::take(&mut state.slaves);
                    (state.executor.clone(), old_slaves)
                }
                None => (None, HashSet::new()),
            }
        };

        let Some(executor) = executor else {
            self.inner.borrow_mut().active.pop();
            return None;
        };

        let result = (&mut *executor.borrow_mut())();

        {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;
            inner.active.pop();

            // a slave from the previous run that this run did not re-invoke
            // is no longer a dependency; mark it stale
            let current = inner
                .computations
                .get(id.0)
                .map(|state| state.slaves.clone())
                .unwrap_or_default();
            for slave in old_slaves {
                if !current.contains(&slave) {
                    if let Some(state) = inner.computations.get_mut(slave.0) {
                        state.invalidated = true;
                    }
                }
            }

            if let Some(state) = inner.computations.get_mut(id.0) {
                state.last_result = Some(result.clone());
            }
        }

        Some(result)
    }

    pub(crate) fn notify_computation(&self, id: ComputationId) {
        let Some(result) = self.run_computation(id) else {
            return;
        };
        let hook = self
            .inner
            .borrow()
            .computations
            .get(id.0)
            .and_then(|state| state.on_notify.clone());
        if let Some(hook) = hook {
            (&mut *hook.borrow_mut())(&result);
        }
    }

    pub(crate) fn destroy_computation(&self, id: ComputationId) {
        let mut inner = self.inner.borrow_mut();
        let Some(state) = inner.computations.remove(id.0) else {
            return;
        };
        for slave in state.slaves {
            if let Some(slave_state) = inner.computations.get_mut(slave.0) {
                slave_state.invalidated = true;
            }
        }
    }

    pub(crate) fn computation_exists(&self, id: ComputationId) -> bool {
        self.inner.borrow().computations.contains(id.0)
    }

    pub(crate) fn computation_invalidated(&self, id: ComputationId) -> bool {
        self.inner
            .borrow()
            .computations
            .get(id.0)
            .map_or(false, |state| state.invalidated)
    }

    pub(crate) fn computation_tick(&self, id: ComputationId) -> u64 {
        self.inner
            .borrow()
            .computations
            .get(id.0)
            .map_or(0, |state| state.tick)
    }

    pub(crate) fn computation_last_result(&self, id: ComputationId) -> Option<Rc<dyn Any>> {
        self.inner
            .borrow()
            .computations
            .get(id.0)
            .and_then(|state| state.last_result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::{Cell, RefCell};

    use crate::engine::EngineOptions;

    #[test]
    fn test_run_returns_result() {
        let engine = Engine::new();
        let computation = engine.computation(|| 42i64);

        assert_eq!(computation.tick(), 0);
        let result = computation.run().unwrap();
        assert_eq!(result.downcast_ref::<i64>(), Some(&42));
        assert_eq!(computation.tick(), 1);

        let last = computation.last_result().unwrap();
        assert_eq!(last.downcast_ref::<i64>(), Some(&42));
    }

    #[test]
    fn test_notify_feeds_on_notify() {
        let engine = Engine::new();

        let log: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let counter = Rc::new(Cell::new(0i64));
        let counter_clone = counter.clone();

        let computation = engine.computation_with(
            move || {
                counter_clone.set(counter_clone.get() + 1);
                counter_clone.get()
            },
            ComputationOptions::new().on_notify(move |result| {
                if let Some(value) = result.downcast_ref::<i64>() {
                    log_clone.borrow_mut().push(*value);
                }
            }),
        );

        computation.notify();
        computation.notify();
        computation.notify();

        assert_eq!(*log.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_autorun_returns_initial_result() {
        let engine = Engine::new();
        let result = engine.autorun(|| 7i64);
        assert_eq!(*result, 7);
    }

    #[test]
    fn test_destroyed_run_is_noop() {
        let engine = Engine::new();
        let computation = engine.computation(|| 1i64);

        computation.destroy();
        assert!(computation.is_destroyed());
        assert!(computation.run().is_none());

        // second destroy is a no-op
        computation.destroy();
        assert!(computation.is_destroyed());
    }

    #[test]
    fn test_destroy_invalidates_slaves() {
        let engine = Engine::new();

        let slave = engine.computation(|| 1i64);
        let slave_handle = slave.clone();
        let master = engine.computation(move || {
            slave_handle.run();
        });

        master.run();
        assert!(!slave.is_invalidated());

        master.destroy();
        assert!(slave.is_invalidated());

        master.destroy();
        assert!(slave.is_invalidated());
    }

    #[test]
    fn test_stale_slave_pruned_after_run() {
        let engine = Engine::new();

        let slave = engine.computation(|| 1i64);
        let slave_handle = slave.clone();
        let wanted = Rc::new(Cell::new(true));
        let wanted_clone = wanted.clone();
        let master = engine.computation(move || {
            if wanted_clone.get() {
                slave_handle.run();
            }
        });

        master.run();
        assert!(!slave.is_invalidated());

        // no longer invoked by its master
        wanted.set(false);
        master.run();
        assert!(slave.is_invalidated());

        // re-observation cancels the pending invalidation
        wanted.set(true);
        master.run();
        assert!(!slave.is_invalidated());
    }

    #[test]
    fn test_only_when_present_records_no_slaves() {
        let engine = Engine::with_options(EngineOptions {
            slave_registration: SlaveRegistration::OnlyWhenPresent,
        });

        let slave = engine.computation(|| 1i64);
        let slave_handle = slave.clone();
        let master = engine.computation(move || {
            slave_handle.run();
        });

        master.run();
        master.destroy();
        assert!(!slave.is_invalidated());
    }

    #[test]
    fn test_destroy_frees_slot() {
        let engine = Engine::new();
        let computation = engine.computation(|| 1i64);
        assert_eq!(engine.computation_count(), 1);

        computation.destroy();
        assert_eq!(engine.computation_count(), 0);

        // the freed slot is reused under a newer generation
        let replacement = engine.computation(|| 2i64);
        assert_eq!(engine.computation_count(), 1);
        assert!(computation.is_destroyed());
        assert!(!replacement.is_destroyed());
    }
}
