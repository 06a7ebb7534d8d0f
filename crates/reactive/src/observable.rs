//! Observable records and lists.
//!
//! Records and lists are born instrumented: they live in the engine's
//! observable arena with per-event subscriber lists. Reading a record field
//! while a computation is active subscribes that computation to the field's
//! change event (and, for list-valued fields, to the list's push/splice
//! events); writes compare strictly against the previous value and emit
//! change events when it differs. List members forward their change events to
//! the owning list, so observing a list transitively observes mutations of
//! its members without per-item subscriptions.
//!
//! `emit` is where batching happens: computation subscribers are deduplicated
//! into the current batch window and run once it closes, while structural
//! subscribers (view hooks, member-change forwarders) and plain callbacks
//! fire immediately in subscription order. Stale computation subscribers --
//! destroyed, invalidated, or re-run since they subscribed -- are pruned
//! during `emit` instead of being notified.

use crate::arena::RawId;
use crate::computation::ComputationId;
use crate::engine::Engine;
use crate::view::{ViewHookKind, ViewKey};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::HashMap;
use rill_core::Value;

/// Generational identity of an observable value in the engine's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObservableId(pub(crate) RawId);

/// Identifier of a plain-callback subscription.
pub type SubscriptionId = u64;

/// The closed set of events an observable can emit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// A record field changed (emitted on the record and forwarded to any
    /// list the record is a member of).
    Change,
    /// A specific record field changed.
    ChangeProp(String),
    /// An element was appended to a list.
    Push,
    /// Elements were removed from a list.
    Splice,
    /// A derived view's contents went out of date.
    Invalidate,
}

impl Event {
    /// Convenience constructor for `Event::ChangeProp`.
    pub fn change_prop(property: impl Into<String>) -> Self {
        Event::ChangeProp(property.into())
    }
}

/// The slot content of a record field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldData {
    /// A literal value.
    Value(Value),
    /// A nested observable list.
    List(ObservableId),
}

/// Event payloads, mirroring the emitting event.
#[derive(Clone, Debug)]
pub enum Payload {
    Change {
        target: ObservableId,
        property: String,
        value: FieldData,
        previous: Option<FieldData>,
    },
    Push {
        target: ObservableId,
        item: ObservableId,
    },
    Splice {
        target: ObservableId,
    },
    Invalidate {
        target: ObservableId,
    },
}

/// An entry in an observable's per-event subscriber list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Subscriber {
    /// A computation; deduplicated into the batch rather than run inline.
    Computation(ComputationId),
    /// Re-emit the payload as `Change` on the owning list (member wiring).
    Forward(ObservableId),
    /// A view maintenance hook on the base collection.
    ViewHook(ViewKey, ViewHookKind),
    /// A plain callback; fires immediately.
    Callback(SubscriptionId),
}

pub(crate) enum ObservableKind {
    Record { fields: HashMap<String, FieldData> },
    List { members: Vec<ObservableId> },
}

pub(crate) struct ObservableState {
    pub(crate) kind: ObservableKind,
    pub(crate) listeners: HashMap<Event, Vec<Subscriber>>,
    /// Tick each subscribed computation last observed this value at; a
    /// mismatch at emit time means the subscription is stale.
    pub(crate) observer_ticks: HashMap<ComputationId, u64>,
    pub(crate) callbacks: HashMap<SubscriptionId, Rc<dyn Fn(&Payload)>>,
}

impl ObservableState {
    pub(crate) fn new(kind: ObservableKind) -> Self {
        Self {
            kind,
            listeners: HashMap::new(),
            observer_ticks: HashMap::new(),
            callbacks: HashMap::new(),
        }
    }

    /// Reads a literal field value; list-valued slots read as `None`.
    pub(crate) fn field_value(&self, property: &str) -> Option<Value> {
        match &self.kind {
            ObservableKind::Record { fields } => match fields.get(property) {
                Some(FieldData::Value(value)) => Some(value.clone()),
                _ => None,
            },
            ObservableKind::List { .. } => None,
        }
    }

    pub(crate) fn members(&self) -> &[ObservableId] {
        match &self.kind {
            ObservableKind::List { members } => members,
            ObservableKind::Record { .. } => &[],
        }
    }

    pub(crate) fn subscriber_count(&self, event: &Event) -> usize {
        self.listeners.get(event).map_or(0, |list| list.len())
    }
}

/// Handle to an observable record.
#[derive(Clone)]
pub struct Record {
    pub(crate) engine: Engine,
    pub(crate) id: ObservableId,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl core::fmt::Debug for Record {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Record").field(&self.id).finish()
    }
}

impl Record {
    /// Returns this record's identity.
    #[inline]
    pub fn id(&self) -> ObservableId {
        self.id
    }

    /// Reads a field, subscribing the active computation.
    fn read(&self, property: &str) -> Option<FieldData> {
        let mut inner = self.engine.inner.borrow_mut();
        let inner = &mut *inner;

        let field = inner.observables.get(self.id.0).and_then(|state| match &state.kind {
            ObservableKind::Record { fields } => fields.get(property).cloned(),
            ObservableKind::List { .. } => None,
        });

        if let Some(active) = inner.active.last().copied().flatten() {
            inner.subscribe(
                self.id,
                Event::change_prop(property),
                Subscriber::Computation(active),
            );
            // a list-valued field is observed transitively through its owner
            if let Some(FieldData::List(list_id)) = &field {
                inner.subscribe(*list_id, Event::Push, Subscriber::Computation(active));
                inner.subscribe(*list_id, Event::Splice, Subscriber::Computation(active));
            }
        }

        field
    }

    /// Returns the literal value of a field, `None` if absent or list-valued.
    pub fn get(&self, property: &str) -> Option<Value> {
        match self.read(property) {
            Some(FieldData::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns the list held by a field, `None` if absent or literal-valued.
    pub fn get_list(&self, property: &str) -> Option<List> {
        match self.read(property) {
            Some(FieldData::List(id)) => Some(List {
                engine: self.engine.clone(),
                id,
            }),
            _ => None,
        }
    }

    /// Returns whatever a field holds.
    pub fn field(&self, property: &str) -> Option<FieldData> {
        self.read(property)
    }

    /// Writes a literal field value.
    pub fn set(&self, property: &str, value: impl Into<Value>) {
        self.store(property, FieldData::Value(value.into()));
    }

    /// Points a field at an observable list.
    pub fn set_list(&self, property: &str, list: &List) {
        self.store(property, FieldData::List(list.id));
    }

    fn store(&self, property: &str, value: FieldData) {
        let previous = {
            let mut inner = self.engine.inner.borrow_mut();
            let Some(state) = inner.observables.get_mut(self.id.0) else {
                return;
            };
            let ObservableKind::Record { fields } = &mut state.kind else {
                return;
            };

            let previous = fields.get(property).cloned();
            let unchanged = match (&previous, &value) {
                (Some(FieldData::Value(prev)), FieldData::Value(next)) => prev.strict_eq(next),
                (Some(FieldData::List(prev)), FieldData::List(next)) => prev == next,
                _ => false,
            };
            if unchanged {
                return;
            }

            fields.insert(String::from(property), value.clone());
            previous
        };

        let payload = Payload::Change {
            target: self.id,
            property: String::from(property),
            value,
            previous,
        };

        // one batch window spans both events so a single write is one batch
        self.engine.batch(|| {
            self.engine
                .emit(self.id, Event::change_prop(property), payload.clone());
            self.engine.emit(self.id, Event::Change, payload);
        });
    }

    /// Subscribes a plain callback; it fires synchronously on every emit.
    pub fn subscribe_fn<F>(&self, event: Event, f: F) -> SubscriptionId
    where
        F: Fn(&Payload) + 'static,
    {
        self.engine.subscribe_callback(self.id, event, Rc::new(f))
    }

    /// Removes a callback subscription. Redundant calls are no-ops.
    pub fn unsubscribe(&self, event: &Event, subscription: SubscriptionId) {
        self.engine.unsubscribe_callback(self.id, event, subscription);
    }

    /// Emits an event on this record.
    pub fn emit(&self, event: Event, payload: Payload) {
        self.engine.emit(self.id, event, payload);
    }
}

/// Handle to an observable list of records.
#[derive(Clone)]
pub struct List {
    pub(crate) engine: Engine,
    pub(crate) id: ObservableId,
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl core::fmt::Debug for List {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("List").field(&self.id).finish()
    }
}

impl List {
    /// Returns this list's identity.
    #[inline]
    pub fn id(&self) -> ObservableId {
        self.id
    }

    /// Appends a record, wires its change forwarding and emits `Push`.
    pub fn push(&self, record: &Record) {
        {
            let mut inner = self.engine.inner.borrow_mut();
            let inner = &mut *inner;
            {
                let Some(state) = inner.observables.get_mut(self.id.0) else {
                    return;
                };
                let ObservableKind::List { members } = &mut state.kind else {
                    return;
                };
                members.push(record.id);
            }
            inner.subscribe(record.id, Event::Change, Subscriber::Forward(self.id));
        }

        self.engine.emit(
            self.id,
            Event::Push,
            Payload::Push {
                target: self.id,
                item: record.id,
            },
        );
    }

    /// Removes up to `delete_count` records starting at `start` and emits
    /// `Splice`. Returns the removed records.
    pub fn splice(&self, start: usize, delete_count: usize) -> Vec<Record> {
        let removed: Vec<ObservableId> = {
            let mut inner = self.engine.inner.borrow_mut();
            let inner = &mut *inner;

            let removed = {
                let Some(state) = inner.observables.get_mut(self.id.0) else {
                    return Vec::new();
                };
                let ObservableKind::List { members } = &mut state.kind else {
                    return Vec::new();
                };
                let start = start.min(members.len());
                let end = (start + delete_count).min(members.len());
                members.drain(start..end).collect::<Vec<_>>()
            };

            for member in &removed {
                let still_member = inner
                    .observables
                    .get(self.id.0)
                    .map_or(false, |state| state.members().contains(member));
                if !still_member {
                    inner.unsubscribe(*member, &Event::Change, &Subscriber::Forward(self.id));
                }
            }

            removed
        };

        self.engine
            .emit(self.id, Event::Splice, Payload::Splice { target: self.id });

        removed
            .into_iter()
            .map(|id| Record {
                engine: self.engine.clone(),
                id,
            })
            .collect()
    }

    /// Returns the number of members. Untracked.
    pub fn len(&self) -> usize {
        self.engine
            .inner
            .borrow()
            .observables
            .get(self.id.0)
            .map_or(0, |state| state.members().len())
    }

    /// Returns true if the list has no members. Untracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the member at `index`. Untracked.
    pub fn get(&self, index: usize) -> Option<Record> {
        self.engine
            .inner
            .borrow()
            .observables
            .get(self.id.0)
            .and_then(|state| state.members().get(index).copied())
            .map(|id| Record {
                engine: self.engine.clone(),
                id,
            })
    }

    /// Returns a snapshot of the members. Untracked.
    pub fn records(&self) -> Vec<Record> {
        self.engine
            .inner
            .borrow()
            .observables
            .get(self.id.0)
            .map(|state| state.members().to_vec())
            .unwrap_or_default()
            .into_iter()
            .map(|id| Record {
                engine: self.engine.clone(),
                id,
            })
            .collect()
    }

    /// Subscribes a plain callback; it fires synchronously on every emit.
    pub fn subscribe_fn<F>(&self, event: Event, f: F) -> SubscriptionId
    where
        F: Fn(&Payload) + 'static,
    {
        self.engine.subscribe_callback(self.id, event, Rc::new(f))
    }

    /// Removes a callback subscription. Redundant calls are no-ops.
    pub fn unsubscribe(&self, event: &Event, subscription: SubscriptionId) {
        self.engine.unsubscribe_callback(self.id, event, subscription);
    }

    /// Emits an event on this list.
    pub fn emit(&self, event: Event, payload: Payload) {
        self.engine.emit(self.id, event, payload);
    }
}

impl Engine {
    /// Creates an observable record from (field, value) pairs.
    ///
    /// Records are instrumented at construction, so re-observing one is
    /// inherently a no-op; handles are plain (engine, id) pairs and cloning
    /// them preserves identity.
    pub fn record<K, I>(&self, fields: I) -> Record
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let fields: HashMap<String, FieldData> = fields
            .into_iter()
            .map(|(key, value)| (key.into(), FieldData::Value(value)))
            .collect();
        let id = ObservableId(
            self.inner
                .borrow_mut()
                .observables
                .insert(ObservableState::new(ObservableKind::Record { fields })),
        );
        Record {
            engine: self.clone(),
            id,
        }
    }

    /// Creates an observable list, wiring change forwarding for the initial
    /// members.
    pub fn list<I>(&self, members: I) -> List
    where
        I: IntoIterator<Item = Record>,
    {
        let member_ids: Vec<ObservableId> = members.into_iter().map(|record| record.id).collect();

        let id = {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;
            let id = ObservableId(inner.observables.insert(ObservableState::new(
                ObservableKind::List {
                    members: member_ids.clone(),
                },
            )));
            for member in member_ids {
                inner.subscribe(member, Event::Change, Subscriber::Forward(id));
            }
            id
        };

        List {
            engine: self.clone(),
            id,
        }
    }

    pub(crate) fn subscribe_callback(
        &self,
        target: ObservableId,
        event: Event,
        callback: Rc<dyn Fn(&Payload)>,
    ) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let subscription = inner.next_subscription;
        inner.next_subscription += 1;
        if let Some(state) = inner.observables.get_mut(target.0) {
            state.callbacks.insert(subscription, callback);
        }
        inner.subscribe(target, event, Subscriber::Callback(subscription));
        subscription
    }

    pub(crate) fn unsubscribe_callback(
        &self,
        target: ObservableId,
        event: &Event,
        subscription: SubscriptionId,
    ) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        inner.unsubscribe(target, event, &Subscriber::Callback(subscription));
        if let Some(state) = inner.observables.get_mut(target.0) {
            state.callbacks.remove(&subscription);
        }
    }

    /// Emits `event` on `target`.
    ///
    /// The outermost emit on the call stack opens the batch window; every
    /// emit raised while it is open -- including those raised by computations
    /// re-running during the drain -- joins it. Within one window each
    /// affected computation is enqueued at most once.
    pub(crate) fn emit(&self, target: ObservableId, event: Event, payload: Payload) {
        let is_root = self.open_batch();

        let subscribers: Vec<Subscriber> = {
            let inner = self.inner.borrow();
            inner
                .observables
                .get(target.0)
                .and_then(|state| state.listeners.get(&event))
                .cloned()
                .unwrap_or_default()
        };

        for subscriber in subscribers {
            match subscriber {
                Subscriber::Computation(cid) => {
                    let mut inner = self.inner.borrow_mut();
                    let inner = &mut *inner;

                    let live_tick = match inner.computations.get(cid.0) {
                        None => None,
                        Some(state) => {
                            let observed = inner
                                .observables
                                .get(target.0)
                                .and_then(|o| o.observer_ticks.get(&cid).copied());
                            if state.invalidated || observed != Some(state.tick) {
                                None
                            } else {
                                Some(state.tick)
                            }
                        }
                    };

                    match live_tick {
                        None => {
                            // destroyed, invalidated, or re-ran since it
                            // subscribed; drop the subscription instead of
                            // notifying
                            if let Some(state) = inner.observables.get_mut(target.0) {
                                if let Some(list) = state.listeners.get_mut(&event) {
                                    list.retain(|s| s != &Subscriber::Computation(cid));
                                }
                                state.observer_ticks.remove(&cid);
                            }
                        }
                        Some(tick) => {
                            if let Some(batch) = inner.batch.as_mut() {
                                if batch.seen.insert(cid) {
                                    batch.queue.push((cid, tick));
                                }
                            }
                        }
                    }
                }
                Subscriber::Forward(owner) => {
                    self.emit(owner, Event::Change, payload.clone());
                }
                Subscriber::ViewHook(key, kind) => {
                    self.dispatch_view_hook(key, kind, &payload);
                }
                Subscriber::Callback(subscription) => {
                    let callback = self
                        .inner
                        .borrow()
                        .observables
                        .get(target.0)
                        .and_then(|state| state.callbacks.get(&subscription).cloned());
                    if let Some(callback) = callback {
                        (*callback)(&payload);
                    }
                }
            }
        }

        if is_root {
            self.flush();
        }
    }
}
