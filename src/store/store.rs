use std::cell::{Cell, OnceCell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use super::action::{Action, ActionCreator, Creation, Dispatched, Dispatcher, LocalBoxFuture, PendingCommit, Thunked};
use super::computed::{self, ComputedProp};
use super::config::StoreConfig;
use super::linked::{Deferred, LinkSource, LinkedProp};
use super::notify::{Listener, Subscribers, Subscription};
use super::observed::{Observable, ObservedProp};
use super::pipeline::{Middleware, Raise, Reduced, Reducer};
use crate::describe::{Builder, Describer, DescribingContext, Evaluator, Mapping, Redescribe};
use crate::error::{Result, StoreError};
use crate::runtime::ReactiveRuntime;
use crate::util::{has_runtime, Selector};
use crate::value::Value;

pub(crate) struct StoreInner {
    pub(super) id: usize,
    pub(super) label: Arc<str>,
    pub(super) config: StoreConfig,
    pub(super) state: RefCell<Value>,
    pub(super) reducers: RefCell<Vec<Reducer>>,
    pub(super) middleware: RefCell<Vec<Rc<dyn Middleware>>>,
    pub(super) computed: RefCell<Vec<Rc<ComputedProp>>>,
    pub(super) links: RefCell<Vec<Rc<LinkedProp>>>,
    /// Stores declared with `add_store` and not yet claimed by a property.
    pub(super) staged: RefCell<Vec<Store>>,
    pub(super) actions: RefCell<BTreeMap<Arc<str>, ActionCreator>>,
    pub(super) subscribers: Subscribers,
    pub(super) syncing: Cell<bool>,
    /// Observables declared with `add_observable` and not yet claimed.
    pub(super) staged_observables: RefCell<Vec<Rc<dyn Observable>>>,
    pub(super) observed: RefCell<Vec<Rc<ObservedProp>>>,
    /// Remote store ids the downstream handler is subscribed to.
    pub(super) wired: RefCell<HashSet<usize>>,
    pub(super) downstream: OnceCell<Deferred>,
    pub(super) observer: OnceCell<Deferred>,
    /// Held on linked stores and observables; released on drop.
    pub(super) remote_subscriptions: RefCell<Vec<Subscription>>,
    pub(super) described: Cell<bool>,
    async_issued: Cell<u64>,
    async_committed: Cell<u64>,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        for subscription in self.remote_subscriptions.get_mut().drain(..) {
            subscription.unsubscribe();
        }
    }
}

/// A state container built from describers.
///
/// Every committed change replaces the state wholesale; snapshots handed out
/// by [`state`](Store::state) or to subscribers never change afterwards.
/// Cloning a `Store` yields another handle to the same store.
///
/// Stores are single-threaded. Linked properties and asynchronous thunks
/// schedule work with `tokio::task::spawn_local` and need a
/// [`LocalSet`](tokio::task::LocalSet); everything else runs inline. Without
/// any tokio runtime, downstream link pulls run inline and asynchronous thunks
/// fail with [`StoreError::NoRuntime`].
#[derive(Clone)]
pub struct Store {
    pub(super) inner: Rc<StoreInner>,
}

impl Store {
    fn new(initial: Value, config: StoreConfig) -> Self {
        let id = ReactiveRuntime::current().next_id();
        let label = config
            .name
            .clone()
            .unwrap_or_else(|| Arc::from(format!("store#{id}")));
        Self {
            inner: Rc::new(StoreInner {
                id,
                label,
                config,
                state: RefCell::new(initial),
                reducers: RefCell::new(Vec::new()),
                middleware: RefCell::new(Vec::new()),
                computed: RefCell::new(Vec::new()),
                links: RefCell::new(Vec::new()),
                staged: RefCell::new(Vec::new()),
                staged_observables: RefCell::new(Vec::new()),
                observed: RefCell::new(Vec::new()),
                actions: RefCell::new(BTreeMap::new()),
                subscribers: Subscribers::default(),
                syncing: Cell::new(false),
                wired: RefCell::new(HashSet::new()),
                downstream: OnceCell::new(),
                observer: OnceCell::new(),
                remote_subscriptions: RefCell::new(Vec::new()),
                described: Cell::new(false),
                async_issued: Cell::new(0),
                async_committed: Cell::new(0),
            }),
        }
    }

    pub(super) fn from_inner(inner: Rc<StoreInner>) -> Self {
        Self { inner }
    }

    /// Identity drawn from the runtime at construction.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Name used in log events.
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Settings fixed when the store was built, such as its name and the
    /// delay of downstream and observed syncs.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// The current snapshot.
    pub fn state(&self) -> Value {
        self.inner.state.borrow().clone()
    }

    /// Dispatch an action.
    ///
    /// Action creators run first and decide the shape of the dispatch; plain
    /// tags go through the middleware chain and the reducers. See
    /// [`Creation`] and [`Thunked`].
    pub fn dispatch(&self, action: impl Into<Action>, payload: impl Into<Value>) -> Result<Dispatched> {
        let action = action.into();
        let payload = payload.into();
        tracing::trace!(store = %self.label(), action = action.name(), "dispatch");

        let creator = match &action {
            Action::Creator(creator) => Some(creator.clone()),
            Action::Init | Action::Named(_) => None,
        };
        let Some(creator) = creator else {
            self.run_pipeline(action, payload)?;
            return Ok(Dispatched::Settled);
        };

        match creator.create(payload) {
            Creation::Payload(payload) => {
                self.run_pipeline(action, payload)?;
                Ok(Dispatched::Settled)
            }
            Creation::Thunk(thunk) => match thunk(&self.state()) {
                Thunked::State(next) => {
                    self.force_set(next);
                    Ok(Dispatched::Settled)
                }
                Thunked::Async(future) => Ok(Dispatched::Pending(self.commit_later(future)?)),
                Thunked::Deep(orchestrate) => orchestrate(self),
            },
        }
    }

    /// Dispatch an action object: a record whose string `type` field is the
    /// tag and whose other fields are the payload.
    pub fn dispatch_object(&self, object: impl Into<Value>) -> Result<Dispatched> {
        let object = object.into();
        let tag = object
            .field("type")
            .and_then(Value::as_str)
            .map(Action::named)
            .ok_or(StoreError::UntypedAction)?;
        self.run_pipeline(tag, object.without_field("type"))?;
        Ok(Dispatched::Settled)
    }

    /// Deliver every committed state to `callback`.
    pub fn subscribe(&self, callback: impl Fn(&Value) + 'static) -> Subscription {
        self.inner.subscribers.add(Listener::new(callback))
    }

    /// Subscribe an existing listener. Aliases of one listener receive each
    /// state once per notification pass.
    pub fn subscribe_listener(&self, listener: &Listener) -> Subscription {
        self.inner.subscribers.add(listener.clone())
    }

    /// A named dispatcher registered with `with_action`.
    pub fn action(&self, name: &str) -> Option<Dispatcher> {
        let creator = self.inner.actions.borrow().get(name).cloned()?;
        Some(Dispatcher::new(self, creator))
    }

    /// Replace the state and run sync, recompute and notify.
    ///
    /// Reserved for the kernel and for linked stores. The `same` state is a
    /// no-op.
    pub(crate) fn force_set(&self, next: Value) -> bool {
        if next.same(&self.inner.state.borrow()) {
            return false;
        }
        self.commit(next);
        true
    }

    pub(super) fn commit(&self, next: Value) {
        self.replace_state(next);
        self.push_upstream();
        self.recompute();
        self.notify();
    }

    pub(super) fn replace_state(&self, next: Value) {
        *self.inner.state.borrow_mut() = next;
    }

    pub(super) fn recompute(&self) {
        let props = self.inner.computed.borrow().clone();
        if props.is_empty() {
            return;
        }
        let state = self.state();
        let next = computed::recompute(&state, &props);
        if !next.same(&state) {
            self.replace_state(next);
        }
    }

    pub(super) fn notify(&self) {
        self.inner.subscribers.notify(&|| self.state());
    }

    /// Commit the awaited value on a later tick unless a newer asynchronous
    /// value has committed in the meantime.
    fn commit_later(&self, future: LocalBoxFuture<Value>) -> Result<PendingCommit> {
        if !has_runtime() {
            tracing::warn!(store = %self.label(), "dropping async thunk: no tokio runtime on this thread");
            return Err(StoreError::NoRuntime {
                operation: "async thunk",
            });
        }
        let ticket = self.inner.async_issued.get() + 1;
        self.inner.async_issued.set(ticket);
        let weak = Rc::downgrade(&self.inner);

        Ok(PendingCommit::new(tokio::task::spawn_local(async move {
            let next = future.await;
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let store = Store::from_inner(inner);
            if ticket < store.inner.async_committed.get() {
                tracing::debug!(store = %store.label(), ticket, "discarding superseded async value");
                return false;
            }
            store.inner.async_committed.set(ticket);
            store.force_set(next);
            true
        })))
    }

    /// Apply describers, run the init action for the reducers they added,
    /// wire and pull links, read observed fields, and recompute.
    pub(crate) fn describe(&self, describers: Vec<Describer>) -> Result<()> {
        let first = !self.inner.described.replace(true);
        let before = self.state();
        let reducers_before = self.inner.reducers.borrow().len();

        {
            let mut cx = DescribingContext::for_store(self);
            for describer in describers {
                describer.apply(&mut cx)?;
            }
        }

        let fresh: Vec<Reducer> = self.inner.reducers.borrow()[reducers_before..].to_vec();
        let mut raise = Raise::default();
        if !fresh.is_empty() {
            let payload = Value::empty_record();
            let state = self.state();
            let initialized = fresh.iter().fold(state, |state, reducer| {
                match reducer(&state, &Action::Init, &payload) {
                    Reduced::State(next) => next,
                    Reduced::Later(request) => {
                        request(&mut raise);
                        state
                    }
                }
            });
            self.replace_state(initialized);
        }

        let has_links = !self.inner.links.borrow().is_empty();
        let has_observed = !self.inner.observed.borrow().is_empty();
        if (has_links || has_observed) && self.state().is_null() {
            self.replace_state(Value::empty_record());
        }
        if has_links {
            self.wire_downstream();
            self.pull_links();
        }
        if has_observed {
            self.pull_observed();
        }
        self.recompute();

        if !first && !self.state().same(&before) {
            self.notify();
        }
        tracing::debug!(
            store = %self.label(),
            reducers = self.inner.reducers.borrow().len(),
            middleware = self.inner.middleware.borrow().len(),
            computed = self.inner.computed.borrow().len(),
            links = self.inner.links.borrow().len(),
            observed = self.inner.observed.borrow().len(),
            "described"
        );

        for (action, payload) in raise.into_queue() {
            self.dispatch(action, payload)?;
        }
        Ok(())
    }

    pub(crate) fn register_reducer(&self, reducer: Reducer) {
        self.inner.reducers.borrow_mut().push(reducer);
    }

    /// The newest middleware becomes the outermost layer.
    pub(crate) fn register_middleware(&self, middleware: Rc<dyn Middleware>) {
        self.inner.middleware.borrow_mut().insert(0, middleware);
    }

    pub(crate) fn stage_store(&self, store: Store) {
        self.inner.staged.borrow_mut().push(store);
    }

    /// Register an observed property when observables are staged, otherwise
    /// a computed property, or a linked one backed by the single staged
    /// store. Staged stores and observables are claimed either way.
    pub(crate) fn register_property(
        &self,
        name: Arc<str>,
        evaluator: Evaluator,
        mapping: Mapping,
    ) -> Result<()> {
        let staged = std::mem::take(&mut *self.inner.staged.borrow_mut());
        let observables = std::mem::take(&mut *self.inner.staged_observables.borrow_mut());
        if !observables.is_empty() {
            self.register_observed(name, evaluator, mapping, observables);
            return Ok(());
        }
        let source = match mapping {
            Mapping::Combine(combiner) => {
                self.inner.computed.borrow_mut().push(Rc::new(ComputedProp {
                    name,
                    evaluator,
                    selector: Selector::new(combiner),
                }));
                return Ok(());
            }
            Mapping::Field(field) => LinkSource::Field(field),
            Mapping::Whole => LinkSource::Whole,
        };

        let [remote]: [Store; 1] = staged.try_into().map_err(|staged: Vec<Store>| {
            if staged.is_empty() {
                StoreError::MissingLinkStore {
                    property: Arc::clone(&name),
                }
            } else {
                StoreError::AmbiguousLinkStore {
                    property: Arc::clone(&name),
                    count: staged.len(),
                }
            }
        })?;
        self.inner
            .links
            .borrow_mut()
            .push(Rc::new(LinkedProp::new(name, &remote, source)));
        Ok(())
    }

    /// Register a named dispatcher. An existing name is left untouched.
    pub(crate) fn register_action(&self, name: Arc<str>, creator: ActionCreator) {
        let mut actions = self.inner.actions.borrow_mut();
        if actions.contains_key(&name) {
            tracing::debug!(store = %self.label(), action = %name, "ignoring redefinition of named action");
            return;
        }
        actions.insert(name, creator);
    }

    /// Whether another handle points at the same store.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Subscriptions not yet released, linked stores included.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.live()
    }
}

impl Redescribe for Store {
    fn redescribe(&self, describers: Vec<Describer>) -> Result<()> {
        self.describe(describers)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("state", &self.inner.state.borrow())
            .finish()
    }
}

/// Builds a [`Store`] from an initial state. Pass it to
/// [`compose`](crate::compose).
#[derive(Debug)]
pub struct StoreBuilder {
    initial: Value,
    config: StoreConfig,
}

/// Start building a store with `initial` as its state.
pub fn store(initial: impl Into<Value>) -> StoreBuilder {
    StoreBuilder {
        initial: initial.into(),
        config: StoreConfig::default(),
    }
}

impl StoreBuilder {
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.config = self.config.named(name);
        self
    }

    pub fn link_delay(mut self, delay: Duration) -> Self {
        self.config = self.config.link_delay(delay);
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }
}

impl Builder for StoreBuilder {
    type Output = Store;

    fn build(self, describers: Vec<Describer>) -> Result<Store> {
        let store = Store::new(self.initial, self.config);
        store.describe(describers)?;
        Ok(store)
    }
}
