//! Fields fed by values the store does not own.
//!
//! An observed field is re-evaluated whenever one of its observables
//! announces a change. Announcements are debounced like downstream link
//! pulls, so a burst commits once.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::linked::Deferred;
use super::notify::{Listener, Subscribers, Subscription};
use super::store::Store;
use crate::describe::{Description, Evaluator, Mapping};
use crate::util::Debounce;
use crate::value::Value;

/// An externally owned value that announces its changes.
///
/// [`Store`] is one; [`ObservableValue`] is a standalone cell. Implementors
/// deliver each new value through [`Listener::call`].
pub trait Observable {
    /// The current value.
    fn get(&self) -> Value;

    /// Deliver later values to `listener` until the subscription is released.
    fn subscribe(&self, listener: &Listener) -> Subscription;
}

impl Observable for Store {
    fn get(&self) -> Value {
        self.state()
    }

    fn subscribe(&self, listener: &Listener) -> Subscription {
        self.subscribe_listener(listener)
    }
}

struct ValueCell {
    value: RefCell<Value>,
    subscribers: Subscribers,
}

/// A shared value that notifies its subscribers when set.
#[derive(Clone)]
pub struct ObservableValue {
    cell: Rc<ValueCell>,
}

impl ObservableValue {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            cell: Rc::new(ValueCell {
                value: RefCell::new(value.into()),
                subscribers: Subscribers::default(),
            }),
        }
    }

    /// Replace the value. Setting the `same` value announces nothing.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        if value.same(&self.cell.value.borrow()) {
            return;
        }
        *self.cell.value.borrow_mut() = value;
        self.cell.subscribers.notify(&|| self.cell.value.borrow().clone());
    }
}

impl Default for ObservableValue {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

impl Observable for ObservableValue {
    fn get(&self) -> Value {
        self.cell.value.borrow().clone()
    }

    fn subscribe(&self, listener: &Listener) -> Subscription {
        self.cell.subscribers.add(listener.clone())
    }
}

impl fmt::Debug for ObservableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableValue")
            .field("value", &self.cell.value.borrow())
            .finish()
    }
}

pub(crate) struct ObservedProp {
    name: Arc<str>,
    evaluator: Evaluator,
    mapping: Mapping,
}

impl Store {
    pub(crate) fn stage_observable(&self, observable: Rc<dyn Observable>) {
        self.inner.staged_observables.borrow_mut().push(observable);
    }

    /// Declare `name` as fed by `observables` and subscribe to each of them.
    pub(super) fn register_observed(
        &self,
        name: Arc<str>,
        evaluator: Evaluator,
        mapping: Mapping,
        observables: Vec<Rc<dyn Observable>>,
    ) {
        tracing::debug!(store = %self.label(), field = %name, count = observables.len(), "observing field");
        self.inner.observed.borrow_mut().push(Rc::new(ObservedProp {
            name,
            evaluator,
            mapping,
        }));
        let listener = self.observer_listener();
        let subscriptions = observables
            .iter()
            .map(|observable| observable.subscribe(&listener));
        self.inner.remote_subscriptions.borrow_mut().extend(subscriptions);
    }

    /// Write the current observed values into the state without notifying.
    /// Returns whether the state changed.
    pub(super) fn pull_observed(&self) -> bool {
        let previous = self.state();
        let next = self.observed_state(&previous);
        if next.same(&previous) {
            return false;
        }
        self.replace_state(next);
        true
    }

    fn observed_state(&self, state: &Value) -> Value {
        let props = self.inner.observed.borrow().clone();
        let mut next = state.clone();
        for prop in props {
            let description = Description::new(next.clone(), Arc::clone(&prop.name));
            let value = prop.mapping.map(&(prop.evaluator)(&description));
            if !next.get(&prop.name).same(&value) {
                next.set_field(&prop.name, value);
            }
        }
        next
    }

    fn observer_listener(&self) -> Listener {
        let observer = self.inner.observer.get_or_init(|| {
            let weak = Rc::downgrade(&self.inner);
            let debounce = Rc::new(Debounce::new(self.inner.config.link_delay, move || {
                if let Some(inner) = weak.upgrade() {
                    let store = Store::from_inner(inner);
                    let next = store.observed_state(&store.state());
                    if store.force_set(next) {
                        tracing::trace!(store = %store.label(), "observed fields changed");
                    }
                }
            }));
            let trigger = Rc::clone(&debounce);
            Deferred {
                debounce,
                listener: Listener::new(move |_| trigger.call()),
            }
        });
        observer.listener.clone()
    }
}
