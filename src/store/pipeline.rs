//! Reducer fold wrapped in the middleware chain.

use std::cell::RefCell;
use std::rc::Rc;

use super::action::Action;
use super::store::Store;
use crate::error::Result;
use crate::value::Value;

/// A registered reducer.
pub type Reducer = Rc<dyn Fn(&Value, &Action, &Value) -> Reduced>;

/// What a reducer hands back.
pub enum Reduced {
    /// The next state. Return the input itself when nothing changed.
    State(Value),
    /// Leave the state alone and ask for dispatches after the commit.
    Later(Box<dyn FnOnce(&mut Raise)>),
}

impl Reduced {
    pub fn later(request: impl FnOnce(&mut Raise) + 'static) -> Self {
        Reduced::Later(Box::new(request))
    }
}

impl From<Value> for Reduced {
    fn from(state: Value) -> Self {
        Reduced::State(state)
    }
}

/// Collects dispatches requested from inside a reducer.
#[derive(Default)]
pub struct Raise {
    queue: Vec<(Action, Value)>,
}

impl Raise {
    pub fn raise(&mut self, action: impl Into<Action>, payload: impl Into<Value>) {
        self.queue.push((action.into(), payload.into()));
    }

    pub(crate) fn into_queue(self) -> Vec<(Action, Value)> {
        self.queue
    }
}

/// One layer around the reducer fold.
///
/// Returning `None` without running `next` swallows the dispatch: the layers
/// below and the reducers never run and nothing is committed.
pub trait Middleware {
    fn handle(&self, store: &Store, next: Next<'_>, action: &Action, payload: &Value)
        -> Option<Value>;
}

impl<F> Middleware for F
where
    F: Fn(&Store, Next<'_>, &Action, &Value) -> Option<Value>,
{
    fn handle(
        &self,
        store: &Store,
        next: Next<'_>,
        action: &Action,
        payload: &Value,
    ) -> Option<Value> {
        self(store, next, action, payload)
    }
}

/// The remainder of the chain below a middleware layer.
pub struct Next<'a> {
    store: &'a Store,
    layers: &'a [Rc<dyn Middleware>],
    fold: &'a dyn Fn(&Action, &Value) -> Value,
}

impl Next<'_> {
    /// Continue with the next layer, or the reducer fold after the last one.
    pub fn run(&self, action: &Action, payload: &Value) -> Option<Value> {
        match self.layers.split_first() {
            Some((layer, rest)) => layer.handle(
                self.store,
                Next {
                    store: self.store,
                    layers: rest,
                    fold: self.fold,
                },
                action,
                payload,
            ),
            None => Some((self.fold)(action, payload)),
        }
    }
}

impl Store {
    /// Middleware, then reducers, then commit, then the raised dispatches.
    pub(super) fn run_pipeline(&self, action: Action, payload: Value) -> Result<()> {
        let raised = RefCell::new(Vec::new());
        let layers = self.inner.middleware.borrow().clone();

        let fold = |action: &Action, payload: &Value| -> Value {
            let reducers = self.inner.reducers.borrow().clone();
            reducers
                .iter()
                .fold(self.state(), |state, reducer| match reducer(&state, action, payload) {
                    Reduced::State(next) => next,
                    Reduced::Later(request) => {
                        let mut raise = Raise::default();
                        request(&mut raise);
                        raised.borrow_mut().extend(raise.queue);
                        state
                    }
                })
        };

        let previous = self.state();
        let chain = Next {
            store: self,
            layers: &layers,
            fold: &fold,
        };
        match chain.run(&action, &payload) {
            None => {
                tracing::debug!(store = %self.label(), action = action.name(), "dispatch swallowed by middleware");
            }
            Some(next) if !next.same(&previous) => {
                tracing::trace!(store = %self.label(), action = action.name(), "commit");
                self.commit(next);
            }
            Some(_) => {}
        }

        let raised = raised.take();
        if !raised.is_empty() {
            tracing::trace!(store = %self.label(), count = raised.len(), "draining raised dispatches");
        }
        for (action, payload) in raised {
            self.dispatch(action, payload)?;
        }
        Ok(())
    }
}
