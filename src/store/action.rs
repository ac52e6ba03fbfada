//! Action tags, action creators and what a dispatch hands back.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use tokio::task::JoinHandle;

use super::store::Store;
use crate::error::Result;
use crate::value::Value;

/// A boxed future that stays on the local task set.
pub type LocalBoxFuture<T> = Pin<Box<dyn Future<Output = T>>>;

/// What reducers and middleware see as the action.
#[derive(Clone)]
pub enum Action {
    /// Sent once to the reducers registered by each describe pass.
    Init,
    /// A plain tag.
    Named(Arc<str>),
    /// An invocable action creator, compared by identity.
    Creator(ActionCreator),
}

impl Action {
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Action::Named(name.into())
    }

    /// Human readable name, used in logs.
    pub fn name(&self) -> &str {
        match self {
            Action::Init => "@@init",
            Action::Named(name) => name,
            Action::Creator(creator) => creator.name(),
        }
    }

    /// Whether this action is the given plain tag.
    pub fn is(&self, tag: &str) -> bool {
        matches!(self, Action::Named(name) if &**name == tag)
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Action::Init, Action::Init) => true,
            (Action::Named(a), Action::Named(b)) => a == b,
            (Action::Creator(a), Action::Creator(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Init => f.write_str("Init"),
            Action::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Action::Creator(creator) => f.debug_tuple("Creator").field(&creator.name()).finish(),
        }
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Action::Named(Arc::from(name))
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        Action::Named(Arc::from(name))
    }
}

impl From<Arc<str>> for Action {
    fn from(name: Arc<str>) -> Self {
        Action::Named(name)
    }
}

impl From<ActionCreator> for Action {
    fn from(creator: ActionCreator) -> Self {
        Action::Creator(creator)
    }
}

impl From<&ActionCreator> for Action {
    fn from(creator: &ActionCreator) -> Self {
        Action::Creator(creator.clone())
    }
}

/// Result of invoking an action creator.
pub enum Creation {
    /// Run the middleware chain and reducers with the creator as the action
    /// and this value as the payload.
    Payload(Value),
    /// Run against the current state.
    Thunk(Box<dyn FnOnce(&Value) -> Thunked>),
}

impl Creation {
    pub fn thunk(f: impl FnOnce(&Value) -> Thunked + 'static) -> Self {
        Creation::Thunk(Box::new(f))
    }
}

/// Result of running a thunk against the current state.
pub enum Thunked {
    /// Commit this state.
    State(Value),
    /// Commit the awaited state on a later tick.
    Async(LocalBoxFuture<Value>),
    /// Orchestrate further dispatches; the result is returned verbatim.
    Deep(Box<dyn FnOnce(&Store) -> Result<Dispatched>>),
}

impl Thunked {
    pub fn deferred(future: impl Future<Output = Value> + 'static) -> Self {
        Thunked::Async(Box::pin(future))
    }

    pub fn deep(f: impl FnOnce(&Store) -> Result<Dispatched> + 'static) -> Self {
        Thunked::Deep(Box::new(f))
    }
}

struct CreatorInner {
    name: Arc<str>,
    create: Box<dyn Fn(Value) -> Creation>,
}

/// An invocable action. Cloning keeps the identity.
#[derive(Clone)]
pub struct ActionCreator {
    inner: Rc<CreatorInner>,
}

impl ActionCreator {
    pub fn new(name: impl Into<Arc<str>>, create: impl Fn(Value) -> Creation + 'static) -> Self {
        Self {
            inner: Rc::new(CreatorInner {
                name: name.into(),
                create: Box::new(create),
            }),
        }
    }

    /// A creator whose payload is the argument itself.
    pub fn identity(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, Creation::Payload)
    }

    /// A creator that maps its argument to the payload.
    pub fn payload(name: impl Into<Arc<str>>, map: impl Fn(Value) -> Value + 'static) -> Self {
        Self::new(name, move |argument| Creation::Payload(map(argument)))
    }

    /// A creator that computes the next state directly from state and argument.
    pub fn setter(
        name: impl Into<Arc<str>>,
        set: impl Fn(&Value, Value) -> Value + 'static,
    ) -> Self {
        let set = Rc::new(set);
        Self::new(name, move |argument| {
            let set = Rc::clone(&set);
            Creation::thunk(move |state| Thunked::State(set(state, argument)))
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn create(&self, argument: Value) -> Creation {
        (self.inner.create)(argument)
    }

    pub fn ptr_eq(&self, other: &ActionCreator) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ActionCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCreator")
            .field("name", &self.name())
            .finish()
    }
}

/// What a dispatch returns.
#[derive(Debug)]
pub enum Dispatched {
    /// Every effect of the dispatch already ran.
    Settled,
    /// The state commit happens on a later tick.
    Pending(PendingCommit),
}

impl Dispatched {
    pub fn is_settled(&self) -> bool {
        matches!(self, Dispatched::Settled)
    }

    pub fn into_pending(self) -> Option<PendingCommit> {
        match self {
            Dispatched::Pending(pending) => Some(pending),
            Dispatched::Settled => None,
        }
    }
}

/// Handle to an asynchronous commit.
#[derive(Debug)]
pub struct PendingCommit {
    handle: JoinHandle<bool>,
}

impl PendingCommit {
    pub(crate) fn new(handle: JoinHandle<bool>) -> Self {
        Self { handle }
    }

    /// Wait for resolution. `false` when the value was discarded because a
    /// newer asynchronous value had already committed, or the store is gone.
    pub async fn committed(self) -> bool {
        self.handle.await.unwrap_or(false)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// How a dispatcher turns its call argument into the dispatched payload.
#[derive(Clone, Default)]
pub enum PayloadFactory {
    /// The argument itself.
    #[default]
    Argument,
    /// A field of the own props the dispatcher was mapped with. The argument
    /// is ignored.
    OwnProp(Arc<str>),
    /// A function of the argument and the own props.
    Build(Rc<dyn Fn(&Value, &Value) -> Value>),
}

impl PayloadFactory {
    pub fn own_prop(name: impl Into<Arc<str>>) -> Self {
        PayloadFactory::OwnProp(name.into())
    }

    pub fn build(f: impl Fn(&Value, &Value) -> Value + 'static) -> Self {
        PayloadFactory::Build(Rc::new(f))
    }

    fn produce(&self, argument: Value, own: &Value) -> Value {
        match self {
            PayloadFactory::Argument => argument,
            PayloadFactory::OwnProp(name) => own.get(name),
            PayloadFactory::Build(build) => build(&argument, own),
        }
    }
}

impl From<&str> for PayloadFactory {
    fn from(name: &str) -> Self {
        PayloadFactory::own_prop(name)
    }
}

impl fmt::Debug for PayloadFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadFactory::Argument => f.write_str("Argument"),
            PayloadFactory::OwnProp(name) => f.debug_tuple("OwnProp").field(name).finish(),
            PayloadFactory::Build(_) => f.write_str("Build(..)"),
        }
    }
}

/// An action bound to a store.
///
/// Dispatchers handed out by a binding instance also carry the own props they
/// were mapped with, which their [`PayloadFactory`] may read.
#[derive(Clone)]
pub struct Dispatcher {
    store: Store,
    action: Action,
    payload: PayloadFactory,
    own: Value,
}

impl Dispatcher {
    pub fn new(store: &Store, action: impl Into<Action>) -> Self {
        Self {
            store: store.clone(),
            action: action.into(),
            payload: PayloadFactory::Argument,
            own: Value::Null,
        }
    }

    /// Build the payload with `payload` instead of passing the argument on.
    pub fn with_payload(mut self, payload: impl Into<PayloadFactory>) -> Self {
        self.payload = payload.into();
        self
    }

    /// The same dispatcher seeing `own` as its own props.
    pub(crate) fn bind_own(&self, own: &Value) -> Self {
        Self {
            own: own.clone(),
            ..self.clone()
        }
    }

    pub fn call(&self, argument: impl Into<Value>) -> Result<Dispatched> {
        let payload = self.payload.produce(argument.into(), &self.own);
        self.store.dispatch(self.action.clone(), payload)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn action(&self) -> &Action {
        &self.action
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("store", &self.store.id())
            .field("action", &self.action)
            .field("payload", &self.payload)
            .finish()
    }
}
