//! The store kernel.
//!
//! A [`Store`] owns a state snapshot and the registrations made by its
//! describers: reducers wrapped in middleware, computed fields, fields linked
//! to other stores or to observables, named actions and subscribers.

mod action;
mod computed;
mod config;
mod linked;
mod notify;
mod observed;
mod pipeline;
mod store;

pub use action::{
    Action, ActionCreator, Creation, Dispatched, Dispatcher, LocalBoxFuture, PayloadFactory,
    PendingCommit, Thunked,
};
pub use config::StoreConfig;
pub use linked::LinkSource;
pub use notify::{Listener, Subscription};
pub use observed::{Observable, ObservableValue};
pub use pipeline::{Middleware, Next, Raise, Reduced, Reducer};
pub use store::{store, Store, StoreBuilder};
