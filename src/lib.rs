//! # Trellis
//!
//! A composable reactive-state kernel for Rust.
//!
//! A store is built by applying an ordered list of small describers, each
//! registering one capability: a reducer, a middleware layer, a computed
//! field, a field linked to another store, or a named action.
//!
//! ## Store
//!
//! - `Store` - state container with immutable snapshots
//! - Reducers wrapped in a middleware chain, with thunk, deep thunk and
//!   asynchronous dispatch forms
//! - Computed fields memoized on their inputs
//! - Linked fields kept in sync with another store, immediately upstream and
//!   on the next tick downstream
//! - Observed fields fed by an `Observable` the store does not own
//!
//! ## Binding
//!
//! - `Binding` - headless mapping of own props and store states into props,
//!   with change notification for each `Instance`
//!
//! Linked fields, observed fields and asynchronous values are scheduled on a
//! `tokio::task::LocalSet`; everything else runs inline on the calling thread.
//! A thread with no tokio runtime runs deferred syncs inline instead.

pub mod binding;
pub mod describe;
pub mod error;
pub mod runtime;
pub mod store;
pub mod util;
pub mod value;

// Re-export main types for convenience
pub use binding::{binding, Binding, Instance, Mapped};
pub use describe::{
    compose, extend, from_future, from_observable, from_prop, from_store, from_value, with_action,
    with_dispatcher, with_dispatcher_payload, with_field_reducers, with_middleware, with_prop,
    with_redux_middleware, with_redux_reducer, with_reducer, Describer, DescribingContext,
    FieldReducer, Mapping, ObjectKind, Role,
};
pub use error::{Result, StoreError};
pub use store::{
    store, Action, ActionCreator, Creation, Dispatched, Dispatcher, Next, Observable,
    ObservableValue, PayloadFactory, Raise, Reduced, Store, StoreConfig, Subscription, Thunked,
};
pub use util::{shallow_equal, Debounce, Selector};
pub use value::{Record, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        let counter = compose(store(Value::from(0)), []).unwrap();
        assert_eq!(counter.state(), Value::from(0));
        counter.dispatch("increase", 1).unwrap();
        assert_eq!(counter.state(), Value::from(0));
    }
}
