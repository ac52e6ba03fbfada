//! The describer protocol.
//!
//! Stores and bindings are built by threading a [`DescribingContext`] through
//! an ordered list of [`Describer`]s. Each describer registers reducers,
//! middleware, properties or actions; the builder then finalizes the object.

mod context;
mod describers;
mod source;

pub use context::{
    compose, extend, Builder, Describer, DescribingContext, Mapping, ObjectKind, Redescribe, Role,
};
pub use describers::{
    with_action, with_dispatcher, with_dispatcher_payload, with_field_reducers, with_middleware,
    with_prop, with_redux_middleware, with_redux_reducer, with_reducer, FieldReducer,
};
pub use source::{
    evaluator, from_future, from_observable, from_prop, from_store, from_value, Description,
    Evaluator, FutureSource, Source,
};
