//! Headless bindings.
//!
//! A binding maps an "own props" record and the state of its stores into a
//! props record, and tells its instances when those stores change. Whether a
//! view re-renders is left to the caller; [`Mapped::shallow_eq`] is there for
//! that decision.

mod binding;

pub(crate) use binding::{BindingSpec, FutureStatus};
pub use binding::{binding, Binding, BindingBuilder, Instance, Mapped, SPREAD};
