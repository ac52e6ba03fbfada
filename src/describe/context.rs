use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::source::Evaluator;
use crate::binding::BindingSpec;
use crate::error::{Result, StoreError};
use crate::store::{ActionCreator, Dispatcher, Middleware, Observable, Reducer, Store};
use crate::util::Combiner;
use crate::value::Value;

/// The kind of object a describing context builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Store,
    Binding,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Store => f.write_str("store"),
            ObjectKind::Binding => f.write_str("binding"),
        }
    }
}

/// What a named entry registered with [`DescribingContext::add_action`] is.
#[derive(Clone, Debug)]
pub enum Role {
    /// A creator dispatched against the store being described.
    Action(ActionCreator),
    /// An action already bound to some store.
    Dispatcher(Dispatcher),
}

/// How a property turns its input tuple into a value.
///
/// On a store, `Combine` declares a computed field while `Field` and `Whole`
/// declare a field linked to the single staged store. On a binding, and for
/// fields fed by observables, `Field` reads a field of the first input and
/// `Whole` passes the first input through.
#[derive(Clone)]
pub enum Mapping {
    Combine(Combiner),
    Field(Arc<str>),
    Whole,
}

impl Mapping {
    pub fn combine(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Mapping::Combine(Rc::new(f))
    }

    pub fn field(name: impl Into<Arc<str>>) -> Self {
        Mapping::Field(name.into())
    }

    /// Apply the mapping directly, as a binding does.
    pub(crate) fn map(&self, inputs: &[Value]) -> Value {
        let first = inputs.first().cloned().unwrap_or_default();
        match self {
            Mapping::Combine(combiner) => combiner(inputs),
            Mapping::Field(name) => first.get(name),
            Mapping::Whole => first,
        }
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mapping::Combine(_) => f.write_str("Combine(..)"),
            Mapping::Field(name) => f.debug_tuple("Field").field(name).finish(),
            Mapping::Whole => f.write_str("Whole"),
        }
    }
}

enum Target<'a> {
    Store(&'a Store),
    Binding(&'a mut BindingSpec),
}

/// The registration surface handed to each describer.
pub struct DescribingContext<'a> {
    target: Target<'a>,
}

impl<'a> DescribingContext<'a> {
    pub(crate) fn for_store(store: &'a Store) -> Self {
        Self {
            target: Target::Store(store),
        }
    }

    pub(crate) fn for_binding(spec: &'a mut BindingSpec) -> Self {
        Self {
            target: Target::Binding(spec),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self.target {
            Target::Store(_) => ObjectKind::Store,
            Target::Binding(_) => ObjectKind::Binding,
        }
    }

    fn wrong_kind(&self, operation: &'static str) -> StoreError {
        StoreError::WrongKind {
            operation,
            kind: self.kind(),
        }
    }

    pub fn add_reducer(&mut self, reducer: Reducer) -> Result<()> {
        match &self.target {
            Target::Store(store) => {
                store.register_reducer(reducer);
                Ok(())
            }
            Target::Binding(_) => Err(self.wrong_kind("add_reducer")),
        }
    }

    pub fn add_middleware(&mut self, middleware: Rc<dyn Middleware>) -> Result<()> {
        match &self.target {
            Target::Store(store) => {
                store.register_middleware(middleware);
                Ok(())
            }
            Target::Binding(_) => Err(self.wrong_kind("add_middleware")),
        }
    }

    /// Declare a dependency on another store.
    pub fn add_store(&mut self, dependency: &Store) {
        match &mut self.target {
            Target::Store(store) => store.stage_store(dependency.clone()),
            Target::Binding(spec) => spec.stores.push(dependency.clone()),
        }
    }

    /// Declare a dependency on an observable. The next property declared on
    /// a store claims it; a binding reports its changes.
    pub fn add_observable(&mut self, observable: Rc<dyn Observable>) {
        match &mut self.target {
            Target::Store(store) => store.stage_observable(observable),
            Target::Binding(spec) => spec.observables.push(observable),
        }
    }

    pub fn add_property(
        &mut self,
        name: impl Into<Arc<str>>,
        evaluator: Evaluator,
        mapping: Mapping,
    ) -> Result<()> {
        let name = name.into();
        match &mut self.target {
            Target::Store(store) => store.register_property(name, evaluator, mapping),
            Target::Binding(spec) => {
                spec.add_property(name, evaluator, mapping);
                Ok(())
            }
        }
    }

    /// Register a named action on a store, or a named dispatcher on a
    /// binding.
    pub fn add_action(&mut self, name: impl Into<Arc<str>>, role: Role) -> Result<()> {
        let name = name.into();
        let kind = self.kind();
        match (&mut self.target, role) {
            (Target::Store(store), Role::Action(creator)) => {
                store.register_action(name, creator);
                Ok(())
            }
            (Target::Binding(spec), Role::Dispatcher(dispatcher)) => {
                spec.dispatchers.insert(name, dispatcher);
                Ok(())
            }
            (_, Role::Action(_)) => Err(StoreError::WrongKind {
                operation: "with_action",
                kind,
            }),
            (_, Role::Dispatcher(_)) => Err(StoreError::WrongKind {
                operation: "with_dispatcher",
                kind,
            }),
        }
    }
}

/// One composition fragment.
pub struct Describer(Box<dyn FnOnce(&mut DescribingContext<'_>) -> Result<()>>);

impl Describer {
    pub fn new(describe: impl FnOnce(&mut DescribingContext<'_>) -> Result<()> + 'static) -> Self {
        Self(Box::new(describe))
    }

    pub fn apply(self, cx: &mut DescribingContext<'_>) -> Result<()> {
        (self.0)(cx)
    }
}

impl fmt::Debug for Describer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Describer(..)")
    }
}

/// Something `compose` can finish.
pub trait Builder {
    type Output;

    fn build(self, describers: Vec<Describer>) -> Result<Self::Output>;
}

/// Objects that accept more describers after construction.
pub trait Redescribe {
    fn redescribe(&self, describers: Vec<Describer>) -> Result<()> {
        let _ = describers;
        Err(StoreError::NotRedescribable)
    }
}

/// Build an object by applying `describers` in order.
///
/// ```
/// use trellis::{compose, store, with_reducer, Value};
///
/// let counter = compose(
///     store(Value::from(0)),
///     [with_reducer(|state: &Value, action: &trellis::Action, payload: &Value| {
///         if action.is("add") {
///             Value::from(state.as_i64().unwrap_or(0) + payload.as_i64().unwrap_or(0))
///         } else {
///             state.clone()
///         }
///     })],
/// )
/// .unwrap();
///
/// counter.dispatch("add", 2).unwrap();
/// assert_eq!(counter.state(), Value::from(2));
/// ```
pub fn compose<B: Builder>(
    builder: B,
    describers: impl IntoIterator<Item = Describer>,
) -> Result<B::Output> {
    builder.build(describers.into_iter().collect())
}

/// Apply more describers to an object already built.
pub fn extend<T: Redescribe + ?Sized>(
    target: &T,
    describers: impl IntoIterator<Item = Describer>,
) -> Result<()> {
    target.redescribe(describers.into_iter().collect())
}
