//! Where property inputs come from.

use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

use super::context::{DescribingContext, ObjectKind};
use crate::binding::{FutureStatus, Instance};
use crate::error::{Result, StoreError};
use crate::store::{LocalBoxFuture, Observable, Store};
use crate::value::Value;

/// What an evaluator sees when it produces an input tuple.
#[derive(Clone)]
pub struct Description {
    own: Value,
    property: Arc<str>,
    instance: Option<Instance>,
}

impl Description {
    pub(crate) fn new(own: Value, property: Arc<str>) -> Self {
        Self {
            own,
            property,
            instance: None,
        }
    }

    pub(crate) fn with_instance(mut self, instance: Instance) -> Self {
        self.instance = Some(instance);
        self
    }

    /// The store's working state, or a binding instance's own props.
    pub fn own(&self) -> &Value {
        &self.own
    }

    /// Name of the property being evaluated.
    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }
}

impl fmt::Debug for Description {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Description")
            .field("own", &self.own)
            .field("property", &self.property)
            .field("instance", &self.instance.is_some())
            .finish()
    }
}

/// Produces the input tuple of a property.
pub type Evaluator = Rc<dyn Fn(&Description) -> Vec<Value>>;

/// Wrap a closure as an [`Evaluator`].
pub fn evaluator(f: impl Fn(&Description) -> Vec<Value> + 'static) -> Evaluator {
    Rc::new(f)
}

/// Turns into an evaluator once the describing context is known. Sources may
/// declare store dependencies while resolving.
pub struct Source(Box<dyn FnOnce(&mut DescribingContext<'_>) -> Result<Evaluator>>);

impl Source {
    pub fn new(resolve: impl FnOnce(&mut DescribingContext<'_>) -> Result<Evaluator> + 'static) -> Self {
        Self(Box::new(resolve))
    }

    pub fn resolve(self, cx: &mut DescribingContext<'_>) -> Result<Evaluator> {
        (self.0)(cx)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Source(..)")
    }
}

/// Read fields of the own record.
pub fn from_prop<I>(fields: I) -> Source
where
    I: IntoIterator,
    I::Item: Into<Arc<str>>,
{
    let fields: Vec<Arc<str>> = fields.into_iter().map(Into::into).collect();
    Source::new(move |_| {
        Ok(evaluator(move |description| {
            fields.iter().map(|field| description.own().get(field)).collect()
        }))
    })
}

/// Read the state of other stores, declaring each as a dependency.
pub fn from_store<'s>(stores: impl IntoIterator<Item = &'s Store>) -> Source {
    let stores: Vec<Store> = stores.into_iter().cloned().collect();
    Source::new(move |cx| {
        for store in &stores {
            cx.add_store(store);
        }
        Ok(evaluator(move |_| stores.iter().map(Store::state).collect()))
    })
}

/// Read observables, declaring each with the describing context.
///
/// On a store the property is re-evaluated, on a later tick, whenever an
/// observable announces a change. On a binding each announcement reports a
/// change to the instance.
pub fn from_observable<'o, O>(observables: impl IntoIterator<Item = &'o O>) -> Source
where
    O: Observable + Clone + 'static,
{
    let observables: Vec<Rc<dyn Observable>> = observables
        .into_iter()
        .map(|observable| Rc::new(observable.clone()) as Rc<dyn Observable>)
        .collect();
    Source::new(move |cx| {
        for observable in &observables {
            cx.add_observable(Rc::clone(observable));
        }
        Ok(evaluator(move |_| observables.iter().map(|observable| observable.get()).collect()))
    })
}

/// A single computed input.
pub fn from_value(f: impl Fn(&Description) -> Value + 'static) -> Source {
    Source::new(move |_| Ok(evaluator(move |description| vec![f(description)])))
}

type FutureFactory = Rc<dyn Fn(&Description) -> Option<LocalBoxFuture<std::result::Result<Value, Value>>>>;

/// A property fed by a future, started per binding instance.
///
/// The input tuple is `[default, "loading"]` while pending,
/// `[value, "success"]` once resolved, `[default, "failure", error]` on
/// failure and `[default, ""]` when the factory produced no future.
pub struct FutureSource {
    factory: FutureFactory,
    default: Value,
    refresh: Option<Rc<dyn Fn(&Description) -> bool>>,
}

/// Feed a binding property from a future. Only valid on bindings.
pub fn from_future<F, Fut, E>(factory: F, default: impl Into<Value>) -> FutureSource
where
    F: Fn(&Description) -> Option<Fut> + 'static,
    Fut: Future<Output = std::result::Result<Value, E>> + 'static,
    E: fmt::Display,
{
    FutureSource {
        factory: Rc::new(move |description| {
            let future = factory(description)?;
            let boxed: LocalBoxFuture<std::result::Result<Value, Value>> =
                Box::pin(async move { future.await.map_err(|err| Value::from(err.to_string())) });
            Some(boxed)
        }),
        default: default.into(),
        refresh: None,
    }
}

impl FutureSource {
    /// Start a fresh future whenever `predicate` holds at mapping time.
    pub fn refresh_when(mut self, predicate: impl Fn(&Description) -> bool + 'static) -> Self {
        self.refresh = Some(Rc::new(predicate));
        self
    }
}

impl From<FutureSource> for Source {
    fn from(source: FutureSource) -> Self {
        let FutureSource {
            factory,
            default,
            refresh,
        } = source;
        Source::new(move |cx| {
            if cx.kind() != ObjectKind::Binding {
                return Err(StoreError::WrongKind {
                    operation: "from_future",
                    kind: cx.kind(),
                });
            }
            Ok(evaluator(move |description| {
                let Some(instance) = description.instance() else {
                    return vec![default.clone(), Value::from("")];
                };
                let refresh = refresh.as_ref().is_some_and(|refresh| refresh(description));
                let status = instance.poll_future(description.property(), refresh, || factory(description));
                match status {
                    FutureStatus::Empty => vec![default.clone(), Value::from("")],
                    FutureStatus::Loading => vec![default.clone(), Value::from("loading")],
                    FutureStatus::Success(value) => vec![value, Value::from("success")],
                    FutureStatus::Failure(error) => {
                        vec![default.clone(), Value::from("failure"), error]
                    }
                }
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prop_source_reads_own_fields() {
        let own = Value::record([("a", 1), ("b", 2)]);
        let description = Description::new(own, "sum".into());
        let spec = &mut crate::binding::BindingSpec::default();
        let mut cx = DescribingContext::for_binding(spec);

        let evaluate = from_prop(["b", "missing"]).resolve(&mut cx).unwrap();
        assert_eq!(evaluate(&description), vec![Value::from(2), Value::Null]);
    }

    #[test]
    fn future_source_is_binding_only() {
        let store = crate::compose(crate::store(Value::Null), []).unwrap();
        let mut cx = DescribingContext::for_store(&store);
        let source: Source = from_future(
            |_| Some(async { Ok::<_, String>(Value::from(1)) }),
            Value::Null,
        )
        .into();

        let err = source.resolve(&mut cx).err();
        assert_eq!(
            err,
            Some(StoreError::WrongKind {
                operation: "from_future",
                kind: ObjectKind::Store,
            })
        );
    }
}
