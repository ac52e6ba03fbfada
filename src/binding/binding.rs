use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::describe::{Builder, Describer, DescribingContext, Description, Evaluator, Mapping, Redescribe};
use crate::error::Result;
use crate::runtime::ReactiveRuntime;
use crate::store::{Dispatcher, Listener, LocalBoxFuture, Observable, Store, Subscription};
use crate::util::{has_runtime, shallow_equal};
use crate::value::Value;

/// Property name whose record result is spread into the mapped props.
pub const SPREAD: &str = "*";

pub(crate) struct BindingProp {
    name: Arc<str>,
    evaluator: Evaluator,
    mapping: Mapping,
}

/// Registrations collected while describing a binding.
#[derive(Default)]
pub(crate) struct BindingSpec {
    pub(crate) props: Vec<BindingProp>,
    pub(crate) stores: Vec<Store>,
    pub(crate) observables: Vec<Rc<dyn Observable>>,
    pub(crate) dispatchers: BTreeMap<Arc<str>, Dispatcher>,
}

impl BindingSpec {
    pub(crate) fn add_property(&mut self, name: Arc<str>, evaluator: Evaluator, mapping: Mapping) {
        self.props.push(BindingProp {
            name,
            evaluator,
            mapping,
        });
    }
}

/// Maps own props plus store states into a props record.
///
/// A binding renders nothing. Each live use is an [`Instance`], which
/// subscribes to the binding's stores and reports changes to its listeners.
#[derive(Clone)]
pub struct Binding {
    spec: Rc<BindingSpec>,
}

/// Start building a binding.
pub fn binding() -> BindingBuilder {
    BindingBuilder { _private: () }
}

#[derive(Debug)]
pub struct BindingBuilder {
    _private: (),
}

impl Builder for BindingBuilder {
    type Output = Binding;

    fn build(self, describers: Vec<Describer>) -> Result<Binding> {
        let mut spec = BindingSpec::default();
        {
            let mut cx = DescribingContext::for_binding(&mut spec);
            for describer in describers {
                describer.apply(&mut cx)?;
            }
        }
        tracing::debug!(
            props = spec.props.len(),
            stores = spec.stores.len(),
            dispatchers = spec.dispatchers.len(),
            "described binding"
        );
        Ok(Binding {
            spec: Rc::new(spec),
        })
    }
}

impl Redescribe for Binding {}

impl Binding {
    /// Start a live use of the binding, subscribed to every declared store
    /// and observable.
    pub fn instance(&self) -> Instance {
        let instance = Instance {
            inner: Rc::new(InstanceInner {
                id: ReactiveRuntime::current().next_id(),
                spec: Rc::clone(&self.spec),
                futures: RefCell::new(HashMap::new()),
                generation: Cell::new(0),
                listeners: RefCell::new(Vec::new()),
                subscriptions: RefCell::new(Vec::new()),
                released: Cell::new(false),
            }),
        };

        if !self.spec.stores.is_empty() || !self.spec.observables.is_empty() {
            let weak = Rc::downgrade(&instance.inner);
            let listener = Listener::new(move |_| {
                if let Some(inner) = weak.upgrade() {
                    Instance { inner }.changed();
                }
            });
            let stores = self
                .spec
                .stores
                .iter()
                .map(|store| store.subscribe_listener(&listener));
            let observables = self
                .spec
                .observables
                .iter()
                .map(|observable| observable.subscribe(&listener));
            *instance.inner.subscriptions.borrow_mut() = stores.chain(observables).collect();
        }
        instance
    }

    pub fn stores(&self) -> &[Store] {
        &self.spec.stores
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("props", &self.spec.props.len())
            .field("stores", &self.spec.stores.len())
            .field("observables", &self.spec.observables.len())
            .field("dispatchers", &self.spec.dispatchers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// State of the future behind one property of one instance.
#[derive(Clone, Debug)]
pub(crate) enum FutureStatus {
    Empty,
    Loading,
    Success(Value),
    Failure(Value),
}

struct FutureSlot {
    generation: u64,
    status: FutureStatus,
}

struct InstanceInner {
    id: usize,
    spec: Rc<BindingSpec>,
    futures: RefCell<HashMap<Arc<str>, FutureSlot>>,
    generation: Cell<u64>,
    listeners: RefCell<Vec<Rc<dyn Fn()>>>,
    subscriptions: RefCell<Vec<Subscription>>,
    released: Cell<bool>,
}

impl Drop for InstanceInner {
    fn drop(&mut self) {
        for subscription in self.subscriptions.get_mut().drain(..) {
            subscription.unsubscribe();
        }
    }
}

/// One live use of a [`Binding`].
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

/// The result of mapping own props through a binding.
#[derive(Clone, Debug)]
pub struct Mapped {
    pub props: Value,
    pub dispatchers: BTreeMap<Arc<str>, Dispatcher>,
}

impl Mapped {
    /// Shallow comparison of the props. Dispatchers are ignored.
    pub fn shallow_eq(&self, other: &Mapped) -> bool {
        shallow_equal(&self.props, &other.props)
    }
}

impl Instance {
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Evaluate every property against `own` in declaration order.
    pub fn map(&self, own: impl Into<Value>) -> Mapped {
        let own = own.into();
        let mut props = Value::empty_record();
        for prop in &self.inner.spec.props {
            let description =
                Description::new(own.clone(), Arc::clone(&prop.name)).with_instance(self.clone());
            let inputs = (prop.evaluator)(&description);
            let value = prop.mapping.map(&inputs);

            if &*prop.name == SPREAD {
                if let Value::Record(fields) = value {
                    for (field, value) in fields.iter() {
                        props.set_field(field, value.clone());
                    }
                }
            } else {
                props.set_field(&prop.name, value);
            }
        }
        let dispatchers = self
            .inner
            .spec
            .dispatchers
            .iter()
            .map(|(name, dispatcher)| (Arc::clone(name), dispatcher.bind_own(&own)))
            .collect();
        Mapped { props, dispatchers }
    }

    /// Call `callback` whenever a bound store or observable changes, or a
    /// future settles.
    pub fn on_change(&self, callback: impl Fn() + 'static) {
        self.inner.listeners.borrow_mut().push(Rc::new(callback));
    }

    /// Drop the store subscriptions. Later changes are not reported.
    pub fn release(&self) {
        self.inner.released.set(true);
        for subscription in self.inner.subscriptions.borrow_mut().drain(..) {
            subscription.unsubscribe();
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.get()
    }

    fn changed(&self) {
        if self.inner.released.get() {
            return;
        }
        let listeners = self.inner.listeners.borrow().clone();
        for listener in listeners {
            listener();
        }
    }

    /// Current status of the future behind `property`, starting one first
    /// when none has started yet or `refresh` is set.
    pub(crate) fn poll_future(
        &self,
        property: &str,
        refresh: bool,
        start: impl FnOnce() -> Option<LocalBoxFuture<std::result::Result<Value, Value>>>,
    ) -> FutureStatus {
        if !refresh {
            if let Some(slot) = self.inner.futures.borrow().get(property) {
                return slot.status.clone();
            }
        }

        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);
        let property: Arc<str> = Arc::from(property);

        let future = start();
        let status = match &future {
            None => FutureStatus::Empty,
            Some(_) if !has_runtime() => {
                tracing::warn!(
                    instance = self.inner.id,
                    property = %property,
                    "cannot await future prop: no tokio runtime on this thread"
                );
                FutureStatus::Failure(Value::from("no tokio runtime"))
            }
            Some(_) => FutureStatus::Loading,
        };
        self.inner.futures.borrow_mut().insert(
            Arc::clone(&property),
            FutureSlot {
                generation,
                status: status.clone(),
            },
        );
        let Some(future) = future.filter(|_| matches!(status, FutureStatus::Loading)) else {
            return status;
        };

        let weak = Rc::downgrade(&self.inner);
        tokio::task::spawn_local(async move {
            let outcome = future.await;
            if let Some(inner) = weak.upgrade() {
                Instance { inner }.settle(&property, generation, outcome);
            }
        });
        FutureStatus::Loading
    }

    fn settle(&self, property: &str, generation: u64, outcome: std::result::Result<Value, Value>) {
        {
            let mut futures = self.inner.futures.borrow_mut();
            let Some(slot) = futures.get_mut(property).filter(|slot| slot.generation == generation) else {
                tracing::debug!(instance = self.inner.id, property, "discarding superseded future");
                return;
            };
            slot.status = match outcome {
                Ok(value) => FutureStatus::Success(value),
                Err(error) => FutureStatus::Failure(error),
            };
        }
        self.changed();
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.inner.id)
            .field("released", &self.inner.released.get())
            .finish()
    }
}
