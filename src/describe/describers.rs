//! The describers shipped with the crate.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::context::{Describer, Mapping, Role};
use super::source::Source;
use crate::store::{Action, ActionCreator, Dispatcher, Next, PayloadFactory, Reduced, Store};
use crate::value::Value;

/// Declare a property fed by `source` and shaped by `mapping`.
pub fn with_prop(name: impl Into<Arc<str>>, source: impl Into<Source>, mapping: Mapping) -> Describer {
    let name = name.into();
    let source = source.into();
    Describer::new(move |cx| {
        let evaluator = source.resolve(cx)?;
        cx.add_property(name, evaluator, mapping)
    })
}

/// Register a reducer. Return the input state when nothing changes.
pub fn with_reducer<F, R>(reducer: F) -> Describer
where
    F: Fn(&Value, &Action, &Value) -> R + 'static,
    R: Into<Reduced>,
{
    Describer::new(move |cx| {
        cx.add_reducer(Rc::new(
            move |state: &Value, action: &Action, payload: &Value| -> Reduced {
                reducer(state, action, payload).into()
            },
        ))
    })
}

/// Register a middleware layer. Later layers wrap earlier ones.
pub fn with_middleware<F>(middleware: F) -> Describer
where
    F: Fn(&Store, Next<'_>, &Action, &Value) -> Option<Value> + 'static,
{
    Describer::new(move |cx| cx.add_middleware(Rc::new(middleware)))
}

/// Register a named action on a store.
pub fn with_action(name: impl Into<Arc<str>>, creator: ActionCreator) -> Describer {
    let name = name.into();
    Describer::new(move |cx| cx.add_action(name, Role::Action(creator)))
}

/// Expose `action` bound to `store` under `name` in a binding's mapped props.
pub fn with_dispatcher(name: impl Into<Arc<str>>, store: &Store, action: impl Into<Action>) -> Describer {
    with_dispatcher_payload(name, store, action, PayloadFactory::Argument)
}

/// Like [`with_dispatcher`], with the payload built by `payload`. A string
/// names an own prop to dispatch instead of the call argument.
pub fn with_dispatcher_payload(
    name: impl Into<Arc<str>>,
    store: &Store,
    action: impl Into<Action>,
    payload: impl Into<PayloadFactory>,
) -> Describer {
    let name = name.into();
    let dispatcher = Dispatcher::new(store, action).with_payload(payload);
    Describer::new(move |cx| cx.add_action(name, Role::Dispatcher(dispatcher)))
}

/// Adapt a reducer over action objects: the record passed as the second
/// argument carries the tag in `type` next to the payload's fields. A
/// payload that is not a record lands under `payload`.
pub fn with_redux_reducer<F>(reducer: F) -> Describer
where
    F: Fn(&Value, &Value) -> Value + 'static,
{
    with_reducer(move |state: &Value, action: &Action, payload: &Value| {
        let object = match payload {
            Value::Record(_) => payload.with_field("type", Value::from(action.name())),
            Value::Null => Value::record([("type", action.name())]),
            other => Value::record([
                ("type", Value::from(action.name())),
                ("payload", other.clone()),
            ]),
        };
        reducer(state, &object)
    })
}

/// Adapt a middleware over action objects.
///
/// Dispatches whose payload is a record reach `middleware` as that record
/// with the tag in `type`; the function it receives as `next` takes such an
/// object and continues the chain, with a rewritten `type` becoming the new
/// tag. Other dispatches skip `middleware`.
pub fn with_redux_middleware<F>(middleware: F) -> Describer
where
    F: Fn(&Store, &dyn Fn(&Value) -> Option<Value>, &Value) -> Option<Value> + 'static,
{
    with_middleware(move |store: &Store, next: Next<'_>, action: &Action, payload: &Value| {
        if !matches!(payload, Value::Record(_)) {
            return next.run(action, payload);
        }
        let object = payload.with_field("type", Value::from(action.name()));
        let forward = |object: &Value| {
            let action = match object.field("type").and_then(Value::as_str) {
                Some(tag) if tag != action.name() => Action::named(tag),
                _ => action.clone(),
            };
            next.run(&action, &object.without_field("type"))
        };
        middleware(store, &forward, &object)
    })
}

type FieldReduce = Rc<dyn Fn(&Value, &Action, &Value) -> Value>;

/// A reducer scoped to one field of a record state.
#[derive(Clone)]
pub struct FieldReducer {
    field: Arc<str>,
    actions: Option<Vec<Action>>,
    reduce: FieldReduce,
}

impl FieldReducer {
    /// `reduce` receives the field's current value, never the whole state.
    pub fn new(
        field: impl Into<Arc<str>>,
        reduce: impl Fn(&Value, &Action, &Value) -> Value + 'static,
    ) -> Self {
        Self {
            field: field.into(),
            actions: None,
            reduce: Rc::new(reduce),
        }
    }

    /// The same reducer applied independently to each field.
    pub fn across<I>(fields: I, reduce: impl Fn(&Value, &Action, &Value) -> Value + 'static) -> Vec<Self>
    where
        I: IntoIterator,
        I::Item: Into<Arc<str>>,
    {
        let reduce: FieldReduce = Rc::new(reduce);
        fields
            .into_iter()
            .map(|field| Self {
                field: field.into(),
                actions: None,
                reduce: Rc::clone(&reduce),
            })
            .collect()
    }

    /// Only run for these actions.
    pub fn on<I>(mut self, actions: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Action>,
    {
        self.actions = Some(actions.into_iter().map(Into::into).collect());
        self
    }

    fn accepts(&self, action: &Action) -> bool {
        self.actions
            .as_ref()
            .map_or(true, |actions| actions.contains(action))
    }
}

impl fmt::Debug for FieldReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldReducer")
            .field("field", &self.field)
            .field("actions", &self.actions)
            .finish()
    }
}

/// Register field reducers as one reducer. The state is copied at most once
/// per dispatch, and left untouched when no field changes.
pub fn with_field_reducers(reducers: impl IntoIterator<Item = FieldReducer>) -> Describer {
    let reducers: Vec<FieldReducer> = reducers.into_iter().collect();
    with_reducer(move |state: &Value, action: &Action, payload: &Value| {
        let mut next = state.clone();
        for reducer in reducers.iter().filter(|reducer| reducer.accepts(action)) {
            let current = next.get(&reducer.field);
            let updated = (reducer.reduce)(&current, action, payload);
            if !updated.same(&current) {
                next.set_field(&reducer.field, updated);
            }
        }
        next
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compose, store};

    fn add(value: &Value, _: &Action, payload: &Value) -> Value {
        Value::from(value.as_i64().unwrap_or(0) + payload.as_i64().unwrap_or(0))
    }

    #[test]
    fn field_reducers_skip_other_actions() {
        let counters = compose(
            store(Value::record([("a", 1), ("b", 1)])),
            [with_field_reducers([
                FieldReducer::new("a", add).on(["bump"]),
                FieldReducer::new("b", add).on(["other"]),
            ])],
        )
        .unwrap();
        let before = counters.state();

        counters.dispatch("bump", 4).unwrap();
        assert_eq!(counters.state(), Value::record([("a", 5), ("b", 1)]));

        let snapshot = counters.state();
        counters.dispatch("nothing", 4).unwrap();
        assert!(counters.state().same(&snapshot));
        assert_eq!(before, Value::record([("a", 1), ("b", 1)]));
    }

    #[test]
    fn redux_middleware_sees_action_objects() {
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let counter = compose(
            store(Value::record([("count", 0)])),
            [
                with_reducer(|state: &Value, action: &Action, payload: &Value| {
                    let by = payload.get("by").as_i64().unwrap_or(1);
                    let count = state.get("count").as_i64().unwrap_or(0);
                    if action.is("increment") {
                        state.with_field("count", Value::from(count + by))
                    } else if action.is("decrement") {
                        state.with_field("count", Value::from(count - by))
                    } else {
                        state.clone()
                    }
                }),
                with_redux_middleware(move |_, next, object| {
                    log.borrow_mut().push(object.get("type"));
                    if object.get("type").as_str() == Some("flip") {
                        return next(&object.with_field("type", Value::from("decrement")));
                    }
                    next(object)
                }),
            ],
        )
        .unwrap();

        counter.dispatch("increment", Value::record([("by", 5)])).unwrap();
        counter.dispatch("flip", Value::record([("by", 2)])).unwrap();
        assert_eq!(counter.state(), Value::record([("count", 3)]));

        counter.dispatch("increment", 1).unwrap();
        assert_eq!(counter.state(), Value::record([("count", 4)]));
        assert_eq!(*seen.borrow(), vec![Value::from("increment"), Value::from("flip")]);
    }

    #[test]
    fn redux_reducer_sees_type_field() {
        let todos = compose(
            store(Value::list(Vec::<Value>::new())),
            [with_redux_reducer(|state, action| {
                if action.get("type").as_str() != Some("add") {
                    return state.clone();
                }
                let mut items = state.as_list().map(<[Value]>::to_vec).unwrap_or_default();
                items.push(action.get("text"));
                Value::list(items)
            })],
        )
        .unwrap();

        todos
            .dispatch_object(Value::record([("type", "add"), ("text", "milk")]))
            .unwrap();
        assert_eq!(todos.state(), Value::list(["milk"]));
    }
}
