//! Integration tests for Trellis

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tokio::task::LocalSet;
use trellis::runtime::ReactiveRuntime;
use trellis::{
    binding, compose, extend, from_future, from_observable, from_prop, from_store, from_value, store,
    with_dispatcher, with_dispatcher_payload, with_field_reducers, with_prop, with_reducer, Action,
    FieldReducer, Mapping, ObjectKind, ObservableValue, PayloadFactory, Store, StoreError, Value,
};

fn settable(field: &'static str) -> impl Fn(&Value, &Action, &Value) -> Value {
    move |state: &Value, action: &Action, payload: &Value| {
        if action.is("set") {
            state.with_field(field, payload.clone())
        } else {
            state.clone()
        }
    }
}

async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn linked_properties_sync_both_ways() {
    LocalSet::new()
        .run_until(async {
            let root = compose(store(Value::record([("value", 1)])), [with_reducer(settable("value"))])
                .unwrap();
            let dependent = compose(
                store(Value::Null),
                [
                    with_reducer(settable("counter")),
                    with_prop("counter", from_store([&root]), Mapping::field("value")),
                ],
            )
            .unwrap();

            // Populated during construction.
            assert_eq!(dependent.state(), Value::record([("counter", 1)]));

            // Upstream is synchronous.
            dependent.dispatch("set", 5).unwrap();
            assert_eq!(root.state().get("value"), Value::from(5));

            // Downstream waits for the next tick.
            root.dispatch("set", 10).unwrap();
            assert_eq!(dependent.state().get("counter"), Value::from(5));
            assert!(dependent.has_pending_sync());
            tick().await;
            assert_eq!(dependent.state().get("counter"), Value::from(10));
        })
        .await;
}

#[tokio::test]
async fn downstream_bursts_coalesce() {
    LocalSet::new()
        .run_until(async {
            let root = compose(store(Value::record([("value", 0)])), [with_reducer(settable("value"))])
                .unwrap();
            let dependent = compose(
                store(Value::Null),
                [with_prop("mirror", from_store([&root]), Mapping::field("value"))],
            )
            .unwrap();
            let notified = Rc::new(Cell::new(0));
            let seen = Rc::clone(&notified);
            let _subscription = dependent.subscribe(move |_| seen.set(seen.get() + 1));

            for value in 1..=5 {
                root.dispatch("set", value).unwrap();
            }
            tick().await;

            assert_eq!(dependent.state().get("mirror"), Value::from(5));
            assert_eq!(notified.get(), 1);
        })
        .await;
}

#[tokio::test]
async fn whole_state_links_and_mutual_links_settle() {
    LocalSet::new()
        .run_until(async {
            let left = compose(store(Value::record([("shared", 1)])), [with_reducer(settable("shared"))])
                .unwrap();
            let right = compose(
                store(Value::Null),
                [
                    with_reducer(settable("shared")),
                    with_prop("shared", from_store([&left]), Mapping::field("shared")),
                ],
            )
            .unwrap();
            extend(
                &left,
                [with_prop("shared", from_store([&right]), Mapping::field("shared"))],
            )
            .unwrap();
            let whole = compose(
                store(Value::Null),
                [with_prop("left", from_store([&left]), Mapping::Whole)],
            )
            .unwrap();
            assert_eq!(whole.state().get("left"), left.state());

            right.dispatch("set", 7).unwrap();
            assert_eq!(left.state().get("shared"), Value::from(7));
            tick().await;
            tick().await;

            assert_eq!(right.state().get("shared"), Value::from(7));
            assert_eq!(left.state().get("shared"), Value::from(7));
            assert!(whole.state().get("left").same(&left.state()));
        })
        .await;
}

#[test]
fn linked_dispatch_without_a_runtime() {
    let root = compose(store(Value::record([("value", 1)])), [with_reducer(settable("value"))]).unwrap();
    let dependent = compose(
        store(Value::Null),
        [
            with_reducer(settable("counter")),
            with_prop("counter", from_store([&root]), Mapping::field("value")),
        ],
    )
    .unwrap();

    dependent.dispatch("set", 5).unwrap();
    assert_eq!(root.state().get("value"), Value::from(5));

    // No runtime to defer on: the pull runs inside the remote's notify.
    root.dispatch("set", 10).unwrap();
    assert_eq!(dependent.state().get("counter"), Value::from(10));
    assert!(!dependent.has_pending_sync());
}

#[test]
fn remotes_from_different_scopes_both_sync() {
    let first = ReactiveRuntime::scope(|| {
        compose(store(Value::record([("a", 1)])), [with_reducer(settable("a"))]).unwrap()
    });
    let second = ReactiveRuntime::scope(|| {
        compose(store(Value::record([("b", 2)])), [with_reducer(settable("b"))]).unwrap()
    });
    assert_ne!(first.id(), second.id());

    let local = compose(
        store(Value::Null),
        [
            with_prop("a", from_store([&first]), Mapping::field("a")),
            with_prop("b", from_store([&second]), Mapping::field("b")),
        ],
    )
    .unwrap();
    assert_eq!(first.subscriber_count(), 1);
    assert_eq!(second.subscriber_count(), 1);

    second.dispatch("set", 20).unwrap();
    assert_eq!(local.state(), Value::record([("a", 1), ("b", 20)]));
}

#[test]
fn future_props_fail_without_a_runtime() {
    let view = compose(
        binding(),
        [with_prop(
            "user",
            from_future(|_| Some(async { Ok::<_, String>(Value::from(1)) }), Value::Null),
            Mapping::combine(|inputs| Value::list(inputs.to_vec())),
        )],
    )
    .unwrap();

    let user = view.instance().map(Value::empty_record()).props.get("user");
    assert_eq!(user.as_list().map(<[Value]>::len), Some(3));
    assert_eq!(user.as_list().unwrap()[1], Value::from("failure"));
}

#[test]
fn field_reducers_compose() {
    let increase_or_decrease = |value: &Value, action: &Action, payload: &Value| {
        let current = value.as_i64().unwrap_or(0);
        let by = payload.as_i64().unwrap_or(0);
        if action.is("increase") {
            Value::from(current + by)
        } else {
            Value::from(current - by)
        }
    };
    let counters = compose(
        store(Value::record([("counter1", 1), ("counter2", 2)])),
        [with_field_reducers(
            FieldReducer::across(["counter1", "counter2"], increase_or_decrease)
                .into_iter()
                .map(|reducer| reducer.on(["increase", "decrease"])),
        )],
    )
    .unwrap();

    counters.dispatch("increase", 2).unwrap();
    assert_eq!(
        counters.state(),
        Value::record([("counter1", 3), ("counter2", 4)])
    );

    counters.dispatch("decrease", 1).unwrap();
    assert_eq!(
        counters.state(),
        Value::record([("counter1", 2), ("counter2", 3)])
    );
}

#[test]
fn subscribers_survive_mutation_during_notify() {
    let store: Store = compose(store(0), [with_reducer(|state: &Value, action: &Action, payload: &Value| {
        if action.is("set") {
            payload.clone()
        } else {
            state.clone()
        }
    })])
    .unwrap();

    let calls = Rc::new(RefCell::new(Vec::new()));
    let own = Rc::new(RefCell::new(None::<trellis::Subscription>));
    let subscription = store.subscribe({
        let calls = Rc::clone(&calls);
        let own = Rc::clone(&own);
        move |state| {
            calls.borrow_mut().push(("once", state.clone()));
            if let Some(subscription) = own.borrow().as_ref() {
                subscription.unsubscribe();
            }
        }
    });
    *own.borrow_mut() = Some(subscription);

    let late = Rc::new(RefCell::new(Vec::new()));
    let adder = store.subscribe({
        let store = store.clone();
        let calls = Rc::clone(&calls);
        let late = Rc::clone(&late);
        move |state| {
            calls.borrow_mut().push(("adder", state.clone()));
            if late.borrow().is_empty() {
                let calls = Rc::clone(&calls);
                late.borrow_mut().push(store.subscribe(move |state| {
                    calls.borrow_mut().push(("late", state.clone()));
                }));
            }
        }
    });

    store.dispatch("set", 1).unwrap();
    store.dispatch("set", 2).unwrap();
    adder.unsubscribe();

    let calls = calls.borrow();
    assert_eq!(calls.iter().filter(|(name, _)| *name == "once").count(), 1);
    assert_eq!(calls.iter().filter(|(name, _)| *name == "adder").count(), 2);
    assert!(calls.contains(&("late", Value::from(2))));
    assert_eq!(store.subscriber_count(), 1);
}

#[test]
fn extend_requires_a_store() {
    let view = compose(binding(), []).unwrap();
    assert_eq!(extend(&view, []), Err(StoreError::NotRedescribable));

    let err = compose(binding(), [with_reducer(|state: &Value, _: &Action, _: &Value| state.clone())])
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::WrongKind {
            operation: "add_reducer",
            kind: ObjectKind::Binding,
        }
    );
}

#[test]
fn binding_maps_props_and_reports_changes() {
    let todos = compose(
        store(Value::record([("items", Value::list(["milk"])), ("filter", Value::from("all"))])),
        [with_reducer(settable("filter"))],
    )
    .unwrap();
    let view = compose(
        binding(),
        [
            with_prop("*", from_store([&todos]), Mapping::Whole),
            with_prop("title", from_prop(["name"]), Mapping::Whole),
            with_prop(
                "count",
                from_value(|description| Value::from(description.own().get("name").as_str().map_or(0, str::len) as i64)),
                Mapping::Whole,
            ),
            with_dispatcher("set_filter", &todos, "set"),
        ],
    )
    .unwrap();

    let instance = view.instance();
    let changes = Rc::new(Cell::new(0));
    let seen = Rc::clone(&changes);
    instance.on_change(move || seen.set(seen.get() + 1));

    let mapped = instance.map(Value::record([("name", "groceries")]));
    assert_eq!(mapped.props.get("title"), Value::from("groceries"));
    assert_eq!(mapped.props.get("filter"), Value::from("all"));
    assert_eq!(mapped.props.get("count"), Value::from(9));
    assert!(mapped.shallow_eq(&instance.map(Value::record([("name", "groceries")]))));

    mapped.dispatchers["set_filter"].call("done").unwrap();
    assert_eq!(changes.get(), 1);
    let remapped = instance.map(Value::record([("name", "groceries")]));
    assert_eq!(remapped.props.get("filter"), Value::from("done"));
    assert!(!remapped.shallow_eq(&mapped));

    instance.release();
    todos.dispatch("set", "all").unwrap();
    assert_eq!(changes.get(), 1);
}

#[test]
fn binding_follows_observables_and_builds_payloads() {
    let online = ObservableValue::new(false);
    let todos = compose(store(Value::record([("selected", Value::Null)])), [with_reducer(settable("selected"))])
        .unwrap();
    let view = compose(
        binding(),
        [
            with_prop("online", from_observable([&online]), Mapping::Whole),
            with_dispatcher_payload("select", &todos, "set", "id"),
            with_dispatcher_payload(
                "select_next",
                &todos,
                "set",
                PayloadFactory::build(|step, own| {
                    Value::from(own.get("id").as_i64().unwrap_or(0) + step.as_i64().unwrap_or(0))
                }),
            ),
        ],
    )
    .unwrap();

    let instance = view.instance();
    let changes = Rc::new(Cell::new(0));
    let seen = Rc::clone(&changes);
    instance.on_change(move || seen.set(seen.get() + 1));

    let own = Value::record([("id", 7)]);
    assert_eq!(instance.map(own.clone()).props.get("online"), Value::from(false));
    online.set(true);
    assert_eq!(changes.get(), 1);
    let mapped = instance.map(own);
    assert_eq!(mapped.props.get("online"), Value::from(true));

    mapped.dispatchers["select"].call(Value::Null).unwrap();
    assert_eq!(todos.state().get("selected"), Value::from(7));
    mapped.dispatchers["select_next"].call(2).unwrap();
    assert_eq!(todos.state().get("selected"), Value::from(9));

    instance.release();
    online.set(false);
    assert_eq!(changes.get(), 3);
}

#[tokio::test]
async fn future_props_report_their_progress() {
    LocalSet::new()
        .run_until(async {
            let view = compose(
                binding(),
                [
                    with_prop(
                        "user",
                        from_future(
                            |description| {
                                let id = description.own().get("id");
                                Some(async move {
                                    tokio::time::sleep(Duration::from_millis(1)).await;
                                    match id.as_i64() {
                                        Some(id) if id > 0 => Ok(Value::record([("id", id)])),
                                        _ => Err(format!("no user {id:?}")),
                                    }
                                })
                            },
                            Value::Null,
                        )
                        .refresh_when(|description| description.own().get("refresh") == Value::from(true)),
                        Mapping::combine(|inputs| Value::list(inputs.to_vec())),
                    ),
                    with_prop(
                        "missing",
                        from_future(|_| None::<std::future::Ready<Result<Value, String>>>, "none"),
                        Mapping::Whole,
                    ),
                ],
            )
            .unwrap();

            let instance = view.instance();
            let changes = Rc::new(Cell::new(0));
            let seen = Rc::clone(&changes);
            instance.on_change(move || seen.set(seen.get() + 1));

            let own = Value::record([("id", 3)]);
            let mapped = instance.map(own.clone());
            assert_eq!(mapped.props.get("user"), Value::list([Value::Null, Value::from("loading")]));
            assert_eq!(mapped.props.get("missing"), Value::from("none"));

            tick().await;
            assert_eq!(changes.get(), 1);
            assert_eq!(
                instance.map(own).props.get("user"),
                Value::list([Value::record([("id", 3)]), Value::from("success")])
            );

            instance.map(Value::record([("id", Value::from(0)), ("refresh", Value::from(true))]));
            tick().await;
            let user = instance.map(Value::record([("id", 0)])).props.get("user");
            assert_eq!(user.as_list().map(<[Value]>::len), Some(3));
            assert_eq!(user.as_list().unwrap()[1], Value::from("failure"));
        })
        .await;
}
