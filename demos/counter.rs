//! Counter store with a computed field, middleware and named actions

use trellis::{
    compose, from_prop, store, with_action, with_middleware, with_prop, with_reducer, Action,
    ActionCreator, Mapping, Next, Store, Value,
};

fn main() -> trellis::Result<()> {
    println!("=== Counter Example ===\n");

    let counter = compose(
        store(Value::record([("count", 0)])).named("counter"),
        [
            with_reducer(|state: &Value, action: &Action, payload: &Value| {
                let count = state.get("count").as_i64().unwrap_or(0);
                let by = payload.as_i64().unwrap_or(1);
                if action.is("increase") {
                    state.with_field("count", Value::from(count + by))
                } else if action.is("decrease") {
                    state.with_field("count", Value::from(count - by))
                } else {
                    state.clone()
                }
            }),
            with_prop(
                "parity",
                from_prop(["count"]),
                Mapping::combine(|inputs| {
                    let even = inputs[0].as_i64().unwrap_or(0) % 2 == 0;
                    Value::from(if even { "even" } else { "odd" })
                }),
            ),
            // Refuse to go below zero.
            with_middleware(|store: &Store, next: Next<'_>, action: &Action, payload: &Value| {
                let count = store.state().get("count").as_i64().unwrap_or(0);
                if action.is("decrease") && count - payload.as_i64().unwrap_or(1) < 0 {
                    println!("  (blocked {} below zero)", action.name());
                    return None;
                }
                next.run(action, payload)
            }),
            with_action(
                "reset",
                ActionCreator::setter("reset", |state, _| state.with_field("count", Value::from(0))),
            ),
        ],
    )?;

    let _subscription = counter.subscribe(|state| {
        println!(
            "count = {}, parity = {}",
            state.get("count").as_i64().unwrap_or(0),
            state.get("parity").as_str().unwrap_or("?")
        );
    });

    println!("Increasing...");
    counter.dispatch("increase", 3)?;
    counter.dispatch("increase", Value::Null)?;

    println!("\nDecreasing past zero...");
    counter.dispatch("decrease", 10)?;

    println!("\nResetting...");
    if let Some(reset) = counter.action("reset") {
        reset.call(Value::Null)?;
    }

    println!("\nFinal state: {:?}", counter.state());
    Ok(())
}
