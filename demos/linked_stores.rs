//! Two stores sharing a field through a link

use std::time::Duration;

use tokio::task::LocalSet;
use trellis::{compose, from_store, store, with_prop, with_reducer, Action, Mapping, Value};

fn set(field: &'static str) -> impl Fn(&Value, &Action, &Value) -> Value {
    move |state: &Value, action: &Action, payload: &Value| {
        if action.is("set") {
            state.with_field(field, payload.clone())
        } else {
            state.clone()
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> trellis::Result<()> {
    println!("=== Linked Stores Example ===\n");

    LocalSet::new()
        .run_until(async {
            let settings = compose(
                store(Value::record([("theme", "light")])).named("settings"),
                [with_reducer(set("theme"))],
            )?;
            let editor = compose(
                store(Value::Null).named("editor"),
                [
                    with_reducer(set("theme")),
                    with_prop("theme", from_store([&settings]), Mapping::field("theme")),
                ],
            )?;
            println!("editor starts with {:?}", editor.state().get("theme"));

            // Local writes reach the remote store immediately.
            editor.dispatch("set", "dark")?;
            println!("settings after editor write: {:?}", settings.state().get("theme"));

            // Remote writes arrive on the next tick.
            settings.dispatch("set", "solarized")?;
            println!("editor right after settings write: {:?}", editor.state().get("theme"));
            tokio::time::sleep(Duration::from_millis(1)).await;
            println!("editor one tick later: {:?}", editor.state().get("theme"));

            Ok::<(), trellis::StoreError>(())
        })
        .await
}
