//! Counter store connected to an in-memory devtools transport

use serde_json::json;
use tinstore::{
    ActionMap, CreateStateOptions, Environment, MemoryTransport, ReactiveState, StateDescriptor,
    StateValue, StoreContext,
};

fn counter_actions(state: &ReactiveState) -> ActionMap {
    let increment = state.clone();
    let reset = state.clone();
    ActionMap::new()
        .action("increment", 1, move |args| {
            let n = args.first().and_then(StateValue::as_i64).unwrap_or(1);
            increment.update("count", |v| *v = StateValue::from(v.as_i64().unwrap_or(0) + n));
            Ok(StateValue::Null)
        })
        .action("reset", 0, move |_| {
            reset.set("count", 0);
            Ok(StateValue::Null)
        })
}

fn main() {
    println!("=== Counter with devtools ===\n");

    let transport = MemoryTransport::new();
    let ctx = StoreContext::builder()
        .environment(Environment::development())
        .transport(transport.clone())
        .build();

    let store = ctx.create_state(
        || StateDescriptor::plain(json!({ "count": 0 })),
        "counter",
        CreateStateOptions::new()
            .with_namespace("counter")
            .with_actions(counter_actions),
    );
    store.get_life_cycle().set_sync_update_component(true);

    let _sub = store.subscribe(
        |state| state.get("count").and_then(|v| v.as_i64()).unwrap_or(0),
        |count| println!("count is now {count}"),
    );

    println!("Dispatching actions...");
    let _ = store.dispatch("increment", &[5.into()]);
    let _ = store.dispatch("increment", &[]);

    println!("\nWriting outside an action...");
    store.get_final_state().set("count", 100);

    let _ = store.dispatch("reset", &[]);

    println!("\nDevtools received:");
    for event in transport.events() {
        println!("  {:<32} {}", event.action.kind, event.state);
    }
}
