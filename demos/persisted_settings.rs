//! Settings store that survives being recreated

use serde_json::json;
use tinstore::{
    CreateStateOptions, Environment, MemoryStorage, PersistOptions, StateDescriptor, StoreContext,
    StoreHook,
};

fn settings(ctx: &StoreContext, storage: &MemoryStorage) -> StoreHook {
    ctx.create_state(
        || StateDescriptor::plain(json!({ "theme": "light", "font_size": 14 })),
        "settings",
        CreateStateOptions::new()
            .with_namespace("settings")
            .with_persist(PersistOptions::new("settings", storage.clone())),
    )
}

fn main() {
    println!("=== Persisted settings ===\n");

    let storage = MemoryStorage::new();

    {
        let ctx = StoreContext::new(Environment::production());
        let store = settings(&ctx, &storage);
        println!("First run: {}", store.get_state().snapshot());

        store.get_final_state().set("theme", "dark");
        store.get_final_state().set("font_size", 16);
        println!("Changed to: {}", store.get_state().snapshot());
    }

    let ctx = StoreContext::new(Environment::production());
    let store = settings(&ctx, &storage);
    println!("\nAfter restart: {}", store.get_state().snapshot());
}
