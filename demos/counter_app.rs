//! Counter application showing containers, definitions and host injection together

use futures::executor::block_on;
use hami::runtime::HostApp;
use hami::{create_store_container, define_store, ContainerOptions, StoreOptions};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn counter_options() -> StoreOptions {
    StoreOptions::new()
        .name("counter")
        .state_fn(|| json!({ "count": 0, "step": 1, "history": [0] }))
        .getter("double", |store| {
            let count = store.get("count")?.as_i64().unwrap_or(0);
            Ok(json!(count * 2))
        })
        .action("increment", |store, _args| {
            let step = store.get("step")?.as_i64().unwrap_or(1);
            store.patch_with(move |state| {
                let count = state["count"].as_i64().unwrap_or(0) + step;
                state.insert("count".to_string(), json!(count));
                if let Some(history) = state.get_mut("history").and_then(|h| h.as_array_mut()) {
                    history.push(json!(count));
                }
                json!(count)
            })
        })
        .action("setStep", |store, args| {
            let step = args.first().cloned().unwrap_or(json!(1));
            store.patch(json!({ "step": step }))?;
            Ok(json!(null))
        })
        .async_action("incrementTwice", |store, _args| async move {
            store.invoke("increment", Vec::new())?;
            store.invoke("increment", Vec::new())
        })
}

fn main() -> hami::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hami=debug")),
        )
        .init();

    println!("=== Counter Application ===\n");

    println!("1. Creating a container with devtools logging");
    let container = create_store_container(ContainerOptions::new().devtools(true));
    container.external_store().subscribe(|mutation, state| {
        println!("   [{}] state: {}", mutation.kind, state.snapshot());
    });

    println!("\n2. Registering the counter module");
    let counter = container.store(counter_options())?;
    println!("   name: {}", counter.name());
    println!("   count: {}, double: {}", counter.get("count")?, counter.get("double")?);

    println!("\n3. Calling methods");
    println!("   increment -> {}", counter.invoke("increment", Vec::new())?);
    counter.invoke("setStep", vec![json!(5)])?;
    println!("   increment -> {}", counter.invoke("increment", Vec::new())?);
    let pending = counter.call("incrementTwice", Vec::new())?;
    println!("   incrementTwice -> {}", block_on(pending)?);
    println!("   double: {}", counter.get("double")?);

    println!("\n4. Resetting");
    let state = counter.state()?;
    counter.reset()?;
    println!("   same state object: {}", state.ptr_eq(&counter.state()?));
    println!("   state: {}", state.snapshot());

    println!("\n5. Using a definition inside a host app");
    let definition = define_store(counter_options())?;
    let mut app = HostApp::new();
    container.install(&mut app);
    app.setup(|| -> hami::Result<()> {
        let injected = definition.use_store(None)?;
        println!("   injected count: {}", injected.get("count")?);
        injected.invoke("increment", Vec::new())?;
        println!("   after increment: {}", injected.get("count")?);
        Ok(())
    })?;

    println!("\n=== Done ===");
    Ok(())
}
