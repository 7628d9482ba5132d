use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use hami::{create_store_container, define_store, ContainerOptions, Facade, StoreOptions};
use hami::runtime::NamespacedStore;
use serde_json::json;

fn counter_options() -> StoreOptions {
    StoreOptions::new()
        .name("counter")
        .state(json!({ "count": 0 }))
        .getter("double", |store| {
            let count = store.get("count")?.as_i64().unwrap_or(0);
            Ok(json!(count * 2))
        })
        .action("increment", |store, _args| {
            let count = store.get("count")?.as_i64().unwrap_or(0);
            store.patch(json!({ "count": count + 1 }))?;
            store.get("count")
        })
}

fn counter() -> Facade {
    create_store_container(ContainerOptions::new())
        .store(counter_options())
        .expect("counter registers")
}

fn registration_benchmark(c: &mut Criterion) {
    let container = create_store_container(ContainerOptions::new());

    c.bench_function("module_registration", |b| {
        b.iter(|| {
            // Same name every time: measures the replace path too.
            let facade = container.store(counter_options()).unwrap();
            black_box(facade)
        });
    });
}

fn state_read_benchmark(c: &mut Criterion) {
    let facade = counter();

    c.bench_function("state_read", |b| {
        b.iter(|| {
            black_box(facade.get("count").unwrap());
        });
    });
}

fn getter_read_benchmark(c: &mut Criterion) {
    let facade = counter();

    c.bench_function("getter_read", |b| {
        b.iter(|| {
            black_box(facade.get("double").unwrap());
        });
    });
}

fn action_round_trip_benchmark(c: &mut Criterion) {
    let facade = counter();

    c.bench_function("action_round_trip", |b| {
        b.iter(|| {
            black_box(facade.invoke("increment", Vec::new()).unwrap());
        });
    });
}

fn patch_benchmark(c: &mut Criterion) {
    let facade = counter();

    c.bench_function("patch_partial", |b| {
        let mut i = 0;
        b.iter(|| {
            facade.patch(json!({ "count": black_box(i) })).unwrap();
            i += 1;
        });
    });
}

fn definition_use_benchmark(c: &mut Criterion) {
    let definition = define_store(counter_options()).unwrap();
    let store = NamespacedStore::new();
    definition.use_store(Some(&store)).unwrap();

    c.bench_function("definition_use_cached", |b| {
        b.iter(|| {
            black_box(definition.use_store(Some(&store)).unwrap());
        });
    });
}

fn reset_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("reset");

    for fields in [1, 10, 100].iter() {
        let state: serde_json::Map<String, serde_json::Value> =
            (0..*fields).map(|i| (format!("field{i}"), json!(i))).collect();
        let facade = create_store_container(ContainerOptions::new())
            .store(StoreOptions::new().state(serde_json::Value::Object(state)))
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(fields), fields, |b, _| {
            b.iter(|| {
                facade.reset().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    registration_benchmark,
    state_read_benchmark,
    getter_read_benchmark,
    action_round_trip_benchmark,
    patch_benchmark,
    definition_use_benchmark,
    reset_benchmark
);
criterion_main!(benches);
