use crate::error::{HamiError, Result};
use crate::runtime::{
    ActionHandler, ExternalStoreAdapter, GetterHandler, ModuleDefinition, MutationHandler, Outcome,
    Payload, SharedStore, StateRef,
};
use crate::store::extract::{ActionDef, ExtractedDefinition, StateProducer};
use crate::store::facade::{Facade, ModuleShape};
use futures::future::BoxFuture;
use futures::task::noop_waker_ref;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

const PATCH: &str = "$patch";
const RESET: &str = "$reset";
const STATE: &str = "$state";

/// Name given to modules declared without `$name`.
pub(crate) fn default_module_name(id: u64) -> String {
    format!("_hami_{id}")
}

/// A module freshly installed on a store.
pub(crate) struct Registered {
    pub(crate) facade: Facade,
    pub(crate) generation: u64,
}

/// Build the module for `definition` and install it on `store` as `name`.
///
/// A module already registered under the same name is unregistered first,
/// so re-evaluating a declaration replaces it instead of failing.
pub(crate) fn register_module(
    store: &SharedStore,
    name: String,
    definition: &ExtractedDefinition,
) -> Result<Registered> {
    let initial = definition.state.produce()?;
    register_module_with(store, name, definition, initial)
}

/// [`register_module`] with an initial state the caller already produced.
pub(crate) fn register_module_with(
    store: &SharedStore,
    name: String,
    definition: &ExtractedDefinition,
    initial: Map<String, Value>,
) -> Result<Registered> {
    let shape = Arc::new(module_shape(name.clone(), definition, &initial));

    let receiver = Receiver {
        shape: Arc::clone(&shape),
        store: Arc::downgrade(store),
    };

    let mut module = ModuleDefinition::namespaced(initial);
    module.mutations.insert(PATCH.to_string(), patch_mutation());
    module
        .mutations
        .insert(RESET.to_string(), reset_mutation(definition.state.clone()));
    for (key, action) in &definition.actions {
        module
            .actions
            .insert(key.clone(), action_trampoline(key, action.clone(), receiver.clone()));
    }
    for (key, getter) in &definition.getters {
        let getter = Arc::clone(getter);
        let receiver = receiver.clone();
        let trampoline: GetterHandler = Arc::new(move |_state| getter(&receiver.bind()?));
        module.getters.insert(key.clone(), trampoline);
    }
    module.getters.insert(STATE.to_string(), state_getter());

    // Hot reload re-evaluates the same declaration: last one wins.
    let generation = store.replace_module(&name, module)?;

    Ok(Registered {
        facade: Facade::from_parts(shape, Arc::clone(store)),
        generation,
    })
}

/// Facade layout of `definition` given its initial state.
pub(crate) fn module_shape(
    name: String,
    definition: &ExtractedDefinition,
    initial: &Map<String, Value>,
) -> ModuleShape {
    ModuleShape::new(
        name,
        [PATCH, RESET],
        definition.actions.keys().map(String::as_str),
        definition
            .getters
            .keys()
            .map(String::as_str)
            .chain([STATE]),
        initial.keys().map(String::as_str),
    )
}

/// What trampolines bind their handlers to.
///
/// Holds the store weakly so registered handlers never keep it alive.
#[derive(Clone)]
struct Receiver {
    shape: Arc<ModuleShape>,
    store: Weak<dyn ExternalStoreAdapter>,
}

impl Receiver {
    fn bind(&self) -> Result<Facade> {
        self.store
            .upgrade()
            .map(|store| Facade::from_parts(Arc::clone(&self.shape), store))
            .ok_or_else(|| HamiError::StoreDropped(self.shape.name().to_string()))
    }
}

fn action_trampoline(key: &str, action: ActionDef, receiver: Receiver) -> ActionHandler {
    let key = key.to_string();
    Arc::new(move |_state, payload| {
        let Payload::Params(params) = payload else {
            return Err(HamiError::UnexpectedMutator(key.clone()));
        };
        let facade = receiver.bind()?;
        match &action {
            ActionDef::Sync(handler) => handler(&facade, &params).map(Outcome::Ready),
            ActionDef::Async(handler) => run_until_suspended(handler(facade, params)),
        }
    })
}

/// Drive an async method up to its first suspension point.
///
/// Work before the first real await happens during dispatch, whether or not
/// the caller ever awaits the outcome.
fn run_until_suspended(mut pending: BoxFuture<'static, Result<Value>>) -> Result<Outcome> {
    let mut cx = Context::from_waker(noop_waker_ref());
    match pending.poll_unpin(&mut cx) {
        Poll::Ready(result) => result.map(Outcome::Ready),
        Poll::Pending => Ok(Outcome::Pending(pending)),
    }
}

fn patch_mutation() -> MutationHandler {
    Arc::new(|state: &StateRef, payload| match payload {
        Payload::Mutator(mutator) => Ok(state.mutate(mutator)),
        Payload::Params(params) => match params.into_iter().next() {
            Some(Value::Object(partial)) => {
                state.merge(partial);
                Ok(Value::Null)
            }
            _ => Err(HamiError::InvalidPatch),
        },
    })
}

fn reset_mutation(producer: StateProducer) -> MutationHandler {
    Arc::new(move |state: &StateRef, _payload| {
        let fresh = producer.produce()?;
        state.refresh_from(&fresh);
        Ok(Value::Null)
    })
}

fn state_getter() -> GetterHandler {
    Arc::new(|state: &StateRef| Ok(state.snapshot()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::NamespacedStore;
    use crate::store::extract::extract_store_options;
    use crate::StoreOptions;
    use serde_json::json;

    fn register(store: &SharedStore, options: StoreOptions) -> Facade {
        let definition = extract_store_options(&options).unwrap();
        let name = definition
            .name()
            .map(str::to_owned)
            .unwrap_or_else(|| default_module_name(store.next_module_id()));
        register_module(store, name, &definition).unwrap().facade
    }

    #[test]
    fn default_names_are_sequential_per_store() {
        let store: SharedStore = NamespacedStore::new();
        let first = register(&store, StoreOptions::new());
        let second = register(&store, StoreOptions::new());
        assert_eq!(first.name(), "_hami_0");
        assert_eq!(second.name(), "_hami_1");

        let other: SharedStore = NamespacedStore::new();
        assert_eq!(register(&other, StoreOptions::new()).name(), "_hami_0");
    }

    #[test]
    fn builtins_are_always_present() {
        let store: SharedStore = NamespacedStore::new();
        let facade = register(&store, StoreOptions::new());
        let mut keys: Vec<&str> = facade.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["$name", "$patch", "$reset", "$state"]);
        facade.patch(json!({})).unwrap();
        facade.reset().unwrap();
    }

    #[test]
    fn patch_rejects_non_objects() {
        let store: SharedStore = NamespacedStore::new();
        let facade = register(&store, StoreOptions::new().state(json!({ "count": 0 })));
        assert!(matches!(facade.patch(json!(5)), Err(HamiError::InvalidPatch)));
        assert!(matches!(
            facade.invoke("$patch", Vec::new()),
            Err(HamiError::InvalidPatch)
        ));
    }

    #[test]
    fn reset_only_refreshes_existing_fields() {
        let store: SharedStore = NamespacedStore::new();
        let facade = register(
            &store,
            StoreOptions::new().state(json!({ "count": 0, "label": "a" })),
        );
        facade
            .patch(json!({ "count": 9, "label": "b", "extra": 1 }))
            .unwrap();
        facade.reset().unwrap();
        assert_eq!(
            facade.state().unwrap().snapshot(),
            json!({ "count": 0, "label": "a", "extra": 1 })
        );
    }

    #[test]
    fn failing_state_producer_registers_nothing() {
        let store: SharedStore = NamespacedStore::new();
        let definition =
            extract_store_options(&StoreOptions::new().name("bad").state_fn(|| json!(1))).unwrap();
        assert!(matches!(
            register_module(&store, "bad".to_string(), &definition),
            Err(HamiError::InvalidState)
        ));
        assert!(!store.has_module("bad"));
    }

    #[test]
    fn concurrent_registration_under_one_name_replaces() {
        let store: SharedStore = NamespacedStore::new();
        std::thread::scope(|scope| {
            for i in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    register(store, StoreOptions::new().name("hot").state(json!({ "i": i })))
                });
            }
        });
        assert!(store.has_module("hot"));
        assert!(store.read_state("hot", "i").unwrap().is_u64());
        assert!(store.module_generation("hot").is_some());
    }

    #[test]
    fn handlers_do_not_keep_store_alive() {
        let store = NamespacedStore::new();
        let shared: SharedStore = store.clone();
        let facade = register(
            &shared,
            StoreOptions::new().getter("one", |_| Ok(json!(1))),
        );
        drop(facade);
        drop(shared);
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
