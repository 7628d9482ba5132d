use crate::error::{HamiError, Result};
use crate::helper::namespaced_key;
use crate::runtime::adapter::{
    ActionHandler, ExternalStoreAdapter, GetterHandler, ModuleDefinition, MutationHandler, Outcome,
    Payload,
};
use crate::runtime::state::{CommitTracker, StateRef};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Description of a committed mutation handed to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct MutationRecord {
    /// Full mutation type, e.g. `counter/$patch`.
    pub kind: String,
    pub payload: Value,
}

/// Description of a dispatched action handed to action subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    pub kind: String,
    pub payload: Value,
}

type MutationSubscriber = Arc<dyn Fn(&MutationRecord, &StateRef) + Send + Sync>;
type ActionSubscriber = Arc<dyn Fn(&ActionRecord) + Send + Sync>;

/// Function run once against a freshly created store.
pub type Plugin = Arc<dyn Fn(&NamespacedStore) + Send + Sync>;

/// Construction settings for [`NamespacedStore`].
#[derive(Clone, Default)]
pub struct StoreSettings {
    /// Reject state writes made outside mutation handlers.
    pub strict: bool,
    /// Emit one `tracing` event per mutation on target `hami::devtools`.
    pub devtools: bool,
    pub plugins: Vec<Plugin>,
}

struct ModuleRecord {
    state: StateRef,
    generation: u64,
    mutations: Vec<String>,
    getters: Vec<String>,
    actions: Vec<String>,
}

#[derive(Default)]
struct Registry {
    modules: HashMap<String, ModuleRecord>,
    // Member tables keyed by full type, each entry remembers its module.
    mutations: HashMap<String, (String, MutationHandler)>,
    getters: HashMap<String, (String, GetterHandler)>,
    actions: HashMap<String, (String, ActionHandler)>,
}

impl Registry {
    fn state_of(&self, module: &str) -> Result<StateRef> {
        self.modules
            .get(module)
            .map(|record| record.state.clone())
            .ok_or_else(|| HamiError::ModuleNotFound(module.to_string()))
    }

    /// Install `module` as `name` under `generation`.
    fn install(
        &mut self,
        name: &str,
        module: ModuleDefinition,
        generation: u64,
        tracker: &Arc<CommitTracker>,
    ) {
        let address = |member: &str| {
            if module.namespaced {
                namespaced_key(name, member)
            } else {
                member.to_string()
            }
        };

        let mut record = ModuleRecord {
            state: StateRef::new(name, module.state, Arc::clone(tracker)),
            generation,
            mutations: Vec::with_capacity(module.mutations.len()),
            getters: Vec::with_capacity(module.getters.len()),
            actions: Vec::with_capacity(module.actions.len()),
        };
        for (key, handler) in module.mutations {
            let path = address(&key);
            self.mutations.insert(path.clone(), (name.to_string(), handler));
            record.mutations.push(path);
        }
        for (key, handler) in module.getters {
            let path = address(&key);
            self.getters.insert(path.clone(), (name.to_string(), handler));
            record.getters.push(path);
        }
        for (key, handler) in module.actions {
            let path = address(&key);
            self.actions.insert(path.clone(), (name.to_string(), handler));
            record.actions.push(path);
        }

        tracing::debug!(
            module = name,
            generation,
            mutations = record.mutations.len(),
            getters = record.getters.len(),
            actions = record.actions.len(),
            "module registered"
        );
        self.modules.insert(name.to_string(), record);
    }

    fn remove(&mut self, name: &str) -> Option<ModuleRecord> {
        let record = self.modules.remove(name)?;

        // Only drop entries still owned by this module.
        for path in &record.mutations {
            if self.mutations.get(path).is_some_and(|(owner, _)| owner == name) {
                self.mutations.remove(path);
            }
        }
        for path in &record.getters {
            if self.getters.get(path).is_some_and(|(owner, _)| owner == name) {
                self.getters.remove(path);
            }
        }
        for path in &record.actions {
            if self.actions.get(path).is_some_and(|(owner, _)| owner == name) {
                self.actions.remove(path);
            }
        }

        tracing::debug!(module = name, generation = record.generation, "module unregistered");
        Some(record)
    }
}

/// Namespaced module state container.
///
/// Holds one state object per registered module plus flat tables of
/// getters, mutations and actions addressed by `module/member`. Handlers are
/// looked up under a short read lock and run with no store lock held, so
/// they may freely commit, dispatch or read back into the same store.
///
/// # Examples
///
/// ```
/// use hami::runtime::{ExternalStoreAdapter, ModuleDefinition, NamespacedStore, Payload};
/// use serde_json::{json, Map};
/// use std::sync::Arc;
///
/// let store = NamespacedStore::new();
/// let mut module = ModuleDefinition::namespaced(Map::new());
/// module.mutations.insert(
///     "touch".to_string(),
///     Arc::new(|state, _payload| {
///         state.set("touched", json!(true))?;
///         Ok(json!(null))
///     }),
/// );
/// store.register_module("page", module).unwrap();
/// store.commit("page/touch", Payload::empty()).unwrap();
/// assert_eq!(store.read_state("page", "touched").unwrap(), json!(true));
/// ```
pub struct NamespacedStore {
    registry: RwLock<Registry>,
    tracker: Arc<CommitTracker>,
    next_module_id: AtomicU64,
    next_generation: AtomicU64,
    subscribers: RwLock<Vec<MutationSubscriber>>,
    action_subscribers: RwLock<Vec<ActionSubscriber>>,
}

impl NamespacedStore {
    /// Create a non-strict store with no plugins.
    pub fn new() -> Arc<Self> {
        Self::with_settings(StoreSettings::default())
    }

    /// Create a store, then run its plugins against it.
    pub fn with_settings(settings: StoreSettings) -> Arc<Self> {
        let store = Arc::new(NamespacedStore {
            registry: RwLock::new(Registry::default()),
            tracker: Arc::new(CommitTracker::new(settings.strict)),
            next_module_id: AtomicU64::new(0),
            next_generation: AtomicU64::new(1),
            subscribers: RwLock::new(Vec::new()),
            action_subscribers: RwLock::new(Vec::new()),
        });

        if settings.devtools {
            store.subscribe(|mutation, _state| {
                tracing::info!(
                    target: "hami::devtools",
                    mutation = %mutation.kind,
                    payload = %mutation.payload,
                    "mutation"
                );
            });
        }
        for plugin in &settings.plugins {
            plugin(store.as_ref());
        }
        store
    }

    pub fn is_strict(&self) -> bool {
        self.tracker.is_strict()
    }

    /// Subscribe to committed mutations.
    ///
    /// The callback runs after each successful commit with the mutation and
    /// the state of the module it touched.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&MutationRecord, &StateRef) + Send + Sync + 'static,
    {
        self.subscribers.write().push(Arc::new(callback));
    }

    /// Subscribe to dispatched actions. Runs before the action handler.
    pub fn subscribe_action<F>(&self, callback: F)
    where
        F: Fn(&ActionRecord) + Send + Sync + 'static,
    {
        self.action_subscribers.write().push(Arc::new(callback));
    }

    /// Names of the registered modules, in no particular order.
    pub fn modules(&self) -> Vec<String> {
        self.registry.read().modules.keys().cloned().collect()
    }

    /// Snapshot of every module's state keyed by module name.
    pub fn root_state(&self) -> Value {
        let registry = self.registry.read();
        let root: Map<String, Value> = registry
            .modules
            .iter()
            .map(|(name, record)| (name.clone(), record.state.snapshot()))
            .collect();
        Value::Object(root)
    }

    fn notify(&self, mutation: &MutationRecord, state: &StateRef) {
        // Copy out so subscribers may subscribe without deadlocking.
        let subscribers = self.subscribers.read().clone();
        for subscriber in subscribers.iter() {
            subscriber(mutation, state);
        }
    }

    fn notify_action(&self, action: &ActionRecord) {
        let subscribers = self.action_subscribers.read().clone();
        for subscriber in subscribers.iter() {
            subscriber(action);
        }
    }
}

impl ExternalStoreAdapter for NamespacedStore {
    fn register_module(&self, name: &str, module: ModuleDefinition) -> Result<u64> {
        let mut registry = self.registry.write();
        if registry.modules.contains_key(name) {
            return Err(HamiError::DuplicateModule(name.to_string()));
        }
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        registry.install(name, module, generation, &self.tracker);
        Ok(generation)
    }

    fn replace_module(&self, name: &str, module: ModuleDefinition) -> Result<u64> {
        let mut registry = self.registry.write();
        registry.remove(name);
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        registry.install(name, module, generation, &self.tracker);
        Ok(generation)
    }

    fn unregister_module(&self, name: &str) -> Result<()> {
        self.registry
            .write()
            .remove(name)
            .map(drop)
            .ok_or_else(|| HamiError::ModuleNotFound(name.to_string()))
    }

    fn has_module(&self, name: &str) -> bool {
        self.registry.read().modules.contains_key(name)
    }

    fn module_generation(&self, name: &str) -> Option<u64> {
        self.registry
            .read()
            .modules
            .get(name)
            .map(|record| record.generation)
    }

    fn module_state(&self, name: &str) -> Result<StateRef> {
        self.registry.read().state_of(name)
    }

    fn read_state(&self, name: &str, key: &str) -> Result<Value> {
        let state = self.module_state(name)?;
        Ok(state.get(key).unwrap_or(Value::Null))
    }

    fn read_getter(&self, path: &str) -> Result<Value> {
        let (handler, state) = {
            let registry = self.registry.read();
            let (module, handler) = registry
                .getters
                .get(path)
                .ok_or_else(|| HamiError::UnknownGetter(path.to_string()))?;
            (Arc::clone(handler), registry.state_of(module)?)
        };
        handler(&state)
    }

    fn commit(&self, path: &str, payload: Payload) -> Result<Value> {
        let (handler, state) = {
            let registry = self.registry.read();
            let (module, handler) = registry
                .mutations
                .get(path)
                .ok_or_else(|| HamiError::UnknownMutation(path.to_string()))?;
            (Arc::clone(handler), registry.state_of(module)?)
        };

        let mutation = MutationRecord {
            kind: path.to_string(),
            payload: payload.describe(),
        };
        tracing::trace!(mutation = path, "commit");

        let result = self.tracker.committing(|| handler(&state, payload))?;
        self.notify(&mutation, &state);
        Ok(result)
    }

    fn dispatch(&self, path: &str, payload: Payload) -> Result<Outcome> {
        let (handler, state) = {
            let registry = self.registry.read();
            let (module, handler) = registry
                .actions
                .get(path)
                .ok_or_else(|| HamiError::UnknownAction(path.to_string()))?;
            (Arc::clone(handler), registry.state_of(module)?)
        };

        tracing::trace!(action = path, "dispatch");
        self.notify_action(&ActionRecord {
            kind: path.to_string(),
            payload: payload.describe(),
        });
        handler(&state, payload)
    }

    fn next_module_id(&self) -> u64 {
        self.next_module_id.fetch_add(1, Ordering::SeqCst)
    }
}
