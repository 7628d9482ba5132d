use crate::error::Result;
use crate::runtime::StateRef;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Callable form of `$patch`: receives the live state, returns a result.
pub type StateMutator = Box<dyn FnOnce(&mut Map<String, Value>) -> Value + Send>;

/// Mutation handler as the store sees it.
pub type MutationHandler = Arc<dyn Fn(&StateRef, Payload) -> Result<Value> + Send + Sync>;

/// Action handler as the store sees it.
pub type ActionHandler = Arc<dyn Fn(&StateRef, Payload) -> Result<Outcome> + Send + Sync>;

/// Getter handler as the store sees it.
pub type GetterHandler = Arc<dyn Fn(&StateRef) -> Result<Value> + Send + Sync>;

/// Argument envelope delivered to a mutation or action handler.
pub enum Payload {
    /// Call-time arguments in order.
    Params(Vec<Value>),
    /// A state mutator, only meaningful for `$patch`.
    Mutator(StateMutator),
}

impl Payload {
    /// Empty argument list.
    pub fn empty() -> Self {
        Payload::Params(Vec::new())
    }

    /// Plain description of the payload for subscribers and logs.
    pub fn describe(&self) -> Value {
        match self {
            Payload::Params(params) => Value::Array(params.clone()),
            Payload::Mutator(_) => Value::String("<mutator>".to_string()),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Params(params) => f.debug_tuple("Params").field(params).finish(),
            Payload::Mutator(_) => f.write_str("Mutator(..)"),
        }
    }
}

/// Result of a dispatched action.
///
/// Synchronous handlers produce `Ready`. Asynchronous handlers run during
/// dispatch until they first suspend; one that finishes without suspending is
/// also `Ready`, otherwise the rest of its work comes back as `Pending` and
/// awaiting it is up to the caller. Both variants can be awaited directly:
///
/// ```
/// use hami::Outcome;
/// use serde_json::json;
///
/// let outcome = Outcome::Ready(json!(2));
/// let value = futures::executor::block_on(outcome).unwrap();
/// assert_eq!(value, json!(2));
/// ```
#[must_use = "a pending outcome holds the rest of the action's work"]
pub enum Outcome {
    Ready(Value),
    Pending(BoxFuture<'static, Result<Value>>),
}

impl Outcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending(_))
    }

    /// The value of a ready outcome, `None` if it is still pending.
    pub fn ready(self) -> Option<Value> {
        match self {
            Outcome::Ready(value) => Some(value),
            Outcome::Pending(_) => None,
        }
    }
}

impl Future for Outcome {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut *self {
            // Polling again after completion yields null.
            Outcome::Ready(value) => Poll::Ready(Ok(value.take())),
            Outcome::Pending(pending) => pending.as_mut().poll(cx),
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Outcome::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Registration payload for one module.
pub struct ModuleDefinition {
    /// Members are addressed as `module/member` when set, bare otherwise.
    pub namespaced: bool,
    pub state: Map<String, Value>,
    pub mutations: IndexMap<String, MutationHandler>,
    pub getters: IndexMap<String, GetterHandler>,
    pub actions: IndexMap<String, ActionHandler>,
}

impl ModuleDefinition {
    /// A namespaced module with the given initial state and no members.
    pub fn namespaced(state: Map<String, Value>) -> Self {
        Self {
            namespaced: true,
            state,
            mutations: IndexMap::new(),
            getters: IndexMap::new(),
            actions: IndexMap::new(),
        }
    }
}

/// The operations the facade needs from a namespaced state container.
///
/// Exactly one implementation ships with the crate
/// ([`NamespacedStore`](crate::runtime::NamespacedStore)); everything above
/// this trait is written against it so the container can be swapped without
/// capability probing at call sites.
pub trait ExternalStoreAdapter: Send + Sync {
    /// Register a module, returning its registration generation.
    fn register_module(&self, name: &str, module: ModuleDefinition) -> Result<u64>;

    /// Register a module, first unregistering any module under `name`, as
    /// one step. Returns the new registration generation.
    fn replace_module(&self, name: &str, module: ModuleDefinition) -> Result<u64>;

    fn unregister_module(&self, name: &str) -> Result<()>;

    fn has_module(&self, name: &str) -> bool;

    /// Generation of the live registration under `name`, if any.
    fn module_generation(&self, name: &str) -> Option<u64>;

    /// The live state container of a module.
    fn module_state(&self, name: &str) -> Result<StateRef>;

    /// One field of a module's state; missing fields read as `null`.
    fn read_state(&self, name: &str, key: &str) -> Result<Value>;

    fn read_getter(&self, path: &str) -> Result<Value>;

    /// Run a mutation and return its handler's result.
    fn commit(&self, path: &str, payload: Payload) -> Result<Value>;

    /// Run an action and return its handler's outcome.
    fn dispatch(&self, path: &str, payload: Payload) -> Result<Outcome>;

    /// Next id for a synthesized module name, unique per store instance.
    fn next_module_id(&self) -> u64;
}

/// Shared handle to a store behind the adapter interface.
pub type SharedStore = Arc<dyn ExternalStoreAdapter>;
