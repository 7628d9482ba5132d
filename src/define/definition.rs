use crate::define::resolve::{resolve_store, StoreCarrier};
use crate::error::{HamiError, Result};
use crate::runtime::{ExternalStoreAdapter, Outcome, SharedStore};
use crate::store::{
    default_module_name, extract_store_options, module_shape, register_module,
    register_module_with, ExtractedDefinition, Facade, MemberKind, ModuleShape, StoreOptions,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};

/// A store declared once and registered lazily on whichever store it is
/// used with.
///
/// # Examples
///
/// ```
/// use hami::runtime::NamespacedStore;
/// use hami::{define_store, StoreOptions};
/// use serde_json::json;
///
/// let counter = define_store(
///     StoreOptions::new()
///         .name("counter")
///         .state(json!({ "count": 0 })),
/// )
/// .unwrap();
///
/// let store = NamespacedStore::new();
/// let first = counter.use_store(Some(&store)).unwrap();
/// first.patch(json!({ "count": 1 })).unwrap();
///
/// // Same store: same live module, state untouched.
/// let second = counter.use_store(Some(&store)).unwrap();
/// assert_eq!(second.get("count").unwrap(), json!(1));
/// ```
#[derive(Clone)]
pub struct StoreDefinition {
    inner: Arc<DefinitionInner>,
}

struct DefinitionInner {
    definition: ExtractedDefinition,
    members: Vec<(String, MemberKind)>,
    // State produced at declaration, spent by the first registration.
    initial: Mutex<Option<Map<String, Value>>>,
    bindings: Mutex<Vec<Binding>>,
}

/// Registration of this definition on one store.
struct Binding {
    store: Weak<dyn ExternalStoreAdapter>,
    shape: Arc<ModuleShape>,
    generation: u64,
}

impl Binding {
    fn is_for(&self, store: &SharedStore) -> bool {
        std::ptr::addr_eq(self.store.as_ptr(), Arc::as_ptr(store))
    }
}

enum Lookup {
    Live(Facade),
    Replaced(String),
    Missing,
}

/// Declare a store without registering it.
///
/// The options are validated and the initial state produced once here, so
/// declaration errors surface immediately. That state seeds the first
/// registration; each later registration produces a fresh one.
pub fn define_store(options: StoreOptions) -> Result<StoreDefinition> {
    let definition = extract_store_options(&options)?;
    let initial = definition.state().produce()?;
    let members = module_shape(String::new(), &definition, &initial)
        .members()
        .map(|(key, kind)| (key.to_string(), kind))
        .collect();

    Ok(StoreDefinition {
        inner: Arc::new(DefinitionInner {
            definition,
            members,
            initial: Mutex::new(Some(initial)),
            bindings: Mutex::new(Vec::new()),
        }),
    })
}

impl StoreDefinition {
    /// Explicit name, if the declaration has one.
    pub fn name(&self) -> Option<&str> {
        self.inner.definition.name()
    }

    /// Facade over the store found from `explicit` alone.
    pub fn use_store(&self, explicit: Option<&dyn StoreCarrier>) -> Result<Facade> {
        self.use_in(explicit, None)
    }

    /// Facade over the store found from `explicit`, then `receiver`, then
    /// ambient injection.
    ///
    /// The module is registered on first use per store. Later uses return a
    /// facade over the same live module unless another registration has
    /// replaced it, in which case it is registered again under its name.
    pub fn use_in(
        &self,
        explicit: Option<&dyn StoreCarrier>,
        receiver: Option<&dyn StoreCarrier>,
    ) -> Result<Facade> {
        let store = resolve_store(explicit, receiver)?;

        let name = match self.lookup(&store) {
            Lookup::Live(facade) => return Ok(facade),
            Lookup::Replaced(name) => name,
            Lookup::Missing => match self.name() {
                Some(name) => name.to_string(),
                None => default_module_name(store.next_module_id()),
            },
        };

        let initial = self.inner.initial.lock().take();
        let registered = match initial {
            Some(initial) => register_module_with(&store, name, &self.inner.definition, initial)?,
            None => register_module(&store, name, &self.inner.definition)?,
        };
        let mut bindings = self.inner.bindings.lock();
        bindings.retain(|binding| binding.store.strong_count() > 0 && !binding.is_for(&store));
        bindings.push(Binding {
            store: Arc::downgrade(&store),
            shape: Arc::clone(registered.facade.shape()),
            generation: registered.generation,
        });
        Ok(registered.facade)
    }

    fn lookup(&self, store: &SharedStore) -> Lookup {
        let bindings = self.inner.bindings.lock();
        let Some(binding) = bindings.iter().find(|binding| binding.is_for(store)) else {
            return Lookup::Missing;
        };
        let name = binding.shape.name();
        if store.module_generation(name) == Some(binding.generation) {
            Lookup::Live(Facade::from_parts(Arc::clone(&binding.shape), Arc::clone(store)))
        } else {
            Lookup::Replaced(name.to_string())
        }
    }

    /// Keys that can be bound as computed accessors.
    pub fn computed_keys(&self) -> impl Iterator<Item = &str> {
        self.inner.members.iter().map(|(key, _)| key.as_str())
    }

    /// Accessor for one facade member, for a host's computed properties.
    pub fn computed(&self, key: &str) -> Result<Computed> {
        let kind = self
            .inner
            .members
            .iter()
            .find(|(member, _)| member == key)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| HamiError::UnknownMember {
                module: self.name().unwrap_or("<unnamed>").to_string(),
                key: key.to_string(),
            })?;
        Ok(Computed {
            definition: self.clone(),
            key: key.to_string(),
            kind,
        })
    }
}

/// One facade member, evaluated against a receiver on demand.
#[derive(Clone)]
pub struct Computed {
    definition: StoreDefinition,
    key: String,
    kind: MemberKind,
}

impl Computed {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Evaluate for `receiver`: a value for fields and getters, a bound
    /// method for mutations and methods.
    pub fn get(&self, receiver: &dyn StoreCarrier) -> Result<ComputedValue> {
        let facade = self.definition.use_in(None, Some(receiver))?;
        if self.kind.is_method() {
            Ok(ComputedValue::Method(BoundMethod {
                facade,
                key: self.key.clone(),
            }))
        } else {
            facade.get(&self.key).map(ComputedValue::Value)
        }
    }
}

/// What a [`Computed`] evaluates to.
#[derive(Debug)]
pub enum ComputedValue {
    Value(Value),
    Method(BoundMethod),
}

impl ComputedValue {
    pub fn into_value(self) -> Option<Value> {
        match self {
            ComputedValue::Value(value) => Some(value),
            ComputedValue::Method(_) => None,
        }
    }

    pub fn into_method(self) -> Option<BoundMethod> {
        match self {
            ComputedValue::Method(method) => Some(method),
            ComputedValue::Value(_) => None,
        }
    }
}

/// A facade method bound to its module.
#[derive(Clone, Debug)]
pub struct BoundMethod {
    facade: Facade,
    key: String,
}

impl BoundMethod {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Outcome> {
        self.facade.call(&self.key, args)
    }

    pub fn invoke(&self, args: Vec<Value>) -> Result<Value> {
        self.facade.invoke(&self.key, args)
    }
}
