use crate::error::{HamiError, Result};
use crate::helper::{is_nil, is_plain_object, is_reserved_key};
use crate::store::options::{ActionFn, AsyncActionFn, GetterFn, Member, ProducerFn, StoreOptions};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;

const NAME_KEY: &str = "$name";
const STATE_KEY: &str = "$state";

/// Callable that yields a fresh, independent initial state on every call.
#[derive(Clone)]
pub struct StateProducer {
    produce: ProducerFn,
}

impl StateProducer {
    /// Produce a new state object.
    pub fn produce(&self) -> Result<Map<String, Value>> {
        match (self.produce)() {
            Value::Object(state) => Ok(state),
            _ => Err(HamiError::InvalidState),
        }
    }
}

/// A declared method, synchronous or not.
#[derive(Clone)]
pub(crate) enum ActionDef {
    Sync(ActionFn),
    Async(AsyncActionFn),
}

/// Declaration split into its reserved fields, getters and methods.
#[derive(Clone)]
pub struct ExtractedDefinition {
    pub(crate) name: Option<String>,
    pub(crate) state: StateProducer,
    pub(crate) getters: IndexMap<String, GetterFn>,
    pub(crate) actions: IndexMap<String, ActionDef>,
}

impl ExtractedDefinition {
    /// Explicit module name, if one was declared.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn state(&self) -> &StateProducer {
        &self.state
    }

    pub fn getter_keys(&self) -> impl Iterator<Item = &str> {
        self.getters.keys().map(String::as_str)
    }

    pub fn action_keys(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }
}

/// Split store options into reserved fields, getters and methods.
///
/// Fails on `$`-prefixed keys other than `$name` and `$state`, on plain keys
/// declared as neither getter nor method, and on a `$state` that is not a
/// producer or a plain object. Nothing is registered when this fails.
pub fn extract_store_options(options: &StoreOptions) -> Result<ExtractedDefinition> {
    let mut name = None;
    let mut state = None;
    let mut getters = IndexMap::new();
    let mut actions = IndexMap::new();

    for (key, member) in options.entries() {
        if is_reserved_key(key) {
            match key {
                NAME_KEY => match member {
                    Member::Value(Value::String(value)) => name = Some(value.clone()),
                    _ => return Err(HamiError::UnexpectedValue(key.to_string())),
                },
                STATE_KEY => state = Some(member),
                _ => return Err(HamiError::ReservedKey(key.to_string())),
            }
            continue;
        }
        match member {
            Member::Getter(getter) => {
                getters.insert(key.to_string(), Arc::clone(getter));
            }
            Member::Action(action) => {
                actions.insert(key.to_string(), ActionDef::Sync(Arc::clone(action)));
            }
            Member::AsyncAction(action) => {
                actions.insert(key.to_string(), ActionDef::Async(Arc::clone(action)));
            }
            Member::Value(_) | Member::Producer(_) => {
                return Err(HamiError::UnexpectedValue(key.to_string()));
            }
        }
    }

    Ok(ExtractedDefinition {
        name,
        state: normalize_state(state)?,
        getters,
        actions,
    })
}

/// Turn a `$state` declaration into a producer.
///
/// A plain object is serialized once and parsed again on every call, so each
/// produced state is independent of the declaration and of earlier calls.
pub fn normalize_state(state: Option<&Member>) -> Result<StateProducer> {
    let produce: ProducerFn = match state {
        None => Arc::new(|| Value::Object(Map::new())),
        Some(Member::Value(value)) if is_nil(value) => Arc::new(|| Value::Object(Map::new())),
        Some(Member::Producer(producer)) => Arc::clone(producer),
        Some(Member::Value(value)) if is_plain_object(value) => {
            let json = serde_json::to_string(value).map_err(|_| HamiError::InvalidState)?;
            Arc::new(move || serde_json::from_str(&json).unwrap_or(Value::Null))
        }
        Some(_) => return Err(HamiError::InvalidState),
    };
    Ok(StateProducer { produce })
}
