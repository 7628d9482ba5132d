use crate::error::Result;
use crate::helper::RESERVED_MARKER;
use crate::store::Facade;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Computed value read through the facade.
pub type GetterFn = Arc<dyn Fn(&Facade) -> Result<Value> + Send + Sync>;

/// Synchronous method; its return value goes straight back to the caller.
pub type ActionFn = Arc<dyn Fn(&Facade, &[Value]) -> Result<Value> + Send + Sync>;

/// Method that hands back pending work instead of a value.
pub type AsyncActionFn =
    Arc<dyn Fn(Facade, Vec<Value>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Initial-state producer.
pub type ProducerFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// One declared member of a store.
#[derive(Clone)]
pub enum Member {
    Value(Value),
    Producer(ProducerFn),
    Getter(GetterFn),
    Action(ActionFn),
    AsyncAction(AsyncActionFn),
}

impl Member {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Member::Value(_) => "value",
            Member::Producer(_) => "producer",
            Member::Getter(_) => "getter",
            Member::Action(_) => "action",
            Member::AsyncAction(_) => "async action",
        }
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Member::Value(value) => f.debug_tuple("Value").field(value).finish(),
            other => write!(f, "{}(..)", other.kind_name()),
        }
    }
}

/// Declaration of a store: its name, initial state, getters and methods.
///
/// Entries keep their declaration order. Declaring the same key twice keeps
/// the last declaration.
///
/// # Examples
///
/// ```
/// use hami::StoreOptions;
/// use serde_json::json;
///
/// let options = StoreOptions::new()
///     .name("counter")
///     .state(json!({ "count": 0 }))
///     .getter("double", |store| {
///         let count = store.get("count")?.as_i64().unwrap_or(0);
///         Ok(json!(count * 2))
///     })
///     .action("increment", |store, _args| {
///         let count = store.get("count")?.as_i64().unwrap_or(0);
///         store.patch(json!({ "count": count + 1 }))?;
///         store.get("count")
///     });
/// assert_eq!(options.len(), 4);
/// ```
#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    entries: Vec<(String, Member)>,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit module name (`$name`).
    pub fn name(self, name: impl Into<String>) -> Self {
        self.entry(reserved("name"), Member::Value(Value::String(name.into())))
    }

    /// Initial state as a plain object (`$state`).
    pub fn state(self, state: Value) -> Self {
        self.entry(reserved("state"), Member::Value(state))
    }

    /// Initial state from any serializable value.
    ///
    /// A value that fails to serialize becomes a producer of `null`, so
    /// registering or defining the store fails with an invalid state error.
    pub fn state_of<T: Serialize>(self, state: &T) -> Self {
        match serde_json::to_value(state) {
            Ok(value) => self.state(value),
            Err(err) => {
                tracing::debug!(error = %err, "store state failed to serialize");
                self.state_fn(|| Value::Null)
            }
        }
    }

    /// Initial state from a producer, called once per registration and reset.
    pub fn state_fn<F>(self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.entry(reserved("state"), Member::Producer(Arc::new(producer)))
    }

    pub fn getter<F>(self, key: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Facade) -> Result<Value> + Send + Sync + 'static,
    {
        self.entry(key, Member::Getter(Arc::new(getter)))
    }

    pub fn action<F>(self, key: impl Into<String>, action: F) -> Self
    where
        F: Fn(&Facade, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.entry(key, Member::Action(Arc::new(action)))
    }

    /// Method run as a future: dispatch drives it to its first suspension and
    /// hands any remaining work back to the caller unawaited.
    pub fn async_action<F, Fut>(self, key: impl Into<String>, action: F) -> Self
    where
        F: Fn(Facade, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let action: AsyncActionFn = Arc::new(move |store, args| action(store, args).boxed());
        self.entry(key, Member::AsyncAction(action))
    }

    /// Raw entry, validated on extraction.
    pub fn entry(mut self, key: impl Into<String>, member: Member) -> Self {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = member,
            None => self.entries.push((key, member)),
        }
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.entries.iter().map(|(key, member)| (key.as_str(), member))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn reserved(name: &str) -> String {
    format!("{RESERVED_MARKER}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn entries_keep_order_and_last_write() {
        let options = StoreOptions::new()
            .state(json!({ "a": 1 }))
            .getter("g", |_| Ok(json!(null)))
            .state(json!({ "a": 2 }));

        let keys: Vec<&str> = options.entries().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["$state", "g"]);
        match options.entries().next() {
            Some((_, Member::Value(value))) => assert_eq!(value, &json!({ "a": 2 })),
            other => panic!("unexpected entry: {other:?}"),
        };
    }

    #[test]
    fn unserializable_state_becomes_null_producer() {
        let mut bad = HashMap::new();
        bad.insert((1, 2), 3);
        let options = StoreOptions::new().state_of(&bad);
        match options.entries().next() {
            Some((_, Member::Producer(producer))) => assert_eq!(producer(), Value::Null),
            other => panic!("unexpected entry: {other:?}"),
        };
    }
}
