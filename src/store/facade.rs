use crate::error::{HamiError, Result};
use crate::helper::namespaced_key;
use crate::runtime::{Outcome, Payload, SharedStore, StateRef};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// What a facade member is backed by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    /// `$name`, a constant.
    Name,
    /// A state field, read through to the module state.
    State,
    /// A getter, `$state` included.
    Getter,
    /// A mutation (`$patch`, `$reset`), run through commit.
    Mutation,
    /// A declared method, run through dispatch.
    Action,
}

impl MemberKind {
    /// Whether the member is called rather than read.
    pub fn is_method(self) -> bool {
        matches!(self, MemberKind::Mutation | MemberKind::Action)
    }
}

/// Member layout of one registered module. Holds no store reference.
pub(crate) struct ModuleShape {
    name: String,
    members: IndexMap<String, MemberKind>,
}

impl ModuleShape {
    /// Lay out members in definition order; a later kind replaces an
    /// earlier one under the same key.
    pub(crate) fn new<'a>(
        name: String,
        mutations: impl IntoIterator<Item = &'a str>,
        actions: impl IntoIterator<Item = &'a str>,
        getters: impl IntoIterator<Item = &'a str>,
        state: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut members = IndexMap::new();
        members.insert("$name".to_string(), MemberKind::Name);
        for (keys, kind) in [
            (mutations.into_iter().collect::<Vec<_>>(), MemberKind::Mutation),
            (actions.into_iter().collect(), MemberKind::Action),
            (getters.into_iter().collect(), MemberKind::Getter),
            (state.into_iter().collect(), MemberKind::State),
        ] {
            for key in keys {
                members.insert(key.to_string(), kind);
            }
        }
        Self { name, members }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn member(&self, key: &str) -> Option<MemberKind> {
        self.members.get(key).copied()
    }

    pub(crate) fn members(&self) -> impl Iterator<Item = (&str, MemberKind)> {
        self.members.iter().map(|(key, kind)| (key.as_str(), *kind))
    }
}

/// Object-like view of one store module.
///
/// The facade holds no state of its own: every read goes to the module's
/// live state or getter table, every call is a commit or dispatch whose
/// handler result is returned directly. Clones are cheap and interchangeable.
#[derive(Clone)]
pub struct Facade {
    shape: Arc<ModuleShape>,
    store: SharedStore,
}

impl Facade {
    pub(crate) fn from_parts(shape: Arc<ModuleShape>, store: SharedStore) -> Self {
        Self { shape, store }
    }

    pub(crate) fn shape(&self) -> &Arc<ModuleShape> {
        &self.shape
    }

    /// Module name (`$name`).
    pub fn name(&self) -> &str {
        self.shape.name()
    }

    /// The store backing this facade.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Every exposed member key.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.shape.members().map(|(key, _)| key)
    }

    pub fn member(&self, key: &str) -> Option<MemberKind> {
        self.shape.member(key)
    }

    /// The live state object (`$state`).
    pub fn state(&self) -> Result<StateRef> {
        self.store.module_state(self.name())
    }

    /// Read a state field, a getter, `$name` or a `$state` snapshot.
    pub fn get(&self, key: &str) -> Result<Value> {
        match self.member(key) {
            Some(MemberKind::Name) => Ok(Value::String(self.name().to_string())),
            Some(MemberKind::State) => self.store.read_state(self.name(), key),
            Some(MemberKind::Getter) => self.store.read_getter(&namespaced_key(self.name(), key)),
            _ => Err(self.unknown(key)),
        }
    }

    /// Call a mutation or method.
    ///
    /// Mutations always come back `Ready`. A method declared async comes back
    /// `Pending` and is not awaited here.
    pub fn call(&self, key: &str, args: Vec<Value>) -> Result<Outcome> {
        let path = namespaced_key(self.name(), key);
        match self.member(key) {
            Some(MemberKind::Mutation) => self
                .store
                .commit(&path, Payload::Params(args))
                .map(Outcome::Ready),
            Some(MemberKind::Action) => self.store.dispatch(&path, Payload::Params(args)),
            _ => Err(self.unknown(key)),
        }
    }

    /// Call a mutation or method that must finish synchronously.
    pub fn invoke(&self, key: &str, args: Vec<Value>) -> Result<Value> {
        self.call(key, args)?
            .ready()
            .ok_or_else(|| HamiError::PendingResult(namespaced_key(self.name(), key)))
    }

    /// Shallow-merge a partial state object (`$patch` with an object).
    pub fn patch(&self, partial: Value) -> Result<()> {
        self.invoke("$patch", vec![partial]).map(drop)
    }

    /// Run a mutator against the module state (`$patch` with a function).
    ///
    /// The mutator edits a draft copy that replaces the state once it
    /// returns. It may read back through the facade, where it sees the state
    /// as it was before the patch. Writes made through the facade from inside
    /// the mutator are overwritten by the draft.
    pub fn patch_with<F>(&self, mutator: F) -> Result<Value>
    where
        F: FnOnce(&mut Map<String, Value>) -> Value + Send + 'static,
    {
        self.store.commit(
            &namespaced_key(self.name(), "$patch"),
            Payload::Mutator(Box::new(mutator)),
        )
    }

    /// Restore declared fields from a fresh initial state (`$reset`).
    pub fn reset(&self) -> Result<()> {
        self.invoke("$reset", Vec::new()).map(drop)
    }

    fn unknown(&self, key: &str) -> HamiError {
        HamiError::UnknownMember {
            module: self.name().to_string(),
            key: key.to_string(),
        }
    }
}

impl fmt::Debug for Facade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Facade")
            .field("name", &self.name())
            .field("members", &self.shape.members.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{create_store_container, ContainerOptions};
    use crate::store::StoreOptions;
    use serde_json::json;

    // Suspends exactly once, asking to be polled again.
    async fn yield_once() {
        let mut yielded = false;
        futures::future::poll_fn(move |cx| {
            if yielded {
                std::task::Poll::Ready(())
            } else {
                yielded = true;
                cx.waker().wake_by_ref();
                std::task::Poll::Pending
            }
        })
        .await
    }

    fn todo_store() -> Facade {
        let container = create_store_container(ContainerOptions::new());
        container
            .store(
                StoreOptions::new()
                    .name("todo")
                    .state(json!({ "items": [], "filter": "all" }))
                    .getter("total", |store| {
                        let items = store.get("items")?;
                        Ok(json!(items.as_array().map_or(0, Vec::len)))
                    })
                    .action("add", |store, args| {
                        let item = args.first().cloned().unwrap_or(Value::Null);
                        store.patch_with(move |state| {
                            if let Some(items) = state.get_mut("items").and_then(Value::as_array_mut) {
                                items.push(item);
                            }
                            json!(null)
                        })?;
                        store.get("total")
                    })
                    .async_action("add_later", |store, args| async move {
                        store.invoke("add", args)?;
                        yield_once().await;
                        store.get("total")
                    })
                    .async_action("add_now", |store, args| async move {
                        store.invoke("add", args)
                    }),
            )
            .unwrap()
    }

    #[test]
    fn member_kinds() {
        let store = todo_store();
        assert_eq!(store.member("$name"), Some(MemberKind::Name));
        assert_eq!(store.member("$state"), Some(MemberKind::Getter));
        assert_eq!(store.member("$patch"), Some(MemberKind::Mutation));
        assert_eq!(store.member("items"), Some(MemberKind::State));
        assert_eq!(store.member("total"), Some(MemberKind::Getter));
        assert_eq!(store.member("add"), Some(MemberKind::Action));
        assert_eq!(store.member("nope"), None);
        assert!(MemberKind::Action.is_method());
        assert!(!MemberKind::State.is_method());
    }

    #[test]
    fn reads_are_live() {
        let store = todo_store();
        assert_eq!(store.get("$name").unwrap(), json!("todo"));
        assert_eq!(store.invoke("add", vec![json!("milk")]).unwrap(), json!(1));
        assert_eq!(store.get("items").unwrap(), json!(["milk"]));
        assert_eq!(
            store.get("$state").unwrap(),
            json!({ "items": ["milk"], "filter": "all" })
        );
    }

    #[test]
    fn async_methods_run_until_first_suspension() {
        let store = todo_store();
        let outcome = store.call("add_later", vec![json!("eggs")]).unwrap();
        assert!(outcome.is_pending());
        assert_eq!(store.get("total").unwrap(), json!(1));

        let total = futures::executor::block_on(outcome).unwrap();
        assert_eq!(total, json!(1));

        assert!(matches!(
            store.invoke("add_later", Vec::new()),
            Err(HamiError::PendingResult(key)) if key == "todo/add_later"
        ));
    }

    #[test]
    fn async_methods_without_suspension_are_ready() {
        let store = todo_store();
        let outcome = store.call("add_now", vec![json!("milk")]).unwrap();
        assert!(!outcome.is_pending());
        assert_eq!(outcome.ready(), Some(json!(1)));

        // Dropped without awaiting: the work is already done.
        drop(store.call("add_now", vec![json!("eggs")]).unwrap());
        assert_eq!(store.get("items").unwrap(), json!(["milk", "eggs"]));
    }

    #[test]
    fn patch_mutator_may_read_back_through_the_facade() {
        let store = todo_store();
        store.invoke("add", vec![json!("milk")]).unwrap();

        let reader = store.clone();
        let seen = store
            .patch_with(move |state| {
                let total = reader.get("total").unwrap_or(Value::Null);
                state.insert("filter".to_string(), json!("done"));
                total
            })
            .unwrap();
        assert_eq!(seen, json!(1));
        assert_eq!(store.get("filter").unwrap(), json!("done"));
    }

    #[test]
    fn unknown_and_misused_members() {
        let store = todo_store();
        assert!(matches!(
            store.get("add"),
            Err(HamiError::UnknownMember { .. })
        ));
        assert!(matches!(
            store.call("items", Vec::new()),
            Err(HamiError::UnknownMember { .. })
        ));
    }
}
