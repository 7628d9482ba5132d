use crate::error::{HamiError, Result};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Tracks which threads are inside a mutation handler, for strict mode.
///
/// Depth is counted per thread: a commit running on one thread does not
/// open a write window for any other.
pub(crate) struct CommitTracker {
    strict: bool,
    depth: Mutex<HashMap<ThreadId, usize>>,
}

impl CommitTracker {
    pub(crate) fn new(strict: bool) -> Self {
        Self {
            strict,
            depth: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn is_strict(&self) -> bool {
        self.strict
    }

    /// Run `f` as part of a commit on the current thread.
    pub(crate) fn committing<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let thread = thread::current().id();
        *self.depth.lock().entry(thread).or_insert(0) += 1;
        let _guard = DepthGuard {
            tracker: self,
            thread,
        };
        f()
    }

    fn allows_write(&self) -> bool {
        !self.strict || self.depth.lock().contains_key(&thread::current().id())
    }
}

struct DepthGuard<'a> {
    tracker: &'a CommitTracker,
    thread: ThreadId,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        let mut depth = self.tracker.depth.lock();
        if let Some(count) = depth.get_mut(&self.thread) {
            *count -= 1;
            if *count == 0 {
                depth.remove(&self.thread);
            }
        }
    }
}

/// Live state container of one module.
///
/// Clones share the same underlying object. The container is created once at
/// registration and is never swapped out: `$patch` and `$reset` write its
/// fields in place, so a handle captured earlier keeps observing current
/// values.
#[derive(Clone)]
pub struct StateRef {
    module: Arc<str>,
    fields: Arc<RwLock<Map<String, Value>>>,
    tracker: Arc<CommitTracker>,
}

impl StateRef {
    pub(crate) fn new(module: &str, initial: Map<String, Value>, tracker: Arc<CommitTracker>) -> Self {
        Self {
            module: Arc::from(module),
            fields: Arc::new(RwLock::new(initial)),
            tracker,
        }
    }

    /// Name of the module owning this state.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Clone of one field.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.fields.read().get(key).cloned()
    }

    /// Read the fields with a function without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&Map<String, Value>) -> R) -> R {
        let fields = self.fields.read();
        f(&fields)
    }

    /// Clone of the whole state as a plain object.
    pub fn snapshot(&self) -> Value {
        Value::Object(self.fields.read().clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.fields.read().keys().cloned().collect()
    }

    /// Whether both handles point at the same state object.
    pub fn ptr_eq(&self, other: &StateRef) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }

    /// Write one field directly.
    ///
    /// Strict stores only accept this from inside a mutation handler.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Result<()> {
        if !self.tracker.allows_write() {
            return Err(HamiError::StrictModeViolation(self.module.to_string()));
        }
        self.fields.write().insert(key.into(), value);
        Ok(())
    }

    /// Run a mutator against a draft of the fields, then store the draft.
    ///
    /// No lock is held while `f` runs, so it may read the state back. Writes
    /// made to the state by other means while `f` runs are overwritten.
    pub(crate) fn mutate<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Map<String, Value>) -> R,
    {
        let mut draft = self.fields.read().clone();
        let result = f(&mut draft);
        *self.fields.write() = draft;
        result
    }

    /// Shallow merge: each key of `partial` is copied onto the state.
    pub(crate) fn merge(&self, partial: Map<String, Value>) {
        let mut fields = self.fields.write();
        for (key, value) in partial {
            fields.insert(key, value);
        }
    }

    /// Refresh every current field from `fresh`.
    ///
    /// Keys the state has but `fresh` lacks keep their value; keys only in
    /// `fresh` are not added.
    pub(crate) fn refresh_from(&self, fresh: &Map<String, Value>) {
        let mut fields = self.fields.write();
        for (key, value) in fields.iter_mut() {
            if let Some(fresh_value) = fresh.get(key) {
                *value = fresh_value.clone();
            }
        }
    }
}

impl std::fmt::Debug for StateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateRef")
            .field("module", &self.module)
            .field("fields", &*self.fields.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(strict: bool, value: Value) -> StateRef {
        let Value::Object(fields) = value else {
            panic!("test state must be an object");
        };
        StateRef::new("test", fields, Arc::new(CommitTracker::new(strict)))
    }

    #[test]
    fn merge_is_shallow() {
        let state = state(false, json!({ "a": 1, "b": { "x": 1 } }));
        let Value::Object(partial) = json!({ "b": { "y": 2 } }) else {
            unreachable!()
        };
        state.merge(partial);
        assert_eq!(state.snapshot(), json!({ "a": 1, "b": { "y": 2 } }));
    }

    #[test]
    fn refresh_keeps_identity_and_extra_fields() {
        let state = state(false, json!({ "count": 3, "extra": true }));
        let before = state.clone();
        let Value::Object(fresh) = json!({ "count": 0, "added": 1 }) else {
            unreachable!()
        };
        state.refresh_from(&fresh);
        assert!(state.ptr_eq(&before));
        assert_eq!(before.snapshot(), json!({ "count": 0, "extra": true }));
    }

    #[test]
    fn strict_rejects_writes_outside_commit() {
        let tracker = Arc::new(CommitTracker::new(true));
        let state = StateRef::new("strict", Map::new(), tracker.clone());

        assert!(matches!(
            state.set("count", json!(1)),
            Err(HamiError::StrictModeViolation(_))
        ));
        tracker
            .committing(|| state.set("count", json!(1)))
            .expect("write inside commit");
        assert_eq!(state.get("count"), Some(json!(1)));
    }

    #[test]
    fn commit_on_one_thread_does_not_open_others() {
        let tracker = Arc::new(CommitTracker::new(true));
        let state = StateRef::new("strict", Map::new(), tracker.clone());

        tracker.committing(|| {
            std::thread::scope(|scope| {
                let other = scope.spawn(|| state.set("count", json!(1)));
                assert!(matches!(
                    other.join().unwrap(),
                    Err(HamiError::StrictModeViolation(_))
                ));
            });
            state.set("count", json!(2)).expect("write on committing thread");
        });
        assert_eq!(state.get("count"), Some(json!(2)));
        assert!(state.set("count", json!(3)).is_err());
    }
}
