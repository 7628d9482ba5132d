use crate::runtime::SharedStore;
use std::cell::RefCell;

// Thread-local stack of stores provided by running host setups.
thread_local! {
    static INJECTION_STACK: RefCell<Vec<SharedStore>> = const { RefCell::new(Vec::new()) };
}

/// Root object of a hosting UI framework.
///
/// Stores reach the host in one of two ways: passed as a root option
/// ([`HostApp::with_store`]), which only attaches it to components, or
/// provided through installation ([`HostApp::provide_store`]), which also
/// makes it injectable while [`HostApp::setup`] runs.
#[derive(Clone, Default)]
pub struct HostApp {
    store: Option<SharedStore>,
    provided: bool,
}

impl HostApp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Root created with a store option. Components see it, nothing is provided.
    pub fn with_store(store: SharedStore) -> Self {
        Self {
            store: Some(store),
            provided: false,
        }
    }

    /// Provide a store to the whole app.
    pub fn provide_store(&mut self, store: SharedStore) {
        self.store = Some(store);
        self.provided = true;
    }

    /// Store attached to this app, if any.
    pub fn store(&self) -> Option<&SharedStore> {
        self.store.as_ref()
    }

    pub fn is_provided(&self) -> bool {
        self.provided
    }

    /// Create a component of this app; it carries the app's store.
    pub fn component(&self) -> HostComponent {
        HostComponent {
            store: self.store.clone(),
        }
    }

    /// Run an initialization hook. A provided store is injectable inside it.
    pub fn setup<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        match (&self.store, self.provided) {
            (Some(store), true) => with_injected(store.clone(), f),
            _ => f(),
        }
    }
}

/// Component instance of a hosting UI framework.
#[derive(Clone, Default)]
pub struct HostComponent {
    store: Option<SharedStore>,
}

impl HostComponent {
    /// A component that carries no store.
    pub fn detached() -> Self {
        Self::default()
    }

    /// The component's `$store` reference.
    pub fn store(&self) -> Option<&SharedStore> {
        self.store.as_ref()
    }
}

/// Store injected by the innermost running host setup, if any.
pub fn inject_store() -> Option<SharedStore> {
    INJECTION_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Run `f` with `store` as the injectable store.
fn with_injected<F, R>(store: SharedStore, f: F) -> R
where
    F: FnOnce() -> R,
{
    INJECTION_STACK.with(|stack| {
        stack.borrow_mut().push(store);
    });

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

    INJECTION_STACK.with(|stack| {
        stack.borrow_mut().pop();
    });

    match result {
        Ok(r) => r,
        Err(e) => std::panic::resume_unwind(e),
    }
}
