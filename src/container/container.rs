use crate::container::compat::{create_external_store, install_store, CompatMode};
use crate::error::Result;
use crate::runtime::{ExternalStoreAdapter, HostApp, NamespacedStore, Plugin, SharedStore};
use crate::store::{default_module_name, extract_store_options, register_module, Facade, StoreOptions};
use serde::Deserialize;
use std::sync::Arc;

/// Options for [`create_store_container`].
///
/// The plain fields deserialize from configuration; the store handle and
/// plugins can only be set in code.
///
/// ```
/// use hami::{CompatMode, ContainerOptions};
///
/// let options: ContainerOptions =
///     serde_json::from_str(r#"{ "strict": true, "compat": "legacy" }"#).unwrap();
/// assert!(options.strict);
/// assert!(!options.devtools);
/// assert_eq!(options.compat, CompatMode::Legacy);
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    /// Use an existing store instead of creating one. `strict`, `devtools`
    /// and `plugins` only apply to a created store.
    #[serde(skip)]
    pub external_store: Option<Arc<NamespacedStore>>,
    pub strict: bool,
    pub devtools: bool,
    pub compat: CompatMode,
    #[serde(skip)]
    pub plugins: Vec<Plugin>,
}

impl ContainerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn external_store(mut self, store: Arc<NamespacedStore>) -> Self {
        self.external_store = Some(store);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn devtools(mut self, devtools: bool) -> Self {
        self.devtools = devtools;
        self
    }

    pub fn compat(mut self, compat: CompatMode) -> Self {
        self.compat = compat;
        self
    }

    pub fn plugin<F>(mut self, plugin: F) -> Self
    where
        F: Fn(&NamespacedStore) + Send + Sync + 'static,
    {
        self.plugins.push(Arc::new(plugin));
        self
    }
}

/// Owner of one store and factory of module facades on it.
#[derive(Clone)]
pub struct StoreContainer {
    store: Arc<NamespacedStore>,
    compat: CompatMode,
}

/// Create a container, creating its store unless one was supplied.
///
/// # Examples
///
/// ```
/// use hami::{create_store_container, ContainerOptions, StoreOptions};
/// use serde_json::json;
///
/// let container = create_store_container(ContainerOptions::new());
/// let counter = container
///     .store(StoreOptions::new().name("counter").state(json!({ "count": 0 })))
///     .unwrap();
/// counter.patch(json!({ "count": 5 })).unwrap();
/// assert_eq!(counter.get("count").unwrap(), json!(5));
/// ```
pub fn create_store_container(options: ContainerOptions) -> StoreContainer {
    let store = match options.external_store {
        Some(store) => store,
        None => create_external_store(options.strict, options.devtools, options.plugins),
    };
    StoreContainer {
        store,
        compat: options.compat,
    }
}

impl StoreContainer {
    /// The underlying store.
    pub fn external_store(&self) -> &Arc<NamespacedStore> {
        &self.store
    }

    /// The underlying store behind the adapter interface.
    pub fn shared_store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn compat(&self) -> CompatMode {
        self.compat
    }

    /// Install the store into a host app.
    pub fn install(&self, host: &mut HostApp) {
        install_store(self.compat, self.shared_store(), host);
    }

    /// Register a store module and return its facade.
    ///
    /// Modules without `$name` are named `_hami_<id>` from the store's
    /// counter. A module already registered under the name is replaced.
    pub fn store(&self, options: StoreOptions) -> Result<Facade> {
        let definition = extract_store_options(&options)?;
        let name = match definition.name() {
            Some(name) => name.to_string(),
            None => default_module_name(self.store.next_module_id()),
        };
        let registered = register_module(&self.shared_store(), name, &definition)?;
        Ok(registered.facade)
    }

    /// Same as [`StoreContainer::store`].
    pub fn module(&self, options: StoreOptions) -> Result<Facade> {
        self.store(options)
    }
}
