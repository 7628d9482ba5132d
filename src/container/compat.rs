use crate::runtime::{HostApp, NamespacedStore, Plugin, SharedStore, StoreSettings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How the host framework expects a store to be installed.
///
/// Chosen once through configuration; nothing probes the host at call time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatMode {
    /// Store handed to the host root as an option; installation does nothing.
    Legacy,
    /// Store installed into the host app, which provides it for injection.
    #[default]
    Modern,
}

/// Create the backing store for a container.
pub(crate) fn create_external_store(
    strict: bool,
    devtools: bool,
    plugins: Vec<Plugin>,
) -> Arc<NamespacedStore> {
    NamespacedStore::with_settings(StoreSettings {
        strict,
        devtools,
        plugins,
    })
}

/// Install `store` into a host app according to `mode`.
pub(crate) fn install_store(mode: CompatMode, store: SharedStore, host: &mut HostApp) {
    match mode {
        CompatMode::Legacy => {
            tracing::debug!("legacy host: store is passed as a root option, install is a no-op");
        }
        CompatMode::Modern => {
            host.provide_store(store);
            tracing::debug!("store provided to host app");
        }
    }
}
