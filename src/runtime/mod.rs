//! Runtime support for store modules.
//!
//! This module provides the namespaced state container the facade sits on,
//! the adapter interface it is reached through, and the host-side plumbing
//! (installation and ambient injection).

mod adapter;
mod host;
mod namespaced;
mod state;

pub use adapter::{
    ActionHandler, ExternalStoreAdapter, GetterHandler, ModuleDefinition, MutationHandler, Outcome,
    Payload, SharedStore, StateMutator,
};
pub use host::{inject_store, HostApp, HostComponent};
pub use namespaced::{ActionRecord, MutationRecord, NamespacedStore, Plugin, StoreSettings};
pub use state::StateRef;
