//! # Hami
//!
//! An object-like facade over a namespaced module state container.
//!
//! A store is declared as a flat list of state, getters and methods; the
//! declaration is registered as a namespaced module and exposed as a
//! [`Facade`] whose reads go straight to the module's live state and whose
//! calls run through commit and dispatch, returning the handler's result.
//!
//! ## Containers (first generation)
//!
//! - [`create_store_container`] - Owns one store, installs it into a host and
//!   registers modules through [`StoreContainer::store`]
//!
//! ## Definitions (second generation)
//!
//! - [`define_store`] - Declares a store once; [`StoreDefinition::use_store`]
//!   finds the backing store from an argument, a receiver or ambient injection
//!
//! ## Every facade has
//!
//! - `$name` - The module name
//! - `$state` - The live state object
//! - `$patch` - Shallow-merge a partial object, or run a mutator on the state
//! - `$reset` - Refresh declared fields from a fresh initial state

pub mod container;
pub mod define;
pub mod error;
pub mod helper;
pub mod runtime;
pub mod store;

// Re-export main types for convenience
pub use container::{create_store_container, CompatMode, ContainerOptions, StoreContainer};
pub use define::{define_store, StoreCarrier, StoreDefinition};
pub use error::{HamiError, Result};
pub use runtime::{NamespacedStore, Outcome, StateRef};
pub use store::{Facade, Member, MemberKind, StoreOptions};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_works() {
        // Basic smoke test
        let container = create_store_container(ContainerOptions::new());
        let store = container
            .store(StoreOptions::new().state(json!({ "count": 0 })))
            .unwrap();
        assert_eq!(store.get("count").unwrap(), json!(0));
        store.patch(json!({ "count": 42 })).unwrap();
        assert_eq!(store.get("count").unwrap(), json!(42));
    }
}
