use crate::container::StoreContainer;
use crate::error::{HamiError, Result};
use crate::runtime::{inject_store, HostApp, HostComponent, NamespacedStore, SharedStore};
use crate::store::Facade;
use std::sync::Arc;

/// Known places a store reference can be attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreSlot {
    /// A host component's or app's `$store`.
    Component,
    /// The store wrapped by a container or facade.
    Container,
}

impl StoreSlot {
    /// Probe order.
    pub const ALL: [StoreSlot; 2] = [StoreSlot::Component, StoreSlot::Container];
}

/// Something a store can be found on.
pub trait StoreCarrier {
    /// The value itself, when it is a store.
    fn raw_store(&self) -> Option<SharedStore> {
        None
    }

    /// A store attached to the value under `slot`.
    fn attached_store(&self, _slot: StoreSlot) -> Option<SharedStore> {
        None
    }
}

impl StoreCarrier for Arc<NamespacedStore> {
    fn raw_store(&self) -> Option<SharedStore> {
        Some(self.clone())
    }
}

impl StoreCarrier for SharedStore {
    fn raw_store(&self) -> Option<SharedStore> {
        Some(Arc::clone(self))
    }
}

impl StoreCarrier for StoreContainer {
    fn attached_store(&self, slot: StoreSlot) -> Option<SharedStore> {
        (slot == StoreSlot::Container).then(|| self.shared_store())
    }
}

impl StoreCarrier for Facade {
    fn attached_store(&self, slot: StoreSlot) -> Option<SharedStore> {
        (slot == StoreSlot::Container).then(|| Arc::clone(self.store()))
    }
}

impl StoreCarrier for HostComponent {
    fn attached_store(&self, slot: StoreSlot) -> Option<SharedStore> {
        match slot {
            StoreSlot::Component => self.store().cloned(),
            StoreSlot::Container => None,
        }
    }
}

impl StoreCarrier for HostApp {
    fn attached_store(&self, slot: StoreSlot) -> Option<SharedStore> {
        match slot {
            StoreSlot::Component => self.store().cloned(),
            StoreSlot::Container => None,
        }
    }
}

/// Find the store backing a call.
///
/// In order: `explicit` itself when it is a store; a store attached to
/// `explicit`, then to `receiver`, probing [`StoreSlot::ALL`]; the store
/// injected by a running host setup. Fails with `store not found` otherwise.
pub fn resolve_store(
    explicit: Option<&dyn StoreCarrier>,
    receiver: Option<&dyn StoreCarrier>,
) -> Result<SharedStore> {
    if let Some(store) = explicit.and_then(|carrier| carrier.raw_store()) {
        return Ok(store);
    }
    let attached = [explicit, receiver].into_iter().flatten().find_map(|carrier| {
        StoreSlot::ALL
            .into_iter()
            .find_map(|slot| carrier.attached_store(slot))
    });
    attached
        .or_else(inject_store)
        .ok_or(HamiError::StoreNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{create_store_container, ContainerOptions};

    #[test]
    fn explicit_raw_store_wins() {
        let raw = NamespacedStore::new();
        let other: SharedStore = NamespacedStore::new();
        let component = HostApp::with_store(other).component();

        let found = resolve_store(Some(&raw), Some(&component)).unwrap();
        let raw_shared: SharedStore = raw;
        assert!(Arc::ptr_eq(&found, &raw_shared));
    }

    #[test]
    fn attached_store_from_explicit_then_receiver() {
        let container = create_store_container(ContainerOptions::new());
        let receiver_store: SharedStore = NamespacedStore::new();
        let component = HostApp::with_store(receiver_store.clone()).component();

        let found = resolve_store(Some(&container), Some(&component)).unwrap();
        assert!(Arc::ptr_eq(&found, &container.shared_store()));

        let found = resolve_store(None, Some(&component)).unwrap();
        assert!(Arc::ptr_eq(&found, &receiver_store));
    }

    #[test]
    fn falls_back_to_injection() {
        let store: SharedStore = NamespacedStore::new();
        let mut app = HostApp::new();
        app.provide_store(store.clone());

        let detached = HostComponent::detached();
        let found = app
            .setup(|| resolve_store(None, Some(&detached)))
            .unwrap();
        assert!(Arc::ptr_eq(&found, &store));
    }

    #[test]
    fn nothing_to_find() {
        let err = resolve_store(None, Some(&HostComponent::detached())).err().unwrap();
        assert_eq!(err.to_string(), "store not found");
    }
}
