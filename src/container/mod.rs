//! Store containers: one store, installable into a host, producing facades.

mod compat;
mod container;

pub use compat::CompatMode;
pub use container::{create_store_container, ContainerOptions, StoreContainer};
