//! Stores declared once and bound to a backing store at use time.

mod definition;
mod resolve;

pub use definition::{define_store, BoundMethod, Computed, ComputedValue, StoreDefinition};
pub use resolve::{resolve_store, StoreCarrier, StoreSlot};
