//! Store declarations and the facades built from them.
//!
//! A declaration ([`StoreOptions`]) is split into reserved fields, getters
//! and methods, registered as a namespaced module with the `$patch`, `$reset`
//! and `$state` built-ins, and exposed through a [`Facade`].

mod extract;
mod facade;
mod options;
mod registrar;

pub use extract::{extract_store_options, normalize_state, ExtractedDefinition, StateProducer};
pub use facade::{Facade, MemberKind};
pub use options::{ActionFn, AsyncActionFn, GetterFn, Member, ProducerFn, StoreOptions};
pub(crate) use facade::ModuleShape;
pub(crate) use registrar::{
    default_module_name, module_shape, register_module, register_module_with,
};
