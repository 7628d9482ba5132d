//! Error types for store construction, registration and dispatch.

use thiserror::Error;

/// Errors raised by the store facade and the namespaced store behind it.
#[derive(Debug, Error)]
pub enum HamiError {
    /// A `$`-prefixed key other than `$name` or `$state`.
    #[error("key '{0}' is reserved in store options")]
    ReservedKey(String),

    /// A plain key that is neither a getter nor an action.
    #[error("unexpected value of key '{0}' in store options")]
    UnexpectedValue(String),

    /// `$state` is not a producer or a serializable plain object.
    #[error("store state should be function or plain object")]
    InvalidState,

    /// No backing store could be resolved at use time.
    #[error("store not found")]
    StoreNotFound,

    /// The backing store was dropped while a facade still referred to it.
    #[error("store of module '{0}' has been dropped")]
    StoreDropped(String),

    #[error("module '{0}' is already registered")]
    DuplicateModule(String),

    #[error("module '{0}' is not registered")]
    ModuleNotFound(String),

    #[error("unknown mutation type: {0}")]
    UnknownMutation(String),

    #[error("unknown action type: {0}")]
    UnknownAction(String),

    #[error("unknown getter: {0}")]
    UnknownGetter(String),

    /// A facade member lookup for a key the module never declared.
    #[error("module '{module}' has no member '{key}'")]
    UnknownMember { module: String, key: String },

    /// `$patch` received something other than a partial object or a mutator.
    #[error("$patch expects a partial state object or a state mutator")]
    InvalidPatch,

    /// A state mutator was sent to a handler that only takes parameters.
    #[error("handler '{0}' does not accept a state mutator")]
    UnexpectedMutator(String),

    /// `invoke` was used on a member whose handler returned pending work.
    #[error("'{0}' returned a pending result; use `call` and await it")]
    PendingResult(String),

    /// State written outside a mutation handler on a strict store.
    #[error("do not mutate store state outside mutation handlers (module '{0}')")]
    StrictModeViolation(String),
}

/// Result type using HamiError
pub type Result<T> = std::result::Result<T, HamiError>;
