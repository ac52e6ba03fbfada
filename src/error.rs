//! Error types for store construction and dispatch.

use std::sync::Arc;

use crate::describe::ObjectKind;

/// Usage errors raised while composing, extending or dispatching.
///
/// None of these are recoverable inside the kernel: they surface to the
/// caller of `compose`, `extend`, a property declaration or `dispatch_object`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The target of `extend` does not carry the re-describe capability.
    #[error("target object does not support update")]
    NotRedescribable,

    /// A linked property was declared without any backing store.
    #[error("linked property `{property}` requires a backing store")]
    MissingLinkStore { property: Arc<str> },

    /// A linked property was declared with more than one backing store.
    #[error("linked property `{property}` requires exactly one store, got {count}")]
    AmbiguousLinkStore { property: Arc<str>, count: usize },

    /// A describing-context operation that makes no sense for the object kind.
    #[error("`{operation}` cannot be used when describing a {kind}")]
    WrongKind {
        operation: &'static str,
        kind: ObjectKind,
    },

    /// An action object without a string `type` field.
    #[error("action object has no string `type` field")]
    UntypedAction,

    /// Asynchronous work was requested on a thread without a tokio runtime.
    #[error("`{operation}` needs a tokio runtime with a local task set")]
    NoRuntime { operation: &'static str },
}

/// Result alias used throughout the crate.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
