//! Runtime context for the kernel.
//!
//! Issues the identities of stores, listeners and binding instances. Ids are
//! unique process-wide; a runtime only counts the ones it handed out.

mod context;

pub use context::ReactiveRuntime;
