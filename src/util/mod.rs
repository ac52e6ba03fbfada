//! Small utilities the kernel is built on: shallow equality, memoizing
//! selectors and a tick-deferred debounce.

mod debounce;
mod equal;
mod selector;

pub(crate) use debounce::has_runtime;
pub use debounce::Debounce;
pub use equal::{shallow_equal, shallow_equal_slices};
pub use selector::{Combiner, Selector};
