//! Dynamic state values.
//!
//! Store state is opaque to the kernel except for named fields, which linked
//! and computed properties read and write. Records are persistent maps so a
//! field update shares everything it does not touch.

mod value;

pub use value::{Record, Value};
