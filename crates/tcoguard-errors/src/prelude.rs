//! Prelude for tcoguard-errors.

pub use crate::class::{Classify, Disposition, ErrorClass};
pub use crate::policy::{DisposeExt, dispose};
