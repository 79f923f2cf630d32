//! Error classification for tcoguard.
//!
//! Hardware calls in the supervisor fail in three very different ways. A
//! missing watchdog device leaves nothing to protect the host, a failed feed
//! is retried on the next cycle, and a failed LED write is purely cosmetic.
//! Rather than deciding swallow-or-raise at every call site, each crate's
//! error type implements [`Classify`] and call sites route results through
//! [`dispose`], which owns the propagation policy in one place.
//!
//! # Example
//!
//! ```
//! use tcoguard_errors::prelude::*;
//!
//! #[derive(Debug)]
//! struct LedWriteFailed;
//!
//! impl std::fmt::Display for LedWriteFailed {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "LED write failed")
//!     }
//! }
//!
//! impl Classify for LedWriteFailed {
//!     fn class(&self) -> ErrorClass {
//!         ErrorClass::Cosmetic
//!     }
//! }
//!
//! let result: Result<(), LedWriteFailed> = Err(LedWriteFailed);
//! // Cosmetic failures never propagate.
//! assert!(matches!(dispose(result, "heartbeat led"), Ok(None)));
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod class;
pub mod policy;
pub mod prelude;

pub use class::{Classify, Disposition, ErrorClass};
pub use policy::{DisposeExt, dispose};
