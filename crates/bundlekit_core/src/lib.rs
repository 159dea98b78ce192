//! Core primitives shared by the bundlekit loading pipeline.
//!
//! - [`errors`]: the recoverable [`BundleError`] and its `Result` alias
//! - [`refcount`]: signed reference counters and warn-once latches
//! - [`status`]: forward-only atomic status cells
//! - [`signal`]: the manual-reset completion signal used by blocking and async waiters

pub mod errors;
pub mod refcount;
pub mod signal;
pub mod status;

pub use errors::{BundleError, Result};
pub use refcount::{OnceFlag, RefCounter};
pub use signal::CompletionSignal;
pub use status::{Status, StatusCell};
