//! Error types for the steadfast workspace.
//!
//! This crate provides the foundation error types used by every steadfast crate,
//! plus the three-way failure taxonomy that drives retry decisions.
//!
//! # Error Hierarchy
//!
//! Errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! Remote-call failures are additionally sorted into an [`ErrorClass`]
//! (retriable, non-retriable, fatal) by a per-service classifier before the
//! retry machinery looks at them.
//!
//! # Examples
//!
//! ```
//! use steadfast_error::{ConfigError, SteadfastResult};
//!
//! fn load() -> SteadfastResult<u32> {
//!     Err(ConfigError::new("growth_factor must be greater than 1"))?
//! }
//!
//! assert!(load().is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod class;
mod config;
mod error;
mod guard;
mod retry;
mod storage;

pub use class::ErrorClass;
pub use config::ConfigError;
pub use error::{SteadfastError, SteadfastErrorKind, SteadfastResult};
pub use guard::{GuardError, GuardErrorKind};
pub use retry::{RetryError, RetryErrorKind};
pub use storage::{StorageError, StorageErrorKind};
