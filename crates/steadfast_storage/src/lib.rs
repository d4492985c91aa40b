//! Atomic JSON record storage.
//!
//! Batch results are persisted one record per file. Every save is a temp
//! write followed by a rename, so a record on disk is always either the old
//! version or the complete new one. Pair saves with
//! `CancellationGuard::protect` to keep termination signals from landing
//! between the two steps.
//!
//! # Example
//!
//! ```rust
//! use steadfast_storage::JsonRecordStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = JsonRecordStore::new("/tmp/problems")?;
//! let written = store.save("two-sum", &vec!["[2,7,11,15]", "9"]).await?;
//! assert!(written > 0);
//!
//! let inputs: Vec<String> = store.load("two-sum").await?;
//! assert_eq!(inputs.len(), 2);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod json;

pub use json::JsonRecordStore;
