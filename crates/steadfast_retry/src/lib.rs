//! Bounded retries against unreliable remote services.
//!
//! A [`RetryExecutor`] runs one unit of work against a
//! [`Throttle`](steadfast_rate_limit::Throttle), consulting a classifier
//! after every failure:
//!
//! - `Retriable` failures slow the throttle down and try again
//! - `NonRetriable` failures return at once so the caller can skip the item
//! - `Fatal` failures return at once so the caller can stop the batch
//!
//! [`ServiceClassifier`] provides ready-made classifiers for the judge, LLM
//! vendors and the scraping target over [`HttpFailure`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod executor;
mod http;

pub use executor::{AttemptRecord, PollStatus, RetryExecutor, run_with_retry};
pub use http::{HttpFailure, ServiceClassifier};
