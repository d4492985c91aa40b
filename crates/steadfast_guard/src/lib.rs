//! Termination handling that never leaves a half-written file behind.
//!
//! [`CancellationGuard`] turns SIGINT/SIGTERM into cooperative cancellation:
//! the first signal cancels a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! threaded through every suspension point, while writes wrapped in
//! [`CancellationGuard::protect`] always run to completion. Once the last
//! write finishes, the pending signal is re-raised with its default
//! disposition so supervisors see the original cause of death.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod guard;
mod terminate;

pub use guard::{CancellationGuard, CriticalSection};
pub use terminate::{ProcessTerminator, TermSignal, Terminate};
