//! Cancellation guard errors.

/// Specific cancellation guard failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum GuardErrorKind {
    /// Subscribing to an OS signal failed
    #[display("Failed to install handler for {}: {}", signal, reason)]
    SignalInstall {
        /// Signal name
        signal: String,
        /// Underlying OS error
        reason: String,
    },
    /// The guard was used outside of a Tokio runtime
    #[display("No Tokio runtime available to run the signal listener")]
    NoRuntime,
}

/// Cancellation guard error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Guard Error: {} at line {} in {}", kind, line, file)]
pub struct GuardError {
    kind: GuardErrorKind,
    line: u32,
    file: &'static str,
}

impl GuardError {
    /// Create a new guard error with caller location tracking.
    #[track_caller]
    pub fn new(kind: GuardErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &GuardErrorKind {
        &self.kind
    }
}
