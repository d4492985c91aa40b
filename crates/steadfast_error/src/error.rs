//! Top-level error wrapper types.

use crate::{ConfigError, GuardError, RetryError, StorageError};

/// Every error a steadfast crate can surface.
///
/// # Examples
///
/// ```
/// use steadfast_error::{ConfigError, SteadfastError};
///
/// let err: SteadfastError = ConfigError::new("missing [retry] section").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum SteadfastErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Storage error
    #[from(StorageError)]
    Storage(StorageError),
    /// Retry executor gave up
    #[from(RetryError)]
    Retry(RetryError),
    /// Cancellation guard error
    #[from(GuardError)]
    Guard(GuardError),
}

/// Steadfast error with kind discrimination.
///
/// # Examples
///
/// ```
/// use steadfast_error::{SteadfastResult, StorageError, StorageErrorKind};
///
/// fn save() -> SteadfastResult<u64> {
///     Err(StorageError::new(StorageErrorKind::FileWrite("disk full".to_string())))?
/// }
///
/// match save() {
///     Ok(bytes) => println!("wrote {bytes} bytes"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Steadfast Error: {}", _0)]
pub struct SteadfastError(Box<SteadfastErrorKind>);

impl SteadfastError {
    /// Create a new error from a kind.
    pub fn new(kind: SteadfastErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &SteadfastErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to SteadfastErrorKind
impl<T> From<T> for SteadfastError
where
    T: Into<SteadfastErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for steadfast operations.
pub type SteadfastResult<T> = std::result::Result<T, SteadfastError>;
