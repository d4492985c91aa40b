//! Three-way classification of remote-call failures.

/// How a failed remote call should be handled.
///
/// Every error surfaced by a remote call is sorted into exactly one class by
/// the classifier supplied for that service. The retry executor only ever
/// inspects the class, never the original error value.
///
/// # Examples
///
/// ```
/// use steadfast_error::ErrorClass;
///
/// let class = ErrorClass::NonRetriable("HTTP 400: bad request".to_string());
/// assert!(!class.is_retriable());
/// assert!(!class.aborts_batch());
/// assert_eq!(class.reason(), "HTTP 400: bad request");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorClass {
    /// Transient failure (rate limited, network hiccup); worth another attempt
    #[display("retriable: {}", _0)]
    Retriable(String),
    /// The request itself is invalid or was structurally rejected; skip the item
    #[display("non-retriable: {}", _0)]
    NonRetriable(String),
    /// Environment-level failure; stop the whole batch
    #[display("fatal: {}", _0)]
    Fatal(String),
}

impl ErrorClass {
    /// Human-readable reason attached by the classifier.
    pub fn reason(&self) -> &str {
        match self {
            ErrorClass::Retriable(reason)
            | ErrorClass::NonRetriable(reason)
            | ErrorClass::Fatal(reason) => reason,
        }
    }

    /// True for [`ErrorClass::Retriable`].
    pub fn is_retriable(&self) -> bool {
        matches!(self, ErrorClass::Retriable(_))
    }

    /// True for [`ErrorClass::Fatal`].
    pub fn aborts_batch(&self) -> bool {
        matches!(self, ErrorClass::Fatal(_))
    }
}
