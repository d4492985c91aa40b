//! Classification of HTTP failures per remote service.

use steadfast_error::ErrorClass;

/// Raw failure of one HTTP call, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpFailure {
    /// Response status, absent for transport failures
    pub status: Option<u16>,
    /// Error message or response body excerpt
    pub message: String,
    /// The request deadline passed
    pub timed_out: bool,
    /// The service answered but the payload had nothing usable in it
    pub empty_response: bool,
}

impl HttpFailure {
    /// Failure carrying a non-success status code.
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            message: message.into(),
            ..Self::default()
        }
    }

    /// Connection-level failure with no response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// The request deadline passed.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
            ..Self::default()
        }
    }

    /// A successful response without any usable content.
    pub fn empty_response(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            empty_response: true,
            ..Self::default()
        }
    }
}

impl From<&reqwest::Error> for HttpFailure {
    fn from(err: &reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
            timed_out: err.is_timeout(),
            empty_response: false,
        }
    }
}

impl From<reqwest::Error> for HttpFailure {
    fn from(err: reqwest::Error) -> Self {
        Self::from(&err)
    }
}

/// Remote services with their own failure conventions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum ServiceClassifier {
    /// The coding judge (submit and check)
    Judge,
    /// A large-language-model vendor
    LlmVendor,
    /// The problem scraping target
    Scraper,
}

impl ServiceClassifier {
    /// Sort a failure into exactly one class.
    ///
    /// | Failure | Class |
    /// |---|---|
    /// | 429 | Retriable |
    /// | other 4xx (400, 401, 403, 499, ...) | NonRetriable |
    /// | 5xx, transport error | Retriable |
    /// | empty response | NonRetriable |
    /// | timeout | Fatal for `LlmVendor`, Retriable otherwise |
    pub fn classify(&self, failure: &HttpFailure) -> ErrorClass {
        if failure.empty_response {
            return ErrorClass::NonRetriable(format!("empty response: {}", failure.message));
        }
        if failure.timed_out {
            let reason = format!("deadline exceeded: {}", failure.message);
            return match self {
                ServiceClassifier::LlmVendor => ErrorClass::Fatal(reason),
                ServiceClassifier::Judge | ServiceClassifier::Scraper => {
                    ErrorClass::Retriable(reason)
                }
            };
        }
        match failure.status {
            Some(429) => ErrorClass::Retriable(format!("HTTP 429: {}", failure.message)),
            Some(code @ 400..=499) => {
                ErrorClass::NonRetriable(format!("HTTP {}: {}", code, failure.message))
            }
            Some(code) => ErrorClass::Retriable(format!("HTTP {}: {}", code, failure.message)),
            None => ErrorClass::Retriable(format!("transport: {}", failure.message)),
        }
    }

    /// The classifier as a closure, for passing to an executor.
    pub fn classifier(self) -> impl Fn(&HttpFailure) -> ErrorClass + Send + Sync + Copy {
        move |failure| self.classify(failure)
    }
}
