//! Conversational backend errors.
//!
//! Every variant maps to a fixed, user-facing advisory via
//! [`BackendError::advisory`]; the detail in the variant payload is only for
//! the operator log.

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// The endpoint could not be reached.
    pub const CONNECTION_FAILED: &str = "CONNECTION_FAILED";

    /// No response within the request timeout.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";

    /// The request failed for another reason (HTTP error status, transport).
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";

    /// The response body could not be understood.
    pub const INVALID_RESPONSE: &str = "INVALID_RESPONSE";
}

/// Advisory for [`BackendError::Connection`].
pub const CONNECTION_ADVISORY: &str =
    "I'm having trouble connecting to my language processing service. Please check your internet connection.";
/// Advisory for [`BackendError::Timeout`].
pub const TIMEOUT_ADVISORY: &str =
    "The request to my language processing service timed out. Please try again.";
/// Advisory for [`BackendError::Request`].
pub const REQUEST_ADVISORY: &str =
    "I'm having trouble connecting to my language processing service.";
/// Advisory for [`BackendError::InvalidResponse`].
pub const INVALID_RESPONSE_ADVISORY: &str =
    "I apologize, but I'm having trouble processing that request.";

/// Classified failure of a conversational backend call.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Connection refused, DNS failure, unreachable host.
    #[error("[{}] {}", error_codes::CONNECTION_FAILED, .0)]
    Connection(String),

    /// The request exceeded its timeout.
    #[error("[{}] {}", error_codes::TIMEOUT_ERROR, .0)]
    Timeout(String),

    /// Any other request failure, including non-success HTTP status.
    #[error("[{}] {}", error_codes::REQUEST_FAILED, .0)]
    Request(String),

    /// The response arrived but had no usable reply.
    #[error("[{}] {}", error_codes::INVALID_RESPONSE, .0)]
    InvalidResponse(String),
}

impl BackendError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Connection(_) => error_codes::CONNECTION_FAILED,
            Self::Timeout(_) => error_codes::TIMEOUT_ERROR,
            Self::Request(_) => error_codes::REQUEST_FAILED,
            Self::InvalidResponse(_) => error_codes::INVALID_RESPONSE,
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Connection(m)
            | Self::Timeout(m)
            | Self::Request(m)
            | Self::InvalidResponse(m) => m,
        }
    }

    /// The fixed text shown to the user instead of this error.
    pub fn advisory(&self) -> &'static str {
        match self {
            Self::Connection(_) => CONNECTION_ADVISORY,
            Self::Timeout(_) => TIMEOUT_ADVISORY,
            Self::Request(_) => REQUEST_ADVISORY,
            Self::InvalidResponse(_) => INVALID_RESPONSE_ADVISORY,
        }
    }

    /// Classify a transport error. Timeouts are checked first because a
    /// timed-out connect reports both.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(format!("request timed out: {err}"))
        } else if err.is_connect() {
            Self::Connection(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::InvalidResponse(format!("could not decode response: {err}"))
        } else {
            Self::Request(format!("request failed: {err}"))
        }
    }
}
