use opwait::{RetryError, Retryable};
use thiserror::Error;

/// Error codes worth retrying when a mutating call is refused
pub const RETRYABLE_CODES: &[&str] = &[
    "FailedOperation",
    "InternalError",
    "TradeUnknownError",
    "RequestLimitExceeded",
    "ResourceInUse",
    "ResourceInsufficient",
    "ResourceUnavailable",
    "ResourceBusy",
];

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("[TencentCloudSDKError] Code={code}, Message={message}, RequestId={request_id}")]
    Sdk {
        code: String,
        message: String,
        request_id: String,
    },

    #[error("API returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Failed to sign request: {0}")]
    Signing(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,
}

impl ApiError {
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Sdk { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the SDK error code equals `expected` or is one of its sub-codes
    pub fn has_code(&self, expected: &str) -> bool {
        self.code().is_some_and(|code| code_matches(code, expected))
    }
}

fn code_matches(code: &str, expected: &str) -> bool {
    code == expected
        || code
            .strip_prefix(expected)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Classification used while polling
///
/// Transport trouble is transient. An error reported by the API itself aborts
/// the session, except for throttling and internal errors.
impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        match self {
            ApiError::Request(e) => !e.is_decode() && !e.is_builder(),
            ApiError::Timeout(_) | ApiError::RateLimited | ApiError::ServiceUnavailable => true,
            ApiError::Sdk { code, .. } => {
                code_matches(code, "RequestLimitExceeded") || code_matches(code, "InternalError")
            }
            ApiError::Http { status, .. } => *status == 408,
            ApiError::ParseError(_) | ApiError::Signing(_) | ApiError::AuthError => false,
        }
    }
}

/// Tag an error from a mutating call for [`opwait::Poller::retry`]
///
/// Besides the polling classification, the common [`RETRYABLE_CODES`] and any
/// caller supplied `extra_codes` are retried.
pub fn retry_error(err: ApiError, extra_codes: &[&str]) -> RetryError<ApiError> {
    let listed = RETRYABLE_CODES
        .iter()
        .chain(extra_codes.iter())
        .any(|code| err.has_code(code));

    if listed || err.is_retryable() {
        RetryError::Retryable(err)
    } else {
        RetryError::NonRetryable(err)
    }
}
