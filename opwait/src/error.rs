//! Error types for poll sessions

use std::fmt;
use std::time::Duration;

/// Classifies errors returned by a status fetch
///
/// `true` means the error is transient and the session keeps polling until its
/// deadline. `false` aborts the session immediately with [`PollError::Rejected`].
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Connection and timing failures are transient; anything else, such as
/// `InvalidInput` or `PermissionDenied`, will not change on another attempt
impl Retryable for std::io::Error {
    fn is_retryable(&self) -> bool {
        use std::io::ErrorKind;
        matches!(
            self.kind(),
            ErrorKind::TimedOut
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::ConnectionRefused
                | ErrorKind::BrokenPipe
                | ErrorKind::Interrupted
                | ErrorKind::WouldBlock
                | ErrorKind::UnexpectedEof
        )
    }
}

/// Tagged error for closures driven by [`crate::Poller::retry`]
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("{0}")]
    Retryable(E),

    #[error("{0}")]
    NonRetryable(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Retryable(e) | RetryError::NonRetryable(e) => e,
        }
    }
}

impl<E> Retryable for RetryError<E> {
    fn is_retryable(&self) -> bool {
        matches!(self, RetryError::Retryable(_))
    }
}

/// Terminal failure of a poll session
///
/// `TimedOut` and `Cancelled` mean the final state of the operation is unknown.
/// The remaining variants mean the operation is confirmed broken or can no
/// longer be observed.
#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    #[error("{target} failed with status {status}")]
    Failed { target: String, status: String },

    #[error("{target} no longer resolves to a status record")]
    Unresolvable { target: String },

    #[error("{target} rejected: {source}")]
    Rejected {
        target: String,
        #[source]
        source: E,
    },

    #[error("timed out after {elapsed:?} waiting for {target} (last observed: {last})", last = .last_observed.as_deref().unwrap_or("nothing"))]
    TimedOut {
        target: String,
        elapsed: Duration,
        last_observed: Option<String>,
    },

    #[error("{target} cancelled")]
    Cancelled { target: String },
}

impl<E> PollError<E> {
    pub fn target(&self) -> &str {
        match self {
            PollError::Failed { target, .. }
            | PollError::Unresolvable { target }
            | PollError::Rejected { target, .. }
            | PollError::TimedOut { target, .. }
            | PollError::Cancelled { target } => target,
        }
    }

    /// Final state unknown: the operation may still complete
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::TimedOut { .. })
    }

    /// Final state known to be broken or unobservable
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PollError::Failed { .. } | PollError::Unresolvable { .. } | PollError::Rejected { .. }
        )
    }

    pub fn map_rejected<F, G>(self, f: G) -> PollError<F>
    where
        G: FnOnce(E) -> F,
    {
        match self {
            PollError::Failed { target, status } => PollError::Failed { target, status },
            PollError::Unresolvable { target } => PollError::Unresolvable { target },
            PollError::Rejected { target, source } => PollError::Rejected {
                target,
                source: f(source),
            },
            PollError::TimedOut {
                target,
                elapsed,
                last_observed,
            } => PollError::TimedOut {
                target,
                elapsed,
                last_observed,
            },
            PollError::Cancelled { target } => PollError::Cancelled { target },
        }
    }
}

pub(crate) fn target_label(operation: &str, handle: &dyn fmt::Display) -> String {
    let handle = handle.to_string();
    if handle.is_empty() {
        operation.to_string()
    } else {
        format!("{} {}", operation, handle)
    }
}
