//! opwait - completion poller for asynchronous control-plane operations
//!
//! Cloud control planes answer mutating calls (resize, backup, password reset,
//! ...) with an operation handle and finish the work later. This crate waits
//! for that work: it polls a caller supplied status fetch until the operation
//! succeeds, fails, or a deadline passes, and reports each of those outcomes
//! distinctly.

// Core modules
pub mod config;
pub mod context;
pub mod error;
pub mod status;

// Polling
pub mod fetcher;
pub mod poller;
pub mod rate_limit;

// Helper modules
pub mod diff;

// Re-exports for convenience
pub use config::{Backoff, PollConfig};
pub use context::Context;
pub use diff::{list_diff, same_members, take_first_matches, ListDiff};
pub use error::{PollError, RetryError, Retryable};
pub use fetcher::{fetch_fn, FnFetcher, StatusFetcher};
pub use poller::Poller;
pub use rate_limit::{ActionRateLimiter, RateLimiter, Unlimited};
pub use status::{ClassifiedStatus, Observation, OperationStatus, Phase, StateSet, StatusSnapshot};
