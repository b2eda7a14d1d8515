//! Async completion poller
//!
//! A poll session starts after the mutating call has already been issued. It
//! repeatedly fetches the status of the operation handle until one of the
//! terminal outcomes is reached:
//!
//! - success: the fetch observed a succeeded phase
//! - explicit failure: a failed/unknown status, an unresolvable handle or a
//!   non-retryable fetch error
//! - timeout: the deadline passed while the operation was still in progress
//! - cancellation: the [`Context`] was cancelled
//!
//! Transient fetch errors are retried silently until the deadline.

use crate::config::PollConfig;
use crate::context::Context;
use crate::error::{target_label, PollError, RetryError, Retryable};
use crate::fetcher::StatusFetcher;
use crate::rate_limit::{RateLimiter, Unlimited};
use crate::status::{Observation, Phase};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// Result of a single attempt, already classified
enum Step<T, E> {
    Done(T),
    Pending(String),
    Failed(String),
    Unresolvable,
    Transient(E),
    Fatal(E),
}

/// Transient state of one poll session
struct Session {
    target: String,
    started: Instant,
    deadline: Instant,
    attempts: u32,
    last_observed: Option<String>,
}

impl Session {
    fn start(target: String, config: &PollConfig, ctx: &Context) -> Self {
        let started = Instant::now();
        let mut deadline = started + config.timeout;
        if let Some(ctx_deadline) = ctx.deadline() {
            deadline = deadline.min(ctx_deadline);
        }
        Self {
            target,
            started,
            deadline,
            attempts: 0,
            last_observed: None,
        }
    }

    fn timed_out<E>(self) -> PollError<E> {
        PollError::TimedOut {
            target: self.target,
            elapsed: self.started.elapsed(),
            last_observed: self.last_observed,
        }
    }
}

#[derive(Clone)]
pub struct Poller {
    operation: String,
    config: PollConfig,
    limiter: Arc<dyn RateLimiter>,
}

impl Poller {
    /// `operation` names the status endpoint; it is passed to the rate limiter
    /// and used in every diagnostic
    pub fn new(operation: impl Into<String>, config: PollConfig) -> Self {
        Self {
            operation: operation.into(),
            config,
            limiter: Arc::new(Unlimited),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `handle` until it reaches a terminal state
    ///
    /// Returns the succeeded observation so callers can read its payload.
    pub async fn poll<H, F>(
        &self,
        ctx: &Context,
        handle: &H,
        fetcher: &F,
    ) -> Result<F::Output, PollError<F::Error>>
    where
        H: Display + ?Sized + Sync,
        F: StatusFetcher<H>,
    {
        let target = target_label(&self.operation, &handle);
        self.drive(ctx, target, move || async move {
            match fetcher.fetch(handle).await {
                Ok(Some(observation)) => match observation.phase() {
                    Phase::Succeeded => Step::Done(observation),
                    Phase::InProgress => Step::Pending(observation.describe()),
                    Phase::Failed => Step::Failed(observation.describe()),
                },
                Ok(None) => Step::Unresolvable,
                Err(e) if e.is_retryable() => Step::Transient(e),
                Err(e) => Step::Fatal(e),
            }
        })
        .await
    }

    /// Re-run `f` until it succeeds, returns a non-retryable error, or the
    /// deadline passes
    ///
    /// Used for mutating calls the control plane may transiently refuse. The
    /// inner error of the last retryable attempt is reported as the last
    /// observation of a timeout.
    pub async fn retry<T, E, F, Fut>(&self, ctx: &Context, mut f: F) -> Result<T, PollError<E>>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RetryError<E>>>,
    {
        let target = self.operation.clone();
        self.drive(ctx, target, || {
            let attempt = f();
            async move {
                match attempt.await {
                    Ok(value) => Step::Done(value),
                    Err(RetryError::Retryable(e)) => Step::Transient(e),
                    Err(RetryError::NonRetryable(e)) => Step::Fatal(e),
                }
            }
        })
        .await
    }

    async fn drive<T, E, S, Fut>(
        &self,
        ctx: &Context,
        target: String,
        mut step: S,
    ) -> Result<T, PollError<E>>
    where
        E: Display,
        S: FnMut() -> Fut,
        Fut: Future<Output = Step<T, E>>,
    {
        let mut session = Session::start(target, &self.config, ctx);

        loop {
            if ctx.is_cancelled() {
                return Err(PollError::Cancelled {
                    target: session.target,
                });
            }

            self.limiter.acquire(&self.operation).await;
            session.attempts += 1;

            match step().await {
                Step::Done(value) => {
                    tracing::debug!(
                        "[{}] {} completed after {} attempt(s)",
                        ctx.log_id(),
                        session.target,
                        session.attempts
                    );
                    return Ok(value);
                }
                Step::Pending(status) => {
                    tracing::debug!(
                        "[{}] {} is {} (attempt {})",
                        ctx.log_id(),
                        session.target,
                        status,
                        session.attempts
                    );
                    session.last_observed = Some(status);
                }
                Step::Transient(e) => {
                    tracing::warn!(
                        "[{}] {} attempt {} failed, retrying: {}",
                        ctx.log_id(),
                        session.target,
                        session.attempts,
                        e
                    );
                    session.last_observed = Some(format!("error: {}", e));
                }
                Step::Failed(status) => {
                    tracing::error!(
                        "[{}] {} reported failure status {}",
                        ctx.log_id(),
                        session.target,
                        status
                    );
                    return Err(PollError::Failed {
                        target: session.target,
                        status,
                    });
                }
                Step::Unresolvable => {
                    tracing::error!(
                        "[{}] {} returned no status record",
                        ctx.log_id(),
                        session.target
                    );
                    return Err(PollError::Unresolvable {
                        target: session.target,
                    });
                }
                Step::Fatal(e) => {
                    tracing::error!(
                        "[{}] {} failed with non-retryable error: {}",
                        ctx.log_id(),
                        session.target,
                        e
                    );
                    return Err(PollError::Rejected {
                        target: session.target,
                        source: e,
                    });
                }
            }

            let now = Instant::now();
            if now >= session.deadline {
                tracing::error!(
                    "[{}] {} timed out after {} attempt(s)",
                    ctx.log_id(),
                    session.target,
                    session.attempts
                );
                return Err(session.timed_out());
            }

            let delay = self
                .config
                .backoff
                .delay(session.attempts)
                .min(session.deadline - now);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.cancelled() => {
                    return Err(PollError::Cancelled {
                        target: session.target,
                    });
                }
            }
        }
    }
}
