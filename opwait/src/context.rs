//! Session context: log correlation and cancellation
//!
//! A [`Context`] is cheap to clone. Every clone and every context derived with
//! [`Context::with_timeout`] shares the same cancellation signal, so cancelling
//! any of them stops all poll sessions that were handed one.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Clone)]
pub struct Context {
    log_id: Arc<str>,
    deadline: Option<Instant>,
    cancel: Arc<watch::Sender<bool>>,
}

impl Context {
    pub fn new() -> Self {
        Self::with_log_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_log_id(log_id: impl Into<String>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            log_id: Arc::from(log_id.into()),
            deadline: None,
            cancel: Arc::new(cancel),
        }
    }

    /// Derive a context whose deadline is at most `timeout` from now
    ///
    /// An existing earlier deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            log_id: self.log_id.clone(),
            deadline: Some(deadline),
            cancel: self.cancel.clone(),
        }
    }

    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Resolves once [`Context::cancel`] has been called on any clone
    pub async fn cancelled(&self) {
        let mut done = self.cancel.subscribe();
        // The sender lives as long as self, so this only returns on cancel.
        let _ = done.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("log_id", &self.log_id)
            .field("deadline", &self.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
