//! Injected rate limiting for status fetches
//!
//! The poller calls [`RateLimiter::acquire`] with the operation name before
//! every fetch. Limiters are shared through `Arc` so one budget can span many
//! concurrent sessions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait until one more call to `action` is allowed
    async fn acquire(&self, action: &str);
}

/// Limiter that never waits
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn acquire(&self, _action: &str) {}
}

/// Spaces calls to each action evenly according to a requests-per-second budget
pub struct ActionRateLimiter {
    default_rps: u32,
    limits: HashMap<String, u32>,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl Default for ActionRateLimiter {
    fn default() -> Self {
        Self::new(20)
    }
}

impl ActionRateLimiter {
    pub fn new(default_rps: u32) -> Self {
        Self {
            default_rps,
            limits: HashMap::new(),
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_limit(mut self, action: impl Into<String>, rps: u32) -> Self {
        self.limits.insert(action.into(), rps);
        self
    }

    /// Minimum spacing between two calls to `action`; zero means unlimited
    pub fn interval(&self, action: &str) -> Duration {
        let rps = self
            .limits
            .get(action)
            .copied()
            .unwrap_or(self.default_rps);
        if rps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / rps
        }
    }
}

#[async_trait]
impl RateLimiter for ActionRateLimiter {
    async fn acquire(&self, action: &str) {
        let interval = self.interval(action);
        if interval.is_zero() {
            return;
        }

        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match next_slot.get(action) {
                Some(reserved) if *reserved > now => *reserved,
                _ => now,
            };
            next_slot.insert(action.to_string(), slot + interval);
            slot
        };

        if slot > Instant::now() {
            tracing::trace!("Rate limiting {} until next slot", action);
            tokio::time::sleep_until(slot).await;
        }
    }
}
