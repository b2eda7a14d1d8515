//! Status observations produced by a single poll attempt
//!
//! A fetch yields one immutable observation per attempt. The poller only needs
//! to know which [`Phase`] the observation is in and how to describe it in
//! diagnostics; everything else is payload owned by the caller.

use std::fmt;

/// Lifecycle phase of an asynchronous operation as seen by one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    InProgress,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Phase::InProgress)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::InProgress => write!(f, "in progress"),
            Phase::Succeeded => write!(f, "succeeded"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// Anything a status fetch can return
///
/// Implementations decide how their own status values map onto a phase.
/// Values the implementation does not recognize must map to [`Phase::Failed`].
pub trait Observation {
    fn phase(&self) -> Phase;

    /// Human readable status used in logs and in [`crate::PollError`]
    fn describe(&self) -> String;
}

/// Enumerated status values that know their own phase
pub trait OperationStatus: fmt::Display {
    fn phase(&self) -> Phase;
}

/// Generic observation: an enumerated status plus an optional diagnostic payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot<S> {
    pub status: S,
    pub detail: Option<String>,
}

impl<S> StatusSnapshot<S> {
    pub fn new(status: S) -> Self {
        Self {
            status,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl<S: OperationStatus> Observation for StatusSnapshot<S> {
    fn phase(&self) -> Phase {
        self.status.phase()
    }

    fn describe(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{} ({})", self.status, detail),
            None => self.status.to_string(),
        }
    }
}

/// Pending/target classification for plain string statuses
///
/// Statuses in `target` succeed, statuses in `pending` keep the session
/// polling, and everything else is a failure.
#[derive(Debug, Clone, Default)]
pub struct StateSet {
    pending: Vec<String>,
    target: Vec<String>,
}

impl StateSet {
    pub fn new<P, T>(pending: P, target: T) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
        }
    }

    pub fn classify(&self, status: &str) -> Phase {
        if self.target.iter().any(|s| s == status) {
            Phase::Succeeded
        } else if self.pending.iter().any(|s| s == status) {
            Phase::InProgress
        } else {
            Phase::Failed
        }
    }

    pub fn observe(&self, status: impl Into<String>) -> ClassifiedStatus {
        let label = status.into();
        ClassifiedStatus {
            phase: self.classify(&label),
            label,
        }
    }
}

/// A string status already classified by a [`StateSet`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedStatus {
    pub label: String,
    pub phase: Phase,
}

impl Observation for ClassifiedStatus {
    fn phase(&self) -> Phase {
        self.phase
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
