//! Close policies for open online periods.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Error from a failed policy evaluation.
///
/// A failed evaluation is never fatal: the period is treated as not
/// closeable this tick and the policy is retried at the next wakeup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("close policy evaluation failed: {reason}")]
pub struct PolicyError {
    pub reason: String,
}

impl PolicyError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Decides whether an open online period should end due to inactivity.
///
/// Implementations must be deterministic for given inputs, side-effect
/// free, and monotone in time: once `should_close` returns `true` for a
/// given `last_update`, it must return `true` for every later `now`.
pub trait ClosePolicy: Send + Sync {
    /// Returns `true` when the period should close.
    fn should_close(
        &self,
        last_update: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, PolicyError>;

    /// The earliest instant `should_close` could first return `true`, when
    /// the implementation can compute one.
    ///
    /// Returning `None` makes the tracker fall back to fixed-cadence
    /// re-evaluation instead of sleeping until an exact deadline.
    fn next_deadline(&self, last_update: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        let _ = last_update;
        None
    }
}

/// Canonical policy: close once at least `threshold` has elapsed since the
/// last update. A period with no updates yet never closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityTimeout {
    threshold: Duration,
}

impl InactivityTimeout {
    #[must_use]
    pub const fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub const fn threshold(&self) -> Duration {
        self.threshold
    }
}

impl ClosePolicy for InactivityTimeout {
    fn should_close(
        &self,
        last_update: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool, PolicyError> {
        Ok(last_update.is_some_and(|t| now - t >= self.threshold))
    }

    fn next_deadline(&self, last_update: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        last_update.map(|t| t + self.threshold)
    }
}
