//! Online/offline periods and closed-period snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::ActivityEvent;
use crate::types::UserId;

/// Which side of the presence boundary a period covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Offline,
}

impl Presence {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific period state.
///
/// Online periods carry the next instant the close policy could fire, so
/// the engine can sleep until exactly that moment. Offline periods have no
/// scheduled check; they close only on an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "presence", rename_all = "lowercase")]
pub enum PeriodKind {
    Online {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next_deadline: Option<DateTime<Utc>>,
    },
    Offline,
}

impl PeriodKind {
    #[must_use]
    pub const fn presence(&self) -> Presence {
        match self {
            Self::Online { .. } => Presence::Online,
            Self::Offline => Presence::Offline,
        }
    }
}

/// A contiguous span during which a user is considered online or offline.
///
/// A period is open until [`Period::close`] is called; `ended_at`, once
/// set, never changes. Contributing events are retained so `last_update`
/// can be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// The user this period belongs to.
    pub user: UserId,
    /// Online/offline plus variant-specific scheduling state.
    pub kind: PeriodKind,
    /// When the period started.
    pub started_at: DateTime<Utc>,
    /// When the period closed; `None` while open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Events that contributed to this period, in arrival order.
    #[serde(default)]
    pub events: Vec<ActivityEvent>,
}

impl Period {
    /// Opens an online period starting at `at`.
    #[must_use]
    pub const fn open_online(user: UserId, at: DateTime<Utc>) -> Self {
        Self {
            user,
            kind: PeriodKind::Online {
                next_deadline: None,
            },
            started_at: at,
            ended_at: None,
            events: Vec::new(),
        }
    }

    /// Opens an offline period starting at `at`.
    #[must_use]
    pub const fn open_offline(user: UserId, at: DateTime<Utc>) -> Self {
        Self {
            user,
            kind: PeriodKind::Offline,
            started_at: at,
            ended_at: None,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub const fn presence(&self) -> Presence {
        self.kind.presence()
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// The most recent contributing event timestamp, or `None` for a
    /// period with no events yet.
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.events.iter().map(|e| e.occurred_at).max()
    }

    /// The half-open interval `[started_at, ended_at)`, using `now` as the
    /// provisional end while the period is open.
    #[must_use]
    pub fn interval_so_far(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.started_at, self.ended_at.unwrap_or(now))
    }

    /// Appends a contributing event. Ignored once the period has closed.
    pub fn record(&mut self, event: ActivityEvent) {
        if self.is_open() {
            self.events.push(event);
        }
    }

    /// The next instant the close policy could fire, for online periods.
    #[must_use]
    pub const fn next_deadline(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            PeriodKind::Online { next_deadline } => next_deadline,
            PeriodKind::Offline => None,
        }
    }

    /// Updates the scheduled check deadline. No effect on offline periods,
    /// which have no scheduled check.
    pub const fn set_deadline(&mut self, deadline: Option<DateTime<Utc>>) {
        if let PeriodKind::Online { next_deadline } = &mut self.kind {
            *next_deadline = deadline;
        }
    }

    /// Closes the period at `now`, returning the outbound snapshot.
    ///
    /// Idempotent: the first call sets `ended_at` and cancels any scheduled
    /// check; later calls return `None` and leave `ended_at` unchanged, so
    /// a period emits at most one notification.
    pub fn close(&mut self, now: DateTime<Utc>) -> Option<ClosedPeriod> {
        if self.ended_at.is_some() {
            return None;
        }
        self.ended_at = Some(now);
        self.set_deadline(None);
        Some(ClosedPeriod {
            user: self.user.clone(),
            presence: self.presence(),
            started_at: self.started_at,
            ended_at: now,
            duration_ms: (now - self.started_at).num_milliseconds(),
        })
    }
}

/// Immutable snapshot emitted when a period closes.
///
/// Covers both `online` and `offline` closures; consumers dispatch on
/// `presence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedPeriod {
    pub user: UserId,
    pub presence: Presence,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn user() -> UserId {
        UserId::new("alice").unwrap()
    }

    #[test]
    fn close_is_idempotent() {
        let mut period = Period::open_online(user(), ts("2026-03-01T00:00:00Z"));

        let first = period.close(ts("2026-03-01T00:05:00Z"));
        assert!(first.is_some());
        assert_eq!(period.ended_at, Some(ts("2026-03-01T00:05:00Z")));

        // A later close must not emit again or move the end.
        let second = period.close(ts("2026-03-01T00:10:00Z"));
        assert!(second.is_none());
        assert_eq!(period.ended_at, Some(ts("2026-03-01T00:05:00Z")));
    }

    #[test]
    fn close_snapshot_carries_duration() {
        let mut period = Period::open_offline(user(), ts("2026-03-01T00:00:00Z"));
        let closed = period.close(ts("2026-03-01T00:05:00Z")).unwrap();

        assert_eq!(closed.presence, Presence::Offline);
        assert_eq!(closed.started_at, ts("2026-03-01T00:00:00Z"));
        assert_eq!(closed.ended_at, ts("2026-03-01T00:05:00Z"));
        assert_eq!(closed.duration_ms, 5 * 60 * 1000);
    }

    #[test]
    fn last_update_is_max_event_timestamp() {
        let mut period = Period::open_online(user(), ts("2026-03-01T00:00:00Z"));
        assert_eq!(period.last_update(), None);

        // Arrival order need not match event time order.
        period.record(ActivityEvent::new(
            user(),
            EventKind::MessageSent,
            ts("2026-03-01T00:03:00Z"),
        ));
        period.record(ActivityEvent::new(
            user(),
            EventKind::ReactionAdded,
            ts("2026-03-01T00:01:00Z"),
        ));

        assert_eq!(period.last_update(), Some(ts("2026-03-01T00:03:00Z")));
    }

    #[test]
    fn record_after_close_is_ignored() {
        let mut period = Period::open_online(user(), ts("2026-03-01T00:00:00Z"));
        period.close(ts("2026-03-01T00:01:00Z"));

        period.record(ActivityEvent::new(
            user(),
            EventKind::MessageSent,
            ts("2026-03-01T00:02:00Z"),
        ));
        assert!(period.events.is_empty());
    }

    #[test]
    fn interval_so_far_uses_now_while_open() {
        let mut period = Period::open_online(user(), ts("2026-03-01T00:00:00Z"));
        assert_eq!(
            period.interval_so_far(ts("2026-03-01T00:02:00Z")),
            (ts("2026-03-01T00:00:00Z"), ts("2026-03-01T00:02:00Z"))
        );

        period.close(ts("2026-03-01T00:03:00Z"));
        assert_eq!(
            period.interval_so_far(ts("2026-03-01T00:09:00Z")),
            (ts("2026-03-01T00:00:00Z"), ts("2026-03-01T00:03:00Z"))
        );
    }

    #[test]
    fn close_cancels_scheduled_deadline() {
        let mut period = Period::open_online(user(), ts("2026-03-01T00:00:00Z"));
        period.set_deadline(Some(ts("2026-03-01T00:15:00Z")));
        assert!(period.next_deadline().is_some());

        period.close(ts("2026-03-01T00:05:00Z"));
        assert_eq!(period.next_deadline(), None);
    }

    #[test]
    fn offline_periods_have_no_deadline() {
        let mut period = Period::open_offline(user(), ts("2026-03-01T00:00:00Z"));
        period.set_deadline(Some(ts("2026-03-01T00:15:00Z")));
        assert_eq!(period.next_deadline(), None);
    }
}
