//! The period engine: drains queued activity events into period
//! transitions.
//!
//! The tracker is a wall-clock-free state machine: every operation takes
//! `now` explicitly, so the same code serves the live tokio engine and
//! deterministic replay. Transitions are explicit functions that return
//! closed-period snapshots; periods do not listen to their own lifecycle.
//!
//! ## Transition rules
//!
//! Per popped event, keyed by its user:
//! - Activity-class: close the open offline period if one exists, ensure an
//!   online period is open, and append the event to it.
//! - Inactivity-class: close the open online period if one exists, ensure an
//!   offline period is open, and append the event to it.
//!
//! Policy-triggered closes reuse the inactivity path: `tick` synthesizes a
//! `became_inactive` event into the queue for each online period whose
//! policy fires, so forced and policy closes share one code path and the
//! idempotent close guarantees a single notification.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

use crate::event::{ActivityEvent, EventClass, EventKind};
use crate::period::{ClosedPeriod, Period, Presence};
use crate::policy::{ClosePolicy, InactivityTimeout};
use crate::types::UserId;

/// Default inactivity threshold: 15 minutes.
pub const DEFAULT_INACTIVITY_THRESHOLD_SECS: i64 = 15 * 60;

/// Default upper bound between policy re-evaluations: 100 ms.
pub const DEFAULT_CHECK_CADENCE_MS: i64 = 100;

/// Tunables for the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// How long an online period may go without an update before the
    /// default policy closes it.
    pub inactivity_threshold: Duration,
    /// Upper bound between policy re-evaluations for open online periods.
    /// Worst-case detection latency past a policy deadline equals this.
    pub check_cadence: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold: Duration::seconds(DEFAULT_INACTIVITY_THRESHOLD_SECS),
            check_cadence: Duration::milliseconds(DEFAULT_CHECK_CADENCE_MS),
        }
    }
}

/// Open periods for a single user.
///
/// At most one online and one offline period are open at any instant, and
/// never both once the user has been seeded: transitions swap one for the
/// other. Closed periods are forwarded once and not retained.
#[derive(Debug, Default)]
struct UserPeriods {
    online: Option<Period>,
    offline: Option<Period>,
}

/// Converts per-user activity events into alternating online and offline
/// periods.
pub struct Tracker {
    queue: VecDeque<ActivityEvent>,
    users: HashMap<UserId, UserPeriods>,
    policy: Box<dyn ClosePolicy>,
    cadence: Duration,
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("queued", &self.queue.len())
            .field("users", &self.users.len())
            .field("cadence", &self.cadence)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    /// Creates a tracker with the canonical inactivity-timeout policy.
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_policy(
            Box::new(InactivityTimeout::new(config.inactivity_threshold)),
            config.check_cadence,
        )
    }

    /// Creates a tracker with an injected close policy.
    #[must_use]
    pub fn with_policy(policy: Box<dyn ClosePolicy>, cadence: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            users: HashMap::new(),
            policy,
            cadence,
        }
    }

    /// Seeds a user into an open offline period as of `at`.
    ///
    /// Called once per known user at startup. A user that already has an
    /// open period is left untouched.
    pub fn seed_inactive(&mut self, user: UserId, at: DateTime<Utc>) {
        let periods = self.users.entry(user.clone()).or_default();
        if periods.online.is_none() && periods.offline.is_none() {
            tracing::debug!(user = %user, "seeding user as inactive");
            periods.offline = Some(Period::open_offline(user, at));
        }
    }

    /// Queues an event and drains the queue to empty.
    ///
    /// Returns the periods closed while draining, in close order.
    pub fn submit(&mut self, event: ActivityEvent, now: DateTime<Utc>) -> Vec<ClosedPeriod> {
        self.queue.push_back(event);
        self.drain(now)
    }

    /// Evaluates the close policy for every open online period.
    ///
    /// For each period whose policy fires, a `became_inactive` event is
    /// synthesized into the queue and the queue is drained. A failed policy
    /// evaluation leaves the period open and re-arms its check one cadence
    /// later.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<ClosedPeriod> {
        let mut lapsed: Vec<UserId> = Vec::new();
        for (user, periods) in &mut self.users {
            let Some(online) = periods.online.as_mut() else {
                continue;
            };
            match self.policy.should_close(online.last_update(), now) {
                Ok(true) => lapsed.push(user.clone()),
                Ok(false) => {
                    // A deadline elapsed without the policy firing; poll
                    // again one cadence later rather than spinning.
                    if online.next_deadline().is_some_and(|d| d <= now) {
                        online.set_deadline(Some(now + self.cadence));
                    }
                }
                Err(e) => {
                    tracing::warn!(user = %user, error = %e, "close policy failed; retrying next tick");
                    online.set_deadline(Some(now + self.cadence));
                }
            }
        }

        for user in lapsed {
            self.queue
                .push_back(ActivityEvent::new(user, EventKind::BecameInactive, now));
        }
        self.drain(now)
    }

    /// The next instant [`Tracker::tick`] should run, or `None` when no
    /// online period is open and no check is needed.
    ///
    /// Uses each online period's policy deadline when one is known, and
    /// falls back to one cadence from `now` otherwise.
    #[must_use]
    pub fn next_wakeup(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.users
            .values()
            .filter_map(|periods| periods.online.as_ref())
            .map(|online| online.next_deadline().unwrap_or(now + self.cadence))
            .min()
            .map(|at| at.max(now))
    }

    /// The user's current open presence, if any period is open.
    #[must_use]
    pub fn presence(&self, user: &UserId) -> Option<Presence> {
        let periods = self.users.get(user)?;
        if periods.online.is_some() {
            Some(Presence::Online)
        } else if periods.offline.is_some() {
            Some(Presence::Offline)
        } else {
            None
        }
    }

    /// Pops queued events until the queue is empty.
    ///
    /// The queue may grow while draining (synthesized inactivity events),
    /// so this loops on the live queue rather than a snapshot.
    fn drain(&mut self, now: DateTime<Utc>) -> Vec<ClosedPeriod> {
        let mut closed = Vec::new();
        while let Some(event) = self.queue.pop_front() {
            self.apply(event, now, &mut closed);
        }
        closed
    }

    /// Applies the transition rules for one event.
    fn apply(&mut self, event: ActivityEvent, now: DateTime<Utc>, closed: &mut Vec<ClosedPeriod>) {
        let periods = self.users.entry(event.user.clone()).or_default();
        match event.kind.class() {
            EventClass::Activity => {
                if let Some(offline) = periods.offline.as_mut() {
                    offline.record(event.clone());
                    closed.extend(offline.close(now));
                    periods.offline = None;
                }
                let online = periods
                    .online
                    .get_or_insert_with(|| Period::open_online(event.user.clone(), now));
                online.record(event);
                online.set_deadline(self.policy.next_deadline(online.last_update()));
            }
            EventClass::Inactivity => {
                if let Some(online) = periods.online.as_mut() {
                    online.record(event.clone());
                    closed.extend(online.close(now));
                    periods.online = None;
                }
                let offline = periods
                    .offline
                    .get_or_insert_with(|| Period::open_offline(event.user.clone(), now));
                offline.record(event);
            }
        }
    }
}
