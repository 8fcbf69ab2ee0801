//! Core domain logic for the presence tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Events: per-user activity signals with a presence classification
//! - Periods: contiguous online/offline spans holding contributing events
//! - Policies: deciding when an open online period ends due to inactivity
//! - Tracker: the state machine turning queued events into closed periods
//!
//! Everything here is synchronous and side-effect free; callers supply the
//! clock as an explicit `now` argument. The tokio wiring lives in
//! `pt-engine`.

pub mod event;
pub mod period;
pub mod policy;
pub mod tracker;
pub mod types;

pub use event::{ActivityEvent, EventClass, EventKind, UnknownEventKind};
pub use period::{ClosedPeriod, Period, PeriodKind, Presence};
pub use policy::{ClosePolicy, InactivityTimeout, PolicyError};
pub use tracker::{Tracker, TrackerConfig};
pub use types::{UserId, ValidationError};
