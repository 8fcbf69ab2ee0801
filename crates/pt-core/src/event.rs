//! Activity events and their presence classification.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Canonical activity event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageSent,
    ReactionAdded,
    BecameInactive,
    VoiceJoined,
    VoiceLeft,
}

/// Whether an event signals presence or absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// The user is present (message, reaction, voice join).
    Activity,
    /// The user is absent (explicit inactivity signal, voice leave).
    Inactivity,
}

impl EventKind {
    /// Presence classification for this kind.
    ///
    /// Messages, reactions, and voice joins signal presence; the explicit
    /// inactivity signal and voice leaves signal absence.
    #[must_use]
    pub const fn class(self) -> EventClass {
        match self {
            Self::MessageSent | Self::ReactionAdded | Self::VoiceJoined => EventClass::Activity,
            Self::BecameInactive | Self::VoiceLeft => EventClass::Inactivity,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MessageSent => "message_sent",
            Self::ReactionAdded => "reaction_added",
            Self::BecameInactive => "became_inactive",
            Self::VoiceJoined => "voice_joined",
            Self::VoiceLeft => "voice_left",
        };
        write!(f, "{s}")
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message_sent" => Ok(Self::MessageSent),
            "reaction_added" => Ok(Self::ReactionAdded),
            "became_inactive" => Ok(Self::BecameInactive),
            "voice_joined" => Ok(Self::VoiceJoined),
            "voice_left" => Ok(Self::VoiceLeft),
            _ => Err(UnknownEventKind(s.to_string())),
        }
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unrecognized event kind strings.
///
/// An unrecognized kind is a routing fault: the offending event is dropped
/// and logged at the ingestion boundary, and processing continues for all
/// other events.
#[derive(Debug, Clone)]
pub struct UnknownEventKind(String);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event kind: {}", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}

/// A single user action at a point in time. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// The user the event belongs to.
    pub user: UserId,
    /// The kind of activity.
    pub kind: EventKind,
    /// When the event occurred.
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEvent {
    /// Creates a new event.
    #[must_use]
    pub const fn new(user: UserId, kind: EventKind, occurred_at: DateTime<Utc>) -> Self {
        Self {
            user,
            kind,
            occurred_at,
        }
    }
}
