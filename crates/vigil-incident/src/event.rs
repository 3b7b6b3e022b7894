//! Incident lifecycle events.
//!
//! An [`Event`] is emitted once per meaningful transition of an incident and
//! is what triggers notification dispatch.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IncidentError;
use crate::types::{IncidentId, UserId};

/// The kind of lifecycle transition an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    /// A stateful incident started.
    #[serde(rename = "STA")]
    IncidentStart,
    /// A stateful incident ended.
    #[serde(rename = "END")]
    IncidentEnd,
    /// Some attribute of the incident changed (tags, level, ticket).
    #[serde(rename = "CHI")]
    IncidentChange,
    /// A stateless incident was reported.
    #[serde(rename = "STL")]
    Stateless,
    /// The incident was acknowledged.
    #[serde(rename = "ACK")]
    Acknowledge,
    /// A closed incident was reopened.
    #[serde(rename = "REO")]
    Reopen,
    /// Anything else.
    #[serde(rename = "OTH")]
    Other,
}

impl EventType {
    /// Returns the three-letter wire code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::IncidentStart => "STA",
            Self::IncidentEnd => "END",
            Self::IncidentChange => "CHI",
            Self::Stateless => "STL",
            Self::Acknowledge => "ACK",
            Self::Reopen => "REO",
            Self::Other => "OTH",
        }
    }

    /// Returns the human-readable label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::IncidentStart => "Incident start",
            Self::IncidentEnd => "Incident end",
            Self::IncidentChange => "Incident change",
            Self::Stateless => "Stateless",
            Self::Acknowledge => "Acknowledge",
            Self::Reopen => "Reopen",
            Self::Other => "Other",
        }
    }

    /// Returns all event types.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::IncidentStart,
            Self::IncidentEnd,
            Self::IncidentChange,
            Self::Stateless,
            Self::Acknowledge,
            Self::Reopen,
            Self::Other,
        ]
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for EventType {
    type Err = IncidentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| IncidentError::Serialization(format!("unknown event type: {s}")))
    }
}

/// A lifecycle transition of an incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The incident the event belongs to.
    pub incident_id: IncidentId,
    /// What happened.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Who caused it, if known.
    #[serde(default)]
    pub actor: Option<UserId>,
    /// Free text description.
    #[serde(default)]
    pub description: String,
}

impl Event {
    /// Creates a new event.
    #[must_use]
    pub fn new(incident_id: IncidentId, event_type: EventType, timestamp: DateTime<Utc>) -> Self {
        Self {
            incident_id,
            event_type,
            timestamp,
            actor: None,
            description: String::new(),
        }
    }

    /// Sets the actor.
    #[must_use]
    pub const fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Incident #{}: {}", self.incident_id, self.event_type)
    }
}
