//! Core incident types.
//!
//! This module provides the entities consumed by the filter and notification
//! engines:
//! - [`SourceSystem`]: The system that reported an incident
//! - [`EndTime`]: Either a finite end instant or the open-ended sentinel
//! - [`Acknowledgement`]: A (possibly expiring) acknowledgement of an incident
//! - [`Incident`]: A reported problem with tags, level and state
//! - [`IncidentPredicate`]: The tri-state predicates filters can require

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IncidentError, Result};
use crate::tag::Tag;

/// Identifier of an incident.
pub type IncidentId = u64;

/// Identifier of a source system.
pub type SourceSystemId = u64;

/// Identifier of a user.
pub type UserId = u64;

/// Most severe level.
pub const MIN_LEVEL: u8 = 1;

/// Least severe level, and the default for new incidents.
pub const MAX_LEVEL: u8 = 5;

/// Validates a severity level.
///
/// # Errors
///
/// Returns `IncidentError::InvalidLevel` if `level` is outside `1..=5`.
pub fn validate_level(level: u8) -> Result<u8> {
    if (MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        Ok(level)
    } else {
        Err(IncidentError::InvalidLevel {
            level,
            min: MIN_LEVEL,
            max: MAX_LEVEL,
        })
    }
}

/// An external system that reports incidents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSystem {
    /// Unique identifier.
    pub id: SourceSystemId,
    /// Human-readable name.
    pub name: String,
    /// Whether incidents from this source have start/end semantics.
    pub stateful: bool,
}

impl SourceSystem {
    /// Creates a new source system.
    #[must_use]
    pub fn new(id: SourceSystemId, name: impl Into<String>, stateful: bool) -> Self {
        Self {
            id,
            name: name.into(),
            stateful,
        }
    }
}

/// End of a stateful incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndTime {
    /// The incident is still open.
    Infinity,
    /// The incident ended at the given instant.
    At(DateTime<Utc>),
}

impl EndTime {
    /// Returns true for the open-ended sentinel.
    #[must_use]
    pub const fn is_infinity(&self) -> bool {
        matches!(self, Self::Infinity)
    }
}

impl fmt::Display for EndTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinity => write!(f, "infinity"),
            Self::At(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

/// An acknowledgement of an incident by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    /// Who acknowledged.
    pub actor: UserId,
    /// When the acknowledgement was made.
    pub timestamp: DateTime<Utc>,
    /// When the acknowledgement stops counting. `None` never expires.
    pub expiration: Option<DateTime<Utc>>,
}

impl Acknowledgement {
    /// Returns true if the acknowledgement counts at `now`.
    #[must_use]
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.timestamp <= now && self.expiration.is_none_or(|exp| exp > now)
    }
}

/// A problem reported by a source system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Unique identifier.
    pub id: IncidentId,
    /// The reporting source system.
    pub source: SourceSystemId,
    /// The identifier the source system uses for this incident.
    #[serde(default)]
    pub source_incident_id: String,
    /// Free text description.
    #[serde(default)]
    pub description: String,
    /// When the incident started.
    pub start_time: DateTime<Utc>,
    /// `None` for stateless incidents.
    #[serde(default)]
    pub end_time: Option<EndTime>,
    /// Severity, 1 (most severe) to 5.
    pub level: u8,
    /// Shared tags.
    #[serde(default)]
    pub tags: Vec<Arc<Tag>>,
    /// Acknowledgements, in creation order.
    #[serde(default)]
    pub acknowledgements: Vec<Acknowledgement>,
    /// Link to an external ticket.
    #[serde(default)]
    pub ticket_url: Option<String>,
}

impl Incident {
    /// Creates a new incident builder.
    pub fn builder(source: SourceSystemId, start_time: DateTime<Utc>) -> IncidentBuilder {
        IncidentBuilder::new(source, start_time)
    }

    /// Returns true if the incident has no end yet.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.end_time.is_some_and(|end| end.is_infinity())
    }

    /// Returns true if the incident has a finite end time.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.end_time, Some(EndTime::At(_)))
    }

    /// Returns true if the incident has start/end semantics.
    #[must_use]
    pub const fn is_stateful(&self) -> bool {
        self.end_time.is_some()
    }

    /// Returns true if any acknowledgement is current at `now`.
    #[must_use]
    pub fn is_acked_at(&self, now: DateTime<Utc>) -> bool {
        self.acknowledgements.iter().any(|ack| ack.is_current(now))
    }

    /// Returns true if the incident carries the exact tag.
    #[must_use]
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.iter().any(|t| t.as_ref() == tag)
    }

    /// Returns true if the incident carries any of `values` under `key`.
    #[must_use]
    pub fn has_any_value<'a, I>(&self, key: &str, values: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        values
            .into_iter()
            .any(|v| self.tags.iter().any(|t| t.key() == key && t.value() == v))
    }

    /// Returns a short human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.description.is_empty() {
            format!("Incident #{}", self.id)
        } else {
            format!("Incident #{}: {}", self.id, self.description)
        }
    }
}

impl fmt::Display for Incident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Incident #{} from source {}", self.id, self.source)
    }
}

/// Builder for [`Incident`] values.
#[derive(Debug)]
pub struct IncidentBuilder {
    source: SourceSystemId,
    start_time: DateTime<Utc>,
    source_incident_id: String,
    description: String,
    end_time: Option<EndTime>,
    level: u8,
    tags: Vec<Arc<Tag>>,
    acknowledgements: Vec<Acknowledgement>,
    ticket_url: Option<String>,
}

impl IncidentBuilder {
    fn new(source: SourceSystemId, start_time: DateTime<Utc>) -> Self {
        Self {
            source,
            start_time,
            source_incident_id: String::new(),
            description: String::new(),
            end_time: Some(EndTime::Infinity),
            level: MAX_LEVEL,
            tags: Vec::new(),
            acknowledgements: Vec::new(),
            ticket_url: None,
        }
    }

    /// Sets the source's own identifier.
    #[must_use]
    pub fn source_incident_id(mut self, id: impl Into<String>) -> Self {
        self.source_incident_id = id.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Marks the incident as stateless (no end time at all).
    #[must_use]
    pub const fn stateless(mut self) -> Self {
        self.end_time = None;
        self
    }

    /// Closes the incident at `end`.
    #[must_use]
    pub const fn ended_at(mut self, end: DateTime<Utc>) -> Self {
        self.end_time = Some(EndTime::At(end));
        self
    }

    /// Sets the severity level.
    #[must_use]
    pub const fn level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn tag(mut self, tag: Arc<Tag>) -> Self {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    /// Adds an acknowledgement.
    #[must_use]
    pub fn acknowledgement(mut self, ack: Acknowledgement) -> Self {
        self.acknowledgements.push(ack);
        self
    }

    /// Sets the ticket URL.
    #[must_use]
    pub fn ticket_url(mut self, url: impl Into<String>) -> Self {
        self.ticket_url = Some(url.into());
        self
    }

    /// Builds the incident with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns `IncidentError::InvalidLevel` for a level outside `1..=5`.
    pub fn build(self, id: IncidentId) -> Result<Incident> {
        let level = validate_level(self.level)?;
        Ok(Incident {
            id,
            source: self.source,
            source_incident_id: self.source_incident_id,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            level,
            tags: self.tags,
            acknowledgements: self.acknowledgements,
            ticket_url: self.ticket_url,
        })
    }
}

/// Boolean incident states a filter can require or forbid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentPredicate {
    /// Open (`true`) versus closed (`false`).
    Open,
    /// Acknowledged (`true`) versus not acknowledged (`false`).
    Acked,
    /// Stateful (`true`) versus stateless (`false`).
    Stateful,
}

impl IncidentPredicate {
    /// Returns true if `incident` fits the predicate with the requested
    /// polarity.
    ///
    /// `Open` with `expected = false` selects *closed* incidents: stateless
    /// incidents are neither open nor closed.
    #[must_use]
    pub fn holds(&self, incident: &Incident, expected: bool, now: DateTime<Utc>) -> bool {
        match (self, expected) {
            (Self::Open, true) => incident.is_open(),
            (Self::Open, false) => incident.is_closed(),
            (Self::Acked, acked) => incident.is_acked_at(now) == acked,
            (Self::Stateful, stateful) => incident.is_stateful() == stateful,
        }
    }

    /// Returns the predicate name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Acked => "acked",
            Self::Stateful => "stateful",
        }
    }
}

impl fmt::Display for IncidentPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
