//! Filter specifications and filter entities.
//!
//! - [`FilterSpecification`]: the serializable description of which incidents
//!   a filter selects
//! - [`CompiledFilter`]: a validated specification with its tags parsed and
//!   grouped, ready for evaluation
//! - [`Filter`]: a named, user-owned specification

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_incident::{
    group_by_key, Event, EventType, Incident, IncidentPredicate, SourceSystemId, Tag, UserId,
    MAX_LEVEL,
};

use crate::error::{FilterError, Result};

/// Identifier of a filter.
pub type FilterId = u64;

/// Structured description of the incidents a filter selects.
///
/// Every field narrows the selection; empty lists and `None` mean "no
/// constraint". A specification with no constraint at all is the *empty
/// filter*, which selects no incidents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpecification {
    /// Only incidents from these source systems.
    #[serde(rename = "sourceSystemIds", default)]
    pub source_system_ids: Vec<SourceSystemId>,
    /// Canonical `key=value` tags the incident must carry.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Require open (`true`) or closed (`false`) incidents.
    #[serde(default)]
    pub open: Option<bool>,
    /// Require acknowledged (`true`) or unacknowledged (`false`) incidents.
    #[serde(default)]
    pub acked: Option<bool>,
    /// Require stateful (`true`) or stateless (`false`) incidents.
    #[serde(default)]
    pub stateful: Option<bool>,
    /// Only incidents with `level <= maxlevel`. `0` means no constraint.
    #[serde(default)]
    pub maxlevel: Option<u8>,
    /// Only these event types trigger notifications.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_types: Vec<EventType>,
}

impl FilterSpecification {
    /// Creates an empty specification.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a JSON specification.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed JSON, or a validation error
    /// for malformed content.
    pub fn parse_json(json: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Restricts to the given source systems.
    #[must_use]
    pub fn with_sources(mut self, ids: impl IntoIterator<Item = SourceSystemId>) -> Self {
        self.source_system_ids.extend(ids);
        self
    }

    /// Requires the given canonical tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Sets the open/closed requirement.
    #[must_use]
    pub const fn open(mut self, open: bool) -> Self {
        self.open = Some(open);
        self
    }

    /// Sets the acknowledged requirement.
    #[must_use]
    pub const fn acked(mut self, acked: bool) -> Self {
        self.acked = Some(acked);
        self
    }

    /// Sets the stateful requirement.
    #[must_use]
    pub const fn stateful(mut self, stateful: bool) -> Self {
        self.stateful = Some(stateful);
        self
    }

    /// Sets the maximum level.
    #[must_use]
    pub const fn maxlevel(mut self, level: u8) -> Self {
        self.maxlevel = Some(level);
        self
    }

    /// Restricts the event types that trigger notifications.
    #[must_use]
    pub fn with_event_types(mut self, types: impl IntoIterator<Item = EventType>) -> Self {
        self.event_types.extend(types);
        self
    }

    /// Returns the effective level ceiling, if any.
    #[must_use]
    pub fn effective_maxlevel(&self) -> Option<u8> {
        self.maxlevel.filter(|level| *level > 0)
    }

    /// Returns the tri-state constraints that are set.
    #[must_use]
    pub fn tristates(&self) -> Vec<(IncidentPredicate, bool)> {
        [
            (IncidentPredicate::Open, self.open),
            (IncidentPredicate::Acked, self.acked),
            (IncidentPredicate::Stateful, self.stateful),
        ]
        .into_iter()
        .filter_map(|(predicate, expected)| expected.map(|e| (predicate, e)))
        .collect()
    }

    /// Returns true if the specification constrains nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source_system_ids.is_empty()
            && self.tags.is_empty()
            && self.open.is_none()
            && self.acked.is_none()
            && self.stateful.is_none()
            && self.effective_maxlevel().is_none()
            && self.event_types.is_empty()
    }

    /// Checks that every tag parses and the level is in range.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::Tag` for a malformed tag and
    /// `FilterError::Validation` for an out-of-range `maxlevel`.
    pub fn validate(&self) -> Result<()> {
        self.compile().map(|_| ())
    }

    /// Validates the specification and prepares it for evaluation.
    ///
    /// # Errors
    ///
    /// Same as [`FilterSpecification::validate`].
    pub fn compile(&self) -> Result<CompiledFilter> {
        if let Some(level) = self.maxlevel {
            if level > MAX_LEVEL {
                return Err(FilterError::Validation {
                    reason: format!("maxlevel {level} is above {MAX_LEVEL}"),
                });
            }
        }

        let tags = self
            .tags
            .iter()
            .map(|raw| Tag::parse(raw))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(CompiledFilter {
            empty: self.is_empty(),
            sources: self.source_system_ids.iter().copied().collect(),
            tag_groups: group_by_key(&tags),
            tristates: self.tristates(),
            maxlevel: self.effective_maxlevel(),
            event_types: self.event_types.iter().copied().collect(),
        })
    }

    /// Returns true if `incident` is selected at `now`.
    ///
    /// A malformed specification selects nothing.
    #[must_use]
    pub fn matches(&self, incident: &Incident, now: DateTime<Utc>) -> bool {
        self.compile()
            .is_ok_and(|compiled| compiled.matches(incident, now))
    }

    /// Returns true if the event's type may trigger a notification.
    #[must_use]
    pub fn matches_event(&self, event: &Event) -> bool {
        self.event_types.is_empty() || self.event_types.contains(&event.event_type)
    }
}

/// A validated [`FilterSpecification`] ready for evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    pub(crate) empty: bool,
    pub(crate) sources: BTreeSet<SourceSystemId>,
    pub(crate) tag_groups: BTreeMap<String, BTreeSet<String>>,
    pub(crate) tristates: Vec<(IncidentPredicate, bool)>,
    pub(crate) maxlevel: Option<u8>,
    pub(crate) event_types: BTreeSet<EventType>,
}

impl CompiledFilter {
    /// Returns true if this is the empty filter.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.empty
    }

    /// Returns true if `incident` satisfies every constraint at `now`.
    ///
    /// The empty filter matches nothing.
    #[must_use]
    pub fn matches(&self, incident: &Incident, now: DateTime<Utc>) -> bool {
        if self.empty {
            return false;
        }
        let source_ok = self.sources.is_empty() || self.sources.contains(&incident.source);
        let tags_ok = self
            .tag_groups
            .iter()
            .all(|(key, values)| incident.has_any_value(key, values));
        let states_ok = self
            .tristates
            .iter()
            .all(|(predicate, expected)| predicate.holds(incident, *expected, now));
        let level_ok = self.maxlevel.is_none_or(|max| incident.level <= max);

        source_ok && tags_ok && states_ok && level_ok
    }

    /// Returns true if the event's type is accepted.
    #[must_use]
    pub fn accepts_event_type(&self, event_type: EventType) -> bool {
        self.event_types.is_empty() || self.event_types.contains(&event_type)
    }

    /// Returns true if the event's incident matches and its type is accepted.
    #[must_use]
    pub fn matches_event(&self, incident: &Incident, event: &Event, now: DateTime<Utc>) -> bool {
        self.accepts_event_type(event.event_type) && self.matches(incident, now)
    }
}

/// A named, user-owned filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Unique identifier.
    pub id: FilterId,
    /// Owner.
    pub user: UserId,
    /// Name, unique per user.
    pub name: String,
    /// What the filter selects.
    pub filter: FilterSpecification,
}

impl Filter {
    /// Maximum allowed length for filter names.
    pub const MAX_NAME_LENGTH: usize = 40;

    /// Creates a filter after validating its name and specification.
    ///
    /// # Errors
    ///
    /// Returns `FilterError::Validation` for an empty or overlong name, or
    /// the specification's validation error.
    pub fn new(
        id: FilterId,
        user: UserId,
        name: impl Into<String>,
        filter: FilterSpecification,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(FilterError::Validation {
                reason: "filter name cannot be empty".to_string(),
            });
        }
        if name.chars().count() > Self::MAX_NAME_LENGTH {
            return Err(FilterError::Validation {
                reason: format!(
                    "filter name cannot exceed {} characters",
                    Self::MAX_NAME_LENGTH
                ),
            });
        }
        filter.validate()?;

        Ok(Self {
            id,
            user,
            name,
            filter,
        })
    }

    /// Returns true if the filter's specification is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filter.is_empty()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
