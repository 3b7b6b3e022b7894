//! Notification profiles.
//!
//! A profile ties a user's filters and destinations to one schedule. The
//! filter and destination links live in the notification store as join sets.

use std::fmt;

use serde::{Deserialize, Serialize};
use vigil_filter::FilterId;
use vigil_incident::UserId;
use vigil_schedule::GroupId;

use crate::destination::DestinationId;
use crate::error::{NotifyError, Result};

/// Identifier of a notification profile.
pub type ProfileId = u64;

/// A user's rule for when and where to be notified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationProfile {
    /// Unique identifier.
    pub id: ProfileId,
    /// Owner.
    pub user: UserId,
    /// Name, unique per user.
    pub name: String,
    /// The schedule this profile exclusively owns.
    pub time_recurrence_group: GroupId,
    /// Inactive profiles never fire.
    pub active: bool,
}

impl NotificationProfile {
    /// Maximum allowed length for profile names.
    pub const MAX_NAME_LENGTH: usize = 40;

    /// Checks the profile name.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Validation` for an empty or overlong name.
    pub fn validate_name(name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(NotifyError::validation("profile name cannot be empty"));
        }
        if name.chars().count() > Self::MAX_NAME_LENGTH {
            return Err(NotifyError::validation(format!(
                "profile name cannot exceed {} characters",
                Self::MAX_NAME_LENGTH
            )));
        }
        Ok(())
    }
}

impl fmt::Display for NotificationProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Everything needed to store a profile and its links.
///
/// `id` of `None` lets the store assign one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    /// Requested identifier.
    #[serde(default)]
    pub id: Option<ProfileId>,
    /// Owner.
    pub user: UserId,
    /// Name, unique per user.
    pub name: String,
    /// Schedule to attach. Must be owned by `user` and unused.
    pub time_recurrence_group: GroupId,
    /// Filters to link.
    #[serde(default)]
    pub filters: Vec<FilterId>,
    /// Destinations to link.
    #[serde(default)]
    pub destinations: Vec<DestinationId>,
    /// Whether the profile may fire.
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl NewProfile {
    /// Starts an active profile without links.
    #[must_use]
    pub fn new(user: UserId, name: impl Into<String>, group: GroupId) -> Self {
        Self {
            id: None,
            user,
            name: name.into(),
            time_recurrence_group: group,
            filters: Vec::new(),
            destinations: Vec::new(),
            active: true,
        }
    }

    /// Requests a specific identifier.
    #[must_use]
    pub const fn with_id(mut self, id: ProfileId) -> Self {
        self.id = Some(id);
        self
    }

    /// Links filters.
    #[must_use]
    pub fn with_filters(mut self, filters: impl IntoIterator<Item = FilterId>) -> Self {
        self.filters.extend(filters);
        self
    }

    /// Links destinations.
    #[must_use]
    pub fn with_destinations(mut self, destinations: impl IntoIterator<Item = DestinationId>) -> Self {
        self.destinations.extend(destinations);
        self
    }

    /// Sets whether the profile may fire.
    #[must_use]
    pub const fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}
