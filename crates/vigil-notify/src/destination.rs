//! Users and their delivery destinations.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vigil_incident::UserId;

/// Identifier of a destination.
pub type DestinationId = u64;

/// An account that owns filters, schedules, profiles and destinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Account email address.
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    /// Creates a user without an email address.
    #[must_use]
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: None,
        }
    }

    /// Sets the account email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// A concrete endpoint on one medium, such as an email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Unique identifier.
    pub id: DestinationId,
    /// Owner.
    pub user: UserId,
    /// Slug of the medium that delivers to this destination.
    pub media: String,
    /// Medium-specific settings.
    pub settings: Value,
    /// Provisioned from the user's account rather than entered by hand.
    #[serde(default)]
    pub synced: bool,
}

impl Destination {
    /// Creates an unsynced destination.
    #[must_use]
    pub fn new(id: DestinationId, user: UserId, media: impl Into<String>, settings: Value) -> Self {
        Self {
            id,
            user,
            media: media.into(),
            settings,
            synced: false,
        }
    }

    /// Marks the destination as synced.
    #[must_use]
    pub const fn synced(mut self) -> Self {
        self.synced = true;
        self
    }

    /// Returns a string setting.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} destination #{}", self.media, self.id)
    }
}
