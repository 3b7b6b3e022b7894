//! Error types for the vigil-notify crate.

use thiserror::Error;
use vigil_filter::FilterError;
use vigil_incident::IncidentError;
use vigil_schedule::ScheduleError;

/// Errors that can occur when managing or delivering notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Destination settings or another entity failed validation.
    #[error("validation failed: {reason}")]
    Validation {
        /// The reason validation failed.
        reason: String,
    },

    /// The destination cannot be deleted.
    #[error("cannot delete destination: {reason}")]
    NotDeletable {
        /// The reason deletion is refused.
        reason: String,
    },

    /// Delivery to a single recipient failed.
    #[error("delivery failed: {reason}")]
    TransientDelivery {
        /// The reason delivery failed.
        reason: String,
    },

    /// Delivery is impossible because a setting is missing or invalid.
    #[error("configuration error: {reason}")]
    Configuration {
        /// The missing or invalid setting.
        reason: String,
    },

    /// A user already owns an entity with this name.
    #[error("{kind} named '{name}' already exists")]
    NameTaken {
        /// The kind of entity.
        kind: &'static str,
        /// The conflicting name.
        name: String,
    },

    /// An entity was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// The kind of entity.
        kind: &'static str,
        /// The missing ID.
        id: u64,
    },

    /// No medium is registered under this slug.
    #[error("unknown medium: {0}")]
    UnknownMedium(String),

    /// Filter error.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Schedule error.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// Incident error.
    #[error(transparent)]
    Incident(#[from] IncidentError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl NotifyError {
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_deletable(reason: impl Into<String>) -> Self {
        Self::NotDeletable {
            reason: reason.into(),
        }
    }

    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for NotifyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
