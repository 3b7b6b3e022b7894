//! Error types for the vigil-incident crate.

use thiserror::Error;

/// Errors that can occur when building or querying incidents.
#[derive(Debug, Error)]
pub enum IncidentError {
    /// A tag string or tag component is malformed.
    #[error("invalid tag '{tag}': {reason}")]
    InvalidTag {
        /// The offending tag text.
        tag: String,
        /// Why the tag was rejected.
        reason: String,
    },

    /// Severity level outside the accepted range.
    #[error("invalid level {level}: must be between {min} and {max}")]
    InvalidLevel {
        /// The rejected level.
        level: u8,
        /// Lowest accepted level.
        min: u8,
        /// Highest accepted level.
        max: u8,
    },

    /// Incident with the given ID was not found.
    #[error("incident not found: {id}")]
    IncidentNotFound {
        /// The incident ID that was not found.
        id: u64,
    },

    /// Source system with the given ID was not found.
    #[error("source system not found: {id}")]
    SourceNotFound {
        /// The source system ID that was not found.
        id: u64,
    },

    /// The requested state transition does not apply to this incident.
    #[error("invalid transition for incident {id}: {reason}")]
    InvalidTransition {
        /// The incident ID.
        id: u64,
        /// Why the transition was rejected.
        reason: String,
    },

    /// No identifiers are left to hand out.
    #[error("identifier space exhausted at {id}")]
    IdSpaceExhausted {
        /// The identifier that could not be followed.
        id: u64,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for IncidentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for incident operations.
pub type Result<T> = std::result::Result<T, IncidentError>;
