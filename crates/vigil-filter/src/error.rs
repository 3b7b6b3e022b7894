//! Error types for the vigil-filter crate.

use thiserror::Error;
use vigil_incident::IncidentError;

/// Errors that can occur when building or evaluating filters.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The filter specification or filter entity is malformed.
    #[error("invalid filter: {reason}")]
    Validation {
        /// The reason the filter is invalid.
        reason: String,
    },

    /// A tag in the specification could not be parsed.
    #[error(transparent)]
    Tag(#[from] IncidentError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for FilterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_validation() {
        let err = FilterError::Validation {
            reason: "maxlevel out of range".to_string(),
        };
        assert_eq!(err.to_string(), "invalid filter: maxlevel out of range");
    }

    #[test]
    fn error_from_tag_error_is_transparent() {
        let err: FilterError = IncidentError::InvalidTag {
            tag: "x".to_string(),
            reason: "missing '='".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "invalid tag 'x': missing '='");
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<u8>("nope").unwrap_err();
        assert!(matches!(
            FilterError::from(json_err),
            FilterError::Serialization(_)
        ));
    }
}
