//! Error types for the vigil-schedule crate.

use thiserror::Error;

/// Errors that can occur when building schedules.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A recurrence or recurrence group is malformed.
    #[error("invalid recurrence: {reason}")]
    InvalidRecurrence {
        /// The reason the recurrence is invalid.
        reason: String,
    },

    /// The timezone name is not a known IANA zone.
    #[error("invalid timezone '{0}'")]
    InvalidTimezone(String),
}

/// Result type for schedule operations.
pub type Result<T> = std::result::Result<T, ScheduleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ScheduleError::InvalidRecurrence {
            reason: "no days".to_string(),
        };
        assert_eq!(err.to_string(), "invalid recurrence: no days");

        let err = ScheduleError::InvalidTimezone("Mars/Base".to_string());
        assert_eq!(err.to_string(), "invalid timezone 'Mars/Base'");
    }
}
