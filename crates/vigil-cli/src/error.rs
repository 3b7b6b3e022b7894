//! CLI error types.

use std::fmt;

use vigil_notify::NotifyError;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Invalid configuration.
    Config(String),
    /// The fixture is missing or inconsistent.
    Fixture(String),
    /// An entity named on the command line does not exist.
    NotFound(String),
    /// Command execution failed.
    Command(String),
    /// Output formatting error.
    Format(String),
    /// Error from the notification layer.
    Notify(NotifyError),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Fixture(msg) => write!(f, "fixture error: {msg}"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Command(msg) => write!(f, "command error: {msg}"),
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::Notify(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Notify(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<NotifyError> for CliError {
    fn from(err: NotifyError) -> Self {
        Self::Notify(err)
    }
}
