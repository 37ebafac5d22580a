use std::fmt::{self, Display};
use std::io;

/// Provides `SimError` and maps to other errors to
/// convert to a `SimError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SimError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    /// A structural problem with the model configuration, e.g. a contact
    /// matrix whose rows do not sum to one. Detected at reset time.
    ConfigError(String),
    /// A state transition was invoked on an agent that cannot take it. This is
    /// a contract violation, not a data problem.
    InvariantBreach(String),
    /// A replicate aborted; carries the replicate index and the cause.
    ReplicateFailed {
        replicate: usize,
        source: Box<SimError>,
    },
    SimError(String),
}

impl SimError {
    /// Shorthand for building a [`SimError::ConfigError`].
    pub fn config(message: impl Into<String>) -> Self {
        SimError::ConfigError(message.into())
    }

    /// Shorthand for building a [`SimError::InvariantBreach`].
    pub fn invariant(message: impl Into<String>) -> Self {
        SimError::InvariantBreach(message.into())
    }
}

impl From<io::Error> for SimError {
    fn from(error: io::Error) -> Self {
        SimError::IoError(error)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(error: serde_json::Error) -> Self {
        SimError::JsonError(error)
    }
}

impl From<csv::Error> for SimError {
    fn from(error: csv::Error) -> Self {
        SimError::CSVError(error)
    }
}

impl From<String> for SimError {
    fn from(error: String) -> Self {
        SimError::SimError(error)
    }
}

impl From<&str> for SimError {
    fn from(error: &str) -> Self {
        SimError::SimError(error.to_string())
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::IoError(error) => Some(error),
            SimError::JsonError(error) => Some(error),
            SimError::CSVError(error) => Some(error),
            SimError::ReplicateFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimError::ConfigError(message) => write!(f, "Configuration error: {message}"),
            SimError::InvariantBreach(message) => write!(f, "Invariant breach: {message}"),
            SimError::ReplicateFailed { replicate, source } => {
                write!(f, "Replicate {replicate} failed: {source}")
            }
            _ => write!(f, "Error: {self:?}"),
        }
    }
}
