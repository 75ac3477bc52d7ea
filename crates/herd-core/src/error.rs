//! Error types for herd.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Field and state errors
    #[error("Invalid value for `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{value} is not a valid value for `{field}`")]
    InvalidState { field: &'static str, value: String },

    // Capability errors
    #[error("Software {software} {version} is already attached")]
    DuplicateCapability { software: String, version: String },

    // Startup errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Persistence errors
    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the caller can fix the failure by supplying a different value.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. }
                | Error::InvalidState { .. }
                | Error::DuplicateCapability { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message() {
        let err = Error::validation("port", "must be between 1024 and 65535");
        assert_eq!(
            err.to_string(),
            "Invalid value for `port`: must be between 1024 and 65535"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_configuration_is_not_recoverable() {
        let err = Error::Configuration("min_priority > max_priority".into());
        assert!(!err.is_recoverable());
    }
}
