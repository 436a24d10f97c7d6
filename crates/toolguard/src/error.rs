//! Error types for the toolguard facade
//!
//! Failures of the guarded operations themselves never appear here: they are
//! reported through [`RetryError`](toolguard_core::retry::RetryError), which
//! keeps the caller's own error type. This enum covers setting the layer up.

use thiserror::Error;
use toolguard_core::retry::PolicyError;

/// Result type alias for toolguard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the toolguard crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The retry policy violated one of its constraints.
    #[error("Invalid retry policy: {0}")]
    InvalidPolicy(#[from] PolicyError),

    /// A configuration value could not be used.
    #[error("Invalid configuration for {key}: {message}")]
    InvalidConfig {
        /// Setting (usually an environment variable name)
        key: String,
        /// What was wrong with it
        message: String,
    },

    /// A value could not be serialized for caching or reporting.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from configuration rather than data.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::InvalidPolicy(_) | Error::InvalidConfig { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_error_converts() {
        let policy_err = toolguard_core::retry::RetryPolicy::builder()
            .max_attempts(0)
            .build()
            .unwrap_err();
        let err: Error = policy_err.into();
        assert!(err.is_config_error());
        assert!(err.to_string().starts_with("Invalid retry policy"));
    }

    #[test]
    fn test_invalid_config_display() {
        let err = Error::invalid_config("TOOLGUARD_JITTER", "expected a number, got 'lots'");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for TOOLGUARD_JITTER: expected a number, got 'lots'"
        );
    }

    #[test]
    fn test_serialization_is_not_config() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = Error::from(json_err);
        assert!(!err.is_config_error());
    }
}
