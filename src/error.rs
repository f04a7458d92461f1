//! Error types for the catalog refresh guard.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Only authentication failures abort a run; every other variant is caught at the
//! per-connection or per-owner level and recorded in the summary report.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GovernanceError {
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("Authentication failed: {message}")]
    Authentication {
        message: String,
        status: Option<u16>,
    },

    #[error("API request failed: {message}")]
    Api {
        message: String,
        status: Option<u16>,
        /// Raw response body, when the server sent one
        body: Option<String>,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Could not resolve {} owner(s) of database {database_id}", unresolved.len())]
    PartialResolution {
        database_id: String,
        unresolved: Vec<String>,
    },

    #[error("Data inconsistency for database {database_id}: {message}")]
    DataInconsistency {
        database_id: String,
        message: String,
    },

    #[error("Notification via {channel} failed: {message}")]
    Notification { channel: String, message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl GovernanceError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error tied to a file.
    pub fn configuration_at(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Configuration {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Authentication {
            message: message.into(),
            status,
        }
    }

    /// Create an API error with optional status code and response body.
    pub fn api(message: impl Into<String>, status: Option<u16>, body: Option<String>) -> Self {
        Self::Api {
            message: message.into(),
            status,
            body,
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    pub fn partial_resolution(database_id: impl Into<String>, unresolved: Vec<String>) -> Self {
        Self::PartialResolution {
            database_id: database_id.into(),
            unresolved,
        }
    }

    pub fn data_inconsistency(database_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataInconsistency {
            database_id: database_id.into(),
            message: message.into(),
        }
    }

    pub fn notification(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Notification {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// HTTP status code attached to this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Api { status, .. } => *status,
            _ => None,
        }
    }

    /// Fatal errors abort the whole run instead of being recorded per connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Configuration { .. })
    }

    /// Check if this error is retryable by the HTTP layer.
    pub fn is_retryable(&self) -> bool {
        match self {
            // No status means the request never got an answer (connect/read failure)
            Self::Api { status: None, .. } => true,
            Self::Api {
                status: Some(code), ..
            } => is_retryable_status(*code),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Get a remediation hint for this error, if one applies.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Configuration { .. } => Some(
                "Set CATALOG_BASE_URL, CATALOG_CLIENT_ID and CATALOG_CLIENT_SECRET, and check the governed connections file",
            ),
            Self::Authentication { .. } => {
                Some("Verify the OAuth client credentials and that the client is enabled")
            }
            Self::Api {
                status: Some(401 | 403),
                ..
            } => Some("Check that the OAuth client has permission for this endpoint"),
            Self::Api {
                status: Some(404), ..
            } => Some("Verify that the identifier exists in the catalog"),
            Self::Timeout { .. } => Some("Consider increasing --job-timeout"),
            _ => None,
        }
    }
}

/// Statuses retried transparently by the HTTP layer.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

impl From<reqwest::Error> for GovernanceError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        if err.is_timeout() {
            GovernanceError::api(format!("Request timed out: {err}"), status, None)
        } else if err.is_decode() {
            GovernanceError::api(format!("Invalid response body: {err}"), status, None)
        } else {
            GovernanceError::api(format!("Network error: {err}"), status, None)
        }
    }
}

impl From<serde_yaml::Error> for GovernanceError {
    fn from(err: serde_yaml::Error) -> Self {
        GovernanceError::configuration(format!("Invalid YAML: {err}"))
    }
}

impl From<serde_json::Error> for GovernanceError {
    fn from(err: serde_json::Error) -> Self {
        GovernanceError::api(format!("Invalid JSON: {err}"), None, None)
    }
}

impl From<url::ParseError> for GovernanceError {
    fn from(err: url::ParseError) -> Self {
        GovernanceError::configuration(format!("Invalid URL: {err}"))
    }
}

/// Result type alias for governance operations.
pub type GovernanceResult<T> = Result<T, GovernanceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GovernanceError::authentication("invalid_client", Some(401));
        assert!(err.to_string().contains("Authentication failed"));
        assert!(err.to_string().contains("invalid_client"));
    }

    #[test]
    fn test_partial_resolution_display_counts_ids() {
        let err = GovernanceError::partial_resolution("db-1", vec!["u1".into(), "u2".into()]);
        assert_eq!(
            err.to_string(),
            "Could not resolve 2 owner(s) of database db-1"
        );
    }

    #[test]
    fn test_error_fatal() {
        assert!(GovernanceError::authentication("bad", None).is_fatal());
        assert!(GovernanceError::configuration("missing").is_fatal());
        assert!(!GovernanceError::api("boom", Some(500), None).is_fatal());
        assert!(!GovernanceError::data_inconsistency("db", "no owners").is_fatal());
    }

    #[test]
    fn test_error_retryable() {
        assert!(GovernanceError::api("rate limited", Some(429), None).is_retryable());
        assert!(GovernanceError::api("unavailable", Some(503), None).is_retryable());
        assert!(GovernanceError::api("network", None, None).is_retryable());
        assert!(GovernanceError::timeout("job", 30).is_retryable());
        assert!(!GovernanceError::api("not found", Some(404), None).is_retryable());
        assert!(!GovernanceError::authentication("bad", Some(401)).is_retryable());
    }

    #[test]
    fn test_status_code() {
        assert_eq!(
            GovernanceError::api("x", Some(404), None).status_code(),
            Some(404)
        );
        assert_eq!(
            GovernanceError::authentication("x", Some(401)).status_code(),
            Some(401)
        );
        assert_eq!(GovernanceError::invalid_input("x").status_code(), None);
    }

    #[test]
    fn test_error_suggestion() {
        let err = GovernanceError::api("missing", Some(404), None);
        assert_eq!(
            err.suggestion(),
            Some("Verify that the identifier exists in the catalog")
        );
        assert!(GovernanceError::invalid_input("x").suggestion().is_none());
    }

    #[test]
    fn test_yaml_error_maps_to_configuration() {
        let yaml_err = serde_yaml::from_str::<Vec<String>>("a: [").unwrap_err();
        let err: GovernanceError = yaml_err.into();
        assert!(matches!(err, GovernanceError::Configuration { .. }));
    }
}
