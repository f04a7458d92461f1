//! Connection-related data models.
//!
//! This module defines the governed (edge) connections under test and the database
//! connections the catalog registers beneath them.

use serde::{Deserialize, Serialize};

/// An edge connection explicitly opted into testing by the governed scope file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernedConnection {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Environment tag, e.g. "prod"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Owning team
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

impl GovernedConnection {
    /// Create a governed connection; the name falls back to the shortened id.
    pub fn new(id: impl Into<String>, name: Option<String>) -> Result<Self, ConnectionIdError> {
        let id = id.into();
        let trimmed = id.trim();

        if trimmed.is_empty() {
            return Err(ConnectionIdError::EmptyId);
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c == '/' || c == '?') {
            return Err(ConnectionIdError::InvalidId(id));
        }

        let id = trimmed.to_string();
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| short_id(&id));

        Ok(Self {
            id,
            name,
            description: None,
            environment: None,
            team: None,
        })
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_environment(mut self, environment: Option<String>) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_team(mut self, team: Option<String>) -> Self {
        self.team = team;
        self
    }
}

/// Errors that can occur when creating a governed connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionIdError {
    /// Connection ID is empty
    #[error("Connection ID cannot be empty")]
    EmptyId,

    /// Connection ID would not survive being placed in a URL path or query
    #[error("Connection ID contains invalid characters: {0}")]
    InvalidId(String),
}

/// A database connection registered in the catalog for an edge connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConnection {
    pub id: String,
    /// Name of the database (catalog) as read from the source
    pub name: String,
    pub edge_connection_id: String,
    /// Database asset linked with this connection, once cataloged
    #[serde(default)]
    pub database_id: Option<String>,
}

impl DatabaseConnection {
    pub fn is_cataloged(&self) -> bool {
        self.database_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Shorten an identifier for log lines: first 8 characters followed by "...".
pub fn short_id(id: &str) -> String {
    match id.char_indices().nth(8) {
        Some((idx, _)) => format!("{}...", &id[..idx]),
        None => id.to_string(),
    }
}
