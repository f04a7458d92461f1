//! Governed scope loading.
//!
//! The governed scope is the allow-list of edge connections under test, read from a
//! YAML file shaped like:
//!
//! ```yaml
//! governed_connections:
//!   "0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0":
//!     name: "Sales warehouse"
//!     description: "Snowflake, EU region"
//!     environment: prod
//!     team: data-platform
//! ```
//!
//! Refresh never runs without a non-empty scope. Listing may fall back to every
//! connection known to the catalog, see [`ListingScope`].

use crate::error::{GovernanceError, GovernanceResult};
use crate::models::GovernedConnection;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Deserialize)]
struct GovernedFile {
    #[serde(default)]
    governed_connections: Option<BTreeMap<String, Option<GovernedEntry>>>,
}

#[derive(Debug, Default, Deserialize)]
struct GovernedEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "env")]
    environment: Option<String>,
    #[serde(default, alias = "owning_team")]
    team: Option<String>,
}

/// Mapping of governed connection id to its metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GovernedScope {
    connections: BTreeMap<String, GovernedConnection>,
    source: Option<PathBuf>,
}

impl GovernedScope {
    /// Load the governed scope from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> GovernanceResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            let message = if e.kind() == std::io::ErrorKind::NotFound {
                format!("Governed connections config not found: {}", path.display())
            } else {
                format!("Cannot read {}: {e}", path.display())
            };
            GovernanceError::configuration_at(message, path)
        })?;

        let mut scope = Self::from_yaml_str(&contents).map_err(|e| match e {
            GovernanceError::Configuration { message, .. } => {
                GovernanceError::configuration_at(format!("{}: {message}", path.display()), path)
            }
            other => other,
        })?;
        scope.source = Some(path.to_path_buf());

        info!(
            path = %path.display(),
            count = scope.len(),
            "Loaded governed connections"
        );
        Ok(scope)
    }

    /// Parse the governed scope from YAML text.
    pub fn from_yaml_str(contents: &str) -> GovernanceResult<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        // A document that is only comments or `~` deserializes to None
        let file: Option<GovernedFile> = serde_yaml::from_str(contents)?;
        let entries = file
            .and_then(|f| f.governed_connections)
            .unwrap_or_default();

        let mut connections = BTreeMap::new();
        for (id, entry) in entries {
            let entry = entry.unwrap_or_default();
            let connection = GovernedConnection::new(id.clone(), entry.name)
                .map_err(|e| GovernanceError::configuration(e.to_string()))?
                .with_description(entry.description)
                .with_environment(entry.environment)
                .with_team(entry.team);
            debug!(connection_id = %connection.id, name = %connection.name, "Governed connection");
            connections.insert(connection.id.clone(), connection);
        }

        Ok(Self {
            connections,
            source: None,
        })
    }

    pub fn from_connections(connections: impl IntoIterator<Item = GovernedConnection>) -> Self {
        Self {
            connections: connections
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            source: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&GovernedConnection> {
        self.connections.get(id)
    }

    /// Governed connection ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }

    /// Governed connections, sorted by id.
    pub fn iter(&self) -> impl Iterator<Item = &GovernedConnection> {
        self.connections.values()
    }

    /// File the scope was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Ensure the scope can drive a refresh run.
    pub fn require_non_empty(self) -> GovernanceResult<Self> {
        if self.is_empty() {
            let message = match &self.source {
                Some(path) => format!(
                    "No governed edge connection ids in {} (or the file is empty)",
                    path.display()
                ),
                None => "No governed edge connection ids configured".to_string(),
            };
            return Err(GovernanceError::Configuration {
                message,
                path: self.source,
            });
        }
        Ok(self)
    }
}

/// Which connections the listing workflow operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingScope {
    /// Only connections under these edge connection ids
    Governed(Vec<String>),
    /// Every connection known to the catalog
    Everything,
}

impl ListingScope {
    /// Decide the listing scope from an attempt to load the governed file.
    ///
    /// A missing or empty file falls back to [`ListingScope::Everything`]; a malformed
    /// file is still an error.
    pub fn from_load_result(result: GovernanceResult<GovernedScope>) -> GovernanceResult<Self> {
        match result {
            Ok(scope) if !scope.is_empty() => {
                Ok(Self::Governed(scope.ids().map(String::from).collect()))
            }
            Ok(_) => {
                warn!("Governed connections file is empty, listing every connection");
                Ok(Self::Everything)
            }
            Err(GovernanceError::Configuration {
                path: Some(path),
                message,
            }) if !path.exists() => {
                warn!(error = %message, "Governed connections file not found, listing every connection");
                Ok(Self::Everything)
            }
            Err(e) => Err(e),
        }
    }

    pub fn includes(&self, edge_connection_id: &str) -> bool {
        match self {
            Self::Governed(ids) => ids.iter().any(|id| id == edge_connection_id),
            Self::Everything => true,
        }
    }
}
