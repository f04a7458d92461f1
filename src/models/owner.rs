//! Database assets and their owners.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A cataloged database asset, read on demand after a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseAsset {
    pub id: String,
    pub name: Option<String>,
    /// Owner user ids, duplicates removed, first occurrence order kept
    pub owner_ids: Vec<String>,
}

impl DatabaseAsset {
    /// Build an asset from the database endpoint body.
    ///
    /// Owners come from `ownerIds`; a single `ownerId` is accepted as a fallback.
    pub fn from_body(database_id: impl Into<String>, body: &JsonValue) -> Self {
        let database_id = database_id.into();
        let raw_ids: Vec<String> = match (body.get("ownerIds"), body.get("ownerId")) {
            (Some(JsonValue::Array(ids)), _) if !ids.is_empty() => {
                ids.iter().filter_map(id_string).collect()
            }
            (_, Some(single)) => id_string(single).into_iter().collect(),
            _ => Vec::new(),
        };

        let mut owner_ids: Vec<String> = Vec::with_capacity(raw_ids.len());
        for id in raw_ids {
            if !owner_ids.contains(&id) {
                owner_ids.push(id);
            }
        }

        Self {
            id: body
                .get("id")
                .and_then(id_string)
                .unwrap_or(database_id),
            name: body
                .get("name")
                .and_then(JsonValue::as_str)
                .map(String::from),
            owner_ids,
        }
    }
}

fn id_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Object(map) => map.get("id").and_then(id_string),
        _ => None,
    }
}

/// User record as returned by the user lookup endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// A user accountable for a database asset. Identity is the user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
}

impl Owner {
    /// An owner whose user record could not be fetched.
    pub fn unresolved(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            email: None,
            username: None,
        }
    }

    pub fn from_record(user_id: impl Into<String>, record: UserRecord) -> Self {
        let joined = [record.first_name.as_deref(), record.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let display_name = non_empty(record.full_name)
            .or_else(|| (!joined.is_empty()).then_some(joined))
            .or_else(|| non_empty(record.username.clone()));

        Self {
            user_id: user_id.into(),
            display_name,
            email: non_empty(record.email).or_else(|| non_empty(record.email_address)),
            username: non_empty(record.username),
        }
    }

    /// Best human-readable label: name, then email, then username, then id.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .or(self.username.as_deref())
            .unwrap_or(&self.user_id)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
