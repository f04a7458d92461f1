//! Typed catalog operations.
//!
//! [`CatalogApi`] is the seam between the workflow and the network: the refresh driver,
//! owner resolver and platform notifier only depend on this trait, so tests substitute
//! an in-memory catalog.

use super::http::CatalogClient;
use crate::error::{GovernanceError, GovernanceResult};
use crate::models::{DatabaseAsset, DatabaseConnection, UserRecord};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

pub const REFRESH_PATH: &str = "/rest/catalogDatabase/v1/databaseConnections/refresh";
pub const DATABASE_CONNECTIONS_PATH: &str = "/rest/catalogDatabase/v1/databaseConnections";
pub const JOBS_PATH: &str = "/rest/jobs/v1/jobs";
pub const DATABASES_PATH: &str = "/rest/catalogDatabase/v1/databases";
pub const USERS_PATH: &str = "/rest/2.0/users";

/// Largest page the database connection listing accepts.
pub const MAX_PAGE_SIZE: usize = 500;

/// Operations the governance workflow needs from the catalog.
pub trait CatalogApi: Send + Sync {
    /// Trigger a refresh of every database connection under an edge connection.
    ///
    /// Returns the raw response body; the job id is extracted by the caller.
    fn refresh_connection(
        &self,
        edge_connection_id: &str,
    ) -> impl Future<Output = GovernanceResult<JsonValue>> + Send;

    /// Fetch the raw status body of a job.
    fn job_status(&self, job_id: &str) -> impl Future<Output = GovernanceResult<JsonValue>> + Send;

    fn database_asset(
        &self,
        database_id: &str,
    ) -> impl Future<Output = GovernanceResult<DatabaseAsset>> + Send;

    fn user(&self, user_id: &str) -> impl Future<Output = GovernanceResult<UserRecord>> + Send;

    /// List database connections, optionally restricted to one edge connection.
    fn database_connections(
        &self,
        edge_connection_id: Option<&str>,
    ) -> impl Future<Output = GovernanceResult<Vec<DatabaseConnection>>> + Send;

    /// Post a notification payload to a catalog endpoint.
    fn create_notification(
        &self,
        endpoint: &str,
        payload: &JsonValue,
    ) -> impl Future<Output = GovernanceResult<JsonValue>> + Send;
}

impl CatalogApi for CatalogClient {
    async fn refresh_connection(&self, edge_connection_id: &str) -> GovernanceResult<JsonValue> {
        self.post(
            REFRESH_PATH,
            &[("edgeConnectionId", edge_connection_id.to_string())],
            None,
        )
        .await
    }

    async fn job_status(&self, job_id: &str) -> GovernanceResult<JsonValue> {
        self.get(&resource_path(JOBS_PATH, job_id)?, &[]).await
    }

    async fn database_asset(&self, database_id: &str) -> GovernanceResult<DatabaseAsset> {
        let body = self
            .get(&resource_path(DATABASES_PATH, database_id)?, &[])
            .await?;
        Ok(DatabaseAsset::from_body(database_id, &body))
    }

    async fn user(&self, user_id: &str) -> GovernanceResult<UserRecord> {
        let body = self.get(&resource_path(USERS_PATH, user_id)?, &[]).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn database_connections(
        &self,
        edge_connection_id: Option<&str>,
    ) -> GovernanceResult<Vec<DatabaseConnection>> {
        let mut connections = Vec::new();
        let mut offset = 0usize;
        let mut previous_first: Option<String> = None;

        loop {
            let mut query = vec![
                ("limit", MAX_PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ];
            if let Some(edge) = edge_connection_id {
                query.push(("edgeConnectionId", edge.to_string()));
            }

            let body = self.get(DATABASE_CONNECTIONS_PATH, &query).await?;
            let page = parse_connection_page(&body);
            let page_len = page.raw_len;

            if page.first_id.is_some() && page.first_id == previous_first {
                warn!(offset, "Connection listing repeated the previous page, stopping");
                break;
            }
            previous_first = page.first_id;
            connections.extend(page.connections);

            debug!(offset, page_len, total = connections.len(), "Fetched database connections page");

            if page_len < MAX_PAGE_SIZE {
                break;
            }
            offset += page_len;
        }

        Ok(connections)
    }

    async fn create_notification(
        &self,
        endpoint: &str,
        payload: &JsonValue,
    ) -> GovernanceResult<JsonValue> {
        self.post(endpoint, &[], Some(payload)).await
    }
}

impl<T: CatalogApi> CatalogApi for Arc<T> {
    fn refresh_connection(
        &self,
        edge_connection_id: &str,
    ) -> impl Future<Output = GovernanceResult<JsonValue>> + Send {
        (**self).refresh_connection(edge_connection_id)
    }

    fn job_status(&self, job_id: &str) -> impl Future<Output = GovernanceResult<JsonValue>> + Send {
        (**self).job_status(job_id)
    }

    fn database_asset(
        &self,
        database_id: &str,
    ) -> impl Future<Output = GovernanceResult<DatabaseAsset>> + Send {
        (**self).database_asset(database_id)
    }

    fn user(&self, user_id: &str) -> impl Future<Output = GovernanceResult<UserRecord>> + Send {
        (**self).user(user_id)
    }

    fn database_connections(
        &self,
        edge_connection_id: Option<&str>,
    ) -> impl Future<Output = GovernanceResult<Vec<DatabaseConnection>>> + Send {
        (**self).database_connections(edge_connection_id)
    }

    fn create_notification(
        &self,
        endpoint: &str,
        payload: &JsonValue,
    ) -> impl Future<Output = GovernanceResult<JsonValue>> + Send {
        (**self).create_notification(endpoint, payload)
    }
}

/// Build `<prefix>/<id>` with `id` escaped as a single path segment.
fn resource_path(prefix: &str, id: &str) -> GovernanceResult<String> {
    if matches!(id.trim(), "" | "." | "..") {
        return Err(GovernanceError::invalid_input(format!(
            "Invalid identifier '{id}' for {prefix}"
        )));
    }
    let mut url = Url::parse("http://catalog.invalid/")?;
    url.path_segments_mut()
        .map_err(|()| GovernanceError::invalid_input("Cannot build a resource path"))?
        .pop_if_empty()
        .extend(prefix.split('/').filter(|s| !s.is_empty()))
        .push(id);
    Ok(url.path().to_string())
}

struct ConnectionPage {
    connections: Vec<DatabaseConnection>,
    /// Entries on the page before parsing, used to detect the last page
    raw_len: usize,
    /// Id of the first entry, used to detect a server that ignores `offset`
    first_id: Option<String>,
}

fn parse_connection_page(body: &JsonValue) -> ConnectionPage {
    let entries = body
        .get("results")
        .and_then(JsonValue::as_array)
        .or_else(|| body.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let connections = entries
        .iter()
        .filter_map(|entry| match serde_json::from_value(entry.clone()) {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable database connection entry");
                None
            }
        })
        .collect();

    ConnectionPage {
        connections,
        raw_len: entries.len(),
        first_id: entries
            .first()
            .and_then(|entry| entry.get("id"))
            .and_then(JsonValue::as_str)
            .map(String::from),
    }
}
