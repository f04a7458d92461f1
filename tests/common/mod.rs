//! In-memory catalog and notifier shared by the integration tests.

#![allow(dead_code)]

use catalog_refresh_guard::client::CatalogApi;
use catalog_refresh_guard::models::{DatabaseAsset, DatabaseConnection, GovernedConnection, Owner, UserRecord};
use catalog_refresh_guard::notify::{FailureNotice, Notifier};
use catalog_refresh_guard::{GovernanceError, GovernanceResult, GovernedScope};
use serde_json::{Value as JsonValue, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

enum RefreshBehavior {
    Respond(JsonValue),
    Fail(u16),
    Unauthorized,
}

/// Scripted catalog. Job statuses are consumed one per poll; the last one repeats.
#[derive(Default)]
pub struct FakeCatalog {
    refresh: HashMap<String, RefreshBehavior>,
    jobs: Mutex<HashMap<String, VecDeque<JsonValue>>>,
    failing_jobs: HashSet<String>,
    polls: Mutex<HashMap<String, u32>>,
    assets: HashMap<String, JsonValue>,
    users: HashMap<String, JsonValue>,
    connections: Vec<DatabaseConnection>,
    pub notifications: Mutex<Vec<JsonValue>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh returns a job id and the job walks through `statuses`.
    pub fn job(mut self, edge: &str, job_id: &str, statuses: &[&str]) -> Self {
        self.refresh
            .insert(edge.to_string(), RefreshBehavior::Respond(json!({ "id": job_id })));
        let script = statuses.iter().map(|s| json!({ "status": s })).collect();
        self.jobs
            .get_mut()
            .unwrap()
            .insert(job_id.to_string(), script);
        self
    }

    /// Job that ends in ERROR with the given message.
    pub fn failing_job(mut self, edge: &str, job_id: &str, message: &str) -> Self {
        self.refresh
            .insert(edge.to_string(), RefreshBehavior::Respond(json!({ "id": job_id })));
        self.jobs.get_mut().unwrap().insert(
            job_id.to_string(),
            VecDeque::from([
                json!({ "status": "RUNNING" }),
                json!({ "status": "ERROR", "errorMessage": message }),
            ]),
        );
        self
    }

    /// Refresh response without a job id.
    pub fn no_job_id(mut self, edge: &str) -> Self {
        self.refresh.insert(
            edge.to_string(),
            RefreshBehavior::Respond(json!({ "status": "ACCEPTED" })),
        );
        self
    }

    pub fn refresh_fails(mut self, edge: &str, status: u16) -> Self {
        self.refresh
            .insert(edge.to_string(), RefreshBehavior::Fail(status));
        self
    }

    pub fn refresh_unauthorized(mut self, edge: &str) -> Self {
        self.refresh
            .insert(edge.to_string(), RefreshBehavior::Unauthorized);
        self
    }

    /// Job-status endpoint answers 500 for this job.
    pub fn status_check_fails(mut self, edge: &str, job_id: &str) -> Self {
        self.refresh
            .insert(edge.to_string(), RefreshBehavior::Respond(json!({ "jobId": job_id })));
        self.failing_jobs.insert(job_id.to_string());
        self
    }

    /// Register a cataloged database under an edge with the given owner ids.
    pub fn database(mut self, edge: &str, database_id: &str, owner_ids: &[&str]) -> Self {
        self.connections.push(DatabaseConnection {
            id: format!("conn-{database_id}"),
            name: database_id.to_uppercase(),
            edge_connection_id: edge.to_string(),
            database_id: Some(database_id.to_string()),
        });
        self.assets.insert(
            database_id.to_string(),
            json!({ "id": database_id, "name": database_id.to_uppercase(), "ownerIds": owner_ids }),
        );
        self
    }

    pub fn uncataloged(mut self, edge: &str, name: &str) -> Self {
        self.connections.push(DatabaseConnection {
            id: format!("conn-{name}"),
            name: name.to_string(),
            edge_connection_id: edge.to_string(),
            database_id: None,
        });
        self
    }

    pub fn user(mut self, user_id: &str, full_name: &str) -> Self {
        self.users.insert(
            user_id.to_string(),
            json!({
                "id": user_id,
                "fullName": full_name,
                "email": format!("{user_id}@example.com"),
                "username": user_id,
            }),
        );
        self
    }

    pub fn polls(&self, job_id: &str) -> u32 {
        self.polls
            .lock()
            .unwrap()
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_polls(&self) -> u32 {
        self.polls.lock().unwrap().values().sum()
    }
}

fn not_found(what: &str, id: &str) -> GovernanceError {
    GovernanceError::api(format!("{what} {id} not found"), Some(404), None)
}

impl CatalogApi for FakeCatalog {
    async fn refresh_connection(&self, edge_connection_id: &str) -> GovernanceResult<JsonValue> {
        match self.refresh.get(edge_connection_id) {
            Some(RefreshBehavior::Respond(body)) => Ok(body.clone()),
            Some(RefreshBehavior::Fail(status)) => Err(GovernanceError::api(
                format!("refresh returned {status}"),
                Some(*status),
                None,
            )),
            Some(RefreshBehavior::Unauthorized) => Err(GovernanceError::authentication(
                "rejected with 401 after re-authentication",
                Some(401),
            )),
            None => Err(not_found("edge connection", edge_connection_id)),
        }
    }

    async fn job_status(&self, job_id: &str) -> GovernanceResult<JsonValue> {
        *self
            .polls
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default() += 1;

        if self.failing_jobs.contains(job_id) {
            return Err(GovernanceError::api("job status returned 500", Some(500), None));
        }

        let mut jobs = self.jobs.lock().unwrap();
        let script = jobs.get_mut(job_id).ok_or_else(|| not_found("job", job_id))?;
        let status = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        Ok(status.unwrap_or_else(|| json!({ "status": "RUNNING" })))
    }

    async fn database_asset(&self, database_id: &str) -> GovernanceResult<DatabaseAsset> {
        self.assets
            .get(database_id)
            .map(|body| DatabaseAsset::from_body(database_id, body))
            .ok_or_else(|| not_found("database", database_id))
    }

    async fn user(&self, user_id: &str) -> GovernanceResult<UserRecord> {
        let body = self
            .users
            .get(user_id)
            .ok_or_else(|| not_found("user", user_id))?;
        Ok(serde_json::from_value(body.clone())?)
    }

    async fn database_connections(
        &self,
        edge_connection_id: Option<&str>,
    ) -> GovernanceResult<Vec<DatabaseConnection>> {
        Ok(self
            .connections
            .iter()
            .filter(|c| edge_connection_id.is_none_or(|edge| c.edge_connection_id == edge))
            .cloned()
            .collect())
    }

    async fn create_notification(
        &self,
        _endpoint: &str,
        payload: &JsonValue,
    ) -> GovernanceResult<JsonValue> {
        self.notifications.lock().unwrap().push(payload.clone());
        Ok(json!({ "id": "task-1" }))
    }
}

/// One delivered notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub connection_id: String,
    pub database_id: String,
    pub user_id: String,
}

/// Notifier that records deliveries and fails for selected users.
#[derive(Default)]
pub struct RecordingNotifier {
    pub delivered: Mutex<Vec<Delivered>>,
    failing_users: HashSet<String>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, user_id: &str) -> Self {
        self.failing_users.insert(user_id.to_string());
        self
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn channel(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, notice: &FailureNotice<'_>, owner: &Owner) -> GovernanceResult<()> {
        if self.failing_users.contains(&owner.user_id) {
            return Err(GovernanceError::notification(self.channel(), "mailbox full"));
        }
        self.delivered.lock().unwrap().push(Delivered {
            connection_id: notice.connection.id.clone(),
            database_id: notice.database_id.to_string(),
            user_id: owner.user_id.clone(),
        });
        Ok(())
    }
}

pub fn scope(ids: &[&str]) -> GovernedScope {
    GovernedScope::from_connections(
        ids.iter()
            .map(|id| GovernedConnection::new(*id, None).unwrap()),
    )
}
