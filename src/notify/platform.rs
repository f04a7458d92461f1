use super::Notifier;
use super::message::{FailureNotice, compose_message, subject};
use crate::client::CatalogApi;
use crate::error::{GovernanceError, GovernanceResult};
use crate::models::Owner;
use serde_json::json;
use tracing::info;

/// Creates a task in the catalog, assigned to the owner and attached to the database.
#[derive(Debug)]
pub struct PlatformNotifier<A> {
    api: A,
    endpoint: String,
}

impl<A: CatalogApi> PlatformNotifier<A> {
    pub fn new(api: A, endpoint: impl Into<String>) -> Self {
        Self {
            api,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl<A: CatalogApi> Notifier for PlatformNotifier<A> {
    fn channel(&self) -> &'static str {
        "platform"
    }

    async fn notify(&self, notice: &FailureNotice<'_>, owner: &Owner) -> GovernanceResult<()> {
        let payload = json!({
            "name": subject(notice.connection),
            "description": compose_message(notice, &[owner]),
            "assetId": notice.database_id,
            "assigneeId": owner.user_id,
        });

        match self.api.create_notification(&self.endpoint, &payload).await {
            Ok(response) => {
                info!(
                    endpoint = %self.endpoint,
                    user_id = %owner.user_id,
                    database_id = %notice.database_id,
                    task_id = response.get("id").and_then(|v| v.as_str()).unwrap_or("-"),
                    "Platform notification created"
                );
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Err(GovernanceError::notification(self.channel(), e.to_string())),
        }
    }
}
