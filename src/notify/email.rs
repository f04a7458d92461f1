use super::Notifier;
use super::message::{FailureNotice, compose_message, subject};
use crate::error::{GovernanceError, GovernanceResult};
use crate::models::Owner;
use tracing::info;

/// Email placeholder: validates the recipient and logs the message, sends nothing.
#[derive(Debug, Default)]
pub struct EmailNotifier;

impl EmailNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, notice: &FailureNotice<'_>, owner: &Owner) -> GovernanceResult<()> {
        let Some(email) = owner.email.as_deref() else {
            return Err(GovernanceError::notification(
                self.channel(),
                format!("Owner {} has no email address", owner.user_id),
            ));
        };

        info!(
            to = %email,
            subject = %subject(notice.connection),
            body = %compose_message(notice, &[owner]),
            "Email notification prepared (not sent)"
        );
        Ok(())
    }
}
