use super::Notifier;
use super::message::{FailureNotice, compose_message, subject};
use crate::error::{GovernanceError, GovernanceResult};
use crate::models::Owner;
use std::io::Write;
use std::sync::Mutex;
use tracing::warn;

/// Prints failure notices to a writer (stderr by default, stdout carries the report).
pub struct ConsoleNotifier {
    out: Mutex<Box<dyn Write + Send>>,
    target: &'static str,
}

impl ConsoleNotifier {
    pub fn stderr() -> Self {
        Self {
            target: "stderr",
            ..Self::with_writer(std::io::stderr())
        }
    }

    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
            target: "writer",
        }
    }

    /// Where notices go: `stderr` or a caller-supplied `writer`.
    pub fn target(&self) -> &'static str {
        self.target
    }
}

impl std::fmt::Debug for ConsoleNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleNotifier")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Notifier for ConsoleNotifier {
    fn channel(&self) -> &'static str {
        "console"
    }

    async fn notify(&self, notice: &FailureNotice<'_>, owner: &Owner) -> GovernanceResult<()> {
        warn!(
            connection_id = %notice.connection.id,
            database_id = %notice.database_id,
            owner = %owner.label(),
            "Notifying owner of failed connection"
        );

        let rule = "=".repeat(72);
        let text = format!(
            "{rule}\nTo: {} <{}>\nSubject: {}\n\n{}\n{rule}\n",
            owner.label(),
            owner.email.as_deref().unwrap_or("no email on record"),
            subject(notice.connection),
            compose_message(notice, &[owner]),
        );

        let mut out = self
            .out
            .lock()
            .map_err(|_| GovernanceError::notification(self.channel(), "output lock poisoned"))?;
        out.write_all(text.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| GovernanceError::notification(self.channel(), e.to_string()))
    }
}
