//! Summary report of a governance run.
//!
//! The report keeps four outcome families apart: connections that succeeded, connections
//! that were tested and failed, connections that could not be verified, and owner
//! notifications that could not be delivered.

use crate::error::{GovernanceError, GovernanceResult};
use crate::format::{Column, Table};
use crate::models::{GovernedConnection, Owner};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SucceededEntry {
    pub connection_id: String,
    pub name: String,
    pub job_id: String,
    pub polls: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedDatabase {
    pub database_id: String,
    pub database_name: Option<String>,
    pub owner_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedEntry {
    pub connection_id: String,
    pub name: String,
    pub job_id: Option<String>,
    /// Failure kind, e.g. `ERROR` or `TIMED_OUT`
    pub failure: String,
    pub error: String,
    pub databases: Vec<FailedDatabase>,
    /// Distinct owners across all databases of the connection
    pub owners: Vec<Owner>,
    /// Notice addressed to all owners, ready to forward
    pub notification_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndeterminateEntry {
    pub connection_id: String,
    pub name: String,
    pub reason: String,
}

/// One notification delivered to one owner for one failed connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub connection_id: String,
    pub connection_name: String,
    pub database_id: String,
    pub user_id: String,
    pub email: Option<String>,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationFailure {
    pub connection_id: String,
    pub database_id: String,
    pub user_id: String,
    pub channel: String,
    pub error: String,
}

/// Non-fatal problem discovered while handling a failed connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Warning {
    pub connection_id: String,
    pub database_id: Option<String>,
    pub kind: String,
    pub message: String,
}

impl Warning {
    pub fn from_error(
        connection_id: impl Into<String>,
        database_id: Option<&str>,
        error: &GovernanceError,
    ) -> Self {
        let kind = match error {
            GovernanceError::PartialResolution { .. } => "PARTIAL_RESOLUTION",
            GovernanceError::DataInconsistency { .. } => "DATA_INCONSISTENCY",
            GovernanceError::Api { .. } => "API_ERROR",
            GovernanceError::Timeout { .. } => "TIMEOUT",
            GovernanceError::Notification { .. } => "NOTIFICATION",
            GovernanceError::InvalidInput { .. } => "INVALID_INPUT",
            GovernanceError::Configuration { .. } => "CONFIGURATION",
            GovernanceError::Authentication { .. } => "AUTHENTICATION",
        };
        Self {
            connection_id: connection_id.into(),
            database_id: database_id.map(String::from),
            kind: kind.to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub indeterminate: usize,
    pub notifications_sent: usize,
    pub notification_failures: usize,
    pub warnings: usize,
}

/// Immutable result of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub counts: ReportCounts,
    pub succeeded: Vec<SucceededEntry>,
    pub failed: Vec<FailedEntry>,
    pub indeterminate: Vec<IndeterminateEntry>,
    pub notifications: Vec<NotificationRecord>,
    pub notification_failures: Vec<NotificationFailure>,
    pub warnings: Vec<Warning>,
}

impl SummaryReport {
    pub fn counts(&self) -> ReportCounts {
        self.counts
    }

    /// Notifications delivered for one connection.
    pub fn notifications_for<'a>(
        &'a self,
        connection_id: &'a str,
    ) -> impl Iterator<Item = &'a NotificationRecord> {
        self.notifications
            .iter()
            .filter(move |n| n.connection_id == connection_id)
    }

    pub fn to_json(&self) -> GovernanceResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_text(&self) -> String {
        let c = self.counts;
        let mut out = String::new();

        out.push_str("Connection refresh summary\n");
        out.push_str(&format!(
            "Run {} at {}\n\n",
            self.run_id,
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        out.push_str(&format!("  Governed connections:   {}\n", c.total));
        out.push_str(&format!("  Succeeded:              {}\n", c.succeeded));
        out.push_str(&format!("  Failed:                 {}\n", c.failed));
        out.push_str(&format!("  Indeterminate:          {}\n", c.indeterminate));
        out.push_str(&format!("  Notifications sent:     {}\n", c.notifications_sent));
        out.push_str(&format!("  Notification failures:  {}\n", c.notification_failures));
        out.push_str(&format!("  Warnings:               {}\n", c.warnings));

        if !self.succeeded.is_empty() {
            let mut table = Table::new(vec![
                Column::new("connection"),
                Column::new("id"),
                Column::new("job"),
                Column::new("polls").right(),
            ]);
            for e in &self.succeeded {
                table.push_row([
                    e.name.clone(),
                    e.connection_id.clone(),
                    e.job_id.clone(),
                    e.polls.to_string(),
                ]);
            }
            out.push_str("\nSucceeded\n");
            out.push_str(&table.render());
        }

        if !self.failed.is_empty() {
            let mut table = Table::new(vec![
                Column::new("connection"),
                Column::new("id"),
                Column::new("failure"),
                Column::new("error").max_width(60),
                Column::new("owners").right(),
            ]);
            for e in &self.failed {
                table.push_row([
                    e.name.clone(),
                    e.connection_id.clone(),
                    e.failure.clone(),
                    e.error.clone(),
                    e.owners.len().to_string(),
                ]);
            }
            out.push_str("\nFailed\n");
            out.push_str(&table.render());
        }

        if !self.indeterminate.is_empty() {
            let mut table = Table::new(vec![
                Column::new("connection"),
                Column::new("id"),
                Column::new("reason").max_width(60),
            ]);
            for e in &self.indeterminate {
                table.push_row([e.name.clone(), e.connection_id.clone(), e.reason.clone()]);
            }
            out.push_str("\nIndeterminate (could not be verified)\n");
            out.push_str(&table.render());
        }

        if !self.notifications.is_empty() {
            let mut table = Table::new(vec![
                Column::new("connection"),
                Column::new("database"),
                Column::new("user"),
                Column::new("email"),
                Column::new("channel"),
            ]);
            for n in &self.notifications {
                table.push_row([
                    n.connection_name.clone(),
                    n.database_id.clone(),
                    n.user_id.clone(),
                    n.email.clone().unwrap_or_default(),
                    n.channel.clone(),
                ]);
            }
            out.push_str("\nNotifications\n");
            out.push_str(&table.render());
        }

        if !self.notification_failures.is_empty() {
            out.push_str("\nNotification failures\n");
            for f in &self.notification_failures {
                out.push_str(&format!(
                    "  - {} / {} -> {} via {}: {}\n",
                    f.connection_id, f.database_id, f.user_id, f.channel, f.error
                ));
            }
        }

        if !self.warnings.is_empty() {
            out.push_str("\nWarnings\n");
            for w in &self.warnings {
                out.push_str(&format!("  - [{}] {}: {}\n", w.kind, w.connection_id, w.message));
            }
        }

        out
    }
}

/// Accumulates outcomes while a run progresses.
#[derive(Debug)]
pub struct ReportBuilder {
    run_id: Uuid,
    succeeded: Vec<SucceededEntry>,
    failed: Vec<FailedEntry>,
    indeterminate: Vec<IndeterminateEntry>,
    notifications: Vec<NotificationRecord>,
    notification_failures: Vec<NotificationFailure>,
    warnings: Vec<Warning>,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            indeterminate: Vec::new(),
            notifications: Vec::new(),
            notification_failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record_success(&mut self, connection: &GovernedConnection, job_id: &str, polls: u32) {
        self.succeeded.push(SucceededEntry {
            connection_id: connection.id.clone(),
            name: connection.name.clone(),
            job_id: job_id.to_string(),
            polls,
        });
    }

    pub fn record_failure(&mut self, entry: FailedEntry) {
        self.failed.push(entry);
    }

    pub fn record_indeterminate(&mut self, connection: &GovernedConnection, reason: &str) {
        self.indeterminate.push(IndeterminateEntry {
            connection_id: connection.id.clone(),
            name: connection.name.clone(),
            reason: reason.to_string(),
        });
    }

    pub fn record_notification(
        &mut self,
        connection: &GovernedConnection,
        database_id: &str,
        owner: &Owner,
        channel: &str,
    ) {
        self.notifications.push(NotificationRecord {
            connection_id: connection.id.clone(),
            connection_name: connection.name.clone(),
            database_id: database_id.to_string(),
            user_id: owner.user_id.clone(),
            email: owner.email.clone(),
            channel: channel.to_string(),
        });
    }

    pub fn record_notification_failure(
        &mut self,
        connection: &GovernedConnection,
        database_id: &str,
        owner: &Owner,
        channel: &str,
        error: &GovernanceError,
    ) {
        self.notification_failures.push(NotificationFailure {
            connection_id: connection.id.clone(),
            database_id: database_id.to_string(),
            user_id: owner.user_id.clone(),
            channel: channel.to_string(),
            error: error.to_string(),
        });
    }

    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn build(self) -> SummaryReport {
        let counts = ReportCounts {
            total: self.succeeded.len() + self.failed.len() + self.indeterminate.len(),
            succeeded: self.succeeded.len(),
            failed: self.failed.len(),
            indeterminate: self.indeterminate.len(),
            notifications_sent: self.notifications.len(),
            notification_failures: self.notification_failures.len(),
            warnings: self.warnings.len(),
        };

        SummaryReport {
            run_id: self.run_id,
            generated_at: Utc::now(),
            counts,
            succeeded: self.succeeded,
            failed: self.failed,
            indeterminate: self.indeterminate,
            notifications: self.notifications,
            notification_failures: self.notification_failures,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: &str) -> GovernedConnection {
        GovernedConnection::new(id, Some(format!("{id} name"))).unwrap()
    }

    fn failed(id: &str) -> FailedEntry {
        FailedEntry {
            connection_id: id.to_string(),
            name: format!("{id} name"),
            job_id: Some("job-2".into()),
            failure: "ERROR".into(),
            error: "bad credentials".into(),
            databases: vec![],
            owners: vec![Owner::unresolved("u1")],
            notification_message: None,
        }
    }

    #[test]
    fn test_counts_are_kept_apart() {
        let mut builder = ReportBuilder::new();
        builder.record_success(&conn("edge-1"), "job-1", 1);
        builder.record_failure(failed("edge-2"));
        builder.record_indeterminate(&conn("edge-3"), "no job id");
        builder.record_notification(&conn("edge-2"), "db-1", &Owner::unresolved("u1"), "console");
        builder.record_notification_failure(
            &conn("edge-2"),
            "db-1",
            &Owner::unresolved("u2"),
            "email",
            &GovernanceError::notification("email", "no address"),
        );
        builder.warn(Warning::from_error(
            "edge-2",
            Some("db-9"),
            &GovernanceError::data_inconsistency("db-9", "no owners"),
        ));

        let report = builder.build();
        assert_eq!(
            report.counts(),
            ReportCounts {
                total: 3,
                succeeded: 1,
                failed: 1,
                indeterminate: 1,
                notifications_sent: 1,
                notification_failures: 1,
                warnings: 1,
            }
        );
        assert_eq!(report.warnings[0].kind, "DATA_INCONSISTENCY");
        assert_eq!(report.notifications_for("edge-2").count(), 1);
        assert_eq!(report.notifications_for("edge-1").count(), 0);
    }

    #[test]
    fn test_render_text_sections() {
        let mut builder = ReportBuilder::new();
        builder.record_success(&conn("edge-1"), "job-1", 3);
        builder.record_failure(failed("edge-2"));
        builder.record_indeterminate(&conn("edge-3"), "no job id");
        let text = builder.build().render_text();

        assert!(text.contains("Succeeded:              1"));
        assert!(text.contains("Failed:                 1"));
        assert!(text.contains("Indeterminate:          1"));
        assert!(text.contains("Indeterminate (could not be verified)"));
        assert!(text.contains("bad credentials"));
        assert!(!text.contains("Notification failures\n"));
    }

    #[test]
    fn test_json_export() {
        let mut builder = ReportBuilder::new();
        builder.record_failure(failed("edge-2"));
        let report = builder.build();
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["counts"]["failed"], 1);
        assert_eq!(json["failed"][0]["failure"], "ERROR");
        assert_eq!(json["run_id"], report.run_id.to_string());
    }
}
