//! Integration tests for the governance workflow against an in-memory catalog.

mod common;

use catalog_refresh_guard::governed::ListingScope;
use catalog_refresh_guard::notify::PlatformNotifier;
use catalog_refresh_guard::refresh::{PollSettings, RefreshDriver, RefreshOutcome};
use catalog_refresh_guard::workflow::list_connections;
use catalog_refresh_guard::{GovernanceError, GovernanceRun};
use common::{Delivered, FakeCatalog, RecordingNotifier, scope};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn poll() -> PollSettings {
    PollSettings::new(Duration::from_secs(1), Duration::from_secs(10)).unwrap()
}

fn delivered(connection_id: &str, database_id: &str, user_id: &str) -> Delivered {
    Delivered {
        connection_id: connection_id.to_string(),
        database_id: database_id.to_string(),
        user_id: user_id.to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_mixed_run_reports_each_bucket_separately() {
    let catalog = FakeCatalog::new()
        .job("edge-1", "job-1", &["RUNNING", "COMPLETED"])
        .failing_job("edge-2", "job-2", "password authentication failed")
        .no_job_id("edge-3")
        .database("edge-2", "db-1", &["u1", "u2"])
        .user("u1", "Ada Lovelace")
        .user("u2", "Grace Hopper");
    let notifier = RecordingNotifier::new();

    let report = GovernanceRun::new(&catalog, &notifier, poll())
        .run(&scope(&["edge-1", "edge-2", "edge-3"]))
        .await
        .unwrap();

    let counts = report.counts();
    assert_eq!(counts.succeeded, 1);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.indeterminate, 1);
    assert_eq!(counts.notifications_sent, 2);
    assert_eq!(counts.notification_failures, 0);

    assert_eq!(
        notifier.delivered(),
        vec![
            delivered("edge-2", "db-1", "u1"),
            delivered("edge-2", "db-1", "u2"),
        ]
    );
    assert!(report.notifications.iter().all(|n| n.connection_id == "edge-2"));

    let failed = &report.failed[0];
    assert_eq!(failed.connection_id, "edge-2");
    assert_eq!(failed.failure, "ERROR");
    assert_eq!(failed.error, "password authentication failed");
    assert_eq!(failed.owners.len(), 2);
    let message = failed.notification_message.as_deref().unwrap();
    assert!(message.contains("all 2 owners"));
    assert!(message.contains("Grace Hopper (u2@example.com)"));

    assert_eq!(report.indeterminate[0].connection_id, "edge-3");
    assert_eq!(report.succeeded[0].connection_id, "edge-1");
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_owners_notified_once_per_connection() {
    // u1 owns both databases and is listed twice on db-1
    let catalog = FakeCatalog::new()
        .failing_job("edge-2", "job-2", "host unreachable")
        .database("edge-2", "db-1", &["u1", "u1", "u2"])
        .database("edge-2", "db-2", &["u1"])
        .user("u1", "Ada Lovelace")
        .user("u2", "Grace Hopper");
    let notifier = RecordingNotifier::new();

    let report = GovernanceRun::new(&catalog, &notifier, poll())
        .run(&scope(&["edge-2"]))
        .await
        .unwrap();

    assert_eq!(report.counts().notifications_sent, 2);
    let users: Vec<_> = notifier
        .delivered()
        .into_iter()
        .map(|d| d.user_id)
        .collect();
    assert_eq!(users, vec!["u1", "u2"]);
    assert_eq!(report.failed[0].databases.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_database_without_owners_is_flagged_not_notified() {
    let catalog = FakeCatalog::new()
        .failing_job("edge-2", "job-2", "timeout reading schema")
        .database("edge-2", "db-1", &[]);
    let notifier = RecordingNotifier::new();

    let report = GovernanceRun::new(&catalog, &notifier, poll())
        .run(&scope(&["edge-2"]))
        .await
        .unwrap();

    assert_eq!(report.counts().failed, 1);
    assert_eq!(report.counts().notifications_sent, 0);
    assert!(notifier.delivered().is_empty());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, "DATA_INCONSISTENCY");
    assert_eq!(report.warnings[0].database_id.as_deref(), Some("db-1"));
    assert!(report.failed[0].notification_message.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unresolved_owner_still_notified_with_warning() {
    let catalog = FakeCatalog::new()
        .failing_job("edge-2", "job-2", "boom")
        .database("edge-2", "db-1", &["u1", "ghost"])
        .user("u1", "Ada Lovelace");
    let notifier = RecordingNotifier::new();

    let report = GovernanceRun::new(&catalog, &notifier, poll())
        .run(&scope(&["edge-2"]))
        .await
        .unwrap();

    assert_eq!(report.counts().notifications_sent, 2);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, "PARTIAL_RESOLUTION");
    let ghost = report
        .notifications
        .iter()
        .find(|n| n.user_id == "ghost")
        .unwrap();
    assert!(ghost.email.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_notification_failure_does_not_stop_other_owners() {
    let catalog = FakeCatalog::new()
        .failing_job("edge-2", "job-2", "boom")
        .database("edge-2", "db-1", &["u1", "u2"])
        .user("u1", "Ada Lovelace")
        .user("u2", "Grace Hopper");
    let notifier = RecordingNotifier::new().failing_for("u1");

    let report = GovernanceRun::new(&catalog, &notifier, poll())
        .run(&scope(&["edge-2"]))
        .await
        .unwrap();

    let counts = report.counts();
    assert_eq!(counts.notifications_sent, 1);
    assert_eq!(counts.notification_failures, 1);
    assert_eq!(report.notification_failures[0].user_id, "u1");
    assert_eq!(notifier.delivered(), vec![delivered("edge-2", "db-1", "u2")]);
}

#[tokio::test(start_paused = true)]
async fn test_uncataloged_databases_are_skipped() {
    let catalog = FakeCatalog::new()
        .failing_job("edge-2", "job-2", "boom")
        .uncataloged("edge-2", "scratch")
        .database("edge-2", "db-1", &["u1"])
        .user("u1", "Ada Lovelace");
    let notifier = RecordingNotifier::new();

    let report = GovernanceRun::new(&catalog, &notifier, poll())
        .run(&scope(&["edge-2"]))
        .await
        .unwrap();

    assert_eq!(report.failed[0].databases.len(), 1);
    assert_eq!(report.counts().notifications_sent, 1);
    assert!(report.warnings.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_refresh_counts_as_failed() {
    let catalog = FakeCatalog::new().refresh_fails("edge-1", 500);
    let notifier = RecordingNotifier::new();

    let report = GovernanceRun::new(&catalog, &notifier, poll())
        .run(&scope(&["edge-1"]))
        .await
        .unwrap();

    assert_eq!(report.counts().failed, 1);
    assert_eq!(report.failed[0].failure, "REFRESH_REJECTED");
    assert!(report.failed[0].job_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_authentication_failure_aborts_run() {
    let catalog = FakeCatalog::new()
        .job("edge-1", "job-1", &["COMPLETED"])
        .refresh_unauthorized("edge-2");
    let notifier = RecordingNotifier::new();

    let err = GovernanceRun::new(&catalog, &notifier, poll())
        .run(&scope(&["edge-1", "edge-2"]))
        .await
        .unwrap_err();

    assert!(matches!(err, GovernanceError::Authentication { .. }));
    assert!(err.is_fatal());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_all_yields_one_outcome_per_connection() {
    let ids = ["edge-a", "edge-b", "edge-c", "edge-d", "edge-e"];
    let catalog = FakeCatalog::new()
        .job("edge-a", "job-a", &["COMPLETED"])
        .failing_job("edge-b", "job-b", "boom")
        .no_job_id("edge-c")
        .refresh_fails("edge-d", 404)
        .job("edge-e", "job-e", &["RUNNING"]);

    let outcomes = RefreshDriver::new(&catalog, poll())
        .refresh_all(&scope(&ids))
        .await
        .unwrap();

    assert_eq!(outcomes.len(), ids.len());
    let seen: BTreeSet<_> = outcomes.iter().map(|o| o.connection.id.as_str()).collect();
    assert_eq!(seen, ids.into_iter().collect());

    let labels: Vec<_> = outcomes.iter().map(|o| o.outcome.label()).collect();
    assert_eq!(
        labels,
        vec!["SUCCEEDED", "FAILED", "INDETERMINATE", "FAILED", "FAILED"]
    );
    assert!(matches!(
        outcomes[4].outcome,
        RefreshOutcome::Failed { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_platform_notifier_posts_task_payload() {
    let catalog = Arc::new(
        FakeCatalog::new()
            .failing_job("edge-2", "job-2", "boom")
            .database("edge-2", "db-1", &["u1"])
            .user("u1", "Ada Lovelace"),
    );
    let notifier = PlatformNotifier::new(catalog.clone(), "/rest/2.0/tasks");

    let report = GovernanceRun::new(&catalog, &notifier, poll())
        .run(&scope(&["edge-2"]))
        .await
        .unwrap();

    assert_eq!(report.notifications[0].channel, "platform");
    let posted = catalog.notifications.lock().unwrap().clone();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0]["assetId"], "db-1");
    assert_eq!(posted[0]["assigneeId"], "u1");
    assert!(posted[0]["description"].as_str().unwrap().contains("boom"));
}

#[tokio::test(start_paused = true)]
async fn test_list_connections_respects_scope() {
    let catalog = FakeCatalog::new()
        .database("edge-2", "db-2", &["u1"])
        .database("edge-1", "db-1", &["u1"])
        .uncataloged("edge-9", "other");

    let governed = list_connections(&catalog, &ListingScope::Governed(vec!["edge-1".into(), "edge-2".into()]))
        .await
        .unwrap();
    let edges: Vec<_> = governed.iter().map(|c| c.edge_connection_id.as_str()).collect();
    assert_eq!(edges, vec!["edge-1", "edge-2"]);

    let everything = list_connections(&catalog, &ListingScope::Everything)
        .await
        .unwrap();
    assert_eq!(everything.len(), 3);
}
