//! Governance workflow.
//!
//! Refresh every governed connection, then for each failure find the cataloged databases
//! behind it, resolve their owners and notify every distinct owner once. Everything is
//! collected into a [`SummaryReport`]; only authentication failures abort the run.

use crate::client::CatalogApi;
use crate::error::GovernanceResult;
use crate::format::{Column, Table};
use crate::governed::{GovernedScope, ListingScope};
use crate::models::{DatabaseConnection, GovernedConnection, Owner};
use crate::notify::{FailureNotice, Notifier, compose_message};
use crate::owners::{OwnerResolver, OwnerSet};
use crate::refresh::{ConnectionOutcome, FailureReason, PollSettings, RefreshDriver, RefreshOutcome};
use crate::report::{FailedDatabase, FailedEntry, ReportBuilder, SummaryReport, Warning};
use std::collections::HashSet;
use tracing::{info, warn};

/// One governance run over a governed scope.
pub struct GovernanceRun<'a, A, N> {
    api: &'a A,
    notifier: &'a N,
    poll: PollSettings,
}

impl<'a, A: CatalogApi, N: Notifier> GovernanceRun<'a, A, N> {
    pub fn new(api: &'a A, notifier: &'a N, poll: PollSettings) -> Self {
        Self {
            api,
            notifier,
            poll,
        }
    }

    pub async fn run(&self, scope: &GovernedScope) -> GovernanceResult<SummaryReport> {
        let mut report = ReportBuilder::new();
        info!(
            run_id = %report.run_id(),
            connections = scope.len(),
            channel = self.notifier.channel(),
            "Starting governance run"
        );

        let outcomes = RefreshDriver::new(self.api, self.poll)
            .refresh_all(scope)
            .await?;

        for ConnectionOutcome {
            connection,
            outcome,
        } in &outcomes
        {
            match outcome {
                RefreshOutcome::Succeeded { job_id, polls } => {
                    report.record_success(connection, job_id, *polls)
                }
                RefreshOutcome::Indeterminate { reason } => {
                    report.record_indeterminate(connection, reason)
                }
                RefreshOutcome::Failed { job_id, reason } => {
                    let entry = self
                        .handle_failure(connection, job_id.as_deref(), reason, &mut report)
                        .await?;
                    report.record_failure(entry);
                }
            }
        }

        let report = report.build();
        let counts = report.counts();
        info!(
            succeeded = counts.succeeded,
            failed = counts.failed,
            indeterminate = counts.indeterminate,
            notifications = counts.notifications_sent,
            notification_failures = counts.notification_failures,
            warnings = counts.warnings,
            "Governance run finished"
        );
        Ok(report)
    }

    async fn handle_failure(
        &self,
        connection: &GovernedConnection,
        job_id: Option<&str>,
        reason: &FailureReason,
        report: &mut ReportBuilder,
    ) -> GovernanceResult<FailedEntry> {
        let error_message = reason.to_string();
        let resolver = OwnerResolver::new(self.api);

        let databases = match resolver.databases_for_edge(&connection.id).await {
            Ok(databases) => databases,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                report.warn(Warning::from_error(&connection.id, None, &e));
                Vec::new()
            }
        };
        if databases.is_empty() {
            warn!(connection_id = %connection.id, "No cataloged databases found for failed connection");
        }

        let mut owners = OwnerSet::new();
        let mut failed_databases: Vec<FailedDatabase> = Vec::new();
        let mut seen_databases = HashSet::new();

        for database in &databases {
            let Some(database_id) = database.database_id.as_deref() else {
                continue;
            };
            if !seen_databases.insert(database_id.to_string()) {
                continue;
            }

            match resolver.resolve_owners(database_id).await {
                Ok(resolved) => {
                    if let Some(partial) = resolved.partial_resolution() {
                        report.warn(Warning::from_error(&connection.id, Some(database_id), &partial));
                    }
                    failed_databases.push(FailedDatabase {
                        database_id: database_id.to_string(),
                        database_name: resolved.database_name.clone().or_else(|| Some(database.name.clone())),
                        owner_ids: resolved.owners.iter().map(|o| o.user_id.clone()).collect(),
                    });
                    for owner in resolved.owners {
                        owners.insert(owner, database_id);
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        connection_id = %connection.id,
                        database_id = %database_id,
                        error = %e,
                        "Could not resolve database owners"
                    );
                    report.warn(Warning::from_error(&connection.id, Some(database_id), &e));
                    failed_databases.push(FailedDatabase {
                        database_id: database_id.to_string(),
                        database_name: Some(database.name.clone()),
                        owner_ids: Vec::new(),
                    });
                }
            }
        }

        let database_name = |id: &str| {
            failed_databases
                .iter()
                .find(|db| db.database_id == id)
                .and_then(|db| db.database_name.clone())
        };

        for (owner, database_id) in owners.iter() {
            let name = database_name(database_id);
            let notice = FailureNotice {
                connection,
                database_id,
                database_name: name.as_deref(),
                error_message: &error_message,
            };
            match self.notifier.notify(&notice, owner).await {
                Ok(()) => {
                    report.record_notification(connection, database_id, owner, self.notifier.channel())
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        connection_id = %connection.id,
                        user_id = %owner.user_id,
                        error = %e,
                        "Owner notification failed"
                    );
                    report.record_notification_failure(
                        connection,
                        database_id,
                        owner,
                        self.notifier.channel(),
                        &e,
                    );
                }
            }
        }

        let all_owners: Vec<&Owner> = owners.owners().collect();
        let notification_message = owners.iter().next().map(|(_, database_id)| {
            let name = database_name(database_id);
            compose_message(
                &FailureNotice {
                    connection,
                    database_id,
                    database_name: name.as_deref(),
                    error_message: &error_message,
                },
                &all_owners,
            )
        });

        Ok(FailedEntry {
            connection_id: connection.id.clone(),
            name: connection.name.clone(),
            job_id: job_id.map(String::from),
            failure: reason.kind().to_string(),
            error: error_message,
            owners: all_owners.into_iter().cloned().collect(),
            databases: failed_databases,
            notification_message,
        })
    }
}

/// List database connections for the given scope.
///
/// Connections are returned sorted by edge connection id, then database name.
pub async fn list_connections<A: CatalogApi>(
    api: &A,
    scope: &ListingScope,
) -> GovernanceResult<Vec<DatabaseConnection>> {
    let mut connections = match scope {
        ListingScope::Everything => api.database_connections(None).await?,
        ListingScope::Governed(edges) => {
            let mut all = Vec::new();
            for edge in edges {
                all.extend(api.database_connections(Some(edge.as_str())).await?);
            }
            all
        }
    };

    // The catalog may ignore the filter on older versions
    connections.retain(|c| scope.includes(&c.edge_connection_id));
    connections.sort_by(|a, b| {
        (a.edge_connection_id.as_str(), a.name.as_str())
            .cmp(&(b.edge_connection_id.as_str(), b.name.as_str()))
    });
    info!(count = connections.len(), "Listed database connections");
    Ok(connections)
}

/// Render a connection listing as a table.
pub fn render_connections(connections: &[DatabaseConnection]) -> String {
    let mut table = Table::new(vec![
        Column::new("edge connection"),
        Column::new("database"),
        Column::new("connection id"),
        Column::new("database id"),
    ]);
    for c in connections {
        table.push_row([
            c.edge_connection_id.clone(),
            c.name.clone(),
            c.id.clone(),
            c.database_id.clone().unwrap_or_else(|| "(not cataloged)".to_string()),
        ]);
    }
    table.render()
}

/// Resolve the listing scope from explicit edge filters or the governed file.
pub fn listing_scope(
    edges: &[String],
    all: bool,
    governed: impl FnOnce() -> GovernanceResult<GovernedScope>,
) -> GovernanceResult<ListingScope> {
    if all {
        return Ok(ListingScope::Everything);
    }
    let edges: Vec<String> = edges
        .iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();
    if !edges.is_empty() {
        return Ok(ListingScope::Governed(edges));
    }
    ListingScope::from_load_result(governed())
}
