//! Connection refresh driver.
//!
//! Triggers a refresh for each governed connection and polls the resulting job until it
//! reaches a terminal state or the timeout elapses. Connections are processed one at a
//! time. Only authentication failures escape as `Err`; every other failure becomes a
//! [`RefreshOutcome`].

use crate::client::CatalogApi;
use crate::config::RefreshArgs;
use crate::error::{GovernanceError, GovernanceResult};
use crate::governed::GovernedScope;
use crate::models::{GovernedConnection, JobStatus, RefreshJob, job_id_from_refresh_body, short_id};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Why a refresh counted as failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The refresh request itself was refused by the catalog
    RefreshRejected(String),
    /// The job finished with an error
    JobError(String),
    /// The job did not finish in time (locally or as reported by the catalog)
    TimedOut { elapsed_secs: u64, remote: bool },
    /// The job status could not be read
    StatusCheck(String),
}

impl FailureReason {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RefreshRejected(_) => "REFRESH_REJECTED",
            Self::JobError(_) => "ERROR",
            Self::TimedOut { .. } => "TIMED_OUT",
            Self::StatusCheck(_) => "STATUS_CHECK_FAILED",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RefreshRejected(msg) => write!(f, "Refresh request failed: {msg}"),
            Self::JobError(msg) => f.write_str(msg),
            Self::TimedOut {
                remote: true,
                elapsed_secs,
            } => write!(f, "Job reported TIMED_OUT after {elapsed_secs}s"),
            Self::TimedOut { elapsed_secs, .. } => {
                write!(f, "Job did not complete within {elapsed_secs}s")
            }
            Self::StatusCheck(msg) => write!(f, "Job status check failed: {msg}"),
        }
    }
}

/// Terminal outcome of one governed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Succeeded {
        job_id: String,
        polls: u32,
    },
    Failed {
        job_id: Option<String>,
        reason: FailureReason,
    },
    /// Could not be verified either way, e.g. no job id was returned
    Indeterminate { reason: String },
}

impl RefreshOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Succeeded { job_id, .. } => Some(job_id),
            Self::Failed { job_id, .. } => job_id.as_deref(),
            Self::Indeterminate { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded { .. } => "SUCCEEDED",
            Self::Failed { .. } => "FAILED",
            Self::Indeterminate { .. } => "INDETERMINATE",
        }
    }
}

/// Outcome paired with the connection it belongs to.
#[derive(Debug, Clone)]
pub struct ConnectionOutcome {
    pub connection: GovernedConnection,
    pub outcome: RefreshOutcome,
}

/// Polling cadence and ceiling for refresh jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    pub fn new(interval: Duration, timeout: Duration) -> GovernanceResult<Self> {
        if interval.is_zero() {
            return Err(GovernanceError::invalid_input(
                "Poll interval must be greater than zero",
            ));
        }
        Ok(Self { interval, timeout })
    }

    pub fn from_args(args: &RefreshArgs) -> GovernanceResult<Self> {
        Self::new(args.poll_interval_duration(), args.job_timeout_duration())
    }
}

/// Drives refresh jobs against a [`CatalogApi`].
pub struct RefreshDriver<'a, A> {
    api: &'a A,
    poll: PollSettings,
}

impl<'a, A: CatalogApi> RefreshDriver<'a, A> {
    pub fn new(api: &'a A, poll: PollSettings) -> Self {
        Self { api, poll }
    }

    /// Refresh every governed connection, sorted by id, one outcome per connection.
    pub async fn refresh_all(&self, scope: &GovernedScope) -> GovernanceResult<Vec<ConnectionOutcome>> {
        let mut outcomes = Vec::with_capacity(scope.len());

        for (index, connection) in scope.iter().enumerate() {
            info!(
                connection_id = %connection.id,
                name = %connection.name,
                position = index + 1,
                total = scope.len(),
                "Refreshing governed connection"
            );

            let outcome = self.refresh_and_wait(&connection.id).await?;
            match &outcome {
                RefreshOutcome::Succeeded { .. } => {
                    info!(connection_id = %connection.id, "Connection refresh succeeded")
                }
                RefreshOutcome::Failed { reason, .. } => {
                    warn!(connection_id = %connection.id, reason = %reason, "Connection refresh failed")
                }
                RefreshOutcome::Indeterminate { reason } => {
                    warn!(connection_id = %connection.id, reason = %reason, "Connection refresh indeterminate")
                }
            }

            outcomes.push(ConnectionOutcome {
                connection: connection.clone(),
                outcome,
            });
        }

        Ok(outcomes)
    }

    /// Trigger a refresh and wait for its job to finish.
    pub async fn refresh_and_wait(&self, connection_id: &str) -> GovernanceResult<RefreshOutcome> {
        let body = match self.api.refresh_connection(connection_id).await {
            Ok(body) => body,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                return Ok(RefreshOutcome::Failed {
                    job_id: None,
                    reason: FailureReason::RefreshRejected(e.to_string()),
                });
            }
        };

        let Some(job_id) = job_id_from_refresh_body(&body) else {
            warn!(
                connection_id = %connection_id,
                response = %body,
                "Refresh response did not include a job id"
            );
            return Ok(RefreshOutcome::Indeterminate {
                reason: "Refresh response did not include a job id".to_string(),
            });
        };

        info!(
            connection_id = %short_id(connection_id),
            job_id = %job_id,
            "Refresh job started"
        );
        self.wait_for_job(connection_id, job_id).await
    }

    /// Poll immediately, then every interval, until terminal or the timeout elapses.
    async fn wait_for_job(&self, connection_id: &str, job_id: String) -> GovernanceResult<RefreshOutcome> {
        let started = Instant::now();
        let mut polls: u32 = 0;

        loop {
            polls += 1;
            let body = match self.api.job_status(&job_id).await {
                Ok(body) => body,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    return Ok(RefreshOutcome::Failed {
                        job_id: Some(job_id),
                        reason: FailureReason::StatusCheck(e.to_string()),
                    });
                }
            };

            let job = RefreshJob::from_status_body(job_id.as_str(), connection_id, &body);
            debug!(
                job_id = %job_id,
                poll = polls,
                status = %job.status,
                progress = job.progress,
                "Job status"
            );

            match job.status {
                JobStatus::Completed => return Ok(RefreshOutcome::Succeeded { job_id, polls }),
                JobStatus::Error => {
                    return Ok(RefreshOutcome::Failed {
                        reason: FailureReason::JobError(job.error_detail()),
                        job_id: Some(job_id),
                    });
                }
                JobStatus::TimedOut => {
                    return Ok(RefreshOutcome::Failed {
                        job_id: Some(job_id),
                        reason: FailureReason::TimedOut {
                            elapsed_secs: started.elapsed().as_secs(),
                            remote: true,
                        },
                    });
                }
                JobStatus::Pending | JobStatus::Running => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= self.poll.timeout {
                warn!(
                    job_id = %job_id,
                    polls,
                    elapsed_secs = elapsed.as_secs(),
                    "Job did not reach a terminal state in time"
                );
                return Ok(RefreshOutcome::Failed {
                    job_id: Some(job_id),
                    reason: FailureReason::TimedOut {
                        elapsed_secs: elapsed.as_secs(),
                        remote: false,
                    },
                });
            }

            // Last sleep is shortened so the final poll lands on the deadline
            let wait = self.poll.interval.min(self.poll.timeout - elapsed);
            tokio::time::sleep(wait).await;
        }
    }
}
