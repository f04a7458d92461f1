//! Refresh job models.
//!
//! The job-status endpoint is loosely typed: the status and the error detail may live
//! under several field names, and the status vocabulary varies between job types.
//! Everything is normalised here so the polling loop only sees [`JobStatus`].

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

const STATUS_FIELDS: &[&str] = &["status", "state", "jobStatus", "currentStatus"];
const ERROR_FIELDS: &[&str] = &["error", "errorMessage", "message", "statusMessage"];
const PROGRESS_FIELDS: &[&str] = &["progress", "progressPercentage", "completionPercentage"];

/// Status of an asynchronous refresh job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Error,
    TimedOut,
}

impl JobStatus {
    /// Normalise a raw status value reported by the catalog.
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" | "SUCCESS" | "SUCCEEDED" | "DONE" | "FINISHED" => Self::Completed,
            "ERROR" | "FAILED" | "FAILURE" | "CANCELLED" | "CANCELED" => Self::Error,
            "TIMED_OUT" | "TIMEOUT" => Self::TimedOut,
            "PENDING" | "QUEUED" | "WAITING" | "SCHEDULED" => Self::Pending,
            _ => Self::Running,
        }
    }

    /// Check if the job has reached a state it will never leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::TimedOut)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Error => "ERROR",
            Self::TimedOut => "TIMED_OUT",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a refresh job, as returned by the job-status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshJob {
    pub job_id: String,
    pub connection_id: String,
    pub status: JobStatus,
    /// Raw status string before normalisation
    pub raw_status: Option<String>,
    pub progress: Option<f64>,
    pub error: Option<String>,
}

impl RefreshJob {
    /// A freshly triggered job that has not been polled yet.
    pub fn pending(job_id: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            connection_id: connection_id.into(),
            status: JobStatus::Pending,
            raw_status: None,
            progress: None,
            error: None,
        }
    }

    /// Build a job observation from a job-status response body.
    pub fn from_status_body(
        job_id: impl Into<String>,
        connection_id: impl Into<String>,
        body: &JsonValue,
    ) -> Self {
        let raw_status = first_string(body, STATUS_FIELDS);
        let status = raw_status
            .as_deref()
            .map(JobStatus::from_remote)
            .unwrap_or(JobStatus::Running);
        let error = match status {
            JobStatus::Error | JobStatus::TimedOut => first_string(body, ERROR_FIELDS),
            _ => None,
        };
        let progress = PROGRESS_FIELDS
            .iter()
            .filter_map(|field| body.get(*field))
            .find_map(JsonValue::as_f64);

        Self {
            job_id: job_id.into(),
            connection_id: connection_id.into(),
            status,
            raw_status,
            progress,
            error,
        }
    }

    /// Error detail for a failed job, with a generic fallback.
    pub fn error_detail(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| format!("Job {} ended with status {}", self.job_id, self.status))
    }
}

/// Extract the job identifier from a refresh response (`id`, falling back to `jobId`).
pub fn job_id_from_refresh_body(body: &JsonValue) -> Option<String> {
    first_string(body, &["id", "jobId"])
}

fn first_string(body: &JsonValue, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| body.get(*field))
        .find_map(|value| match value {
            JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
            JsonValue::Object(_) | JsonValue::Array(_) => Some(value.to_string()),
            _ => None,
        })
}
