//! Configuration handling for the catalog refresh guard.
//!
//! This module provides configuration management via CLI arguments and environment variables.
//! The parsed [`Config`] is built once in `main` and passed down explicitly; nothing in the
//! library reads the environment on its own.

use crate::error::{GovernanceError, GovernanceResult};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_GOVERNED_CONFIG: &str = "governed_connections.yaml";

// Refresh job polling defaults
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_NOTIFICATION_ENDPOINT: &str = "/rest/2.0/tasks";

/// Delivery channel for owner notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum NotifyChannel {
    /// Print a human-readable notice on stderr
    #[default]
    Console,
    /// Post a task to the catalog, assigned to the owner
    Platform,
    /// Email placeholder (logs only)
    Email,
}

impl std::fmt::Display for NotifyChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Console => write!(f, "console"),
            Self::Platform => write!(f, "platform"),
            Self::Email => write!(f, "email"),
        }
    }
}

/// Output format for the summary report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Arguments of the `refresh` subcommand.
#[derive(Debug, Clone, Args)]
pub struct RefreshArgs {
    /// Seconds between two job status checks
    #[arg(
        long,
        default_value_t = DEFAULT_POLL_INTERVAL_SECS,
        env = "CATALOG_POLL_INTERVAL"
    )]
    pub poll_interval: u64,

    /// Seconds to wait for a refresh job before reporting it as timed out
    #[arg(
        long,
        default_value_t = DEFAULT_JOB_TIMEOUT_SECS,
        env = "CATALOG_JOB_TIMEOUT"
    )]
    pub job_timeout: u64,

    /// Channel used to notify owners of failed connections
    #[arg(long, value_enum, default_value = "console", env = "CATALOG_NOTIFY")]
    pub notify: NotifyChannel,

    /// Catalog endpoint receiving platform notifications
    #[arg(
        long,
        default_value = DEFAULT_NOTIFICATION_ENDPOINT,
        env = "CATALOG_NOTIFICATION_ENDPOINT"
    )]
    pub notification_endpoint: String,

    /// Report format printed on stdout
    #[arg(long, value_enum, default_value = "text")]
    pub format: ReportFormat,

    /// Also write the JSON export of the report to this file
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
}

impl Default for RefreshArgs {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL_SECS,
            job_timeout: DEFAULT_JOB_TIMEOUT_SECS,
            notify: NotifyChannel::Console,
            notification_endpoint: DEFAULT_NOTIFICATION_ENDPOINT.to_string(),
            format: ReportFormat::Text,
            export: None,
        }
    }
}

impl RefreshArgs {
    /// Get the poll interval as a Duration.
    pub fn poll_interval_duration(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    /// Get the job timeout as a Duration.
    pub fn job_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.job_timeout)
    }
}

/// Arguments of the `list` subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct ListArgs {
    /// Only list connections of these edge connection ids (overrides the governed file)
    #[arg(long = "edge", value_name = "ID", value_delimiter = ',')]
    pub edges: Vec<String>,

    /// Ignore the governed file and list every connection known to the catalog
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Refresh governed connections, wait for the jobs and notify owners of failures
    Refresh(RefreshArgs),
    /// List database connections registered in the catalog
    List(ListArgs),
    /// Verify that the OAuth credentials work
    Check,
}

/// Configuration for the catalog refresh guard.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "catalog-refresh-guard",
    about = "Refreshes governed catalog connections and notifies database owners of failures",
    version,
    author
)]
pub struct Config {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// `refresh` options, used when no subcommand is given
    #[command(flatten)]
    pub refresh: RefreshArgs,

    /// Base URL of the catalog instance (e.g. https://acme.catalog.example.com)
    #[arg(long, global = true, env = "CATALOG_BASE_URL")]
    pub base_url: Option<String>,

    /// OAuth client id
    #[arg(long, global = true, env = "CATALOG_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret
    #[arg(long, global = true, env = "CATALOG_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Per-request timeout in seconds
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS,
        env = "CATALOG_REQUEST_TIMEOUT"
    )]
    pub request_timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "CATALOG_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Retries for 429/5xx responses and transport failures
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_MAX_RETRIES,
        env = "CATALOG_MAX_RETRIES"
    )]
    pub max_retries: u32,

    /// Base backoff in milliseconds, doubled after every retry
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_RETRY_BACKOFF_MS,
        env = "CATALOG_RETRY_BACKOFF_MS"
    )]
    pub retry_backoff_ms: u64,

    /// YAML file listing the governed edge connections
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_GOVERNED_CONFIG,
        env = "CATALOG_GOVERNED_CONNECTIONS_CONFIG"
    )]
    pub governed_config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info", env = "CATALOG_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, global = true, env = "CATALOG_JSON_LOGS")]
    pub json_logs: bool,

    /// Also write logs (without colours) to this file
    #[arg(long, global = true, value_name = "PATH", env = "CATALOG_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

/// Validated settings for building a catalog client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: Url,
    pub client_id: String,
    /// Sensitive - never log
    pub client_secret: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
}

/// Retry behaviour of the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    /// Upper bound for a single wait, including server-provided Retry-After
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (0-based): base * 2^attempt, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            command: None,
            refresh: RefreshArgs::default(),
            base_url: None,
            client_id: None,
            client_secret: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            governed_config: PathBuf::from(DEFAULT_GOVERNED_CONFIG),
            log_level: "info".to_string(),
            json_logs: false,
            log_file: None,
        }
    }

    /// The subcommand to run; `refresh` with the top-level refresh options when none was given.
    pub fn selected_command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Refresh(self.refresh.clone()))
    }

    /// Get the request timeout as a Duration.
    pub fn request_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_backoff: Duration::from_millis(self.retry_backoff_ms),
            ..RetryPolicy::default()
        }
    }

    /// Validate the connection settings needed to talk to the catalog.
    pub fn client_settings(&self) -> GovernanceResult<ClientSettings> {
        let base_url = required(
            &self.base_url,
            "Catalog base URL is required. Set CATALOG_BASE_URL or pass --base-url.",
        )?;
        let client_id = required(
            &self.client_id,
            "OAuth client ID is required. Set CATALOG_CLIENT_ID or pass --client-id.",
        )?;
        let client_secret = required(
            &self.client_secret,
            "OAuth client secret is required. Set CATALOG_CLIENT_SECRET or pass --client-secret.",
        )?;

        let base_url = Url::parse(base_url.trim_end_matches('/'))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(GovernanceError::configuration(format!(
                "Catalog base URL must use http or https, got '{}'",
                base_url.scheme()
            )));
        }

        Ok(ClientSettings {
            base_url,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            request_timeout: self.request_timeout_duration(),
            connect_timeout: self.connect_timeout_duration(),
            retry: self.retry_policy(),
        })
    }
}

fn required<'a>(value: &'a Option<String>, message: &str) -> GovernanceResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GovernanceError::configuration(message))
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
