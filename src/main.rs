//! Catalog Refresh Guard - Main entry point.
//!
//! Exits non-zero when configuration or authentication fails; connection failures are
//! part of the report and do not change the exit code.

use catalog_refresh_guard::config::{Command, Config, ListArgs, RefreshArgs, ReportFormat};
use catalog_refresh_guard::notify::NotificationChannel;
use catalog_refresh_guard::refresh::PollSettings;
use catalog_refresh_guard::workflow::{list_connections, listing_scope, render_connections};
use catalog_refresh_guard::{
    CatalogClient, GovernanceError, GovernanceResult, GovernanceRun, GovernedScope,
};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr so stdout carries only the report.
fn init_tracing(config: &Config) -> GovernanceResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    GovernanceError::configuration_at(format!("Cannot open log file: {e}"), path)
                })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(file_layer);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_ansi(std::io::stderr().is_terminal())
                    .with_writer(std::io::stderr),
            )
            .init();
    }
    Ok(())
}

async fn run_refresh(config: &Config, args: &RefreshArgs) -> GovernanceResult<()> {
    let settings = config.client_settings()?;
    let scope = GovernedScope::load(&config.governed_config)?.require_non_empty()?;
    let poll = PollSettings::from_args(args)?;

    let client = CatalogClient::new(&settings)?;
    // Fail fast on bad credentials before touching any connection
    client.authenticator().get_token(false).await?;

    let notifier =
        NotificationChannel::from_kind(args.notify, client.clone(), &args.notification_endpoint);
    let report = GovernanceRun::new(&client, &notifier, poll)
        .run(&scope)
        .await?;

    match args.format {
        ReportFormat::Text => print!("{}", report.render_text()),
        ReportFormat::Json => println!("{}", report.to_json()?),
    }

    if let Some(path) = &args.export {
        std::fs::write(path, report.to_json()?).map_err(|e| {
            GovernanceError::configuration_at(format!("Cannot write report export: {e}"), path)
        })?;
        info!(path = %path.display(), "Report exported");
    }
    Ok(())
}

async fn run_list(config: &Config, args: &ListArgs) -> GovernanceResult<()> {
    let settings = config.client_settings()?;
    let scope = listing_scope(&args.edges, args.all, || {
        GovernedScope::load(&config.governed_config)
    })?;

    let client = CatalogClient::new(&settings)?;
    let connections = list_connections(&client, &scope).await?;
    print!("{}", render_connections(&connections));
    Ok(())
}

async fn run_check(config: &Config) -> GovernanceResult<()> {
    let settings = config.client_settings()?;
    let client = CatalogClient::new(&settings)?;

    client.authenticator().get_token(true).await?;
    let user = client.current_user().await?;
    let name = ["username", "fullName", "id"]
        .iter()
        .find_map(|field| user.get(*field).and_then(|v| v.as_str()))
        .unwrap_or("unknown user");

    println!("Authenticated against {} as {name}", settings.base_url);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    // Parse configuration from command line and environment
    let config = Config::parse_args();

    if let Err(e) = init_tracing(&config) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting catalog refresh guard");

    let result = match config.selected_command() {
        Command::Refresh(args) => run_refresh(&config, &args).await,
        Command::List(args) => run_list(&config, &args).await,
        Command::Check => run_check(&config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run aborted");
            eprintln!("Error: {e}");
            if let Some(hint) = e.suggestion() {
                eprintln!("Hint: {hint}");
            }
            ExitCode::FAILURE
        }
    }
}
