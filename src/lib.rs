//! Catalog Refresh Guard Library
//!
//! Refreshes a governed set of catalog edge connections, waits for the refresh jobs,
//! and notifies the owners of the databases behind every connection that fails.

pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod governed;
pub mod models;
pub mod notify;
pub mod owners;
pub mod refresh;
pub mod report;
pub mod workflow;

pub use client::{CatalogApi, CatalogClient};
pub use config::Config;
pub use error::{GovernanceError, GovernanceResult};
pub use governed::GovernedScope;
pub use report::SummaryReport;
pub use workflow::GovernanceRun;
