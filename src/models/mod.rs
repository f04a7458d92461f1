//! Data models for the catalog refresh guard.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod job;
pub mod owner;

// Re-export commonly used types
pub use connection::{ConnectionIdError, DatabaseConnection, GovernedConnection, short_id};
pub use job::{JobStatus, RefreshJob, job_id_from_refresh_body};
pub use owner::{DatabaseAsset, Owner, UserRecord};
