//! Catalog REST API client.
//!
//! - `auth`: OAuth client-credentials token cache
//! - `http`: authenticated JSON requests with retries
//! - `api`: the [`CatalogApi`] trait and its HTTP implementation

pub mod api;
pub mod auth;
pub mod http;

pub use api::{CatalogApi, MAX_PAGE_SIZE};
pub use auth::{Authenticator, TokenInfo, mask_token};
pub use http::CatalogClient;
