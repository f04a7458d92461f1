//! HTTP layer for the catalog REST API.
//!
//! Every call goes through [`CatalogClient::request`], which attaches the bearer token,
//! retries rate-limited and 5xx responses with exponential backoff, and re-authenticates
//! once on a 401.

use super::auth::{Authenticator, endpoint_url, error_detail, retry_after, status_reason};
use crate::config::{ClientSettings, RetryPolicy};
use crate::error::{GovernanceError, GovernanceResult, is_retryable_status};
use reqwest::{Method, StatusCode, header};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

pub const CURRENT_USER_PATH: &str = "/rest/2.0/users/current";

/// Authenticated JSON client for the catalog. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Arc<Authenticator>,
    retry: RetryPolicy,
}

impl CatalogClient {
    /// Build the HTTP client and authenticator from validated settings.
    pub fn new(settings: &ClientSettings) -> GovernanceResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| GovernanceError::configuration(format!("Cannot build HTTP client: {e}")))?;

        let auth = Authenticator::new(
            http.clone(),
            &settings.base_url,
            &settings.client_id,
            &settings.client_secret,
        )?
        .with_retry(settings.retry);

        Ok(Self::with_authenticator(
            http,
            settings.base_url.clone(),
            Arc::new(auth),
            settings.retry,
        ))
    }

    pub fn with_authenticator(
        http: reqwest::Client,
        base_url: Url,
        auth: Arc<Authenticator>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http,
            base_url,
            auth,
            retry,
        }
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.auth
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> GovernanceResult<JsonValue> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<&JsonValue>,
    ) -> GovernanceResult<JsonValue> {
        self.request(Method::POST, path, query, body).await
    }

    pub async fn put(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<&JsonValue>,
    ) -> GovernanceResult<JsonValue> {
        self.request(Method::PUT, path, query, body).await
    }

    pub async fn delete(&self, path: &str, query: &[(&str, String)]) -> GovernanceResult<JsonValue> {
        self.request(Method::DELETE, path, query, None).await
    }

    /// Fetch the user the OAuth client acts as. Used as a connectivity check.
    pub async fn current_user(&self) -> GovernanceResult<JsonValue> {
        self.get(CURRENT_USER_PATH, &[]).await
    }

    /// Send an authenticated request and parse the JSON response.
    ///
    /// Non-2xx responses become [`GovernanceError::Api`]; a 401 that persists after
    /// re-authentication becomes [`GovernanceError::Authentication`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&JsonValue>,
    ) -> GovernanceResult<JsonValue> {
        let url = endpoint_url(&self.base_url, path)?;
        let mut attempt: u32 = 0;
        let mut reauthenticated = false;

        loop {
            let token = self.auth.get_token(false).await?;

            let mut builder = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&token)
                .header(header::ACCEPT, "application/json");
            if !query.is_empty() {
                builder = builder.query(query);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            debug!(method = %method, path, attempt, "Sending catalog request");

            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) if attempt < self.retry.max_retries => {
                    let wait = self.retry.backoff(attempt);
                    warn!(
                        method = %method,
                        path,
                        error = %e,
                        wait_ms = wait.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(wait).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                if reauthenticated {
                    return Err(GovernanceError::authentication(
                        format!("{method} {path} rejected with 401 after re-authentication"),
                        Some(401),
                    ));
                }
                warn!(method = %method, path, "Received 401, re-acquiring access token");
                self.auth.invalidate().await;
                reauthenticated = true;
                continue;
            }

            if is_retryable_status(status.as_u16()) && attempt < self.retry.max_retries {
                let wait = retry_after(&response)
                    .map(|d| d.min(self.retry.max_backoff))
                    .unwrap_or_else(|| self.retry.backoff(attempt));
                warn!(
                    method = %method,
                    path,
                    status = status.as_u16(),
                    wait_ms = wait.as_millis() as u64,
                    "Retryable response, backing off"
                );
                attempt += 1;
                tokio::time::sleep(wait).await;
                continue;
            }

            let text = response.text().await?;
            if !status.is_success() {
                let detail = error_detail(&text).unwrap_or_else(|| status_reason(status));
                return Err(GovernanceError::api(
                    format!("{method} {path} returned {}: {detail}", status.as_u16()),
                    Some(status.as_u16()),
                    (!text.is_empty()).then_some(text),
                ));
            }

            return parse_body(&text);
        }
    }
}

fn parse_body(text: &str) -> GovernanceResult<JsonValue> {
    if text.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(text).map_err(|e| {
        GovernanceError::api(
            format!("Invalid JSON in response: {e}"),
            None,
            Some(text.to_string()),
        )
    })
}
