//! OAuth 2.0 client-credentials authentication against the catalog.
//!
//! One [`Authenticator`] is created per run and shared (via `Arc`) by every request.
//! The access token is cached behind a `tokio::sync::RwLock` and re-acquired when it
//! is within [`EXPIRY_BUFFER_SECS`] of expiring, or after [`Authenticator::invalidate`].
//!
//! Rate-limited, 5xx and transport failures of the token request are retried with the
//! same [`RetryPolicy`] as API calls. Only a rejection of the credentials themselves is an
//! authentication error; a token endpoint that stays unavailable surfaces as an API error.

use crate::config::RetryPolicy;
use crate::error::{GovernanceError, GovernanceResult, is_retryable_status};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Response, StatusCode, header};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

pub const TOKEN_PATH: &str = "/rest/oauth/v2/token";

/// Tokens are treated as expired this many seconds before their real expiry.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// A cached access token.
#[derive(Clone)]
pub struct TokenInfo {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub issued_at: DateTime<Utc>,
}

impl TokenInfo {
    pub fn new(access_token: impl Into<String>, expires_in: u64, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: "Bearer".to_string(),
            expires_in,
            issued_at,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + ChronoDuration::seconds(self.expires_in.min(u64::from(u32::MAX)) as i64)
    }

    /// Check if the token should be renewed, applying the expiry buffer.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_BUFFER_SECS) >= self.expires_at()
    }

    /// Check if the server would still accept the token (no buffer).
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

impl std::fmt::Debug for TokenInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenInfo")
            .field("access_token", &mask_token(&self.access_token))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Acquires and caches access tokens for the catalog API.
pub struct Authenticator {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
    retry: RetryPolicy,
    token: RwLock<Option<TokenInfo>>,
}

impl Authenticator {
    pub fn new(
        http: reqwest::Client,
        base_url: &Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> GovernanceResult<Self> {
        let token_url = endpoint_url(base_url, TOKEN_PATH)?;
        Ok(Self {
            http,
            token_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            retry: RetryPolicy::default(),
            token: RwLock::new(None),
        })
    }

    /// Retry policy for the token request.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get a valid access token, requesting a new one when needed.
    pub async fn get_token(&self, force_refresh: bool) -> GovernanceResult<String> {
        if !force_refresh {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.access_token.clone());
            }
        }

        let mut cached = self.token.write().await;
        // Another task may have refreshed while we waited for the write lock
        if !force_refresh {
            if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.access_token.clone());
            }
        }

        match self.request_token().await {
            Ok(token) => {
                let access_token = token.access_token.clone();
                *cached = Some(token);
                Ok(access_token)
            }
            Err(e)
                if e.status_code() == Some(429)
                    && cached.as_ref().is_some_and(|t| t.is_live_at(Utc::now())) =>
            {
                warn!("Token endpoint rate limited, reusing cached token");
                Ok(cached
                    .as_ref()
                    .map(|t| t.access_token.clone())
                    .unwrap_or_default())
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        let mut cached = self.token.write().await;
        if cached.take().is_some() {
            debug!("Cached access token invalidated");
        }
    }

    /// Snapshot of the cached token, if any.
    pub async fn token_info(&self) -> Option<TokenInfo> {
        self.token.read().await.clone()
    }

    async fn request_token(&self) -> GovernanceResult<TokenInfo> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let mut attempt: u32 = 0;

        loop {
            debug!(url = %self.token_url, client_id = %self.client_id, attempt, "Requesting access token");

            let response = match self
                .http
                .post(self.token_url.clone())
                .form(&form)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) if attempt < self.retry.max_retries => {
                    let wait = self.retry.backoff(attempt);
                    warn!(error = %e, wait_ms = wait.as_millis() as u64, "Token request failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(wait).await;
                    continue;
                }
                Err(e) => {
                    return Err(GovernanceError::api(
                        format!("Token request failed: {e}"),
                        None,
                        None,
                    ));
                }
            };

            let status = response.status();
            if is_retryable_status(status.as_u16()) && attempt < self.retry.max_retries {
                let wait = retry_after(&response)
                    .map(|d| d.min(self.retry.max_backoff))
                    .unwrap_or_else(|| self.retry.backoff(attempt));
                warn!(
                    status = status.as_u16(),
                    wait_ms = wait.as_millis() as u64,
                    "Token endpoint unavailable, backing off"
                );
                attempt += 1;
                tokio::time::sleep(wait).await;
                continue;
            }

            let text = response.text().await.map_err(|e| {
                GovernanceError::api(
                    format!("Token response unreadable: {e}"),
                    Some(status.as_u16()),
                    None,
                )
            })?;

            if !status.is_success() {
                let detail = error_detail(&text).unwrap_or_else(|| status_reason(status));
                let message = format!("Token endpoint returned {}: {detail}", status.as_u16());
                return Err(if rejects_credentials(status) {
                    GovernanceError::authentication(message, Some(status.as_u16()))
                } else {
                    GovernanceError::api(message, Some(status.as_u16()), (!text.is_empty()).then_some(text))
                });
            }

            return parse_token(&text, status);
        }
    }
}

/// Client errors other than rate limiting mean the credentials or the token endpoint are wrong.
fn rejects_credentials(status: StatusCode) -> bool {
    status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS
}

fn parse_token(text: &str, status: StatusCode) -> GovernanceResult<TokenInfo> {
    let body: TokenResponse = serde_json::from_str(text).map_err(|e| {
        GovernanceError::authentication(format!("Invalid token response: {e}"), Some(status.as_u16()))
    })?;
    let access_token = body
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GovernanceError::authentication("Token response has no access_token", Some(status.as_u16())))?;

    let mut token = TokenInfo::new(
        access_token,
        body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
        Utc::now(),
    );
    if let Some(token_type) = body.token_type.filter(|t| !t.is_empty()) {
        token.token_type = token_type;
    }

    info!(
        token = %mask_token(&token.access_token),
        expires_in = token.expires_in,
        "Obtained access token"
    );
    Ok(token)
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &mask_token(&self.client_secret))
            .finish_non_exhaustive()
    }
}

/// Join an absolute API path onto the base URL, keeping any base path prefix.
pub(crate) fn endpoint_url(base_url: &Url, path: &str) -> GovernanceResult<Url> {
    let base = base_url.as_str().trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

/// Pull a readable message out of an error body (`message`, then `error`).
pub(crate) fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let field = |name: &str| match value.get(name) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(serde_json::Value::Object(obj)) => obj
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(String::from),
        _ => None,
    };
    field("message")
        .or_else(|| field("error_description"))
        .or_else(|| field("error"))
}

/// Server-requested wait from a `Retry-After` header given in seconds.
pub(crate) fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

pub(crate) fn status_reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("unexpected status")
        .to_string()
}

/// Keep the first three characters of a secret for log correlation.
pub fn mask_token(token: &str) -> String {
    match token.char_indices().nth(3) {
        Some((idx, _)) => format!("{}***", &token[..idx]),
        None => "***".to_string(),
    }
}
