//! Owner notification channels.
//!
//! [`Notifier`] is the one-method interface every channel implements. The three built-in
//! channels are gathered in [`NotificationChannel`]; any other type implementing
//! [`Notifier`] can be handed to the workflow instead.

pub mod console;
pub mod email;
pub mod message;
pub mod platform;

pub use console::ConsoleNotifier;
pub use email::EmailNotifier;
pub use message::{FailureNotice, compose_message};
pub use platform::PlatformNotifier;

use crate::client::CatalogApi;
use crate::config::NotifyChannel;
use crate::error::GovernanceResult;
use crate::models::Owner;
use std::future::Future;

/// Delivers a failure notice to one owner.
pub trait Notifier: Send + Sync {
    /// Channel name used in logs and the report.
    fn channel(&self) -> &'static str;

    /// Notify `owner` that the connection in `notice` failed.
    fn notify(
        &self,
        notice: &FailureNotice<'_>,
        owner: &Owner,
    ) -> impl Future<Output = GovernanceResult<()>> + Send;
}

/// The built-in notification channels.
#[derive(Debug)]
pub enum NotificationChannel<A> {
    Console(ConsoleNotifier),
    Platform(PlatformNotifier<A>),
    Email(EmailNotifier),
}

impl<A: CatalogApi> NotificationChannel<A> {
    /// Build the channel selected on the command line.
    pub fn from_kind(kind: NotifyChannel, api: A, endpoint: impl Into<String>) -> Self {
        match kind {
            NotifyChannel::Console => Self::Console(ConsoleNotifier::stderr()),
            NotifyChannel::Platform => Self::Platform(PlatformNotifier::new(api, endpoint)),
            NotifyChannel::Email => Self::Email(EmailNotifier::new()),
        }
    }
}

impl<A: CatalogApi> Notifier for NotificationChannel<A> {
    fn channel(&self) -> &'static str {
        match self {
            Self::Console(n) => n.channel(),
            Self::Platform(n) => n.channel(),
            Self::Email(n) => n.channel(),
        }
    }

    async fn notify(&self, notice: &FailureNotice<'_>, owner: &Owner) -> GovernanceResult<()> {
        match self {
            Self::Console(n) => n.notify(notice, owner).await,
            Self::Platform(n) => n.notify(notice, owner).await,
            Self::Email(n) => n.notify(notice, owner).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CatalogClient;
    use crate::config::{ClientSettings, RetryPolicy};
    use std::time::Duration;
    use url::Url;

    fn client() -> CatalogClient {
        CatalogClient::new(&ClientSettings {
            base_url: Url::parse("https://catalog.example.com").unwrap(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            retry: RetryPolicy::none(),
        })
        .unwrap()
    }

    #[test]
    fn test_console_channel_writes_to_stderr() {
        let channel = NotificationChannel::from_kind(NotifyChannel::Console, client(), "/rest/2.0/tasks");
        assert_eq!(channel.channel(), "console");
        match channel {
            NotificationChannel::Console(console) => assert_eq!(console.target(), "stderr"),
            _ => panic!("expected the console channel"),
        }
    }

    #[test]
    fn test_platform_channel_uses_endpoint() {
        let channel = NotificationChannel::from_kind(NotifyChannel::Platform, client(), "/rest/custom/tasks");
        match channel {
            NotificationChannel::Platform(platform) => {
                assert_eq!(platform.endpoint(), "/rest/custom/tasks")
            }
            _ => panic!("expected the platform channel"),
        }
    }
}
