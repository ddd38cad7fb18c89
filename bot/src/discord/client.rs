//! Discord REST client.

use crate::discord::response;
use crate::types::Message;
use crate::views;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tally_core::backup::{Archive, ArchiveError, BackupReport};
use thiserror::Error;

/// Public API base URL.
pub const API_BASE: &str = "https://discord.com/api/v10";

/// Errors from the REST API.
#[derive(Error, Debug)]
pub enum DiscordError {
    /// The request never got a response.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Discord answered 429.
    #[error("Rate limited")]
    RateLimited,

    /// Discord answered with an error status.
    #[error("API error ({status}): {message}")]
    ApiError {
        /// HTTP status
        status: u16,
        /// Response body
        message: String,
    },

    /// The response body did not decode.
    #[error("Failed to parse response: {0}")]
    ResponseParseFailed(String),
}

impl From<DiscordError> for ArchiveError {
    fn from(error: DiscordError) -> Self {
        match error {
            DiscordError::RequestFailed(reason) | DiscordError::ResponseParseFailed(reason) => {
                Self::Unreachable(reason)
            },
            DiscordError::RateLimited => Self::Rejected {
                status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
                body: String::new(),
            },
            DiscordError::ApiError { status, message } => Self::Rejected { status, body: message },
        }
    }
}

/// A guild role.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GuildRole {
    /// Snowflake id
    pub id: String,
    /// Display name
    pub name: String,
}

/// Authenticated REST client.
#[derive(Clone)]
pub struct DiscordClient {
    client: Client,
    token: String,
    api_url: String,
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient").field("api_url", &self.api_url).finish_non_exhaustive()
    }
}

impl DiscordClient {
    /// Create a client for the public API, each request bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscordError::RequestFailed`] when the HTTP client cannot be built.
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self, DiscordError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiscordError::RequestFailed(e.to_string()))?;
        Ok(Self {
            client,
            token: token.into(),
            api_url: API_BASE.to_string(),
        })
    }

    /// Point the client at another base URL.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Overwrite the application's global commands.
    ///
    /// # Errors
    ///
    /// Returns [`DiscordError`] when the request fails or is refused.
    pub async fn register_commands(&self, application_id: &str) -> Result<(), DiscordError> {
        let url = format!("{}/applications/{application_id}/commands", self.api_url);
        let response = self.send(self.client.put(url).json(&response::commands())).await?;
        check(response).await.map(drop)
    }

    /// Every role of a guild.
    ///
    /// # Errors
    ///
    /// Returns [`DiscordError`] when the request fails, is refused, or the
    /// body is not a role list.
    pub async fn guild_roles(&self, guild_id: &str) -> Result<Vec<GuildRole>, DiscordError> {
        let url = format!("{}/guilds/{guild_id}/roles", self.api_url);
        let response = check(self.send(self.client.get(url)).await?).await?;
        response
            .json::<Vec<GuildRole>>()
            .await
            .map_err(|e| DiscordError::ResponseParseFailed(e.to_string()))
    }

    /// Post a message to a channel.
    ///
    /// # Errors
    ///
    /// Returns [`DiscordError`] when the request fails or is refused.
    pub async fn create_message(&self, channel_id: &str, body: &Value) -> Result<(), DiscordError> {
        let url = format!("{}/channels/{channel_id}/messages", self.api_url);
        let response = self.send(self.client.post(url).json(body)).await?;
        check(response).await.map(drop)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, DiscordError> {
        request
            .header("authorization", format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| DiscordError::RequestFailed(e.to_string()))
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, DiscordError> {
    let status = response.status();
    metrics::counter!("discord.requests.total", "status" => status.as_u16().to_string()).increment(1);
    match status {
        status if status.is_success() => Ok(response),
        StatusCode::TOO_MANY_REQUESTS => Err(DiscordError::RateLimited),
        status => {
            let message = response.text().await.unwrap_or_default();
            Err(DiscordError::ApiError {
                status: status.as_u16(),
                message,
            })
        },
    }
}

/// Archive that posts backup reports into a channel, one message per embed.
#[derive(Clone, Debug)]
pub struct BackupChannel {
    client: DiscordClient,
    channel_id: String,
}

impl BackupChannel {
    /// Archive into `channel_id`.
    #[must_use]
    pub fn new(client: DiscordClient, channel_id: impl Into<String>) -> Self {
        Self {
            client,
            channel_id: channel_id.into(),
        }
    }
}

impl Archive for BackupChannel {
    fn deliver<'a>(
        &'a self,
        report: &'a BackupReport,
    ) -> Pin<Box<dyn Future<Output = Result<(), ArchiveError>> + Send + 'a>> {
        Box::pin(async move {
            let embeds = views::backup_embeds(report);
            let parts = embeds.len();
            for embed in embeds {
                let body = response::message_data(&Message::embed(embed), false);
                self.client.create_message(&self.channel_id, &body).await?;
            }
            tracing::info!(channel = %self.channel_id, rows = report.len(), parts, "Backup posted");
            Ok(())
        })
    }
}
