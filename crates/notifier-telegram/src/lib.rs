//! Telegram Bot API sink for profit alerts.
//!
//! Delivery is fire-and-forget from the monitor's point of view: errors are
//! returned to the caller, which logs them and moves on.

use async_trait::async_trait;
use calendar_core::{AlertRequest, Notifier, TelegramConfig};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("telegram bot token or chat id is not configured")]
    NotConfigured,

    #[error("telegram rejected message (HTTP {status}): {description}")]
    Rejected { status: u16, description: String },

    #[error("telegram request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends Markdown messages to one chat through a bot.
pub struct TelegramNotifier {
    http: Client,
    api_url: String,
    bot_token: SecretString,
    chat_id: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_url", &self.api_url)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_url: calendar_core::config::DEFAULT_TELEGRAM_API_URL.to_string(),
            bot_token: SecretString::from(bot_token.into()),
            chat_id: chat_id.into(),
        }
    }

    /// Builds a notifier when both the bot token and chat id are present.
    ///
    /// # Errors
    /// Returns [`NotifyError::NotConfigured`] if either value is missing or blank.
    pub fn from_config(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let token = config.bot_token.as_deref().map(str::trim).unwrap_or_default();
        let chat = config.chat_id.as_deref().map(str::trim).unwrap_or_default();
        if token.is_empty() || chat.is_empty() {
            return Err(NotifyError::NotConfigured);
        }
        Ok(Self::new(token, chat).with_api_url(&config.api_url))
    }

    /// Sets a custom API URL (useful for testing).
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sends a Markdown message.
    ///
    /// # Errors
    /// Returns an error on transport failure or when the API answers `ok: false`.
    pub async fn send_markdown(&self, text: &str) -> Result<(), NotifyError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_url,
            self.bot_token.expose_secret()
        );
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();
        let parsed = response
            .json::<ApiResponse>()
            .await
            .map_err(reqwest::Error::without_url);

        match parsed {
            Ok(api) if status.is_success() && api.ok => {
                debug!(chat_id = %self.chat_id, "Telegram message delivered");
                Ok(())
            }
            Ok(api) => Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: api.description.unwrap_or_default(),
            }),
            Err(_) if !status.is_success() => Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: String::new(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, alert: &AlertRequest) -> anyhow::Result<()> {
        self.send_markdown(&alert.to_markdown()).await?;
        Ok(())
    }
}

/// Fallback sink when no chat transport is configured: the alert only reaches the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &AlertRequest) -> anyhow::Result<()> {
        info!(
            ticker = %alert.ticker,
            leg = %alert.leg,
            pl_pct = %alert.pl_percent,
            target = %alert.target,
            "Profit alert (no notification transport configured)"
        );
        Ok(())
    }
}
