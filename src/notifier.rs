// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Delivery of validated submissions to a Telegram chat.
//!
//! One message per submission, one attempt per message. There is no retry,
//! no queue and no timeout beyond the HTTP client default: a failure is
//! returned to the caller as a [`NotifyError`].

use crate::config::TelegramConfig;
use crate::validator::ContactSubmission;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Europe::Riga;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Delivery failures.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Telegram configuration missing: {0} not set")]
    Configuration(&'static str),

    #[error("Telegram send failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Telegram send failed: API returned {status}: {description}")]
    Rejected { status: u16, description: String },
}

impl NotifyError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, NotifyError::Configuration(_))
    }
}

/// Forwards a submission to its destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, submission: &ContactSubmission) -> Result<(), NotifyError>;
}

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";

/// Render a submission as a Telegram Markdown message.
///
/// Pure apart from `received_at`, which is shown in Riga local time.
pub fn format_contact_message(submission: &ContactSubmission, received_at: DateTime<Utc>) -> String {
    let received = received_at.with_timezone(&Riga).format("%d.%m.%Y, %H:%M:%S");

    format!(
        "🏗️ *Jauns kontakta pieprasījums!*\n\
         {RULE}\n\
         \n\
         👤 *Vārds:* {name}\n\
         📧 *E-pasts:* {email}\n\
         📱 *Telefons:* {phone}\n\
         \n\
         💬 *Ziņa:*\n\
         {message}\n\
         \n\
         {RULE}\n\
         ⏰ Saņemts: {received}",
        name = escape_markdown(&submission.name),
        email = escape_markdown(&submission.email),
        phone = escape_markdown(&submission.phone),
        message = escape_markdown(&submission.message),
    )
}

/// Escape the characters legacy Telegram Markdown treats as entity markers.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    #[serde(default)]
    username: Option<String>,
}

/// Upper bound on the startup `getMe` probe.
pub const CONNECTION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram Bot API client.
pub struct TelegramNotifier {
    api_url: String,
    bot_token: Option<String>,
    chat_id: Option<String>,
    check_timeout: Duration,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Create new Telegram notifier. Missing credentials are accepted here and
    /// reported on first use.
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            check_timeout: CONNECTION_CHECK_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    fn credentials(&self) -> Result<(&str, &str), NotifyError> {
        match (self.bot_token.as_deref(), self.chat_id.as_deref()) {
            (Some(token), Some(chat_id)) => Ok((token, chat_id)),
            (None, _) => Err(NotifyError::Configuration("TELEGRAM_BOT_TOKEN")),
            (_, None) => Err(NotifyError::Configuration("TELEGRAM_CHAT_ID")),
        }
    }

    fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, token, method)
    }

    /// Call `getMe` and return the bot's username. Gives up after the check
    /// timeout so an unresponsive API cannot stall startup.
    pub async fn check_connection(&self) -> Result<String, NotifyError> {
        let (token, _) = self.credentials()?;

        let response = self
            .client
            .get(self.method_url(token, "getMe"))
            .timeout(self.check_timeout)
            .send()
            .await
            .map_err(transport)?;

        let bot: BotUser = read_result(response).await?;
        Ok(bot.username.unwrap_or_default())
    }

    async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        let (token, chat_id) = self.credentials()?;

        let response = self
            .client
            .post(self.method_url(token, "sendMessage"))
            .json(&SendMessage {
                chat_id,
                text,
                parse_mode: "Markdown",
                disable_web_page_preview: true,
            })
            .send()
            .await
            .map_err(transport)?;

        read_result::<serde_json::Value>(response).await.map(|_| ())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, submission: &ContactSubmission) -> Result<(), NotifyError> {
        // Fail before formatting or touching the network
        self.credentials()?;

        let text = format_contact_message(submission, Utc::now());
        match self.send_text(&text).await {
            Ok(()) => {
                info!(email = %submission.email, "Contact form sent to Telegram");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Failed to send message to Telegram");
                Err(err)
            }
        }
    }
}

// Request URLs embed the bot token, so they are stripped from errors.
fn transport(err: reqwest::Error) -> NotifyError {
    NotifyError::Transport(err.without_url())
}

async fn read_result<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, NotifyError> {
    let status = response.status();
    let body = response.text().await.map_err(transport)?;

    let parsed: ApiResponse<T> = match serde_json::from_str(&body) {
        Ok(parsed) => parsed,
        Err(_) => {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: body.chars().take(200).collect(),
            })
        }
    };

    match parsed {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } if status.is_success() => Ok(result),
        ApiResponse { description, .. } => Err(NotifyError::Rejected {
            status: status.as_u16(),
            description: description.unwrap_or_else(|| "no description".to_string()),
        }),
    }
}
