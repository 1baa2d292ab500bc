// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the contact relay.
//!
//! Values are read once at startup from the process environment (optionally
//! seeded from a `.env` file) and never re-read.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors detected before the server starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid CORS origin: {0}")]
    InvalidCorsOrigin(String),

    #[error("Invalid Telegram API URL: {0}")]
    InvalidTelegramUrl(String),

    #[error("Rate limit for {0} scope must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("Rate limit window must be greater than zero")]
    ZeroWindow,

    #[error("Metrics path must start with '/': {0}")]
    InvalidMetricsPath(String),
}

/// Deployment mode. Controls log verbosity and whether error detail is
/// returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Development,
    Test,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the contact relay service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind host (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port (default: 3001)
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub environment: Environment,

    /// The single origin allowed to call the API cross-origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    /// Maximum accepted request body (default: 10 MiB)
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Take the client IP from `X-Forwarded-For` instead of the socket peer
    #[serde(default)]
    pub trust_proxy: bool,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Telegram Bot API settings. Token and chat id stay optional here; the
/// notifier refuses to send while either is missing.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default)]
    pub chat_id: Option<String>,

    /// Bot API base URL (default: https://api.telegram.org)
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

// Keeps the bot token out of logs.
impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("chat_id", &self.chat_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Fixed-window limits for the two rate limiting scopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in seconds, shared by both scopes (default: 900)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Submissions per IP per window (default: 5)
    #[serde(default = "default_contact_max")]
    pub contact_max: u32,

    /// Requests per IP per window across all routes (default: 100)
    #[serde(default = "default_general_max")]
    pub general_max: u32,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn parse_value<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_window_secs() -> u64 {
    15 * 60
}

fn default_contact_max() -> u32 {
    5
}

fn default_general_max() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: Environment::default(),
            cors_origin: default_cors_origin(),
            body_limit_bytes: default_body_limit(),
            trust_proxy: false,
            telegram: TelegramConfig::default(),
            rate_limit: RateLimitConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_url: default_telegram_api_url(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            contact_max: default_contact_max(),
            general_max: default_general_max(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unset or unparsable
    /// values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: parse_value(non_empty("PORT")).unwrap_or(defaults.port),
            environment: non_empty("APP_ENV")
                .or_else(|| non_empty("NODE_ENV"))
                .map(|v| Environment::parse(&v))
                .unwrap_or_default(),
            cors_origin: non_empty("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            body_limit_bytes: parse_value(non_empty("BODY_LIMIT_BYTES"))
                .unwrap_or(defaults.body_limit_bytes),
            trust_proxy: non_empty("TRUST_PROXY")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            telegram: TelegramConfig {
                bot_token: non_empty("TELEGRAM_BOT_TOKEN"),
                chat_id: non_empty("TELEGRAM_CHAT_ID"),
                api_url: non_empty("TELEGRAM_API_URL").unwrap_or(defaults.telegram.api_url),
            },
            rate_limit: RateLimitConfig {
                window_secs: parse_value(non_empty("RATE_LIMIT_WINDOW_SECS"))
                    .unwrap_or(defaults.rate_limit.window_secs),
                contact_max: parse_value(non_empty("CONTACT_RATE_LIMIT_MAX"))
                    .unwrap_or(defaults.rate_limit.contact_max),
                general_max: parse_value(non_empty("GENERAL_RATE_LIMIT_MAX"))
                    .unwrap_or(defaults.rate_limit.general_max),
            },
            metrics: MetricsConfig {
                enabled: non_empty("METRICS_ENABLED")
                    .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no"))
                    .unwrap_or(defaults.metrics.enabled),
                path: non_empty("METRICS_PATH").unwrap_or(defaults.metrics.path),
            },
        }
    }

    /// Reject configurations the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = url::Url::parse(&self.cors_origin)
            .map_err(|_| ConfigError::InvalidCorsOrigin(self.cors_origin.clone()))?;
        if !matches!(origin.scheme(), "http" | "https") || origin.host_str().is_none() {
            return Err(ConfigError::InvalidCorsOrigin(self.cors_origin.clone()));
        }

        let api = url::Url::parse(&self.telegram.api_url)
            .map_err(|_| ConfigError::InvalidTelegramUrl(self.telegram.api_url.clone()))?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidTelegramUrl(self.telegram.api_url.clone()));
        }

        if self.metrics.enabled && !self.metrics.path.starts_with('/') {
            return Err(ConfigError::InvalidMetricsPath(self.metrics.path.clone()));
        }

        if self.rate_limit.window_secs == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.rate_limit.contact_max == 0 {
            return Err(ConfigError::ZeroLimit("contact"));
        }
        if self.rate_limit.general_max == 0 {
            return Err(ConfigError::ZeroLimit("general"));
        }

        Ok(())
    }

    /// Address string suitable for binding a listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
