// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Relay
//!
//! Accepts contact form submissions over HTTP and forwards them to a
//! Telegram chat:
//!
//! - Per-IP fixed-window rate limiting (5 submissions / 100 requests per 15 minutes)
//! - Field validation with bilingual (Latvian / English) error messages
//! - Email normalization
//! - Single-attempt delivery through the Telegram Bot API
//! - CORS, security headers and body size limits on every route

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod notifier;
pub mod server;
pub mod validator;

pub use config::Config;
pub use error::AppError;
pub use handlers::AppState;
pub use limiter::{RateLimitResult, RateLimiter, Scope};
pub use notifier::{format_contact_message, Notifier, NotifyError, TelegramNotifier};
pub use server::create_router;
pub use validator::{ContactSubmission, ContactValidator, ValidationResult};
