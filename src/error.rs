// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error types for the contact relay
//!
//! Every per-request failure is rendered by [`AppError::into_api_response`],
//! which decides the status, the bilingual client text and whether internal
//! detail may be shown.

use crate::config::Environment;
use crate::limiter::Scope;
use crate::notifier::NotifyError;
use crate::validator::FieldError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

pub const VALIDATION_FAILED: &str = "Validācija neizdevās / Validation failed";
pub const SEND_FAILED: &str =
    "Kļūda nosūtot ziņu. Lūdzu, mēģiniet vēlreiz. / Error sending message. Please try again.";
pub const CONTACT_RATE_LIMITED: &str =
    "Pārāk daudz pieprasījumu. Lūdzu, mēģiniet vēlāk. / Too many requests. Please try again later.";
pub const GENERAL_RATE_LIMITED: &str = "Pārāk daudz pieprasījumu no šīs IP adreses. Lūdzu, mēģiniet vēlāk. / Too many requests from this IP, please try again later.";
pub const INTERNAL_ERROR: &str = "Iekšēja servera kļūda / Internal server error";
pub const NOT_FOUND: &str = "Maršruts nav atrasts / Route not found";
pub const INVALID_BODY: &str = "Nederīgs pieprasījuma saturs / Invalid request body";

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed: {} field error(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("Rate limit exceeded for {scope} scope")]
    RateLimited {
        scope: Scope,
        window: Duration,
        retry_after: Duration,
    },

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("Invalid request body: {detail}")]
    Body { status: StatusCode, detail: String },

    #[error("Route not found: {0}")]
    NotFound(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// JSON body for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            errors: None,
            retry_after: None,
            details: None,
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Body { status, .. } => *status,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Notify(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render the error. Internal detail is attached only outside production.
    pub fn into_api_response(self, environment: Environment) -> Response {
        let status = self.status();
        let expose = !environment.is_production();

        let (body, retry_after) = match self {
            AppError::Validation(errors) => {
                info!(count = errors.len(), "Validation failed");
                (
                    ErrorBody {
                        errors: Some(errors),
                        ..ErrorBody::new(VALIDATION_FAILED)
                    },
                    None,
                )
            }
            AppError::RateLimited {
                scope,
                window,
                retry_after,
            } => {
                warn!(%scope, retry_after_secs = retry_after.as_secs(), "Request rate limited");
                let message = match scope {
                    Scope::Contact => CONTACT_RATE_LIMITED,
                    Scope::General => GENERAL_RATE_LIMITED,
                };
                (
                    ErrorBody {
                        retry_after: Some(describe_window(window)),
                        ..ErrorBody::new(message)
                    },
                    Some(retry_after),
                )
            }
            AppError::Notify(err) => {
                error!(error = %err, configuration = err.is_configuration(), "Contact delivery failed");
                (
                    ErrorBody {
                        details: expose.then(|| err.to_string()),
                        ..ErrorBody::new(SEND_FAILED)
                    },
                    None,
                )
            }
            AppError::Body { detail, .. } => {
                info!(%status, %detail, "Rejected request body");
                (
                    ErrorBody {
                        details: expose.then_some(detail),
                        ..ErrorBody::new(INVALID_BODY)
                    },
                    None,
                )
            }
            AppError::NotFound(path) => {
                warn!(%path, "Route not found");
                (ErrorBody::new(format!("{}: {}", NOT_FOUND, path)), None)
            }
            AppError::Unexpected(detail) => {
                error!(%detail, "Unexpected error while handling request");
                (
                    ErrorBody {
                        details: expose.then_some(detail),
                        ..ErrorBody::new(INTERNAL_ERROR)
                    },
                    None,
                )
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(retry_after) = retry_after {
            // Round up so clients never retry inside the window
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

// Without an environment at hand, render as production.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.into_api_response(Environment::Production)
    }
}

/// Human-readable window length, e.g. "15 minutes".
fn describe_window(window: Duration) -> String {
    let secs = window.as_secs();
    match secs {
        s if s >= 3600 && s % 3600 == 0 => plural(s / 3600, "hour"),
        s if s >= 60 && s % 60 == 0 => plural(s / 60, "minute"),
        s => plural(s, "second"),
    }
}

fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}
