// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the contact relay service.
//!
//! The submission handler runs validation then delivery. Rate limiting has
//! already happened in middleware by the time it is called.

use crate::config::{Config, Environment};
use crate::error::AppError;
use crate::limiter::RateLimiter;
use crate::metrics::{Metrics, Outcome};
use crate::notifier::Notifier;
use crate::validator::{ContactValidator, RawSubmission, ValidationResult};
use axum::{
    async_trait,
    extract::{
        rejection::{FormRejection, JsonRejection},
        FromRequest, Request, State,
    },
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    Form, Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

pub const SERVICE_NAME: &str = "Contact Relay API";
pub const MESSAGE_SENT: &str = "Ziņa veiksmīgi nosūtīta! Mēs sazināsimies ar jums drīzākajā laikā. / Message sent successfully! We will contact you soon.";

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub limiter: RateLimiter,
    pub validator: ContactValidator,
    pub notifier: Arc<dyn Notifier>,
    pub metrics: Metrics,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: String,
    pub timestamp: String,
    pub environment: &'static str,
}

/// Service index response.
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: Endpoints,
}

/// Public routes listed by the index.
#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub health: &'static str,
    pub contact: &'static str,
}

/// Successful submission response.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Submission body, accepted as JSON or as a urlencoded form.
#[derive(Debug)]
pub struct ContactForm(pub RawSubmission);

#[async_trait]
impl FromRequest<Arc<AppState>> for ContactForm {
    type Rejection = Response;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let environment = state.config.environment;
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| {
                ct.split(';').next().unwrap_or(ct).trim().to_lowercase()
                    == "application/x-www-form-urlencoded"
            })
            .unwrap_or(false);

        if is_form {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|rejection| {
                    let status = match &rejection {
                        FormRejection::FailedToDeserializeForm(_)
                        | FormRejection::FailedToDeserializeFormBody(_) => StatusCode::BAD_REQUEST,
                        other => other.status(),
                    };
                    body_error(status, rejection.body_text(), environment)
                })?;

            let field = |name: &str| fields.get(name).cloned().map(Value::String);
            Ok(ContactForm(RawSubmission {
                name: field("name"),
                email: field("email"),
                phone: field("phone"),
                message: field("message"),
            }))
        } else {
            let Json(raw) = Json::<RawSubmission>::from_request(req, state)
                .await
                .map_err(|rejection| {
                    // A well-formed document of the wrong shape is still a bad request
                    let status = match &rejection {
                        JsonRejection::JsonDataError(_) => StatusCode::BAD_REQUEST,
                        other => other.status(),
                    };
                    body_error(status, rejection.body_text(), environment)
                })?;
            Ok(ContactForm(raw))
        }
    }
}

fn body_error(status: StatusCode, detail: String, environment: Environment) -> Response {
    AppError::Body { status, detail }.into_api_response(environment)
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: format!("{} is running", SERVICE_NAME),
        timestamp: Utc::now().to_rfc3339(),
        environment: state.config.environment.as_str(),
    })
}

/// Service description and endpoint map.
pub async fn index() -> Json<IndexResponse> {
    Json(IndexResponse {
        message: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        endpoints: Endpoints {
            health: "/health",
            contact: "/api/contact",
        },
    })
}

/// Handle a contact form submission.
pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    ContactForm(raw): ContactForm,
) -> Response {
    let environment = state.config.environment;

    let submission = match state.validator.validate(&raw) {
        ValidationResult::Valid(submission) => submission,
        ValidationResult::Invalid(errors) => {
            state.metrics.record_submission(Outcome::Invalid);
            return AppError::Validation(errors).into_api_response(environment);
        }
    };

    debug!(email = %submission.email, "Contact submission validated");

    match state.notifier.notify(&submission).await {
        Ok(()) => {
            state.metrics.record_submission(Outcome::Delivered);
            info!(email = %submission.email, "Contact submission delivered");
            (
                StatusCode::OK,
                Json(SuccessResponse {
                    success: true,
                    message: MESSAGE_SENT,
                }),
            )
                .into_response()
        }
        Err(err) => {
            state.metrics.record_submission(Outcome::Failed);
            AppError::from(err).into_api_response(environment)
        }
    }
}

/// Prometheus exposition endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to render metrics");
            AppError::Unexpected(err.to_string()).into_api_response(state.config.environment)
        }
    }
}

/// Fallback for unmatched routes.
pub async fn not_found(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    AppError::NotFound(uri.path().to_string()).into_api_response(state.config.environment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_index_lists_health_before_contact() {
        let Json(body) = index().await;
        let text = serde_json::to_string(&body).unwrap();

        assert_eq!(
            text,
            format!(
                r#"{{"message":"{}","version":"{}","endpoints":{{"health":"/health","contact":"/api/contact"}}}}"#,
                SERVICE_NAME,
                env!("CARGO_PKG_VERSION")
            )
        );
    }
}
