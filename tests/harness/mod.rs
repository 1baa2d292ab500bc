// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for driving the contact relay router in-process.
//!
//! Requests carry an `X-Forwarded-For` header so each test can act as any
//! number of distinct clients.

#![allow(dead_code)]

pub mod logs;
pub mod notifiers;

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use contact_relay::{
    config::{Config, Environment},
    create_router,
    limiter::RateLimiter,
    metrics::Metrics,
    AppState, ContactValidator, Notifier,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Response parts collected for assertions.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// An application instance with its shared state.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_config(test_config(), notifier)
    }

    pub fn with_config(config: Config, notifier: Arc<dyn Notifier>) -> Self {
        let state = Arc::new(AppState {
            limiter: RateLimiter::new(&config.rate_limit),
            validator: ContactValidator::new(),
            notifier,
            metrics: Metrics::new().expect("metrics registry"),
            config,
        });
        let router = create_router(state.clone()).expect("router builds");
        Self { router, state }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, ip: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_contact(&self, ip: &str, body: &Value) -> TestResponse {
        self.post_raw(ip, "application/json", body.to_string()).await
    }

    pub async fn post_raw(&self, ip: &str, content_type: &str, body: String) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/contact")
            .header("x-forwarded-for", ip)
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}

/// Non-production configuration that trusts `X-Forwarded-For`.
pub fn test_config() -> Config {
    Config {
        environment: Environment::Test,
        trust_proxy: true,
        ..Default::default()
    }
}

/// The reference Latvian submission.
pub fn valid_submission() -> Value {
    json!({
        "name": "Jānis Bērziņš",
        "email": "janis@example.com",
        "phone": "+371 20123456",
        "message": "Lūdzu, sazinieties ar mani par jūsu pakalpojumiem."
    })
}
