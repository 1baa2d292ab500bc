// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Router construction and cross-cutting middleware.
//!
//! Layers, outermost first:
//! 1. Security response headers
//! 2. Request tracing
//! 3. Panic capture (a panicking handler yields a 500, the process survives)
//! 4. CORS for the configured origin
//! 5. General rate limit (every route, including 404s)
//! 6. Body size limit
//!
//! `POST /api/contact` additionally runs the contact rate limit before its
//! body is read.

use crate::config::{ConfigError, Environment};
use crate::error::AppError;
use crate::handlers::{self, AppState};
use crate::limiter::{RateLimitResult, Scope};
use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

const SECURITY_HEADERS: &[(&str, &str)] = &[
    (
        "content-security-policy",
        "default-src 'self'; style-src 'self' 'unsafe-inline'",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "same-origin"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

static RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
static RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
static RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

/// Creates the router with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Result<Router, ConfigError> {
    let config = &state.config;

    let origin: HeaderValue = config
        .cors_origin
        .parse()
        .map_err(|_| ConfigError::InvalidCorsOrigin(config.cors_origin.clone()))?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin]))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let environment = config.environment;

    let contact = post(handlers::submit_contact)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            contact_rate_limit,
        ))
        .fallback(handlers::not_found);

    let mut router = Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/contact", contact);

    if config.metrics.enabled {
        router = router.route(&config.metrics.path, get(handlers::metrics));
    }

    let router = router
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(config.body_limit_bytes))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            general_rate_limit,
        ))
        .layer(cors)
        .layer(CatchPanicLayer::custom(
            move |panic: Box<dyn Any + Send + 'static>| panic_response(panic, environment),
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(security_headers))
        .with_state(state);

    Ok(router)
}

async fn general_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    enforce_scope(Scope::General, &state, req, next).await
}

async fn contact_rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    enforce_scope(Scope::Contact, &state, req, next).await
}

async fn enforce_scope(scope: Scope, state: &AppState, req: Request, next: Next) -> Response {
    let ip = client_ip(&req, state.config.trust_proxy);

    match state.limiter.check(scope, ip).await {
        RateLimitResult::Allowed {
            limit,
            remaining,
            reset_in,
        } => {
            let mut response = next.run(req).await;
            set_rate_headers(response.headers_mut(), limit, remaining, reset_in);
            response
        }
        RateLimitResult::Limited {
            scope,
            limit,
            retry_after,
        } => {
            state.metrics.record_rate_limited(scope);
            let window = state.limiter.limit_for(scope).window;
            let mut response = AppError::RateLimited {
                scope,
                window,
                retry_after,
            }
            .into_api_response(state.config.environment);
            set_rate_headers(response.headers_mut(), limit, 0, retry_after);
            response
        }
    }
}

/// Standard rate limit headers. Values already set by an inner scope win.
fn set_rate_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset_in: Duration) {
    let reset = reset_in.as_secs() + u64::from(reset_in.subsec_nanos() > 0);
    for (name, value) in [
        (&RATELIMIT_LIMIT, u64::from(limit)),
        (&RATELIMIT_REMAINING, u64::from(remaining)),
        (&RATELIMIT_RESET, reset),
    ] {
        headers
            .entry(name.clone())
            .or_insert_with(|| HeaderValue::from(value));
    }
}

/// Resolve the client address used as the rate limiting key.
pub fn client_ip(req: &Request, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

async fn security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for &(name, value) in SECURITY_HEADERS {
        headers
            .entry(HeaderName::from_static(name))
            .or_insert_with(|| HeaderValue::from_static(value));
    }
    response
}

fn panic_response(panic: Box<dyn Any + Send + 'static>, environment: Environment) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Unexpected(detail).into_api_response(environment)
}
