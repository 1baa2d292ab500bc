// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact Relay Service
//!
//! Receives contact form submissions on `POST /api/contact`, validates them
//! and forwards each one to a Telegram chat.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables, optionally seeded from
//! a `.env` file in the working directory:
//!
//! - `PORT`: Listening port (default: 3001)
//! - `APP_ENV`: `production`, `development` or `test` (default: development)
//! - `CORS_ORIGIN`: Allowed origin (default: http://localhost:3000)
//! - `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`: Delivery destination
//! - `TRUST_PROXY`: Read client IPs from `X-Forwarded-For` (default: false)
//!
//! ## Failure policy
//!
//! A panic inside a request handler becomes a 500 for that request only.
//! The rate limit cleanup task or the listener failing is fatal: the error is
//! logged and the process exits non-zero for the supervisor to restart it.

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use contact_relay::{
    config::{Config, Environment},
    handlers::AppState,
    limiter::RateLimiter,
    metrics::Metrics,
    notifier::TelegramNotifier,
    server::create_router,
    validator::ContactValidator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    init_tracing(config.environment);
    install_panic_hook();

    config.validate().context("invalid configuration")?;
    info!(
        bind_addr = %config.bind_addr(),
        environment = %config.environment,
        cors_origin = %config.cors_origin,
        contact_max = config.rate_limit.contact_max,
        general_max = config.rate_limit.general_max,
        window_secs = config.rate_limit.window_secs,
        "Starting contact relay"
    );

    let notifier = TelegramNotifier::new(&config.telegram);
    match notifier.check_connection().await {
        Ok(username) => info!(bot = %username, "Telegram bot connected"),
        Err(err) if err.is_configuration() => {
            warn!(error = %err, "Telegram is not configured, submissions will fail")
        }
        Err(err) => warn!(error = %err, "Telegram bot connection failed"),
    }

    let state = Arc::new(AppState {
        limiter: RateLimiter::new(&config.rate_limit),
        validator: ContactValidator::new(),
        notifier: Arc::new(notifier),
        metrics: Metrics::new().context("failed to register metrics")?,
        config: config.clone(),
    });

    // Spawn cleanup task
    let cleanup_state = state.clone();
    let mut cleanup = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            cleanup_state.limiter.cleanup().await;
        }
    });

    let app = create_router(state)?;

    let addr: SocketAddr = config
        .bind_addr()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_addr()))?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");
    info!("Contact endpoint: http://{}/api/contact", addr);

    let server = async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    };

    tokio::select! {
        result = server => {
            result.context("server terminated")?;
            info!("Server stopped");
        }
        joined = &mut cleanup => {
            let reason = match joined {
                Ok(()) => "exited".to_string(),
                Err(err) => err.to_string(),
            };
            error!(%reason, "Rate limit cleanup task terminated");
            anyhow::bail!("rate limit cleanup task terminated: {}", reason);
        }
    }

    Ok(())
}

fn init_tracing(environment: Environment) {
    let default_level = if environment.is_production() {
        Level::INFO
    } else {
        Level::DEBUG
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(filter);
    if environment.is_production() {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_default();
        let backtrace = std::backtrace::Backtrace::capture();

        error!(%payload, %location, %backtrace, "Panic");
    }));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
