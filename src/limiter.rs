// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window rate limiter keyed by client IP.
//!
//! Two scopes are layered on the submission route:
//! 1. General scope (100 requests per 15 minutes, every route)
//! 2. Contact scope (5 submissions per 15 minutes)
//!
//! A window starts on the first request from an IP and is reset only once
//! its wall-clock length has elapsed. Requests over the limit still count.

use crate::config::RateLimitConfig;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// A named rate limiting boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Submission endpoint
    Contact,
    /// All traffic
    General,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limit and window length for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeLimit {
    pub max_requests: u32,
    pub window: Duration,
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        limit: u32,
        /// Remaining requests in current window
        remaining: u32,
        /// Time until window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        scope: Scope,
        limit: u32,
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }
}

/// Source of monotonic time for window bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Clock backed by `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
    length: Duration,
}

impl Window {
    fn expires_at(&self) -> Instant {
        self.started + self.length
    }
}

/// Counter table for all scopes, keyed by (scope, client IP).
///
/// The only way to mutate a window is [`WindowStore::hit`], which performs
/// expiry, increment and comparison under one write lock.
#[derive(Debug, Default)]
pub struct WindowStore {
    windows: RwLock<HashMap<(Scope, IpAddr), Window>>,
}

impl WindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically record one request and decide whether it fits the limit.
    pub async fn hit(
        &self,
        scope: Scope,
        ip: IpAddr,
        limit: ScopeLimit,
        now: Instant,
    ) -> RateLimitResult {
        let mut windows = self.windows.write().await;
        let window = windows.entry((scope, ip)).or_insert(Window {
            started: now,
            count: 0,
            length: limit.window,
        });

        if now >= window.expires_at() {
            window.started = now;
            window.count = 0;
            window.length = limit.window;
        }

        window.count = window.count.saturating_add(1);
        let reset_in = window.expires_at().saturating_duration_since(now);

        if window.count > limit.max_requests {
            RateLimitResult::Limited {
                scope,
                limit: limit.max_requests,
                retry_after: reset_in,
            }
        } else {
            RateLimitResult::Allowed {
                limit: limit.max_requests,
                remaining: limit.max_requests - window.count,
                reset_in,
            }
        }
    }

    /// Drop windows that have expired. Returns how many were removed.
    pub async fn prune(&self, now: Instant) -> usize {
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|_, window| now < window.expires_at());
        before - windows.len()
    }

    /// Number of live windows.
    pub async fn len(&self) -> usize {
        self.windows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Thread-safe rate limiter over an injected [`WindowStore`] and [`Clock`].
#[derive(Clone)]
pub struct RateLimiter {
    contact: ScopeLimit,
    general: ScopeLimit,
    store: Arc<WindowStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_parts(config, Arc::new(WindowStore::new()), Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: &RateLimitConfig,
        store: Arc<WindowStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let window = config.window_duration();
        Self {
            contact: ScopeLimit {
                max_requests: config.contact_max,
                window,
            },
            general: ScopeLimit {
                max_requests: config.general_max,
                window,
            },
            store,
            clock,
        }
    }

    pub fn limit_for(&self, scope: Scope) -> ScopeLimit {
        match scope {
            Scope::Contact => self.contact,
            Scope::General => self.general,
        }
    }

    /// Check and count one request from `ip` in `scope`.
    pub async fn check(&self, scope: Scope, ip: IpAddr) -> RateLimitResult {
        let result = self
            .store
            .hit(scope, ip, self.limit_for(scope), self.clock.now())
            .await;

        if let RateLimitResult::Limited { retry_after, .. } = &result {
            debug!(%ip, %scope, ?retry_after, "Rate limit exceeded");
        }

        result
    }

    /// Clean up expired entries (should be called periodically).
    pub async fn cleanup(&self) {
        let removed = self.store.prune(self.clock.now()).await;
        if removed > 0 {
            debug!(removed, "Pruned expired rate limit windows");
        }
    }
}
