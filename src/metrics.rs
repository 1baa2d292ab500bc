// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for submissions and rate limiting.

use crate::limiter::Scope;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Final outcome of a submission that reached the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    Invalid,
    Failed,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Invalid => "invalid",
            Self::Failed => "failed",
        }
    }
}

/// Metrics owned by one application instance.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    submissions: IntCounterVec,
    rate_limited: IntCounterVec,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let submissions = IntCounterVec::new(
            Opts::new("contact_submissions_total", "Contact submissions by outcome"),
            &["outcome"],
        )?;
        let rate_limited = IntCounterVec::new(
            Opts::new("rate_limited_requests_total", "Requests rejected by rate limiting"),
            &["scope"],
        )?;

        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;

        Ok(Self {
            registry,
            submissions,
            rate_limited,
        })
    }

    pub fn record_submission(&self, outcome: Outcome) {
        self.submissions.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn record_rate_limited(&self, scope: Scope) {
        self.rate_limited.with_label_values(&[scope.as_str()]).inc();
    }

    pub fn submissions(&self, outcome: Outcome) -> u64 {
        self.submissions.with_label_values(&[outcome.as_str()]).get()
    }

    pub fn rate_limited(&self, scope: Scope) -> u64 {
        self.rate_limited.with_label_values(&[scope.as_str()]).get()
    }

    /// Text exposition of every registered metric.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_render() {
        let metrics = Metrics::new().unwrap();
        metrics.record_submission(Outcome::Delivered);
        metrics.record_submission(Outcome::Delivered);
        metrics.record_rate_limited(Scope::Contact);

        assert_eq!(metrics.submissions(Outcome::Delivered), 2);
        assert_eq!(metrics.submissions(Outcome::Failed), 0);

        let text = metrics.render().unwrap();
        assert!(text.contains("contact_submissions_total{outcome=\"delivered\"} 2"));
        assert!(text.contains("rate_limited_requests_total{scope=\"contact\"} 1"));
    }
}
