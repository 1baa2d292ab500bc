// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Notifier doubles.

use async_trait::async_trait;
use contact_relay::{
    config::TelegramConfig, ContactSubmission, Notifier, NotifyError, TelegramNotifier,
};
use std::sync::{Arc, Mutex};

/// Records every submission and reports success.
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<ContactSubmission>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<ContactSubmission> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, submission: &ContactSubmission) -> Result<(), NotifyError> {
        self.calls.lock().unwrap().push(submission.clone());
        Ok(())
    }
}

/// Panics on delivery.
pub struct PanickingNotifier;

#[async_trait]
impl Notifier for PanickingNotifier {
    async fn notify(&self, _submission: &ContactSubmission) -> Result<(), NotifyError> {
        panic!("notifier exploded");
    }
}

/// A real Telegram notifier aimed at a port nothing listens on.
pub fn unreachable_telegram() -> Arc<TelegramNotifier> {
    Arc::new(TelegramNotifier::new(&TelegramConfig {
        bot_token: Some("123:abc".to_string()),
        chat_id: Some("-1001".to_string()),
        api_url: "http://127.0.0.1:9".to_string(),
    }))
}

/// A Telegram notifier with no credentials.
pub fn unconfigured_telegram() -> Arc<TelegramNotifier> {
    Arc::new(TelegramNotifier::new(&TelegramConfig::default()))
}
