//! Recording notifier for tests.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::NotifyError;

use super::Notifier;

/// One captured message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Target channel.
    pub channel: String,
    /// Message body.
    pub text: String,
}

/// Notifier that records messages instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail: bool,
}

impl RecordingNotifier {
    /// Create a notifier that accepts every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a notifier whose sends always fail.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Messages recorded so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, channel: &str, text: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Unavailable("recording notifier set to fail".into()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMessage {
                channel: channel.to_string(),
                text: text.to_string(),
            });
        Ok(())
    }
}
