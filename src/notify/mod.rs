//! Notification module: schedule gate, message formatting and transport.

pub mod format;
pub mod gate;
pub mod mock;
pub mod state;
pub mod telegram;

use async_trait::async_trait;

use crate::error::NotifyError;

pub use format::{alert_message, betslip_block, AlertCaps};
pub use gate::{GateDecision, NotificationGate, RapidWindow};
pub use mock::RecordingNotifier;
pub use state::{fingerprint, DigestStore};
pub use telegram::TelegramNotifier;

/// Message transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a pre-formatted message to one channel.
    async fn send(&self, channel: &str, text: &str) -> Result<(), NotifyError>;
}
