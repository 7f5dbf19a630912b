//! Notification delivery
//!
//! The alarm service hands a fired trigger's payload to a
//! `NotificationPort`. The UI layer reads `navigation_target()` from the
//! delivered payload to reopen the originating record.

use crate::error::{AppError, Result};
use crate::services::trigger::TriggerPayload;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// User-visible alert delivery
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn deliver(&self, payload: TriggerPayload) -> Result<()>;
}

/// Forwards payloads to the UI over a channel
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<TriggerPayload>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TriggerPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationPort for ChannelNotifier {
    async fn deliver(&self, payload: TriggerPayload) -> Result<()> {
        tracing::info!(
            "Delivering reminder {} for item {}",
            payload.trigger_id,
            payload.record_id
        );
        self.tx
            .send(payload)
            .map_err(|_| AppError::Generic("Notification receiver closed".to_string()))
    }
}

/// Writes payloads to the log only
#[derive(Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationPort for LogNotifier {
    async fn deliver(&self, payload: TriggerPayload) -> Result<()> {
        tracing::info!(
            "Reminder: {} - {} (item {})",
            payload.title,
            payload.body,
            payload.record_id
        );
        Ok(())
    }
}
