//! Outbound notification contract.
//!
//! Fire-and-forget: the engine spawns the send and never awaits it on the
//! transition path. At-most-once, best-effort, no retry.

use crate::error::NotifyError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use haulflow_core::{LoadId, OwnerId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// What happened to a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadEventKind {
    Accepted,
    LoadingStarted,
    LoadingFinished,
    PickupCompleted,
    DeliveryStarted,
    DeliveryCompleted,
}

/// Event emitted after a transition's write commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadEvent {
    pub kind: LoadEventKind,
    pub load_id: LoadId,
    pub owner_id: OwnerId,
    pub occurred_at: DateTime<Utc>,
}

impl LoadEvent {
    pub fn new(kind: LoadEventKind, load_id: LoadId, owner_id: OwnerId) -> Self {
        Self {
            kind,
            load_id,
            owner_id,
            occurred_at: Utc::now(),
        }
    }
}

/// Delivery transport for load events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, event: LoadEvent) -> Result<(), NotifyError>;
}

/// Notifier backed by an unbounded channel, for embedding callers that
/// drain events into a push pipeline.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<LoadEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LoadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send(&self, event: LoadEvent) -> Result<(), NotifyError> {
        self.tx.send(event).map_err(|_| NotifyError::ChannelClosed)
    }
}

/// Notifier that drops every event, for tests that do not observe them.
#[derive(Default)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, _event: LoadEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_notifier_delivers() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let event = LoadEvent::new(LoadEventKind::Accepted, LoadId::new(), OwnerId::new());
        notifier.send(event.clone()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, LoadEventKind::Accepted);
        assert_eq!(received.load_id, event.load_id);
    }

    #[tokio::test]
    async fn closed_channel_reports_error() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        let event = LoadEvent::new(LoadEventKind::Accepted, LoadId::new(), OwnerId::new());
        assert!(notifier.send(event).await.is_err());
    }
}
