//! emberbot-core/src/overlay/mod.rs
//!
//! Fan-out of overlay events to whoever is watching. Delivery is
//! fire-and-forget: each observer gets a bounded queue, and a stalled or
//! absent observer never slows the bot down.

pub mod server;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Capacity of each observer's delivery queue. Events beyond this are
/// dropped for that observer only.
const OBSERVER_BUFFER_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayEventType {
    Connected,
    ChatCommand,
    Redemption,
    CollectionDisplay,
    SeriesRedemption,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayEvent {
    #[serde(rename = "type")]
    pub event_type: OverlayEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl OverlayEvent {
    /// Synthetic handshake event pushed when an observer connects.
    pub fn connected() -> Self {
        Self {
            event_type: OverlayEventType::Connected,
            message: None,
            data: None,
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }

    pub fn with_data(event_type: OverlayEventType, data: serde_json::Value) -> Self {
        Self {
            event_type,
            message: None,
            data: Some(data),
            timestamp: None,
        }
    }
}

/// Registry of connected observers, each behind its own bounded queue.
pub struct OverlayBroadcaster {
    observers: DashMap<u64, mpsc::Sender<OverlayEvent>>,
    next_id: AtomicU64,
}

impl OverlayBroadcaster {
    pub fn new() -> Self {
        Self {
            observers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> (u64, mpsc::Receiver<OverlayEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OBSERVER_BUFFER_SIZE);
        self.observers.insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&self, id: u64) {
        self.observers.remove(&id);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Deliver to every connected observer without ever blocking. A full
    /// queue drops the event for that observer; a closed one is pruned.
    pub fn broadcast(&self, event: OverlayEvent) {
        if self.observers.is_empty() {
            warn!(event_type = ?event.event_type, "no overlay observers connected, event dropped");
            return;
        }

        let mut closed = Vec::new();
        for entry in self.observers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(observer = entry.key(), event_type = ?event.event_type,
                          "observer queue full, dropping event");
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }
        for id in closed {
            self.observers.remove(&id);
        }

        debug!(event_type = ?event.event_type, observers = self.observers.len(), "overlay event sent");
    }
}

impl Default for OverlayBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn display_event() -> OverlayEvent {
        OverlayEvent::with_data(OverlayEventType::CollectionDisplay, json!({"n": 1}))
    }

    #[test]
    fn serializes_without_null_fields() {
        let event = OverlayEvent::with_data(OverlayEventType::SeriesRedemption, json!({"isNew": true}));
        let text = serde_json::to_string(&event).unwrap();
        assert_eq!(text, r#"{"type":"series_redemption","data":{"isNew":true}}"#);
    }

    #[tokio::test]
    async fn broadcast_with_no_observers_is_a_noop() {
        let broadcaster = OverlayBroadcaster::new();
        broadcaster.broadcast(display_event());
        assert_eq!(broadcaster.observer_count(), 0);
    }

    #[tokio::test]
    async fn delivers_to_every_observer() {
        let broadcaster = OverlayBroadcaster::new();
        let (_id1, mut rx1) = broadcaster.subscribe();
        let (_id2, mut rx2) = broadcaster.subscribe();

        broadcaster.broadcast(display_event());

        assert_eq!(rx1.recv().await.unwrap().event_type, OverlayEventType::CollectionDisplay);
        assert_eq!(rx2.recv().await.unwrap().event_type, OverlayEventType::CollectionDisplay);
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let broadcaster = OverlayBroadcaster::new();
        let (_id, mut rx) = broadcaster.subscribe();

        // One more than the queue holds; the call must return regardless.
        for _ in 0..=OBSERVER_BUFFER_SIZE {
            broadcaster.broadcast(display_event());
        }

        let mut delivered = 0;
        while rx.try_recv().is_ok() {
            delivered += 1;
        }
        assert_eq!(delivered, OBSERVER_BUFFER_SIZE);
    }

    #[tokio::test]
    async fn closed_observers_are_pruned() {
        let broadcaster = OverlayBroadcaster::new();
        let (_id, rx) = broadcaster.subscribe();
        drop(rx);

        broadcaster.broadcast(display_event());
        assert_eq!(broadcaster.observer_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_removes_observer() {
        let broadcaster = OverlayBroadcaster::new();
        let (id, _rx) = broadcaster.subscribe();
        assert_eq!(broadcaster.observer_count(), 1);
        broadcaster.unsubscribe(id);
        assert_eq!(broadcaster.observer_count(), 0);
    }
}
