// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Notifications
//
// In-memory fan-out of dashboard pushes, sync alerts and connector lifecycle
// events using a tokio broadcast channel. Feeds the SSE endpoint and any
// in-process observer. Nothing is persisted; a subscriber that falls behind
// loses the oldest events.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::notification::{Notification, NotificationError, NotificationHandler};

/// Event bus for publishing and subscribing to notifications
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<Notification>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish a notification to all subscribers
    pub fn publish(&self, notification: Notification) {
        debug!(kind = notification.kind(), "Publishing notification");

        let receiver_count = self.sender.send(notification).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to notification");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Raw receiver, for adapters that wrap it in a stream
    pub fn receiver(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[async_trait]
impl NotificationHandler for EventBus {
    async fn handle(&self, notification: Notification) -> Result<(), NotificationError> {
        self.publish(notification);
        Ok(())
    }
}

/// Receiver for all notifications
pub struct EventReceiver {
    receiver: broadcast::Receiver<Notification>,
}

impl EventReceiver {
    /// Receive the next notification (waits until one is available)
    pub async fn recv(&mut self) -> Result<Notification, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<Notification, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
