// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Fire-and-forget notification delivery.
//!
//! [`QueuedNotificationSink`] puts notifications on a bounded queue drained by a
//! single background task that hands each one to a [`NotificationHandler`].
//! Submission never waits: when the queue is full the notification is dropped,
//! logged and counted in `notifications_dropped_total`.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::hierarchy::{Agent, Operation, Target};
use crate::domain::notification::{DashboardPush, Notification, NotificationHandler, NotificationSink};
use crate::domain::sync::SyncLifecycleEvent;

#[derive(Clone)]
pub struct QueuedNotificationSink {
    sender: mpsc::Sender<Notification>,
}

impl QueuedNotificationSink {
    /// Start the delivery task. It exits once every sink clone is dropped and
    /// the queue is drained.
    pub fn spawn(handler: Arc<dyn NotificationHandler>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<Notification>(capacity.max(1));

        let task = tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                let kind = notification.kind();
                if let Err(e) = handler.handle(notification).await {
                    warn!(kind, error = %e, "Notification delivery failed");
                }
            }
            debug!("Notification queue closed");
        });

        (Self { sender }, task)
    }

    fn submit(&self, notification: Notification) {
        let kind = notification.kind();
        match self.sender.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(kind, "Notification queue full, dropping notification");
                metrics::counter!("notifications_dropped_total", "kind" => kind).increment(1);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(kind, "Notification queue closed, dropping notification");
                metrics::counter!("notifications_dropped_total", "kind" => kind).increment(1);
            }
        }
    }
}

impl NotificationSink for QueuedNotificationSink {
    fn push_dashboard(&self, agent: &Agent, target: &Target, operation: &Operation) {
        self.submit(Notification::Dashboard(DashboardPush {
            agent: agent.clone(),
            target: target.clone(),
            operation: operation.clone(),
        }));
    }

    fn alert_on_sync(&self, agent: &Agent) {
        self.submit(Notification::SyncAlert { agent: agent.clone() });
    }

    fn publish_lifecycle(&self, event: SyncLifecycleEvent) {
        self.submit(Notification::Lifecycle(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hierarchy::{OperationId, TargetId};
    use crate::domain::identity::AgentIdentity;
    use crate::domain::notification::NotificationError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Collecting {
        seen: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl NotificationHandler for Collecting {
        async fn handle(&self, notification: Notification) -> Result<(), NotificationError> {
            self.seen.lock().push(notification.kind());
            if matches!(notification, Notification::SyncAlert { .. }) {
                return Err(NotificationError::Delivery("alert backend down".to_string()));
            }
            Ok(())
        }
    }

    fn agent() -> Agent {
        Agent::new(
            "agent",
            AgentIdentity::new("RCS_0000000042", "abc").unwrap(),
            TargetId::new(),
        )
    }

    #[tokio::test]
    async fn test_delivers_in_order_and_survives_handler_errors() {
        let handler = Arc::new(Collecting::default());
        let (sink, task) = QueuedNotificationSink::spawn(handler.clone(), 16);

        let agent = agent();
        sink.alert_on_sync(&agent);
        sink.publish_lifecycle(SyncLifecycleEvent::SyncStopped {
            agent_id: agent.id,
            stopped_at: chrono::Utc::now(),
        });
        drop(sink);
        task.await.unwrap();

        assert_eq!(*handler.seen.lock(), vec!["sync_alert", "lifecycle"]);
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let handler = Arc::new(Collecting::default());
        let (sink, task) = QueuedNotificationSink::spawn(handler.clone(), 1);

        // the delivery task cannot run before the first await on this runtime
        let agent = agent();
        let target = Target::new("target", OperationId::new());
        let operation = Operation::new("op");
        for _ in 0..10 {
            sink.push_dashboard(&agent, &target, &operation);
        }
        drop(sink);
        task.await.unwrap();

        assert_eq!(*handler.seen.lock(), vec!["dashboard"]);
    }
}
