// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Notification Side Effects
//!
//! Alerting, dashboard pushes and connector events raised by sync transitions.
//!
//! [`NotificationSink`] is the fire-and-forget submission side: calls never block
//! on delivery and return nothing. [`NotificationHandler`] is the delivery side,
//! run off the transition path; its failures are logged and dropped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::hierarchy::{Agent, Operation, Target};
use crate::domain::sync::SyncLifecycleEvent;

/// Snapshot of the three hierarchy levels after a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardPush {
    pub agent: Agent,
    pub target: Target,
    pub operation: Operation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Dashboard(DashboardPush),
    SyncAlert { agent: Agent },
    Lifecycle(SyncLifecycleEvent),
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Dashboard(_) => "dashboard",
            Notification::SyncAlert { .. } => "sync_alert",
            Notification::Lifecycle(_) => "lifecycle",
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn push_dashboard(&self, agent: &Agent, target: &Target, operation: &Operation);

    fn alert_on_sync(&self, agent: &Agent);

    fn publish_lifecycle(&self, event: SyncLifecycleEvent);
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, notification: Notification) -> Result<(), NotificationError>;
}
