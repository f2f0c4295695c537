// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Synchronization Session
//!
//! A sync session is not persisted on its own: it is represented by the agent's
//! `stat.last_sync_status` plus the `last_sync` timestamps along the hierarchy.
//!
//! ## State Machine
//!
//! ```text
//! Idle ──start──▶ InProgress ──stop────▶ Idle
//!                  │    ▲
//!                  │    └──update (timestamps only)
//!                  └──timeout──▶ Timeouted ──start──▶ InProgress
//! *  ──(external processing)──▶ Processing | Ghost
//! ```
//!
//! No transition depends on the previously recorded status: every transition is
//! a forward-only timestamp write plus idempotent field overwrites, so duplicated
//! or reordered deliveries converge on the state of the newest event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::hierarchy::{AgentId, EntityKind};
use crate::domain::repository::RepositoryError;

/// Recorded status of an agent's most recent sync session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    #[default]
    Idle,
    InProgress,
    Timeouted,
    Processing,
    Ghost,
}

/// Payload of a `start` or `update` lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Collector-side time of the sync, unix seconds on the wire.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub sync_time: DateTime<Utc>,

    pub version: String,

    /// Network address the agent connected from.
    pub source: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub device: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTransition {
    Start,
    Update,
    Stop,
    Timeout,
}

impl SyncTransition {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncTransition::Start => "start",
            SyncTransition::Update => "update",
            SyncTransition::Stop => "stop",
            SyncTransition::Timeout => "timeout",
        }
    }
}

/// Result of applying a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The event advanced the agent's state and its side effects were submitted.
    Applied,
    /// The event was older than what the agent already recorded and was skipped.
    Stale,
}

/// Lifecycle notification forwarded to external connectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncLifecycleEvent {
    SyncStarted {
        agent_id: AgentId,
        sync_time: DateTime<Utc>,
        source: String,
    },
    SyncStopped {
        agent_id: AgentId,
        stopped_at: DateTime<Utc>,
    },
    SyncTimedOut {
        agent_id: AgentId,
        timed_out_at: DateTime<Utc>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{kind} not found: {id}")]
    EntityNotFound { kind: EntityKind, id: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SyncError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        SyncError::EntityNotFound {
            kind,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sync_event_reads_unix_seconds() {
        let json = r#"{"sync_time": 1700000000, "version": "2024011601", "source": "10.0.0.5"}"#;
        let event: SyncEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.sync_time, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        assert_eq!(event.source, "10.0.0.5");
        assert!(event.user.is_none());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&SyncStatus::InProgress).unwrap(), "\"IN_PROGRESS\"");

        let event = SyncLifecycleEvent::SyncTimedOut {
            agent_id: AgentId::new(),
            timed_out_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "sync_timed_out");
    }
}
