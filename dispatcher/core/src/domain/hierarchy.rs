// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Ownership Hierarchy
//!
//! Three aggregates form a static tree: an [`Operation`] owns many [`Target`]s and
//! a `Target` owns many [`Agent`]s. Parents are referenced by identifier only;
//! traversal goes through [`crate::domain::repository::HierarchyStore`].
//!
//! ## Invariants
//!
//! - `agent.target` and `target.operation` never change after creation.
//! - `last_sync` on every level only moves forward. A write carrying an older
//!   timestamp than the one recorded is refused by the aggregate itself.
//! - Only the agent records a session status; ancestors record which child
//!   synced most recently (`last_child`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::domain::identity::AgentIdentity;
use crate::domain::sync::{SyncEvent, SyncStatus};

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(AgentId);
entity_id!(TargetId);
entity_id!(OperationId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Agent,
    Target,
    Operation,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Agent => write!(f, "Agent"),
            EntityKind::Target => write!(f, "Target"),
            EntityKind::Operation => write!(f, "Operation"),
        }
    }
}

/// Per-session counters shown on the console dashboard, keyed by evidence type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DashboardCounters(HashMap<String, u64>);

impl DashboardCounters {
    pub fn increment(&mut self, evidence_type: &str) {
        *self.0.entry(evidence_type.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, evidence_type: &str) -> u64 {
        self.0.get(evidence_type).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStat {
    pub last_sync: Option<DateTime<Utc>>,
    pub last_sync_status: SyncStatus,
    pub source: Option<String>,
    pub user: Option<String>,
    pub device: Option<String>,
    #[serde(default)]
    pub dashboard: DashboardCounters,
}

/// A running agent instance. Mutated only by the sync state machine here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub identity: AgentIdentity,
    pub target: TargetId,
    pub version: Option<String>,
    pub stat: AgentStat,
}

impl Agent {
    pub fn new(name: impl Into<String>, identity: AgentIdentity, target: TargetId) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            identity,
            target,
            version: None,
            stat: AgentStat::default(),
        }
    }

    /// True when `sync_time` predates what this agent already recorded.
    pub fn is_stale(&self, sync_time: DateTime<Utc>) -> bool {
        self.stat.last_sync.is_some_and(|last| sync_time < last)
    }

    /// Open a session: counters reset and status moves to `InProgress`.
    pub fn begin_sync(&mut self, event: &SyncEvent) {
        self.stat.dashboard.reset();
        self.stat.last_sync_status = SyncStatus::InProgress;
        self.refresh_sync(event);
    }

    /// Heartbeat during a transfer. Leaves the status and counters alone.
    pub fn refresh_sync(&mut self, event: &SyncEvent) {
        self.version = Some(event.version.clone());
        self.stat.last_sync = Some(event.sync_time);
        self.stat.source = Some(event.source.clone());
        self.stat.user = event.user.clone();
        self.stat.device = event.device.clone();
    }

    /// Close the session. Returns the timestamp actually recorded.
    pub fn end_sync(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.close_with(now, SyncStatus::Idle)
    }

    pub fn time_out(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.close_with(now, SyncStatus::Timeouted)
    }

    fn close_with(&mut self, now: DateTime<Utc>, status: SyncStatus) -> DateTime<Utc> {
        let stamp = self.stat.last_sync.map_or(now, |last| last.max(now));
        self.stat.last_sync = Some(stamp);
        self.stat.last_sync_status = status;
        stamp
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetStat {
    pub last_sync: Option<DateTime<Utc>>,
    pub last_child: Vec<AgentId>,
    #[serde(default)]
    pub dashboard: DashboardCounters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub operation: OperationId,
    pub stat: TargetStat,
}

impl Target {
    pub fn new(name: impl Into<String>, operation: OperationId) -> Self {
        Self {
            id: TargetId::new(),
            name: name.into(),
            operation,
            stat: TargetStat::default(),
        }
    }

    /// Record that `agent` synced at `at`. Returns `false`, leaving the target
    /// untouched, when a newer sync is already recorded.
    pub fn record_child_sync(&mut self, agent: AgentId, at: DateTime<Utc>, reset_dashboard: bool) -> bool {
        if self.stat.last_sync.is_some_and(|last| at < last) {
            return false;
        }
        self.stat.last_sync = Some(at);
        self.stat.last_child = vec![agent];
        if reset_dashboard {
            self.stat.dashboard.reset();
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStat {
    pub last_sync: Option<DateTime<Utc>>,
    pub last_child: Vec<TargetId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    pub name: String,
    pub stat: OperationStat,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: OperationId::new(),
            name: name.into(),
            stat: OperationStat::default(),
        }
    }

    /// Same forward-only rule as [`Target::record_child_sync`].
    pub fn record_child_sync(&mut self, target: TargetId, at: DateTime<Utc>) -> bool {
        if self.stat.last_sync.is_some_and(|last| at < last) {
            return false;
        }
        self.stat.last_sync = Some(at);
        self.stat.last_child = vec![target];
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn event(secs: i64) -> SyncEvent {
        SyncEvent {
            sync_time: Utc.timestamp_opt(secs, 0).unwrap(),
            version: "2024011601".to_string(),
            source: "10.0.0.5".to_string(),
            user: Some("alice".to_string()),
            device: Some("laptop".to_string()),
        }
    }

    fn agent() -> Agent {
        let identity = AgentIdentity::new("RCS_0000000042", "abc").unwrap();
        Agent::new("agent", identity, TargetId::new())
    }

    #[test]
    fn test_begin_sync_resets_counters() {
        let mut agent = agent();
        agent.stat.dashboard.increment("chat");
        agent.begin_sync(&event(100));

        assert!(agent.stat.dashboard.is_empty());
        assert_eq!(agent.stat.last_sync_status, SyncStatus::InProgress);
        assert_eq!(agent.version.as_deref(), Some("2024011601"));
        assert_eq!(agent.stat.source.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_refresh_keeps_status_and_counters() {
        let mut agent = agent();
        agent.stat.last_sync_status = SyncStatus::Timeouted;
        agent.stat.dashboard.increment("chat");
        agent.refresh_sync(&event(200));

        assert_eq!(agent.stat.last_sync_status, SyncStatus::Timeouted);
        assert_eq!(agent.stat.dashboard.get("chat"), 1);
        assert_eq!(agent.stat.last_sync, Some(Utc.timestamp_opt(200, 0).unwrap()));
    }

    #[test]
    fn test_close_never_moves_time_backward() {
        let mut agent = agent();
        agent.begin_sync(&event(1_000));
        let earlier = Utc.timestamp_opt(500, 0).unwrap();

        let stamp = agent.end_sync(earlier);
        assert_eq!(stamp, Utc.timestamp_opt(1_000, 0).unwrap());
        assert_eq!(agent.stat.last_sync_status, SyncStatus::Idle);

        let later = stamp + Duration::seconds(30);
        assert_eq!(agent.time_out(later), later);
        assert_eq!(agent.stat.last_sync_status, SyncStatus::Timeouted);
    }

    #[test]
    fn test_staleness() {
        let mut agent = agent();
        assert!(!agent.is_stale(Utc.timestamp_opt(1, 0).unwrap()));
        agent.begin_sync(&event(100));
        assert!(agent.is_stale(Utc.timestamp_opt(99, 0).unwrap()));
        assert!(!agent.is_stale(Utc.timestamp_opt(100, 0).unwrap()));
    }

    #[test]
    fn test_ancestors_refuse_older_children() {
        let operation = Operation::new("op");
        let mut target = Target::new("target", operation.id);
        let first = AgentId::new();
        let second = AgentId::new();

        assert!(target.record_child_sync(first, Utc.timestamp_opt(200, 0).unwrap(), true));
        assert!(!target.record_child_sync(second, Utc.timestamp_opt(100, 0).unwrap(), true));
        assert_eq!(target.stat.last_child, vec![first]);

        let mut operation = operation;
        assert!(operation.record_child_sync(target.id, Utc.timestamp_opt(200, 0).unwrap()));
        assert!(operation.record_child_sync(target.id, Utc.timestamp_opt(200, 0).unwrap()));
        assert_eq!(operation.stat.last_child, vec![target.id]);
    }
}
