// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Sync State Machine
//!
//! Applies session lifecycle events for one agent instance and cascades them up
//! the ownership hierarchy.
//!
//! ## Cascade Order (start / update)
//!
//! ```text
//! 1. Agent      version, stat, status ──save
//! 2. Target     last_sync, last_child ──advance
//! 3. Operation  last_sync, last_child ──advance
//! 4. alert_on_sync(agent)                     start only, fire-and-forget
//! 5. ip evidence from event.source            start only
//! 6. push_dashboard(agent, target, operation) fire-and-forget
//! ```
//!
//! Each level is persisted on its own with no transaction across levels. A
//! failure aborts the transition and leaves already-written levels in place; a
//! replay of the same event re-applies cleanly because every write is a
//! forward-only timestamp plus field overwrites.
//!
//! ## Ordering
//!
//! An event older than the agent's recorded `last_sync` is stale and skipped
//! entirely. `stop` and `timeout` stamp `max(now, last_sync)`. Ancestors are
//! advanced by the store in one compare-and-write step that refuses anything
//! older than what is stored, so concurrent agents under one target resolve to
//! "newest writer wins" on `last_child` without a cross-entity lock.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::clock::Clock;
use crate::domain::evidence::Evidence;
use crate::domain::hierarchy::{Agent, AgentId, EntityKind, Operation, Target};
use crate::domain::notification::NotificationSink;
use crate::domain::position::PositionResolver;
use crate::domain::repository::{EvidenceStore, HierarchyStore};
use crate::domain::sync::{SyncError, SyncEvent, SyncLifecycleEvent, SyncOutcome, SyncTransition};

pub struct SyncStateMachine {
    store: Arc<dyn HierarchyStore>,
    evidence: Arc<dyn EvidenceStore>,
    positions: Arc<dyn PositionResolver>,
    notifications: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl SyncStateMachine {
    pub fn new(
        store: Arc<dyn HierarchyStore>,
        evidence: Arc<dyn EvidenceStore>,
        positions: Arc<dyn PositionResolver>,
        notifications: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            evidence,
            positions,
            notifications,
            clock,
        }
    }

    /// Open a session: `Idle | Timeouted → InProgress`.
    pub async fn start(&self, agent_id: AgentId, event: &SyncEvent) -> Result<SyncOutcome, SyncError> {
        self.cascade(agent_id, event, SyncTransition::Start).await
    }

    /// Heartbeat during a long transfer. Same cascade as `start` without
    /// touching the status or the dashboard counters.
    pub async fn update(&self, agent_id: AgentId, event: &SyncEvent) -> Result<SyncOutcome, SyncError> {
        self.cascade(agent_id, event, SyncTransition::Update).await
    }

    /// Close a session: `→ Idle`. Persists the agent only.
    pub async fn stop(&self, agent_id: AgentId) -> Result<SyncOutcome, SyncError> {
        let mut agent = self.load_agent(agent_id).await?;
        info!("{} sync end [{}]", agent.name, agent.identity);

        let stopped_at = agent.end_sync(self.clock.now());
        self.store.save_agent(&agent).await?;
        record(SyncTransition::Stop);

        self.notifications.publish_lifecycle(SyncLifecycleEvent::SyncStopped {
            agent_id: agent.id,
            stopped_at,
        });

        let target = self.load_target(&agent).await?;
        let operation = self.load_operation(&target).await?;
        self.notifications.push_dashboard(&agent, &target, &operation);

        Ok(SyncOutcome::Applied)
    }

    /// Mark a session as timed out: `→ Timeouted`. Persists the agent only.
    /// Connectors hear about it; the dashboard and alerting do not.
    pub async fn timeout(&self, agent_id: AgentId) -> Result<SyncOutcome, SyncError> {
        let mut agent = self.load_agent(agent_id).await?;
        info!("{} sync timeouted [{}]", agent.name, agent.identity);

        let timed_out_at = agent.time_out(self.clock.now());
        self.store.save_agent(&agent).await?;
        record(SyncTransition::Timeout);

        self.notifications.publish_lifecycle(SyncLifecycleEvent::SyncTimedOut {
            agent_id: agent.id,
            timed_out_at,
        });

        Ok(SyncOutcome::Applied)
    }

    async fn cascade(
        &self,
        agent_id: AgentId,
        event: &SyncEvent,
        transition: SyncTransition,
    ) -> Result<SyncOutcome, SyncError> {
        let starting = transition == SyncTransition::Start;
        let mut agent = self.load_agent(agent_id).await?;

        if agent.is_stale(event.sync_time) {
            debug!(
                agent = %agent.id,
                transition = transition.as_str(),
                sync_time = %event.sync_time,
                last_sync = ?agent.stat.last_sync,
                "Skipping stale sync event"
            );
            return Ok(SyncOutcome::Stale);
        }

        if starting {
            info!("{} sync started [{}]", agent.name, agent.identity);
            agent.begin_sync(event);
        } else {
            info!("{} sync update [{}]", agent.name, agent.identity);
            agent.refresh_sync(event);
        }
        self.store.save_agent(&agent).await?;

        let advanced = self
            .store
            .advance_target(agent.target, agent.id, event.sync_time, starting)
            .await?
            .ok_or_else(|| SyncError::not_found(EntityKind::Target, agent.target))?;
        if !advanced.applied {
            debug!(target = %advanced.entity.id, "Target already holds a newer sync");
        }
        let target = advanced.entity;

        let advanced = self
            .store
            .advance_operation(target.operation, target.id, event.sync_time)
            .await?
            .ok_or_else(|| SyncError::not_found(EntityKind::Operation, target.operation))?;
        if !advanced.applied {
            debug!(operation = %advanced.entity.id, "Operation already holds a newer sync");
        }
        let operation = advanced.entity;

        record(transition);

        if starting {
            self.notifications.publish_lifecycle(SyncLifecycleEvent::SyncStarted {
                agent_id: agent.id,
                sync_time: event.sync_time,
                source: event.source.clone(),
            });
            self.notifications.alert_on_sync(&agent);
            self.insert_sync_address(&target, &agent, event).await;
        }

        self.notifications.push_dashboard(&agent, &target, &operation);

        Ok(SyncOutcome::Applied)
    }

    /// Record where the agent connected from as `ip` evidence on its target.
    /// Failures are logged; the transition already committed.
    async fn insert_sync_address(&self, target: &Target, agent: &Agent, event: &SyncEvent) {
        let position = self.positions.resolve(&event.source).await;
        if position.is_none() {
            debug!(source = %event.source, "No position for sync address");
        }

        let evidence = Evidence::sync_address(
            target.id,
            agent.id,
            event.sync_time,
            &event.source,
            position,
            self.clock.now(),
        );

        if let Err(e) = self.evidence.save(&evidence).await {
            warn!(
                agent = %agent.id,
                target = %target.id,
                error = %e,
                "Cannot record sync address evidence"
            );
        }
    }

    async fn load_agent(&self, id: AgentId) -> Result<Agent, SyncError> {
        self.store
            .find_agent(id)
            .await?
            .ok_or_else(|| SyncError::not_found(EntityKind::Agent, id))
    }

    async fn load_target(&self, agent: &Agent) -> Result<Target, SyncError> {
        self.store
            .find_target(agent.target)
            .await?
            .ok_or_else(|| SyncError::not_found(EntityKind::Target, agent.target))
    }

    async fn load_operation(&self, target: &Target) -> Result<Operation, SyncError> {
        self.store
            .find_operation(target.operation)
            .await?
            .ok_or_else(|| SyncError::not_found(EntityKind::Operation, target.operation))
    }
}

fn record(transition: SyncTransition) {
    metrics::counter!("sync_transitions_total", "transition" => transition.as_str()).increment(1);
}
