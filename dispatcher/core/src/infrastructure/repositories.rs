// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! In-memory implementations of the domain persistence contracts. The durable
//! hierarchy and evidence stores belong to the wider platform; these back the
//! daemon in standalone mode and every test in this crate.
//!
//! Both stores are cheap to clone and share their maps across clones.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::evidence::{Evidence, EvidenceId};
use crate::domain::hierarchy::{Agent, AgentId, Operation, OperationId, Target, TargetId};
use crate::domain::identity::AgentIdentity;
use crate::domain::repository::{Advanced, EvidenceStore, HierarchyStore, RepositoryError};

#[derive(Clone, Default)]
pub struct InMemoryHierarchyStore {
    agents: Arc<RwLock<HashMap<AgentId, Agent>>>,
    targets: Arc<RwLock<HashMap<TargetId, Target>>>,
    operations: Arc<RwLock<HashMap<OperationId, Operation>>>,
}

impl InMemoryHierarchyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an operation, a target under it and an agent under the target.
    pub fn seed(&self, operation: &str, target: &str, agent: &str, identity: AgentIdentity) -> (AgentId, TargetId, OperationId) {
        let op = Operation::new(operation);
        let tgt = Target::new(target, op.id);
        let agt = Agent::new(agent, identity, tgt.id);
        let ids = (agt.id, tgt.id, op.id);

        self.operations.write().insert(op.id, op);
        self.targets.write().insert(tgt.id, tgt);
        self.agents.write().insert(agt.id, agt);
        ids
    }

    /// Add one more agent under an existing target.
    pub fn add_agent(&self, agent: Agent) -> AgentId {
        let id = agent.id;
        self.agents.write().insert(id, agent);
        id
    }
}

#[async_trait]
impl HierarchyStore for InMemoryHierarchyStore {
    async fn find_agent(&self, id: AgentId) -> Result<Option<Agent>, RepositoryError> {
        Ok(self.agents.read().get(&id).cloned())
    }

    async fn find_target(&self, id: TargetId) -> Result<Option<Target>, RepositoryError> {
        Ok(self.targets.read().get(&id).cloned())
    }

    async fn find_operation(&self, id: OperationId) -> Result<Option<Operation>, RepositoryError> {
        Ok(self.operations.read().get(&id).cloned())
    }

    async fn save_agent(&self, agent: &Agent) -> Result<(), RepositoryError> {
        self.agents.write().insert(agent.id, agent.clone());
        Ok(())
    }

    async fn advance_target(
        &self,
        id: TargetId,
        child: AgentId,
        at: DateTime<Utc>,
        reset_dashboard: bool,
    ) -> Result<Option<Advanced<Target>>, RepositoryError> {
        let mut targets = self.targets.write();
        Ok(targets.get_mut(&id).map(|target| {
            let applied = target.record_child_sync(child, at, reset_dashboard);
            Advanced {
                entity: target.clone(),
                applied,
            }
        }))
    }

    async fn advance_operation(
        &self,
        id: OperationId,
        child: TargetId,
        at: DateTime<Utc>,
    ) -> Result<Option<Advanced<Operation>>, RepositoryError> {
        let mut operations = self.operations.write();
        Ok(operations.get_mut(&id).map(|operation| {
            let applied = operation.record_child_sync(child, at);
            Advanced {
                entity: operation.clone(),
                applied,
            }
        }))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryEvidenceStore {
    evidence: Arc<RwLock<HashMap<EvidenceId, Evidence>>>,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.evidence.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.evidence.read().is_empty()
    }
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn save(&self, evidence: &Evidence) -> Result<(), RepositoryError> {
        self.evidence.write().insert(evidence.id, evidence.clone());
        Ok(())
    }

    async fn find_by_target(
        &self,
        target: TargetId,
        evidence_type: Option<&str>,
    ) -> Result<Vec<Evidence>, RepositoryError> {
        let mut found: Vec<Evidence> = self
            .evidence
            .read()
            .values()
            .filter(|e| e.target == target)
            .filter(|e| evidence_type.is_none_or(|t| e.evidence_type == t))
            .cloned()
            .collect();
        found.sort_by_key(|e| e.acquired_at);
        Ok(found)
    }
}
