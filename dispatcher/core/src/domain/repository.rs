// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts consumed by the sync state machine, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregates | Implementations |
//! |-------|------------|----------------|
//! | `HierarchyStore` | `Agent`, `Target`, `Operation` | `InMemoryHierarchyStore` |
//! | `EvidenceStore` | `Evidence` | `InMemoryEvidenceStore` |
//!
//! `save` is a whole-entity upsert. There is no transaction spanning entities:
//! each level of a cascade is persisted on its own.
//!
//! Targets and operations are shared by many agents, so their sync stats are
//! never written back from a copy read earlier. `advance_*` compares and writes
//! in one step against the stored record; a SQL backend maps it to a single
//! `UPDATE ... WHERE last_sync IS NULL OR last_sync <= $at RETURNING *`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::evidence::Evidence;
use crate::domain::hierarchy::{Agent, AgentId, Operation, OperationId, Target, TargetId};

/// Ancestor record after a forward-only write attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Advanced<T> {
    /// Stored record after the attempt
    pub entity: T,
    /// `false` when the record already held a newer sync and was left untouched
    pub applied: bool,
}

#[async_trait]
pub trait HierarchyStore: Send + Sync {
    async fn find_agent(&self, id: AgentId) -> Result<Option<Agent>, RepositoryError>;

    async fn find_target(&self, id: TargetId) -> Result<Option<Target>, RepositoryError>;

    async fn find_operation(&self, id: OperationId) -> Result<Option<Operation>, RepositoryError>;

    async fn save_agent(&self, agent: &Agent) -> Result<(), RepositoryError>;

    /// Record that `child` synced at `at`. `None` when the target does not exist.
    async fn advance_target(
        &self,
        id: TargetId,
        child: AgentId,
        at: DateTime<Utc>,
        reset_dashboard: bool,
    ) -> Result<Option<Advanced<Target>>, RepositoryError>;

    /// Record that `child` synced at `at`. `None` when the operation does not exist.
    async fn advance_operation(
        &self,
        id: OperationId,
        child: TargetId,
        at: DateTime<Utc>,
    ) -> Result<Option<Advanced<Operation>>, RepositoryError>;
}

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Save evidence (create or replace by id)
    async fn save(&self, evidence: &Evidence) -> Result<(), RepositoryError>;

    /// Evidence owned by a target, optionally narrowed to one type
    async fn find_by_target(
        &self,
        target: TargetId,
        evidence_type: Option<&str>,
    ) -> Result<Vec<Evidence>, RepositoryError>;
}

/// Repository errors. A missing entity is `Ok(None)`, not an error.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(String),
}
