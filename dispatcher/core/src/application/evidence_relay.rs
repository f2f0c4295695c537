// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Evidence Relay
//!
//! Forwards one raw evidence payload for one agent instance to the worker that
//! owns the agent's shard, or to the co-located worker for direct imports.
//!
//! ## Flow
//!
//! ```text
//! collector ──forward(identity, payload)──▶ ShardRouter::route
//!                                             └─▶ EvidenceTransport::transfer
//!                                                   └─▶ accepted == len(payload) ?
//! importer  ──forward_local(identity, payload)────────┘ (no shard lookup)
//! ```
//!
//! A transfer either succeeds byte-exact or fails. There is no retry and no
//! queueing here; the caller decides whether and when to re-send.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::shard_router::ShardRouter;
use crate::domain::dispatch::{DispatchError, EvidenceTransport};
use crate::domain::identity::AgentIdentity;
use crate::domain::shard::{ShardId, WorkerAddress};

pub struct EvidenceRelay {
    router: Arc<ShardRouter>,
    transport: Arc<dyn EvidenceTransport>,
    local_worker: WorkerAddress,
}

impl EvidenceRelay {
    pub fn new(
        router: Arc<ShardRouter>,
        transport: Arc<dyn EvidenceTransport>,
        local_worker: WorkerAddress,
    ) -> Self {
        Self {
            router,
            transport,
            local_worker,
        }
    }

    pub fn router(&self) -> &Arc<ShardRouter> {
        &self.router
    }

    pub fn local_worker(&self) -> &WorkerAddress {
        &self.local_worker
    }

    /// Deliver `payload` to the worker owning `identity`'s shard.
    ///
    /// Returns the accepted byte count, which always equals `payload.len()`.
    pub async fn forward(&self, identity: &AgentIdentity, payload: Bytes) -> Result<u64, DispatchError> {
        let (shard, worker) = self.router.route(identity).inspect_err(|e| {
            warn!(identity = %identity, error = %e, "Cannot route evidence");
            record_failure(e);
        })?;

        info!("Assigned worker for {} is {} ({})", identity, shard, worker);

        self.deliver(Some(shard), &worker, identity, payload).await
    }

    /// Deliver `payload` to the co-located worker, bypassing shard lookup.
    pub async fn forward_local(&self, identity: &AgentIdentity, payload: Bytes) -> Result<u64, DispatchError> {
        let worker = self.local_worker.clone();
        self.deliver(None, &worker, identity, payload).await
    }

    async fn deliver(
        &self,
        shard: Option<ShardId>,
        worker: &WorkerAddress,
        identity: &AgentIdentity,
        payload: Bytes,
    ) -> Result<u64, DispatchError> {
        let sent = payload.len() as u64;
        let key = identity.key();

        debug!(
            "Sending evidence of agent {} ({} bytes) to worker {}",
            key, sent, worker
        );

        let accepted = match self.transport.transfer(worker, &key, payload).await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(identity = %identity, worker = %worker, error = %e, "Cannot send evidence to worker");
                record_failure(&e);
                return Err(e);
            }
        };

        if accepted != sent {
            let e = DispatchError::IntegrityMismatch {
                endpoint: worker.to_string(),
                sent,
                accepted,
            };
            error!(
                identity = %identity,
                shard = ?shard.map(|s| s.0),
                worker = %worker,
                sent,
                accepted,
                "Worker accepted a different byte count than was sent"
            );
            record_failure(&e);
            return Err(e);
        }

        metrics::counter!("evidence_relay_forwarded_bytes_total").increment(sent);
        Ok(accepted)
    }
}

fn record_failure(error: &DispatchError) {
    metrics::counter!("evidence_relay_failures_total", "kind" => error.kind()).increment(1);
}
