// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Evidence Dispatch Contracts
//!
//! Error taxonomy and transport abstraction shared by
//! [`crate::application::shard_router::ShardRouter`] and
//! [`crate::application::evidence_relay::EvidenceRelay`].
//!
//! Every variant is local to one transfer. None of them is retried here; the
//! originating collector owns the retry policy and re-sends on failure.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::shard::{ShardId, WorkerAddress};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// No worker address is currently known for the shard. No network call was made.
    #[error("No worker address known for shard {0}")]
    RoutingUnavailable(ShardId),

    /// Transport error or non-success status from the destination worker.
    #[error("Relay to {endpoint} failed: {reason}")]
    RelayFailure {
        endpoint: String,
        status: Option<u16>,
        reason: String,
    },

    /// The worker accepted a different number of bytes than were sent.
    #[error("Integrity mismatch relaying to {endpoint}: sent {sent} bytes, worker accepted {accepted}")]
    IntegrityMismatch {
        endpoint: String,
        sent: u64,
        accepted: u64,
    },
}

impl DispatchError {
    /// Label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::RoutingUnavailable(_) => "routing_unavailable",
            DispatchError::RelayFailure { .. } => "relay_failure",
            DispatchError::IntegrityMismatch { .. } => "integrity_mismatch",
        }
    }

    pub fn failure(endpoint: impl Into<String>, status: Option<u16>, reason: impl Into<String>) -> Self {
        DispatchError::RelayFailure {
            endpoint: endpoint.into(),
            status,
            reason: reason.into(),
        }
    }
}

/// Single blocking transfer of one payload to one worker.
///
/// Implementations report the byte count the worker says it accepted; comparing
/// it with the payload size is the caller's job.
#[async_trait]
pub trait EvidenceTransport: Send + Sync {
    async fn transfer(&self, worker: &WorkerAddress, key: &str, payload: Bytes) -> Result<u64, DispatchError>;
}
