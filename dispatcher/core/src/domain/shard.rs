// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Shards
//!
//! Agent identities are partitioned across a fixed number of shards, each owned
//! by one worker process.
//!
//! ## Partition Function
//!
//! `shard = u64_be(sha256("{ident}:{instance}")[0..8]) mod shard_count`
//!
//! The assignment must be identical in every collector process and across
//! restarts, so `std::hash` hashers are not usable here. The shard count is fixed
//! configuration; changing it reassigns identities and requires a coordinated
//! rebalance.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU32;

use crate::domain::identity::AgentIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(pub u32);

impl ShardId {
    /// Deterministic shard for `identity` among `shard_count` shards.
    pub fn for_identity(identity: &AgentIdentity, shard_count: NonZeroU32) -> Self {
        let digest = Sha256::digest(identity.key().as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let bucket = u64::from_be_bytes(prefix) % u64::from(shard_count.get());
        // bucket < shard_count <= u32::MAX
        Self(bucket as u32)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network location of a worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerAddress {
    pub host: String,
    pub port: u16,
}

impl WorkerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for WorkerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShardMapError {
    #[error("Shard count must be greater than zero")]
    ZeroShards,

    #[error("Shard {shard} is out of range for {count} shards")]
    OutOfRange { shard: ShardId, count: u32 },

    #[error("Shard count is fixed at {current}; reload requested {requested}")]
    CountChanged { current: u32, requested: u32 },
}

/// Shard count plus the currently known worker for each shard.
///
/// A shard without an entry is a valid state (worker relocating, not yet
/// registered); routing to it fails with `RoutingUnavailable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardMap {
    shard_count: NonZeroU32,
    workers: HashMap<ShardId, WorkerAddress>,
}

impl ShardMap {
    pub fn new(shard_count: u32, workers: HashMap<ShardId, WorkerAddress>) -> Result<Self, ShardMapError> {
        let count = NonZeroU32::new(shard_count).ok_or(ShardMapError::ZeroShards)?;
        if let Some(shard) = workers.keys().find(|s| s.0 >= shard_count) {
            return Err(ShardMapError::OutOfRange {
                shard: *shard,
                count: shard_count,
            });
        }
        Ok(Self {
            shard_count: count,
            workers,
        })
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count.get()
    }

    pub fn partitions(&self) -> NonZeroU32 {
        self.shard_count
    }

    pub fn address(&self, shard: ShardId) -> Option<&WorkerAddress> {
        self.workers.get(&shard)
    }

    pub fn shard_for(&self, identity: &AgentIdentity) -> ShardId {
        ShardId::for_identity(identity, self.shard_count)
    }

    pub fn known_shards(&self) -> usize {
        self.workers.len()
    }

    /// Workers ordered by shard id.
    pub fn workers(&self) -> Vec<(ShardId, &WorkerAddress)> {
        let mut workers: Vec<_> = self.workers.iter().map(|(s, a)| (*s, a)).collect();
        workers.sort_by_key(|(shard, _)| *shard);
        workers
    }
}
