// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Shard Router
//!
//! Maps an [`AgentIdentity`] to its [`ShardId`] and the shard to its current
//! worker address.
//!
//! - `shard_id` is a pure function of the identity and the fixed shard count.
//! - `address` reads the *current* registry on every call; relocations become
//!   visible through [`ShardRouter::reload`], which swaps the whole map at once.
//! - The router never retries. An unknown address is `RoutingUnavailable`.

use parking_lot::RwLock;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::dispatch::DispatchError;
use crate::domain::identity::AgentIdentity;
use crate::domain::shard::{ShardId, ShardMap, ShardMapError, WorkerAddress};

pub struct ShardRouter {
    shard_count: NonZeroU32,
    map: RwLock<Arc<ShardMap>>,
}

impl ShardRouter {
    pub fn new(map: ShardMap) -> Self {
        Self {
            shard_count: map.partitions(),
            map: RwLock::new(Arc::new(map)),
        }
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count.get()
    }

    pub fn shard_id(&self, identity: &AgentIdentity) -> ShardId {
        ShardId::for_identity(identity, self.shard_count)
    }

    pub fn address(&self, shard: ShardId) -> Result<WorkerAddress, DispatchError> {
        let map = self.snapshot();
        map.address(shard)
            .cloned()
            .ok_or(DispatchError::RoutingUnavailable(shard))
    }

    /// Shard and current worker for `identity`.
    pub fn route(&self, identity: &AgentIdentity) -> Result<(ShardId, WorkerAddress), DispatchError> {
        let shard = self.shard_id(identity);
        let address = self.address(shard)?;
        debug!(identity = %identity, shard = %shard, worker = %address, "Resolved worker");
        Ok((shard, address))
    }

    /// Replace the registry atomically. The shard count cannot change here.
    pub fn reload(&self, map: ShardMap) -> Result<(), ShardMapError> {
        if map.shard_count() != self.shard_count.get() {
            return Err(ShardMapError::CountChanged {
                current: self.shard_count.get(),
                requested: map.shard_count(),
            });
        }
        let known = map.known_shards();
        *self.map.write() = Arc::new(map);
        info!(shards = self.shard_count.get(), known, "Shard map reloaded");
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<ShardMap> {
        self.map.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn identity() -> AgentIdentity {
        AgentIdentity::new("RCS_0000000042", "4f2a9c0d1e").unwrap()
    }

    fn full_map(count: u32, host_prefix: &str) -> ShardMap {
        let workers = (0..count)
            .map(|n| (ShardId(n), WorkerAddress::new(format!("{host_prefix}{n}"), 442)))
            .collect();
        ShardMap::new(count, workers).unwrap()
    }

    #[test]
    fn test_route_resolves_owner() {
        let router = ShardRouter::new(full_map(8, "worker-"));
        let (shard, address) = router.route(&identity()).unwrap();

        assert_eq!(shard, router.shard_id(&identity()));
        assert_eq!(address.host, format!("worker-{}", shard.0));
    }

    #[test]
    fn test_unknown_address_is_routing_unavailable() {
        let router = ShardRouter::new(ShardMap::new(8, HashMap::new()).unwrap());
        let shard = router.shard_id(&identity());

        assert_eq!(
            router.route(&identity()),
            Err(DispatchError::RoutingUnavailable(shard))
        );
    }

    #[test]
    fn test_reload_moves_address_but_not_shard() {
        let router = ShardRouter::new(full_map(8, "old-"));
        let shard = router.shard_id(&identity());

        router.reload(full_map(8, "new-")).unwrap();

        assert_eq!(router.shard_id(&identity()), shard);
        assert_eq!(router.address(shard).unwrap().host, format!("new-{}", shard.0));
    }

    #[test]
    fn test_reload_rejects_count_change() {
        let router = ShardRouter::new(full_map(8, "w-"));
        assert_eq!(
            router.reload(full_map(4, "w-")),
            Err(ShardMapError::CountChanged { current: 8, requested: 4 })
        );
        assert_eq!(router.snapshot().shard_count(), 8);
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let router = ShardRouter::new(full_map(2, "old-"));
        let before = router.snapshot();
        router.reload(full_map(2, "new-")).unwrap();

        assert_eq!(before.address(ShardId(0)).unwrap().host, "old-0");
        assert_eq!(router.snapshot().address(ShardId(0)).unwrap().host, "new-0");
    }
}
