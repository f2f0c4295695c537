// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Evidence records derived by the dispatcher itself.
//!
//! The evidence store and its query surface are external; the only record this
//! crate creates is the `ip` evidence written when a sync session starts,
//! owned by the target and authored by the agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::hierarchy::{AgentId, TargetId};
use crate::domain::position::GeoData;

pub const IP_EVIDENCE_TYPE: &str = "ip";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceId(pub Uuid);

impl std::fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: EvidenceId,
    pub target: TargetId,
    pub agent: AgentId,
    #[serde(rename = "type")]
    pub evidence_type: String,
    /// Acquisition time.
    pub acquired_at: DateTime<Utc>,
    /// Reception time.
    pub received_at: DateTime<Utc>,
    pub data: Map<String, Value>,
}

impl Evidence {
    /// Build the `ip` evidence for a session opened from `address`.
    ///
    /// The id is derived from `(agent, sync_time, address)` so a replayed start
    /// upserts the same record instead of adding a second one.
    pub fn sync_address(
        target: TargetId,
        agent: AgentId,
        sync_time: DateTime<Utc>,
        address: &str,
        position: Option<GeoData>,
        now: DateTime<Utc>,
    ) -> Self {
        let seed = format!("{}:{}:{}", agent, sync_time.timestamp(), address);
        let id = EvidenceId(Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()));

        let mut data = Map::new();
        data.insert("content".to_string(), Value::String(address.to_string()));
        if let Some(Value::Object(geo)) = position.and_then(|p| serde_json::to_value(p).ok()) {
            data.extend(geo);
        }

        Self {
            id,
            target,
            agent,
            evidence_type: IP_EVIDENCE_TYPE.to_string(),
            acquired_at: now,
            received_at: now,
            data,
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.data.get("content").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sync_address_merges_position() {
        let target = TargetId::new();
        let agent = AgentId::new();
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let geo = GeoData {
            latitude: 45.46,
            longitude: 9.19,
            accuracy: Some(5000.0),
            city: Some("Milan".to_string()),
            country: None,
        };

        let evidence = Evidence::sync_address(target, agent, at, "10.0.0.5", Some(geo), at);

        assert_eq!(evidence.evidence_type, "ip");
        assert_eq!(evidence.content(), Some("10.0.0.5"));
        assert_eq!(evidence.data["city"], "Milan");
        assert!(!evidence.data.contains_key("country"));
    }

    #[test]
    fn test_id_is_stable_for_the_same_sync() {
        let target = TargetId::new();
        let agent = AgentId::new();
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        let first = Evidence::sync_address(target, agent, at, "10.0.0.5", None, at);
        let replay = Evidence::sync_address(target, agent, at, "10.0.0.5", None, Utc::now());
        let next = Evidence::sync_address(target, agent, at + chrono::Duration::seconds(1), "10.0.0.5", None, at);

        assert_eq!(first.id, replay.id);
        assert_ne!(first.id, next.id);
        assert_eq!(first.data.len(), 1);
    }
}
