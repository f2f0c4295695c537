// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Layer
//!
//! Services orchestrating the domain: shard routing, evidence relaying and the
//! sync session state machine.

pub mod shard_router;
pub mod evidence_relay;
pub mod sync_state_machine;

pub use evidence_relay::EvidenceRelay;
pub use shard_router::ShardRouter;
pub use sync_state_machine::SyncStateMachine;
