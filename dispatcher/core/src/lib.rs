// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Evidence Dispatcher Core
//!
//! Routes agent evidence streams to the worker that owns each agent's shard and
//! tracks the synchronization session of every agent instance, cascading status
//! changes up the agent → target → operation hierarchy.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | identities, hierarchy entities, shard map, collaborator traits |
//! | [`application`] | Application | `ShardRouter`, `EvidenceRelay`, `SyncStateMachine` |
//! | [`infrastructure`] | Infrastructure | in-memory stores, HTTP transport, notification queue |
//! | [`presentation`] | Presentation | axum routes for collectors and workers |

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
