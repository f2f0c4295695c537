// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure Layer
//!
//! Adapters for the domain contracts:
//! - **repositories** - in-memory `HierarchyStore` / `EvidenceStore`
//! - **transport** - HTTP delivery of evidence payloads to workers
//! - **position** - HTTP geolocation lookup
//! - **notifications** - bounded fire-and-forget notification queue
//! - **event_bus** - broadcast fan-out feeding the dashboard stream

pub mod repositories;
pub mod transport;
pub mod position;
pub mod notifications;
pub mod event_bus;
