// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Entities, value objects and the collaborator contracts consumed by the
//! application services.

pub mod identity;
pub mod sync;
pub mod hierarchy;
pub mod evidence;
pub mod shard;
pub mod dispatch;
pub mod repository;
pub mod notification;
pub mod position;
pub mod clock;
pub mod config;
