// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Daemon mode implementation
//!
//! Handles:
//! - Service assembly from the configuration manifest
//! - HTTP serving and graceful shutdown
//! - Shard map reload on SIGHUP

pub mod server;

pub use server::start_server;
