// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the dispatcher CLI

pub mod config;
pub mod route;

pub use self::config::ConfigCommand;
