// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Evidence dispatcher CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Daemon wiring and operator commands over `dispatcher_core`

pub mod daemon;
pub mod commands;
pub mod logging;
