// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Position resolution from a network address.
//!
//! The resolver is an external black box; an empty answer is a normal outcome
//! (private ranges, unknown blocks, resolver down) and never an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoData {
    pub latitude: f64,
    pub longitude: f64,

    /// Radius in meters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[async_trait]
pub trait PositionResolver: Send + Sync {
    async fn resolve(&self, address: &str) -> Option<GeoData>;
}
