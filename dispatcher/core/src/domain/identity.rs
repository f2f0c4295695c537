// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Identity
//!
//! An [`AgentIdentity`] addresses one running agent process on one device.
//! It is the routing key for evidence and the path key (`"{ident}:{instance}"`)
//! used when forwarding payloads to a worker.
//!
//! ## Wire Key
//!
//! ```text
//! RCS_0000000042:4f2a9c0d1e
//! └── ident ───┘ └instance┘
//!   14 chars      lowercased, opaque
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed width of the build identifier.
pub const IDENT_LEN: usize = 14;

/// Separator between `ident` and `instance` in the wire key.
pub const KEY_SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Malformed agent key: '{0}'")]
    Malformed(String),

    #[error("Agent ident cannot be blank")]
    BlankIdent,

    #[error("Agent instance cannot be blank")]
    BlankInstance,

    #[error("Agent ident must be {expected} characters, got {actual}")]
    InvalidIdentLength { expected: usize, actual: usize },
}

/// Immutable `(ident, instance)` pair. The instance is always stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentIdentity {
    ident: String,
    instance: String,
}

impl AgentIdentity {
    pub fn new(ident: impl Into<String>, instance: impl Into<String>) -> Result<Self, IdentityError> {
        let ident = ident.into();
        let instance = instance.into().to_lowercase();

        if ident.trim().is_empty() {
            return Err(IdentityError::BlankIdent);
        }
        if instance.trim().is_empty() {
            return Err(IdentityError::BlankInstance);
        }

        let actual = ident.chars().count();
        if actual != IDENT_LEN {
            return Err(IdentityError::InvalidIdentLength {
                expected: IDENT_LEN,
                actual,
            });
        }

        Ok(Self { ident, instance })
    }

    /// Parse a wire key of the form `"{ident}:{instance}"`.
    pub fn parse_key(key: &str) -> Result<Self, IdentityError> {
        let (ident, instance) = key
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| IdentityError::Malformed(key.to_string()))?;
        Self::new(ident, instance)
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// The key used on the relay path and by the shard partition function.
    pub fn key(&self) -> String {
        format!("{}{}{}", self.ident, KEY_SEPARATOR, self.instance)
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.ident, KEY_SEPARATOR, self.instance)
    }
}

impl FromStr for AgentIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_key(s)
    }
}

impl TryFrom<String> for AgentIdentity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_key(&value)
    }
}

impl From<AgentIdentity> for String {
    fn from(identity: AgentIdentity) -> Self {
        identity.key()
    }
}
