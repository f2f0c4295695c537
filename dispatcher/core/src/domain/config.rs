// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Dispatcher Configuration
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - Listening port and the derived local worker port
// - Shard count and shard → worker registry
// - Relay transport settings (connect timeout, TLS verification)
// - Notification queue sizing
// - Position resolver endpoint
// - Observability settings

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::shard::{ShardId, ShardMap, WorkerAddress};

pub const API_VERSION: &str = "evidence-dispatcher/v1";
pub const KIND: &str = "DispatcherConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfigManifest {
    /// API version (must be "evidence-dispatcher/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "DispatcherConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: DispatcherConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfigSpec {
    /// Public listening port. Workers listen one port below it.
    #[serde(default = "default_listening_port")]
    pub listening_port: u16,

    #[serde(default)]
    pub shards: ShardsConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub position: PositionConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardsConfig {
    /// Fixed number of shards. Changing it reassigns every agent.
    #[serde(default = "default_shard_count")]
    pub count: u32,

    #[serde(default)]
    pub workers: Vec<WorkerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerEntry {
    pub shard: u32,
    pub host: String,

    /// Defaults to the worker port (`listening_port - 1`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound on a whole transfer, including the worker's answer
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Workers are addressed by internal location, not public identity, so
    /// their certificates are not checked against a trust anchor.
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,

    /// Host of the co-located worker used for direct imports
    #[serde(default = "default_local_host")]
    pub local_host: String,

    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Bounded queue size; notifications beyond it are dropped and logged
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionConfig {
    /// Resolver endpoint; resolution is skipped when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_position_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus exporter port; exporter disabled when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

fn default_true() -> bool {
    true
}

fn default_listening_port() -> u16 {
    443
}

fn default_shard_count() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    120
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_local_host() -> String {
    "localhost".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_position_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ShardsConfig {
    fn default() -> Self {
        Self {
            count: default_shard_count(),
            workers: Vec::new(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            scheme: default_scheme(),
            accept_invalid_certs: true,
            local_host: default_local_host(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_position_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_port: None,
        }
    }
}

impl Default for DispatcherConfigSpec {
    fn default() -> Self {
        Self {
            listening_port: default_listening_port(),
            shards: ShardsConfig::default(),
            relay: RelayConfig::default(),
            notifications: NotificationsConfig::default(),
            position: PositionConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Default for DispatcherConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "evidence-dispatcher".to_string(),
                labels: None,
            },
            spec: DispatcherConfigSpec::default(),
        }
    }
}

impl RelayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl DispatcherConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. DISPATCHER_CONFIG_PATH environment variable
    /// 2. ./dispatcher-config.yaml (working directory)
    /// 3. ~/.dispatcher/config.yaml (user home)
    /// 4. /etc/dispatcher/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("DISPATCHER_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./dispatcher-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".dispatcher").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/dispatcher/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DISPATCHER_LISTENING_PORT") {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: DISPATCHER_LISTENING_PORT={}", port);
                    self.spec.listening_port = port;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for DISPATCHER_LISTENING_PORT: '{}'. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("DISPATCHER_CONNECT_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => {
                    tracing::info!("Environment override: DISPATCHER_CONNECT_TIMEOUT_SECS={}", secs);
                    self.spec.relay.connect_timeout_secs = secs;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for DISPATCHER_CONNECT_TIMEOUT_SECS: '{}'. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Port every worker listens on unless a worker entry overrides it.
    pub fn worker_port(&self) -> u16 {
        self.spec.listening_port.saturating_sub(1)
    }

    /// Endpoint of the worker co-located with this process.
    pub fn local_worker(&self) -> WorkerAddress {
        WorkerAddress::new(self.spec.relay.local_host.clone(), self.worker_port())
    }

    /// Build the shard map from the worker registry.
    pub fn shard_map(&self) -> anyhow::Result<ShardMap> {
        let port = self.worker_port();
        let workers = self
            .spec
            .shards
            .workers
            .iter()
            .map(|w| (ShardId(w.shard), WorkerAddress::new(w.host.clone(), w.port.unwrap_or(port))))
            .collect();
        Ok(ShardMap::new(self.spec.shards.count, workers)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        // the worker port is derived from it
        if self.spec.listening_port < 2 {
            anyhow::bail!("spec.listening_port must be at least 2");
        }

        if self.spec.shards.count == 0 {
            anyhow::bail!("spec.shards.count must be greater than zero");
        }

        let mut seen = HashSet::new();
        for worker in &self.spec.shards.workers {
            if worker.shard >= self.spec.shards.count {
                anyhow::bail!(
                    "Worker shard {} is out of range for {} shards",
                    worker.shard,
                    self.spec.shards.count
                );
            }
            if !seen.insert(worker.shard) {
                anyhow::bail!("Duplicate worker entry for shard {}", worker.shard);
            }
            if worker.host.is_empty() {
                anyhow::bail!("Worker host cannot be empty for shard {}", worker.shard);
            }
        }

        if self.spec.relay.connect_timeout_secs == 0 {
            anyhow::bail!("spec.relay.connect_timeout_secs must be greater than zero");
        }

        if self.spec.relay.request_timeout_secs < self.spec.relay.connect_timeout_secs {
            anyhow::bail!("spec.relay.request_timeout_secs cannot be below connect_timeout_secs");
        }

        if !matches!(self.spec.relay.scheme.as_str(), "http" | "https") {
            anyhow::bail!("spec.relay.scheme must be 'http' or 'https'");
        }

        if self.spec.notifications.queue_capacity == 0 {
            anyhow::bail!("spec.notifications.queue_capacity must be greater than zero");
        }

        Ok(())
    }
}
