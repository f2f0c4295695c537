// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Log level resolution and subscriber setup.
//!
//! Precedence: `RUST_LOG`, then `--log-level` / `DISPATCHER_LOG_LEVEL`, then
//! `spec.observability.log_level` from the configuration file, then `info`.

use anyhow::{Context, Result};
use std::path::PathBuf;

use dispatcher_core::domain::config::DispatcherConfigManifest;

const DEFAULT_LEVEL: &str = "info";

/// Level to use when `RUST_LOG` is unset.
///
/// Runs before the subscriber exists, so an unreadable config file is not
/// reported here; the command that loads it reports the error.
pub fn resolve_log_level(flag: Option<String>, config_path: Option<PathBuf>) -> String {
    flag.or_else(|| configured_log_level(config_path))
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

fn configured_log_level(config_path: Option<PathBuf>) -> Option<String> {
    let path = config_path.or_else(DispatcherConfigManifest::discover_config)?;
    DispatcherConfigManifest::from_yaml_file(path)
        .ok()
        .map(|manifest| manifest.spec.observability.log_level)
}

/// Initialize tracing subscriber for logging
pub fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
apiVersion: evidence-dispatcher/v1
kind: DispatcherConfig
metadata:
  name: logging-test
spec:
  observability:
    log_level: debug
"#;

    #[test]
    fn test_configured_level_applies_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatcher-config.yaml");
        std::fs::write(&path, CONFIG).unwrap();

        assert_eq!(resolve_log_level(None, Some(path.clone())), "debug");
        assert_eq!(resolve_log_level(Some("warn".to_string()), Some(path)), "warn");
    }

    #[test]
    fn test_unreadable_config_falls_back_to_info() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");

        assert_eq!(resolve_log_level(None, Some(missing)), "info");
    }
}
