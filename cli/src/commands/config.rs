// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use dispatcher_core::domain::config::DispatcherConfigManifest;

const TEMPLATE: &str = include_str!("../../templates/dispatcher-config.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./dispatcher-config.yaml)
        #[arg(short, long, default_value = "./dispatcher-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = DispatcherConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. DISPATCHER_CONFIG_PATH: {}",
            std::env::var("DISPATCHER_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./dispatcher-config.yaml");
        println!("  4. ~/.dispatcher/config.yaml");
        println!("  5. /etc/dispatcher/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Deployment:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Listening port: {}", config.spec.listening_port);
    println!("  Local worker: {}", config.local_worker());
    println!();

    println!("{}", "Shards:".bold());
    println!("  Count: {}", config.spec.shards.count);
    match config.shard_map() {
        Ok(map) => {
            for (shard, worker) in map.workers() {
                println!("    {} → {}", shard, worker);
            }
            let missing = config.spec.shards.count as usize - map.known_shards();
            if missing > 0 {
                println!("  {}", format!("{} shard(s) without a worker", missing).yellow());
            }
        }
        Err(e) => println!("  {}", format!("Invalid shard map: {}", e).red()),
    }
    println!();

    println!("{}", "Relay:".bold());
    println!("  Scheme: {}", config.spec.relay.scheme);
    println!("  Connect timeout: {}s", config.spec.relay.connect_timeout_secs);
    println!("  Request timeout: {}s", config.spec.relay.request_timeout_secs);
    println!("  Accept invalid certs: {}", config.spec.relay.accept_invalid_certs);
    println!();

    println!("{}", "Side effects:".bold());
    println!("  Notification queue: {}", config.spec.notifications.queue_capacity);
    println!(
        "  Position resolver: {}",
        config.spec.position.endpoint.as_deref().unwrap_or("(none)")
    );
    println!("  Log level: {}", config.spec.observability.log_level);
    if let Some(port) = config.spec.observability.metrics_port {
        println!("  Metrics port: {}", port);
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = DispatcherConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf) -> Result<()> {
    std::fs::write(&output, TEMPLATE)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_valid() {
        let manifest = DispatcherConfigManifest::from_yaml_str(TEMPLATE).unwrap();
        manifest.validate().unwrap();
        assert_eq!(manifest.shard_map().unwrap().known_shards(), 4);
    }

    #[tokio::test]
    async fn test_generate_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatcher-config.yaml");

        generate(path.clone()).await.unwrap();
        validate(Some(path)).await.unwrap();
    }
}
