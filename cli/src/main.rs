// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Evidence Dispatcher
//!
//! The `dispatcher` binary fronts the sharded evidence workers.
//!
//! ## Commands
//!
//! - `dispatcher serve` - Run the HTTP dispatcher (relay, import, sync endpoints)
//! - `dispatcher route <ident:instance>...` - Show shard and worker for agent keys
//! - `dispatcher config show|validate|generate` - Configuration management

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use evidence_dispatcher::commands::{self, ConfigCommand};
use evidence_dispatcher::daemon;
use evidence_dispatcher::logging::{init_logging, resolve_log_level};

/// Evidence Dispatcher - route agent evidence to its shard worker
#[derive(Parser)]
#[command(name = "dispatcher")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "DISPATCHER_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Address to bind the HTTP listener to
    #[arg(long, global = true, env = "DISPATCHER_BIND", default_value = "0.0.0.0")]
    bind: String,

    /// Log level (trace, debug, info, warn, error). Defaults to the
    /// configured `observability.log_level`, then `info`.
    #[arg(long, global = true, env = "DISPATCHER_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dispatcher HTTP server
    #[command(name = "serve")]
    Serve,

    /// Resolve shard and worker for agent keys
    #[command(name = "route")]
    Route {
        /// Agent keys in `ident:instance` form
        #[arg(required = true, value_name = "KEY")]
        keys: Vec<String>,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&resolve_log_level(cli.log_level.clone(), cli.config.clone()))?;

    match cli.command {
        Some(Commands::Serve) => {
            info!("Starting evidence dispatcher");
            daemon::start_server(cli.config, &cli.bind).await
        }
        Some(Commands::Route { keys }) => commands::route::handle_command(keys, cli.config).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}
