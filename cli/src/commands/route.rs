// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `dispatcher route <ident:instance>...`
//!
//! Resolves shard and worker for agent keys against the configured shard map
//! without contacting any worker.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use dispatcher_core::application::ShardRouter;
use dispatcher_core::domain::config::DispatcherConfigManifest;
use dispatcher_core::domain::identity::AgentIdentity;

/// One resolved key, as printed.
pub fn describe(router: &ShardRouter, key: &str) -> Result<String> {
    let identity = AgentIdentity::parse_key(key)?;
    let shard = router.shard_id(&identity);
    let worker = match router.address(shard) {
        Ok(address) => address.to_string(),
        Err(_) => "(no worker registered)".to_string(),
    };
    Ok(format!("{}  shard {}  {}", identity, shard, worker))
}

pub async fn handle_command(keys: Vec<String>, config_path: Option<PathBuf>) -> Result<()> {
    let manifest = DispatcherConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    let router = ShardRouter::new(manifest.shard_map().context("Invalid shard map")?);

    println!(
        "{}",
        format!("Routing against {} shards", router.shard_count()).bold()
    );

    let mut failed = false;
    for key in &keys {
        match describe(&router, key) {
            Ok(line) => println!("  {}", line),
            Err(e) => {
                failed = true;
                println!("  {} {}", key.red(), e);
            }
        }
    }

    if failed {
        anyhow::bail!("Some keys could not be parsed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatcher_core::domain::shard::{ShardId, ShardMap, WorkerAddress};
    use std::collections::HashMap;

    #[test]
    fn test_describe_reports_worker_or_gap() {
        let mut workers = HashMap::new();
        workers.insert(ShardId(0), WorkerAddress::new("w0", 442));
        let router = ShardRouter::new(ShardMap::new(1, workers).unwrap());

        let line = describe(&router, "RCS_0000000042:ABC").unwrap();
        assert_eq!(line, "RCS_0000000042:abc  shard 0  w0:442");

        let empty = ShardRouter::new(ShardMap::new(1, HashMap::new()).unwrap());
        assert!(describe(&empty, "RCS_0000000042:abc").unwrap().ends_with("(no worker registered)"));
        assert!(describe(&empty, "not-a-key").is_err());
    }
}
