// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dispatcher HTTP server
//!
//! Wires the configuration manifest into the core services, serves the API and
//! reloads the shard map on `SIGHUP`.

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{lookup_host, TcpListener};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use dispatcher_core::{
    application::{EvidenceRelay, ShardRouter, SyncStateMachine},
    domain::{clock::SystemClock, config::DispatcherConfigManifest},
    infrastructure::{
        event_bus::EventBus,
        notifications::QueuedNotificationSink,
        position::position_resolver,
        repositories::{InMemoryEvidenceStore, InMemoryHierarchyStore},
        transport::HttpEvidenceTransport,
    },
    presentation::api::{app, AppState},
};

/// Grace period for queued notifications after the listener stops.
const NOTIFICATION_DRAIN: Duration = Duration::from_secs(5);

/// Core services assembled from a manifest.
pub struct Dispatcher {
    pub app: Router,
    pub router: Arc<ShardRouter>,
    pub notifications: JoinHandle<()>,
}

/// Build the services and HTTP app described by `manifest`.
///
/// Must run inside a tokio runtime: the notification delivery task is spawned here.
pub fn build(manifest: &DispatcherConfigManifest) -> Result<Dispatcher> {
    let router = Arc::new(ShardRouter::new(
        manifest.shard_map().context("Invalid shard map")?,
    ));
    let transport = Arc::new(
        HttpEvidenceTransport::new(&manifest.spec.relay).context("Failed to build relay client")?,
    );
    let relay = Arc::new(EvidenceRelay::new(
        router.clone(),
        transport,
        manifest.local_worker(),
    ));

    let event_bus = EventBus::default();
    let (sink, notifications) = QueuedNotificationSink::spawn(
        Arc::new(event_bus.clone()),
        manifest.spec.notifications.queue_capacity,
    );

    let sync = Arc::new(SyncStateMachine::new(
        Arc::new(InMemoryHierarchyStore::new()),
        Arc::new(InMemoryEvidenceStore::new()),
        position_resolver(&manifest.spec.position).context("Failed to build position resolver")?,
        Arc::new(sink),
        Arc::new(SystemClock),
    ));

    Ok(Dispatcher {
        app: app(AppState::new(relay, sync, event_bus)),
        router,
        notifications,
    })
}

pub async fn start_server(config_path: Option<PathBuf>, bind: &str) -> Result<()> {
    let manifest = DispatcherConfigManifest::load_or_default(config_path.clone())
        .context("Failed to load configuration")?;

    manifest
        .validate()
        .context("Configuration validation failed")?;

    info!(
        "Configuration loaded: name={}, shards={}, workers={}",
        manifest.metadata.name,
        manifest.spec.shards.count,
        manifest.spec.shards.workers.len()
    );

    if let Some(port) = manifest.spec.observability.metrics_port {
        install_metrics_exporter(bind, port).await?;
    }

    let Dispatcher {
        app,
        router,
        notifications,
    } = build(&manifest)?;

    #[cfg(unix)]
    let reloader = tokio::spawn(reload_on_hangup(
        router.clone(),
        config_path.or_else(DispatcherConfigManifest::discover_config),
    ));

    let addr = format!("{}:{}", bind, manifest.spec.listening_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Dispatcher listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Dispatcher shutting down");

    #[cfg(unix)]
    reloader.abort();
    drop(router);

    if tokio::time::timeout(NOTIFICATION_DRAIN, notifications).await.is_err() {
        warn!("Notification queue not drained before shutdown");
    }

    Ok(())
}

async fn install_metrics_exporter(bind: &str, port: u16) -> Result<()> {
    let addr = metrics_address(bind, port).await?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!("Prometheus metrics exposed on {}", addr);
    Ok(())
}

/// Resolve the exporter address. `bind` may be an IP or a hostname.
async fn metrics_address(bind: &str, port: u16) -> Result<SocketAddr> {
    lookup_host((bind, port))
        .await
        .with_context(|| format!("Cannot resolve metrics address {}:{}", bind, port))?
        .next()
        .with_context(|| format!("No address found for {}:{}", bind, port))
}

/// Re-read `path` and swap the shard map in `router`.
pub fn reload_shard_map(router: &ShardRouter, path: &Path) -> Result<()> {
    let mut manifest = DispatcherConfigManifest::from_yaml_file(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    manifest.apply_env_overrides();
    manifest.validate().context("Configuration validation failed")?;

    router.reload(manifest.shard_map()?)?;
    Ok(())
}

#[cfg(unix)]
async fn reload_on_hangup(router: Arc<ShardRouter>, path: Option<PathBuf>) {
    let mut hangup = match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Cannot install SIGHUP handler, shard map reload disabled: {}", e);
            return;
        }
    };

    while hangup.recv().await.is_some() {
        let Some(path) = path.as_deref() else {
            warn!("Received SIGHUP but no configuration file is in use");
            continue;
        };

        info!("Received SIGHUP, reloading shard map from {}", path.display());
        if let Err(e) = reload_shard_map(&router, path) {
            error!("Shard map reload failed, keeping current map: {:#}", e);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
