// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end checks: config manifest → router → HTTP transport → worker, and
//! lifecycle events → hierarchy → notification bus.

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use std::sync::Arc;

use dispatcher_core::application::{EvidenceRelay, ShardRouter, SyncStateMachine};
use dispatcher_core::domain::clock::ManualClock;
use dispatcher_core::domain::config::DispatcherConfigManifest;
use dispatcher_core::domain::dispatch::DispatchError;
use dispatcher_core::domain::identity::AgentIdentity;
use dispatcher_core::domain::notification::Notification;
use dispatcher_core::domain::repository::{EvidenceStore, HierarchyStore};
use dispatcher_core::domain::sync::{SyncEvent, SyncLifecycleEvent, SyncStatus};
use dispatcher_core::infrastructure::event_bus::EventBus;
use dispatcher_core::infrastructure::notifications::QueuedNotificationSink;
use dispatcher_core::infrastructure::position::NullPositionResolver;
use dispatcher_core::infrastructure::repositories::{InMemoryEvidenceStore, InMemoryHierarchyStore};
use dispatcher_core::infrastructure::transport::HttpEvidenceTransport;

const KEY: &str = "RCS_0000000042:4f2a9c0d1e";

/// Manifest registering the mock server as the owner of every shard.
fn manifest_for(server: &mockito::Server, shards: u32) -> DispatcherConfigManifest {
    let host_port = server.host_with_port();
    let (host, port) = host_port.rsplit_once(':').unwrap();
    let workers: String = (0..shards)
        .map(|n| format!("      - shard: {n}\n        host: {host}\n        port: {port}\n"))
        .collect();

    let yaml = format!(
        r#"
apiVersion: evidence-dispatcher/v1
kind: DispatcherConfig
metadata:
  name: integration
spec:
  listening_port: 4443
  shards:
    count: {shards}
    workers:
{workers}
  relay:
    scheme: http
    connect_timeout_secs: 2
"#
    );
    let manifest = DispatcherConfigManifest::from_yaml_str(&yaml).unwrap();
    manifest.validate().unwrap();
    manifest
}

fn relay_from(manifest: &DispatcherConfigManifest) -> EvidenceRelay {
    let router = Arc::new(ShardRouter::new(manifest.shard_map().unwrap()));
    let transport = Arc::new(HttpEvidenceTransport::new(&manifest.spec.relay).unwrap());
    EvidenceRelay::new(router, transport, manifest.local_worker())
}

#[tokio::test]
async fn relay_delivers_to_the_configured_worker() {
    let mut server = mockito::Server::new_async().await;
    let worker = server
        .mock("POST", format!("/evidence/{KEY}").as_str())
        .match_body("evidence-bytes")
        .with_status(200)
        .with_body(r#"{"bytes": 14}"#)
        .expect(1)
        .create_async()
        .await;

    let relay = relay_from(&manifest_for(&server, 4));
    let identity = AgentIdentity::parse_key(KEY).unwrap();

    let accepted = relay
        .forward(&identity, Bytes::from_static(b"evidence-bytes"))
        .await
        .unwrap();

    assert_eq!(accepted, 14);
    worker.assert_async().await;
}

#[tokio::test]
async fn relay_flags_short_acknowledgement() {
    let mut server = mockito::Server::new_async().await;
    let _worker = server
        .mock("POST", format!("/evidence/{KEY}").as_str())
        .with_status(200)
        .with_body(r#"{"bytes": 3}"#)
        .create_async()
        .await;

    let relay = relay_from(&manifest_for(&server, 2));
    let identity = AgentIdentity::parse_key(KEY).unwrap();

    let result = relay.forward(&identity, Bytes::from_static(b"evidence-bytes")).await;

    assert!(matches!(
        result,
        Err(DispatchError::IntegrityMismatch { sent: 14, accepted: 3, .. })
    ));
}

#[tokio::test]
async fn reload_redirects_new_transfers() {
    let mut old_server = mockito::Server::new_async().await;
    let mut new_server = mockito::Server::new_async().await;
    let old_worker = old_server
        .mock("POST", format!("/evidence/{KEY}").as_str())
        .with_status(200)
        .with_body(r#"{"bytes": 1}"#)
        .expect(1)
        .create_async()
        .await;
    let new_worker = new_server
        .mock("POST", format!("/evidence/{KEY}").as_str())
        .with_status(200)
        .with_body(r#"{"bytes": 1}"#)
        .expect(1)
        .create_async()
        .await;

    let relay = relay_from(&manifest_for(&old_server, 4));
    let identity = AgentIdentity::parse_key(KEY).unwrap();
    relay.forward(&identity, Bytes::from_static(b"x")).await.unwrap();

    relay
        .router()
        .reload(manifest_for(&new_server, 4).shard_map().unwrap())
        .unwrap();
    relay.forward(&identity, Bytes::from_static(b"x")).await.unwrap();

    old_worker.assert_async().await;
    new_worker.assert_async().await;
}

#[tokio::test]
async fn sync_session_reaches_the_dashboard_bus() {
    let store = InMemoryHierarchyStore::new();
    let evidence = InMemoryEvidenceStore::new();
    let identity = AgentIdentity::parse_key(KEY).unwrap();
    let (agent_id, target_id, operation_id) = store.seed("op", "target", "agent", identity);

    let bus = EventBus::new(64);
    let mut receiver = bus.subscribe();
    let (sink, delivery) = QueuedNotificationSink::spawn(Arc::new(bus.clone()), 64);
    let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_600, 0).unwrap()));

    let machine = SyncStateMachine::new(
        Arc::new(store.clone()),
        Arc::new(evidence.clone()),
        Arc::new(NullPositionResolver),
        Arc::new(sink),
        clock,
    );

    let event = SyncEvent {
        sync_time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        version: "1.0".to_string(),
        source: "10.0.0.5".to_string(),
        user: None,
        device: None,
    };
    machine.start(agent_id, &event).await.unwrap();
    machine.start(agent_id, &event).await.unwrap();
    machine.stop(agent_id).await.unwrap();
    drop(machine);
    delivery.await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(notification) = receiver.try_recv() {
        if let Notification::Lifecycle(SyncLifecycleEvent::SyncStopped { stopped_at, .. }) = &notification {
            assert_eq!(*stopped_at, Utc.timestamp_opt(1_700_000_600, 0).unwrap());
        }
        kinds.push(notification.kind());
    }
    assert_eq!(
        kinds,
        vec![
            "lifecycle", "sync_alert", "dashboard",
            "lifecycle", "sync_alert", "dashboard",
            "lifecycle", "dashboard",
        ]
    );

    let agent = store.find_agent(agent_id).await.unwrap().unwrap();
    assert_eq!(agent.stat.last_sync_status, SyncStatus::Idle);
    let target = store.find_target(target_id).await.unwrap().unwrap();
    assert_eq!(target.stat.last_child, vec![agent_id]);
    let operation = store.find_operation(operation_id).await.unwrap().unwrap();
    assert_eq!(operation.stat.last_child, vec![target_id]);
    assert_eq!(evidence.find_by_target(target_id, Some("ip")).await.unwrap().len(), 1);
}
