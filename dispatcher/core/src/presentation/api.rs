// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP API for collectors, importers and consoles.
//!
//! | Route | Caller | Action |
//! |-------|--------|--------|
//! | `GET /health` | ops | liveness plus shard map summary |
//! | `POST /evidence/{ident}:{instance}` | importer | deliver to the local worker |
//! | `POST /evidence/{ident}:{instance}/relay` | collector | deliver to the shard owner |
//! | `GET /evidence/{ident}:{instance}/worker` | collector | `host:port` of the shard owner |
//! | `POST /sync/{start,update,stop,timeout}` | collector, watchdog | lifecycle transition |
//! | `GET /dashboard/events` | console | notification stream (SSE) |

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::application::{EvidenceRelay, SyncStateMachine};
use crate::domain::dispatch::DispatchError;
use crate::domain::hierarchy::AgentId;
use crate::domain::identity::{AgentIdentity, IdentityError};
use crate::domain::sync::{SyncError, SyncEvent, SyncOutcome};
use crate::infrastructure::event_bus::EventBus;

/// Upper bound on a single evidence payload.
pub const MAX_EVIDENCE_BYTES: usize = 64 * 1024 * 1024;

pub struct AppState {
    pub relay: Arc<EvidenceRelay>,
    pub sync: Arc<SyncStateMachine>,
    pub event_bus: EventBus,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(relay: Arc<EvidenceRelay>, sync: Arc<SyncStateMachine>, event_bus: EventBus) -> Self {
        Self {
            relay,
            sync,
            event_bus,
            start_time: Instant::now(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/evidence/{key}", post(import_evidence))
        .route("/evidence/{key}/relay", post(relay_evidence))
        .route("/evidence/{key}/worker", get(worker_address))
        .route("/sync/start", post(sync_start))
        .route("/sync/update", post(sync_update))
        .route("/sync/stop", post(sync_stop))
        .route("/sync/timeout", post(sync_timeout))
        .route("/dashboard/events", get(dashboard_events))
        .layer(DefaultBodyLimit::max(MAX_EVIDENCE_BYTES))
        .with_state(Arc::new(state))
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Evidence payload is empty")]
    EmptyPayload,

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Identity(_) | ApiError::EmptyPayload => StatusCode::CONFLICT,
            ApiError::Dispatch(DispatchError::RoutingUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Dispatch(_) => StatusCode::BAD_GATEWAY,
            ApiError::Sync(SyncError::EntityNotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Sync(SyncError::Repository(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Body of `POST /sync/start` and `POST /sync/update`.
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub bid: AgentId,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub sync_time: DateTime<Utc>,
    pub version: String,
    pub source: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
}

impl SyncRequest {
    fn into_event(self) -> (AgentId, SyncEvent) {
        (
            self.bid,
            SyncEvent {
                sync_time: self.sync_time,
                version: self.version,
                source: self.source,
                user: self.user,
                device: self.device,
            },
        )
    }
}

/// Body of `POST /sync/stop` and `POST /sync/timeout`.
#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    pub bid: AgentId,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let map = state.relay.router().snapshot();
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "shards": map.shard_count(),
        "known_workers": map.known_shards(),
    }))
}

async fn import_evidence(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let identity = AgentIdentity::parse_key(&key)?;
    if body.is_empty() {
        return Err(ApiError::EmptyPayload);
    }
    let bytes = state.relay.forward_local(&identity, body).await?;
    Ok(Json(json!({ "bytes": bytes })))
}

async fn relay_evidence(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let identity = AgentIdentity::parse_key(&key)?;
    if body.is_empty() {
        return Err(ApiError::EmptyPayload);
    }
    let bytes = state.relay.forward(&identity, body).await?;
    Ok(Json(json!({ "bytes": bytes })))
}

async fn worker_address(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<String, ApiError> {
    let identity = AgentIdentity::parse_key(&key)?;
    let (shard, worker) = state.relay.router().route(&identity)?;
    info!("Assigned worker for {} is {} ({})", identity, shard, worker);
    Ok(worker.to_string())
}

fn outcome(outcome: SyncOutcome) -> Json<serde_json::Value> {
    let label = match outcome {
        SyncOutcome::Applied => "applied",
        SyncOutcome::Stale => "stale",
    };
    Json(json!({ "outcome": label }))
}

async fn sync_start(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (agent, event) = request.into_event();
    Ok(outcome(state.sync.start(agent, &event).await?))
}

async fn sync_update(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SyncRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (agent, event) = request.into_event();
    Ok(outcome(state.sync.update(agent, &event).await?))
}

async fn sync_stop(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AgentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(outcome(state.sync.stop(request.bid).await?))
}

async fn sync_timeout(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AgentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(outcome(state.sync.timeout(request.bid).await?))
}

async fn dashboard_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = BroadcastStream::new(state.event_bus.receiver()).filter_map(|message| match message {
        Ok(notification) => Some(Event::default().event(notification.kind()).json_data(&notification)),
        Err(e) => {
            warn!(error = %e, "Dashboard stream lagged");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
