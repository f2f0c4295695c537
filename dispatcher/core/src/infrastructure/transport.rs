// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP Evidence Transport
//!
//! Delivers one payload to one worker as a single `POST`.
//!
//! # Wire Format
//!
//! ```text
//! POST {scheme}://{host}:{port}/evidence/{ident}:{instance}
//! Connection: keep-alive
//! Keep-Alive: {keep_alive_secs}
//!
//! <raw payload>
//!
//! 200 OK
//! {"bytes": <accepted>}
//! ```
//!
//! Any other status, a connect failure or an unreadable body is a
//! `RelayFailure`. The connect phase is bounded by `connect_timeout_secs` and
//! the whole exchange by `request_timeout_secs`.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::domain::config::RelayConfig;
use crate::domain::dispatch::{DispatchError, EvidenceTransport};
use crate::domain::shard::WorkerAddress;

#[derive(Debug, Deserialize)]
struct AcceptedBytes {
    bytes: u64,
}

pub struct HttpEvidenceTransport {
    client: Client,
    scheme: String,
}

impl HttpEvidenceTransport {
    pub fn new(config: &RelayConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            "keep-alive",
            HeaderValue::from_str(&config.keep_alive_secs.to_string())?,
        );

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .pool_idle_timeout(config.keep_alive())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            scheme: config.scheme.clone(),
        })
    }

    fn url(&self, worker: &WorkerAddress, key: &str) -> String {
        format!("{}://{}/evidence/{}", self.scheme, worker, key)
    }
}

#[async_trait]
impl EvidenceTransport for HttpEvidenceTransport {
    async fn transfer(&self, worker: &WorkerAddress, key: &str, payload: Bytes) -> Result<u64, DispatchError> {
        let url = self.url(worker, key);
        let endpoint = worker.to_string();

        let response = self
            .client
            .post(&url)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_connect() {
                    format!("connect error: {}", e)
                } else if e.is_timeout() {
                    format!("timed out: {}", e)
                } else {
                    e.to_string()
                };
                DispatchError::failure(endpoint.clone(), None, reason)
            })?;

        match response.status() {
            StatusCode::OK => {
                let accepted: AcceptedBytes = response.json().await.map_err(|e| {
                    DispatchError::failure(
                        endpoint.clone(),
                        Some(StatusCode::OK.as_u16()),
                        format!("invalid response body: {}", e),
                    )
                })?;
                debug!(worker = %endpoint, accepted = accepted.bytes, "Worker acknowledged evidence");
                Ok(accepted.bytes)
            }
            status => Err(DispatchError::failure(
                endpoint,
                Some(status.as_u16()),
                format!("{} error", status.as_u16()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;
    use tokio::net::TcpListener;

    fn transport() -> HttpEvidenceTransport {
        let config = RelayConfig {
            scheme: "http".to_string(),
            ..RelayConfig::default()
        };
        HttpEvidenceTransport::new(&config).unwrap()
    }

    fn worker_of(server: &mockito::Server) -> WorkerAddress {
        let host_port = server.host_with_port();
        let (host, port) = host_port.rsplit_once(':').unwrap();
        WorkerAddress::new(host, port.parse().unwrap())
    }

    #[tokio::test]
    async fn test_transfer_posts_payload_to_keyed_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/evidence/RCS_0000000042:4f2a9c0d1e")
            .match_header("connection", "keep-alive")
            .match_header("keep-alive", "60")
            .match_body("payload")
            .with_status(200)
            .with_body(r#"{"bytes": 7}"#)
            .create_async()
            .await;

        let accepted = transport()
            .transfer(&worker_of(&server), "RCS_0000000042:4f2a9c0d1e", Bytes::from_static(b"payload"))
            .await
            .unwrap();

        assert_eq!(accepted, 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_ok_status_is_relay_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/evidence/RCS_0000000042:abc")
            .with_status(500)
            .create_async()
            .await;

        let result = transport()
            .transfer(&worker_of(&server), "RCS_0000000042:abc", Bytes::from_static(b"x"))
            .await;

        assert!(matches!(result, Err(DispatchError::RelayFailure { status: Some(500), .. })));
    }

    #[tokio::test]
    async fn test_unreadable_body_is_relay_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/evidence/RCS_0000000042:abc")
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let result = transport()
            .transfer(&worker_of(&server), "RCS_0000000042:abc", Bytes::from_static(b"x"))
            .await;

        assert!(matches!(result, Err(DispatchError::RelayFailure { status: Some(200), .. })));
    }

    #[tokio::test]
    async fn test_unreachable_worker_is_relay_failure() {
        let worker = WorkerAddress::new("127.0.0.1", 1);

        let result = transport()
            .transfer(&worker, "RCS_0000000042:abc", Bytes::from_static(b"x"))
            .await;

        assert!(matches!(result, Err(DispatchError::RelayFailure { status: None, .. })));
    }

    #[tokio::test]
    async fn test_silent_worker_is_bounded_by_request_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let config = RelayConfig {
            scheme: "http".to_string(),
            connect_timeout_secs: 1,
            request_timeout_secs: 1,
            ..RelayConfig::default()
        };
        let transport = HttpEvidenceTransport::new(&config).unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            transport.transfer(
                &WorkerAddress::new("127.0.0.1", port),
                "RCS_0000000042:abc",
                Bytes::from_static(b"x"),
            ),
        )
        .await
        .expect("transfer must give up on a silent worker");

        match result {
            Err(DispatchError::RelayFailure { status: None, reason, .. }) => {
                assert!(reason.starts_with("timed out"), "unexpected reason: {}", reason)
            }
            other => panic!("expected a timeout failure, got {:?}", other),
        }
    }
}
