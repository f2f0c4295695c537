// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Position resolvers.
//!
//! `HttpPositionResolver` asks an external geolocation service:
//! `GET {endpoint}?ip={address}` answering a `GeoData` JSON document. Every
//! failure degrades to "no position"; sync transitions never wait on an error.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::config::PositionConfig;
use crate::domain::position::{GeoData, PositionResolver};

pub struct HttpPositionResolver {
    client: Client,
    endpoint: String,
}

impl HttpPositionResolver {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl PositionResolver for HttpPositionResolver {
    async fn resolve(&self, address: &str) -> Option<GeoData> {
        let response = match self
            .client
            .get(&self.endpoint)
            .query(&[("ip", address)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(address, error = %e, "Position resolver unreachable");
                return None;
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<GeoData>().await {
                Ok(geo) => Some(geo),
                Err(e) => {
                    warn!(address, error = %e, "Position resolver returned an invalid body");
                    None
                }
            },
            StatusCode::NOT_FOUND | StatusCode::NO_CONTENT => {
                debug!(address, "No position known for address");
                None
            }
            status => {
                warn!(address, status = status.as_u16(), "Position resolver failed");
                None
            }
        }
    }
}

/// Resolver used when no geolocation service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPositionResolver;

#[async_trait]
impl PositionResolver for NullPositionResolver {
    async fn resolve(&self, _address: &str) -> Option<GeoData> {
        None
    }
}

/// Pick the resolver for `config`.
pub fn position_resolver(config: &PositionConfig) -> anyhow::Result<Arc<dyn PositionResolver>> {
    let resolver: Arc<dyn PositionResolver> = match &config.endpoint {
        Some(endpoint) => Arc::new(HttpPositionResolver::new(
            endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        )?),
        None => Arc::new(NullPositionResolver),
    };
    Ok(resolver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn resolver(server: &mockito::Server) -> HttpPositionResolver {
        HttpPositionResolver::new(format!("{}/geo", server.url()), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_geo_data() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/geo")
            .match_query(Matcher::UrlEncoded("ip".into(), "10.0.0.5".into()))
            .with_status(200)
            .with_body(r#"{"latitude": 45.46, "longitude": 9.19, "accuracy": 5000.0}"#)
            .create_async()
            .await;

        let geo = resolver(&server).resolve("10.0.0.5").await.unwrap();

        assert_eq!(geo.latitude, 45.46);
        assert_eq!(geo.accuracy, Some(5000.0));
        assert!(geo.city.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failures_degrade_to_none() {
        let mut server = mockito::Server::new_async().await;
        let _missing = server
            .mock("GET", "/geo")
            .match_query(Matcher::UrlEncoded("ip".into(), "192.168.1.1".into()))
            .with_status(404)
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/geo")
            .match_query(Matcher::UrlEncoded("ip".into(), "10.0.0.9".into()))
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let resolver = resolver(&server);
        assert!(resolver.resolve("192.168.1.1").await.is_none());
        assert!(resolver.resolve("10.0.0.9").await.is_none());
        assert!(NullPositionResolver.resolve("10.0.0.5").await.is_none());
    }

    #[test]
    fn test_selects_resolver_from_config() {
        assert!(position_resolver(&PositionConfig::default()).is_ok());
        let config = PositionConfig {
            endpoint: Some("http://geo.local/lookup".to_string()),
            ..PositionConfig::default()
        };
        assert!(position_resolver(&config).is_ok());
    }
}
