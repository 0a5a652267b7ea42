//! HTTP client for the fleet registry.
//!
//! `GET {base}/servers` returns the roster as a JSON array of identifiers;
//! `GET {base}/{id}` returns one instance's stats object.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use cpxstat_core::config::RegistryConfig;
use cpxstat_core::{InstanceId, MonitorError, MonitorResult, RawInstanceStats, RegistryEndpoint};

use crate::source::MetricsSource;

const USER_AGENT: &str = concat!("cpxstat/", env!("CARGO_PKG_VERSION"));

/// `MetricsSource` backed by the registry's HTTP API.
#[derive(Clone)]
pub struct HttpRegistry {
    endpoint: RegistryEndpoint,
    timeout: Duration,
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl HttpRegistry {
    pub fn new(endpoint: RegistryEndpoint, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            endpoint,
            timeout,
            client,
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(config.endpoint.clone(), config.timeout)
    }

    pub fn endpoint(&self) -> &RegistryEndpoint {
        &self.endpoint
    }

    /// GET `url` and return the body of a 2xx response.
    ///
    /// Connection failures, timeouts and non-2xx statuses are all
    /// `RegistryUnavailable`.
    async fn get(&self, url: &str) -> MonitorResult<Bytes> {
        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri(url)
            .header(http::header::USER_AGENT, USER_AGENT)
            .header(http::header::ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| MonitorError::unavailable(url, e))?;

        let result = tokio::time::timeout(self.timeout, async {
            let resp: http::Response<hyper::body::Incoming> =
                self.client.request(req).await.map_err(|e| {
                    debug!(error = %e, %url, "registry request failed");
                    MonitorError::unavailable(url, e)
                })?;

            let status = resp.status();
            if !status.is_success() {
                debug!(%status, %url, "registry returned non-2xx");
                return Err(MonitorError::unavailable(url, format!("HTTP {status}")));
            }

            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| MonitorError::unavailable(url, e))?;
            Ok::<_, MonitorError>(body.to_bytes())
        })
        .await;

        match result {
            Ok(body) => body,
            Err(_) => {
                debug!(%url, "registry request timed out");
                Err(MonitorError::unavailable(
                    url,
                    format!("timed out after {}ms", self.timeout.as_millis()),
                ))
            }
        }
    }
}

impl MetricsSource for HttpRegistry {
    async fn list_instances(&self) -> MonitorResult<Vec<InstanceId>> {
        let url = self.endpoint.servers_url();
        let body = self.get(&url).await?;
        let roster: Vec<InstanceId> = serde_json::from_slice(&body)
            .map_err(|e| MonitorError::unavailable(&url, format!("invalid roster body: {e}")))?;
        debug!(instances = roster.len(), "fetched roster");
        Ok(roster)
    }

    async fn fetch_instance(&self, id: &str) -> MonitorResult<RawInstanceStats> {
        let url = self.endpoint.instance_url(id);
        let body = self.get(&url).await?;
        serde_json::from_slice(&body).map_err(|e| MonitorError::malformed(id, "body", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_port_is_unavailable() {
        let endpoint = RegistryEndpoint::parse("http://127.0.0.1:1").unwrap();
        let registry = HttpRegistry::new(endpoint, Duration::from_millis(500));

        let err = registry.list_instances().await.unwrap_err();
        match err {
            MonitorError::RegistryUnavailable { url, .. } => {
                assert_eq!(url, "http://127.0.0.1:1/servers");
            }
            other => panic!("expected RegistryUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn user_agent_carries_version() {
        assert!(USER_AGENT.starts_with("cpxstat/"));
    }
}
