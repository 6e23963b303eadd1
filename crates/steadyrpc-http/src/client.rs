//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! One network attempt per `send`. HTTP status codes are carried into
//! [`TransportError::Http`] so the classifier can act on 429/502/503/504;
//! reqwest timeouts map to [`TransportError::Timeout`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use steadyrpc_core::error::TransportError;
use steadyrpc_core::health::Endpoint;
use steadyrpc_core::request::{JsonRpcRequest, JsonRpcResponse};
use steadyrpc_core::resilient::{ResilientConfig, ResilientTransport};
use steadyrpc_core::transport::RpcTransport;

/// Configuration for [`HttpRpcClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Single-endpoint HTTP JSON-RPC client.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            request_timeout: config.request_timeout,
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, HttpClientConfig::default())
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        ms: self.request_timeout.as_millis() as u64,
                    }
                } else {
                    TransportError::Http {
                        status: None,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(url = %self.url, status = status.as_u16(), "non-success HTTP status");
            return Err(TransportError::Http {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| TransportError::Deserialization(e.to_string()))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Build a [`ResilientTransport`] with one HTTP client per URL.
pub fn resilient_from_urls<I, S>(
    urls: I,
    http_config: HttpClientConfig,
    config: ResilientConfig,
) -> Result<ResilientTransport, TransportError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut slots: Vec<(Endpoint, Arc<dyn RpcTransport>)> = Vec::new();
    for url in urls {
        let url = url.into();
        let client = HttpRpcClient::new(url.clone(), http_config.clone())?;
        slots.push((Endpoint::new(url), Arc::new(client)));
    }
    ResilientTransport::new(slots, config)
}
