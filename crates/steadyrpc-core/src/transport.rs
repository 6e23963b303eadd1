//! The `RpcTransport` trait — the seam between the resilience layer and a
//! concrete endpoint client.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};

/// A low-level "raw send" against a single logical endpoint.
///
/// The resilient layer wraps one implementation per endpoint and owns all
/// retry, failover and health bookkeeping; implementations should perform
/// exactly one network attempt per `send` call.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and is stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Send a single JSON-RPC request and return the response.
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// The transport's identifier (URL or name).
    fn url(&self) -> &str;

    /// Convenience: call a method and deserialize the result.
    ///
    /// Generic, so only available on concrete clients — `Self: Sized` keeps
    /// the trait usable as `Arc<dyn RpcTransport>`.
    async fn call<T: DeserializeOwned>(
        &self,
        id: u64,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, TransportError>
    where
        Self: Sized,
    {
        let req = JsonRpcRequest::new(id, method, params);
        let resp = self.send(req).await?;
        let result = resp.into_result().map_err(TransportError::Rpc)?;
        Ok(serde_json::from_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RpcId;
    use std::sync::Arc;

    struct EchoTransport;

    #[async_trait]
    impl RpcTransport for EchoTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            Ok(JsonRpcResponse::success(
                req.id,
                Value::String(req.method.clone()),
            ))
        }

        fn url(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn trait_is_usable_as_a_trait_object() {
        let transport: Arc<dyn RpcTransport> = Arc::new(EchoTransport);
        let req = JsonRpcRequest::new(1, "getSlot", vec![]);
        let resp = transport.send(req).await.unwrap();
        assert_eq!(resp.id, RpcId::Number(1));
        assert_eq!(resp.into_result().unwrap(), Value::String("getSlot".into()));
    }

    #[tokio::test]
    async fn call_deserializes_on_a_concrete_client() {
        let client = EchoTransport;
        let method: String = client.call(2, "getHealth", vec![]).await.unwrap();
        assert_eq!(method, "getHealth");
    }
}
