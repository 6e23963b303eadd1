//! JSON-RPC 2.0 wire types and argument constructors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC request ID — string, number, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(u64),
    String(String),
    Null,
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: RpcId,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: RpcId::Number(id),
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: RpcId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Build a success response for the given id.
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Unwrap the result value, or surface the node-side error object.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

/// Encode a binary argument in the canonical form the transport expects.
///
/// Byte buffers are rendered as `"hex:<lowercase-hex>"` strings so that two
/// buffers with equal content (but distinct identity) serialize identically.
/// Required for read coalescing to recognize duplicate calls.
pub fn bytes_param(bytes: &[u8]) -> Value {
    Value::String(format!("hex:{}", hex::encode(bytes)))
}

/// Encode a big-integer argument as a `"<digits>n"` string.
///
/// Avoids both JSON number precision loss and ambiguity with plain numeric
/// strings when the value feeds into a coalesce key.
pub fn bigint_param(value: i128) -> Value {
    Value::String(format!("{value}n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = JsonRpcRequest::new(1, "getSlot", vec![]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"getSlot\""));
    }

    #[test]
    fn response_into_result_ok() {
        let resp = JsonRpcResponse::success(RpcId::Number(1), Value::from(123_456u64));
        assert_eq!(resp.into_result().unwrap(), Value::from(123_456u64));
    }

    #[test]
    fn response_into_result_error() {
        let resp = JsonRpcResponse {
            jsonrpc: "2.0".into(),
            id: RpcId::Number(1),
            result: None,
            error: Some(JsonRpcError {
                code: -32002,
                message: "Transaction simulation failed".into(),
                data: None,
            }),
        };
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, -32002);
    }

    #[test]
    fn bytes_param_is_lowercase_hex() {
        assert_eq!(
            bytes_param(&[0xDE, 0xAD, 0xBE, 0xEF]),
            Value::String("hex:deadbeef".into())
        );
    }

    #[test]
    fn bigint_param_keeps_sign() {
        assert_eq!(bigint_param(10_000_000_000), Value::String("10000000000n".into()));
        assert_eq!(bigint_param(-7), Value::String("-7n".into()));
    }
}
