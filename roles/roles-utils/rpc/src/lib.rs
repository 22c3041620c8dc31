//! JSON-RPC over HTTP plumbing for the merge-mining proxy.
//!
//! The crate has two halves:
//! - [`mini_rpc_client`]: a small client that calls one upstream chain daemon
//!   ([`Endpoint`]) and decodes its answer into either a result or a structured
//!   [`JsonRpcError`].
//! - [`dispatcher`] and [`server`]: an HTTP listener that decodes inbound envelopes and routes
//!   them to handlers registered by name.
//!
//! Both halves share the envelope types and reserved error codes defined here.
pub mod dispatcher;
pub mod endpoint;
pub mod mini_rpc_client;
pub mod server;

pub use dispatcher::{Dispatcher, MethodError};
pub use endpoint::{Auth, Endpoint, EndpointError};
pub use hyper::Uri;
pub use mini_rpc_client::{MiniRpcClient, RpcApi, RpcError};
pub use server::RpcServer;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

pub const JSONRPC_VERSION: &str = "2.0";

/// Invalid JSON was received by the server.
pub const PARSE_ERROR: i64 = -32700;
/// The JSON sent is not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist or is not available.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Application error, also used when an upstream daemon cannot be reached.
pub const APPLICATION_ERROR: i64 = -32099;

pub const BACKEND_UNAVAILABLE_MESSAGE: &str = "Could not connect to backend";

/// Error object carried in the `error` member of a response.
///
/// `data` is always text on the wire. Upstream daemons that put structured values in `data`
/// get them flattened to their JSON representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, deserialize_with = "data_as_text")]
    pub data: String,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: String::new(),
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = data.into();
        self
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request").with_data(reason)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found").with_data(method)
    }

    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, "Invalid params").with_data(reason)
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self::new(APPLICATION_ERROR, message)
    }

    /// Error reported when an upstream actively refuses the connection. `host` names the
    /// unreachable endpoint.
    pub fn backend_unavailable(host: impl Into<String>) -> Self {
        Self::new(APPLICATION_ERROR, BACKEND_UNAVAILABLE_MESSAGE).with_data(host)
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.data.is_empty() {
            write!(f, "[{}] {}", self.code, self.message)
        } else {
            write!(f, "[{}] {} ({})", self.code, self.message, self.data)
        }
    }
}

impl std::error::Error for JsonRpcError {}

fn data_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(data)) => data,
        Some(other) => other.to_string(),
    })
}

/// Outbound request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: Value,
}

impl JsonRpcRequest {
    pub fn new(method: &str, params: Vec<Value>, id: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.to_string(),
            params,
            id,
        }
    }
}

/// Response envelope written by the server. `result` and `error` are both always serialized,
/// the unused one as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub result: Value,
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Value::Null,
            error: Some(error),
        }
    }
}

/// Response envelope as read by the client.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResult<T> {
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Value,
}
