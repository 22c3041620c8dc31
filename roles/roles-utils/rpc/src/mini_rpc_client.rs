use futures::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper::{
    body::Bytes,
    header::{AUTHORIZATION, CONTENT_TYPE},
    Request,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::{json, Value};
use std::{fmt, io};
use tracing::{debug, warn};

use crate::{endpoint::Endpoint, JsonRpcError, JsonRpcRequest, JsonRpcResult, APPLICATION_ERROR};

/// Every outbound request carries the same id. Calls are independent, each one gets its own
/// request object and its own HTTP exchange.
const REQUEST_ID: u64 = 1;

/// Seam between the merge-mining logic and the daemons it talks to.
pub trait RpcApi: Send + Sync {
    /// Call `method` with positional `params`, returning the decoded `result` member.
    fn call<'a>(
        &'a self,
        method: &'a str,
        params: Vec<Value>,
    ) -> BoxFuture<'a, Result<Value, RpcError>>;
}

#[derive(Clone, Debug)]
pub struct MiniRpcClient {
    client: Client<HttpConnector, Full<Bytes>>,
    endpoint: Endpoint,
}

impl MiniRpcClient {
    pub fn new(endpoint: Endpoint) -> MiniRpcClient {
        let client: Client<_, Full<Bytes>> = Client::builder(TokioExecutor::new()).build_http();
        MiniRpcClient { client, endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn send_json_rpc_request(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let request = JsonRpcRequest::new(method, params, json!(REQUEST_ID));
        let request_body =
            serde_json::to_vec(&request).map_err(|e| RpcError::Serialization(e.to_string()))?;

        let mut builder = Request::builder()
            .method("POST")
            .uri(self.endpoint.uri().clone())
            .header(CONTENT_TYPE, "text/json");
        if let Some(auth) = self.endpoint.auth() {
            builder = builder.header(AUTHORIZATION, auth.basic_header());
        }
        let req = builder
            .body(Full::<Bytes>::from(request_body))
            .map_err(|e| RpcError::Http(e.to_string()))?;

        debug!("Calling `{}` on {}", method, self.endpoint);
        let response = self.client.request(req).await.map_err(|e| {
            if is_connection_refused(&e) {
                RpcError::BackendUnavailable {
                    host: self.endpoint.host().to_string(),
                }
            } else {
                RpcError::Http(e.to_string())
            }
        })?;

        // Daemons answer RPC errors with non-2xx statuses; the body is decoded either way.
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| RpcError::Http(e.to_string()))?
            .to_bytes();
        if !status.is_success() {
            debug!("{} answered `{}` with status {}", self.endpoint, method, status);
        }

        let decoded = decode_response(&body)?;
        if decoded.id != json!(REQUEST_ID) {
            return Err(RpcError::IdMismatch {
                expected: json!(REQUEST_ID),
                received: decoded.id,
            });
        }
        if let Some(error) = decoded.error {
            warn!(
                "{} returned an error for `{}`: {}",
                self.endpoint, method, error
            );
            return Err(RpcError::JsonRpc(error));
        }
        Ok(decoded.result.unwrap_or(Value::Null))
    }
}

impl RpcApi for MiniRpcClient {
    fn call<'a>(
        &'a self,
        method: &'a str,
        params: Vec<Value>,
    ) -> BoxFuture<'a, Result<Value, RpcError>> {
        Box::pin(self.send_json_rpc_request(method, params))
    }
}

/// A response must be an object carrying at least one of `result` or `error`.
fn decode_response(body: &[u8]) -> Result<JsonRpcResult<Value>, RpcError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| RpcError::Deserialization(e.to_string()))?;
    let is_response = value
        .as_object()
        .is_some_and(|o| o.contains_key("result") || o.contains_key("error"));
    if !is_response {
        return Err(RpcError::Deserialization(format!(
            "not a JSON-RPC response: {value}"
        )));
    }
    serde_json::from_value(value).map_err(|e| RpcError::Deserialization(e.to_string()))
}

fn is_connection_refused(error: &hyper_util::client::legacy::Error) -> bool {
    if !error.is_connect() {
        return false;
    }
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            if io_error.kind() == io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

#[derive(Debug, Clone, PartialEq)]
pub enum RpcError {
    /// The daemon answered with an `error` object.
    JsonRpc(JsonRpcError),
    /// The daemon refused the connection.
    BackendUnavailable { host: String },
    IdMismatch { expected: Value, received: Value },
    Deserialization(String),
    Serialization(String),
    Http(String),
}

impl RpcError {
    /// Structured form handed back to the worker. Upstream errors keep their code, message and
    /// data; everything else becomes an application error.
    pub fn to_json_rpc_error(&self) -> JsonRpcError {
        match self {
            RpcError::JsonRpc(error) => error.clone(),
            RpcError::BackendUnavailable { host } => JsonRpcError::backend_unavailable(host),
            other => JsonRpcError::new(APPLICATION_ERROR, other.to_string()),
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RpcError::*;
        match self {
            JsonRpc(e) => write!(f, "Upstream RPC error: {e}"),
            BackendUnavailable { host } => write!(f, "Could not connect to backend `{host}`"),
            IdMismatch { expected, received } => {
                write!(f, "Response id mismatch: expected {expected}, got {received}")
            }
            Deserialization(e) => write!(f, "Malformed upstream response: {e}"),
            Serialization(e) => write!(f, "Failed to encode request: {e}"),
            Http(e) => write!(f, "HTTP transport error: {e}"),
        }
    }
}

impl std::error::Error for RpcError {}

impl From<JsonRpcError> for RpcError {
    fn from(error: JsonRpcError) -> Self {
        Self::JsonRpc(error)
    }
}
