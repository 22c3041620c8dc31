//! Method dispatch for inbound JSON-RPC envelopes.
//!
//! A [`Dispatcher`] owns an explicit `name -> handler` registry filled at construction time.
//! [`Dispatcher::dispatch`] takes a raw request body and returns the response envelope to
//! write, or `None` when the request was a notification and nothing must be written.
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::{collections::HashMap, fmt, future::Future, sync::Arc};
use tracing::{debug, warn};

use crate::{JsonRpcError, JsonRpcResponse, APPLICATION_ERROR};

/// Failure returned by a method handler.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodError {
    /// Already in wire form, written back unchanged.
    Rpc(JsonRpcError),
    /// Any other failure. Wrapped as an application error carrying this description.
    Application(String),
}

impl MethodError {
    pub fn into_json_rpc_error(self) -> JsonRpcError {
        match self {
            MethodError::Rpc(error) => error,
            MethodError::Application(message) => JsonRpcError::new(APPLICATION_ERROR, message),
        }
    }
}

impl fmt::Display for MethodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodError::Rpc(e) => write!(f, "{e}"),
            MethodError::Application(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MethodError {}

impl From<JsonRpcError> for MethodError {
    fn from(error: JsonRpcError) -> Self {
        MethodError::Rpc(error)
    }
}

impl From<crate::RpcError> for MethodError {
    fn from(error: crate::RpcError) -> Self {
        MethodError::Rpc(error.to_json_rpc_error())
    }
}

pub type HandlerFuture = BoxFuture<'static, Result<Value, MethodError>>;
type Handler = Arc<dyn Fn(Vec<Value>) -> HandlerFuture + Send + Sync>;

#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
}

/// A request that passed envelope validation. `id` is `None` for notifications; an explicit
/// `"id": null` is kept as `Some(Value::Null)` and answered.
#[derive(Debug)]
struct InboundRequest {
    id: Option<Value>,
    method: String,
    params: Vec<Value>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an asynchronous handler. A later registration under the same name replaces
    /// the earlier one.
    pub fn register<F, Fut>(&mut self, method: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, MethodError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |params| handler(params).boxed());
        self.handlers.insert(method.into(), handler);
        self
    }

    /// Registers a handler that completes without suspending.
    pub fn register_sync<F>(&mut self, method: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> Result<Value, MethodError> + Send + Sync + 'static,
    {
        self.register(method, move |params| future::ready(handler(params)))
    }

    pub async fn dispatch(&self, body: &[u8]) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                debug!("Rejecting unparsable request: {}", e);
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::parse_error(),
                ));
            }
        };
        let request = match validate(value) {
            Ok(request) => request,
            Err(response) => return Some(response),
        };

        let Some(handler) = self.handlers.get(&request.method).cloned() else {
            debug!("Unknown method `{}`", request.method);
            let error = JsonRpcError::method_not_found(&request.method);
            return request.id.map(|id| JsonRpcResponse::failure(id, error));
        };
        let outcome = handler(request.params);

        match request.id {
            None => {
                let method = request.method;
                tokio::spawn(async move {
                    if let Err(e) = outcome.await {
                        warn!("Notification `{}` failed: {}", method, e);
                    }
                });
                None
            }
            Some(id) => Some(match outcome.await {
                Ok(result) => JsonRpcResponse::success(id, result),
                Err(e) => {
                    debug!("`{}` failed: {}", request.method, e);
                    JsonRpcResponse::failure(id, e.into_json_rpc_error())
                }
            }),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.handlers.keys().collect();
        methods.sort();
        f.debug_struct("Dispatcher").field("methods", &methods).finish()
    }
}

fn validate(value: Value) -> Result<InboundRequest, JsonRpcResponse> {
    let Value::Object(mut object) = value else {
        return Err(JsonRpcResponse::failure(
            Value::Null,
            JsonRpcError::invalid_request("request must be an object"),
        ));
    };
    let id = object.remove("id");
    let invalid = |id: Option<Value>, reason: &str| {
        JsonRpcResponse::failure(
            id.unwrap_or(Value::Null),
            JsonRpcError::invalid_request(reason),
        )
    };

    let method = match object.remove("method") {
        Some(Value::String(method)) => method,
        Some(_) => return Err(invalid(id, "`method` must be a string")),
        None => return Err(invalid(id, "missing `method`")),
    };
    let params = match object.remove("params") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(params)) => params,
        Some(_) => return Err(invalid(id, "`params` must be an array")),
    };
    log_extra_members(&mut object);

    Ok(InboundRequest { id, method, params })
}

fn log_extra_members(object: &mut Map<String, Value>) {
    object.remove("jsonrpc");
    if !object.is_empty() {
        debug!("Ignoring extra request members: {:?}", object.keys());
    }
}
