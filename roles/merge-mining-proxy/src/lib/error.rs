//! ## Error Module
//!
//! Defines [`ProxyError`], the error enum used throughout the merge-mining proxy.
//!
//! It unifies errors from:
//! - I/O operations (binding the worker listener)
//! - Upstream RPC calls ([`RpcError`])
//! - Configuration and startup validation
//! - Merge-mining data handling (hex, targets, proofs, templates)
//!
//! A [`ProxyError`] raised while serving `getwork` is turned into a [`MethodError`] so the
//! worker always receives a parseable JSON-RPC error.
use rpc_mm::{EndpointError, JsonRpcError, MethodError, RpcError};
use std::fmt;

pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Debug)]
pub enum ProxyError {
    Io(std::io::Error),
    Rpc(RpcError),
    Json(serde_json::Error),
    InvalidEndpoint { url: String, reason: EndpointError },
    InvalidListenAddress(String),
    /// Only a single auxiliary chain is supported.
    UnsupportedAuxCount(usize),
    InvalidParams(String),
    InvalidHex(hex::FromHexError),
    InvalidTarget(String),
    MalformedAuxBlock(String),
    MalformedTemplate(String),
    MalformedProof(String),
    BadConfig(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ProxyError::*;
        match self {
            Io(e) => write!(f, "I/O error: `{e}`"),
            Rpc(e) => write!(f, "{e}"),
            Json(e) => write!(f, "JSON error: `{e}`"),
            InvalidEndpoint { url, reason } => write!(f, "Invalid endpoint url `{url}`: {reason}"),
            InvalidListenAddress(addr) => write!(f, "Invalid listen address `{addr}`"),
            UnsupportedAuxCount(n) => {
                write!(f, "Exactly one auxiliary chain is supported, {n} configured")
            }
            InvalidParams(e) => write!(f, "Invalid params: {e}"),
            InvalidHex(e) => write!(f, "Invalid hex: {e}"),
            InvalidTarget(e) => write!(f, "Invalid target: {e}"),
            MalformedAuxBlock(e) => write!(f, "Malformed auxiliary block: {e}"),
            MalformedTemplate(e) => write!(f, "Malformed work template: {e}"),
            MalformedProof(e) => write!(f, "Malformed auxiliary proof: {e}"),
            BadConfig(e) => write!(f, "Bad configuration: {e}"),
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<std::io::Error> for ProxyError {
    fn from(e: std::io::Error) -> ProxyError {
        ProxyError::Io(e)
    }
}

impl From<RpcError> for ProxyError {
    fn from(e: RpcError) -> ProxyError {
        ProxyError::Rpc(e)
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(e: serde_json::Error) -> ProxyError {
        ProxyError::Json(e)
    }
}

impl From<hex::FromHexError> for ProxyError {
    fn from(e: hex::FromHexError) -> ProxyError {
        ProxyError::InvalidHex(e)
    }
}

impl From<ProxyError> for MethodError {
    fn from(e: ProxyError) -> MethodError {
        match e {
            ProxyError::Rpc(e) => e.into(),
            ProxyError::InvalidParams(reason) => {
                MethodError::Rpc(JsonRpcError::invalid_params(reason))
            }
            other => MethodError::Application(other.to_string()),
        }
    }
}
