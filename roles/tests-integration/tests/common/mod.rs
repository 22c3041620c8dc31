//! Upstream daemon doubles and helpers shared by the integration tests.
//!
//! The doubles are real HTTP JSON-RPC servers built on [`Dispatcher`] and [`RpcServer`], so the
//! proxy talks to them through its normal client.
use merge_mining_proxy::{
    config::MergeMiningProxyConfig,
    report::{SolveRecord, SolveReporter},
    MergeMiningProxy,
};
use once_cell::sync::Lazy;
use rpc_mm::{
    Dispatcher, JsonRpcError, MethodError, MiniRpcClient, RpcApi, RpcError, RpcServer,
};
use serde_json::Value;
use std::{
    collections::{HashMap, HashSet, VecDeque},
    net::{SocketAddr, TcpListener},
    sync::{Arc, Mutex},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::oneshot,
};

// prevents closed_port from ever returning the same port twice
static UNIQUE_PORTS: Lazy<Mutex<HashSet<u16>>> = Lazy::new(|| Mutex::new(HashSet::new()));

pub type Reply = Result<Value, JsonRpcError>;
pub type CallLog = Arc<Mutex<Vec<(String, Vec<Value>)>>>;

/// Scripted chain daemon. Each method answers from its own queue, in order.
pub struct MockChain {
    addr: SocketAddr,
    calls: CallLog,
    _shutdown: oneshot::Sender<()>,
}

impl MockChain {
    pub async fn start(script: Vec<(&str, Reply)>) -> Self {
        let mut queues: HashMap<String, VecDeque<Reply>> = HashMap::new();
        for (method, reply) in script {
            queues.entry(method.to_string()).or_default().push_back(reply);
        }
        let calls: CallLog = Default::default();

        let mut dispatcher = Dispatcher::new();
        for (method, queue) in queues {
            let queue = Arc::new(Mutex::new(queue));
            let calls = calls.clone();
            let name = method.clone();
            dispatcher.register_sync(method, move |params| {
                calls.lock().unwrap().push((name.clone(), params));
                match queue.lock().unwrap().pop_front() {
                    Some(Ok(result)) => Ok(result),
                    Some(Err(e)) => Err(MethodError::Rpc(e)),
                    None => Err(MethodError::Application(format!("`{name}` not scripted"))),
                }
            });
        }

        let server = RpcServer::bind(localhost(0), dispatcher).await.unwrap();
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(server.serve_with_shutdown(async {
            let _ = shutdown_rx.await;
        }));
        Self {
            addr,
            calls,
            _shutdown: shutdown_tx,
        }
    }

    /// Daemon url with credentials, as an operator would configure it.
    pub fn url(&self) -> String {
        format!("http://rpcuser:rpcpass@{}/", self.addr)
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct RecordingReporter(Mutex<Vec<SolveRecord>>);

impl SolveReporter for RecordingReporter {
    fn report(&self, record: &SolveRecord) {
        self.0.lock().unwrap().push(record.clone());
    }
}

impl RecordingReporter {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|r| r.to_string()).collect()
    }
}

/// A running proxy and a worker client pointed at it.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub reporter: Arc<RecordingReporter>,
    worker: MiniRpcClient,
}

impl TestProxy {
    pub async fn start(parent_url: String, aux_url: String) -> Self {
        let config =
            MergeMiningProxyConfig::new("127.0.0.1".to_string(), 0, parent_url, vec![aux_url]);
        let reporter = Arc::new(RecordingReporter::default());
        let server = MergeMiningProxy::with_reporter(config, reporter.clone())
            .bind()
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.serve());
        let worker = MiniRpcClient::new(format!("http://{addr}/").parse().unwrap());
        Self {
            addr,
            reporter,
            worker,
        }
    }

    pub async fn getwork(&self, params: Vec<Value>) -> Result<Value, RpcError> {
        self.worker.call("getwork", params).await
    }

    /// Posts `body` as is and returns the status code and the response body.
    pub async fn post_raw(&self, body: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        let request = format!(
            "POST / HTTP/1.1\r\nHost: {}\r\nContent-Type: text/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.addr,
            body.len(),
            body
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        let status = response
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap();
        let body = response
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        (status, body)
    }
}

pub fn localhost(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// A port nothing listens on.
pub fn closed_port() -> u16 {
    let mut used = UNIQUE_PORTS.lock().unwrap();
    loop {
        let port = TcpListener::bind(localhost(0))
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        if used.insert(port) {
            return port;
        }
    }
}
