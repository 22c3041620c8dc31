pub mod aux_chain;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod report;
pub mod target;

use aux_chain::AuxChains;
use config::MergeMiningProxyConfig;
use coordinator::MergeMiningCoordinator;
use error::ProxyResult;
use report::{SolveReporter, StdoutReporter};
use rpc_mm::{Dispatcher, MiniRpcClient, RpcApi, RpcServer};
use std::sync::Arc;
use tracing::{error, info};

pub use rpc_mm::Endpoint;

/// The merge-mining proxy role: one `getwork` listener in front of a parent and an auxiliary
/// chain daemon.
#[derive(Clone)]
pub struct MergeMiningProxy {
    config: MergeMiningProxyConfig,
    reporter: Arc<dyn SolveReporter>,
}

impl MergeMiningProxy {
    pub fn new(config: MergeMiningProxyConfig) -> Self {
        Self::with_reporter(config, Arc::new(StdoutReporter))
    }

    pub fn with_reporter(config: MergeMiningProxyConfig, reporter: Arc<dyn SolveReporter>) -> Self {
        Self { config, reporter }
    }

    pub fn config(&self) -> &MergeMiningProxyConfig {
        &self.config
    }

    /// Builds the upstream clients. Fails on a bad url or an unsupported number of auxiliary
    /// chains, before anything is bound.
    pub fn coordinator(&self) -> ProxyResult<MergeMiningCoordinator> {
        let parent = MiniRpcClient::new(self.config.parent_endpoint()?);
        info!("Parent chain daemon: {}", parent.endpoint());
        let parent: Arc<dyn RpcApi> = Arc::new(parent);

        let mut aux = Vec::new();
        for endpoint in self.config.aux_endpoints()? {
            let client = MiniRpcClient::new(endpoint);
            info!("Auxiliary chain daemon: {}", client.endpoint());
            let client: Arc<dyn RpcApi> = Arc::new(client);
            aux.push(client);
        }

        Ok(MergeMiningCoordinator::new(
            parent,
            AuxChains::new(aux)?,
            self.reporter.clone(),
        ))
    }

    /// Binds the worker listener with `getwork` registered.
    pub async fn bind(&self) -> ProxyResult<RpcServer> {
        let coordinator = Arc::new(self.coordinator()?);
        let mut dispatcher = Dispatcher::new();
        coordinator.register(&mut dispatcher);

        let server = RpcServer::bind(self.config.listen_socket()?, dispatcher).await?;
        info!("Waiting for getwork requests on {}", server.local_addr()?);
        Ok(server)
    }

    /// Serves the worker until Ctrl-C.
    pub async fn start(&self) -> ProxyResult<()> {
        let server = self.bind().await?;
        server
            .serve_with_shutdown(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => info!("Interrupt received"),
                    Err(e) => {
                        error!("Failed to listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await
                    }
                }
            })
            .await?;
        Ok(())
    }
}
