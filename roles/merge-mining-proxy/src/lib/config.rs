//! ## Configuration Module
//!
//! Defines [`MergeMiningProxyConfig`], the configuration of the merge-mining proxy.
//!
//! Every field has a default so an empty file, or no file at all, gives a working local setup.
//! Upstream credentials travel in the userinfo part of the daemon urls.
use ext_config::{Config, File, FileFormat};
use rpc_mm::Endpoint;
use serde::Deserialize;
use std::{
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
};

use crate::error::{ProxyError, ProxyResult};

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_WORKER_PORT: u16 = 9992;
pub const DEFAULT_PARENT_URL: &str = "http://pw:un@127.0.0.1:8332/";
pub const DEFAULT_AUX_URL: &str = "http://pw:un@127.0.0.1:8342/";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct MergeMiningProxyConfig {
    #[serde(default = "default_listen_address")]
    listen_address: String,
    #[serde(default = "default_worker_port")]
    worker_port: u16,
    #[serde(default = "default_parent_url")]
    parent_url: String,
    #[serde(default = "default_aux_urls")]
    aux_urls: Vec<String>,
    #[serde(default)]
    log_file: Option<PathBuf>,
}

impl Default for MergeMiningProxyConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            worker_port: default_worker_port(),
            parent_url: default_parent_url(),
            aux_urls: default_aux_urls(),
            log_file: None,
        }
    }
}

impl MergeMiningProxyConfig {
    pub fn new(
        listen_address: String,
        worker_port: u16,
        parent_url: String,
        aux_urls: Vec<String>,
    ) -> Self {
        Self {
            listen_address,
            worker_port,
            parent_url,
            aux_urls,
            log_file: None,
        }
    }

    pub fn from_toml_file(path: &Path) -> ProxyResult<Self> {
        let path = path.to_str().ok_or_else(|| {
            ProxyError::BadConfig(format!("non UTF-8 config path {}", path.display()))
        })?;
        Self::from_source(File::new(path, FileFormat::Toml))
    }

    pub fn from_toml_str(toml: &str) -> ProxyResult<Self> {
        Self::from_source(File::from_str(toml, FileFormat::Toml))
    }

    fn from_source<S>(source: S) -> ProxyResult<Self>
    where
        S: ext_config::Source + Send + Sync + 'static,
    {
        Config::builder()
            .add_source(source)
            .build()
            .and_then(|settings| settings.try_deserialize::<Self>())
            .map_err(|e| ProxyError::BadConfig(e.to_string()))
    }

    pub fn listen_address(&self) -> &str {
        &self.listen_address
    }

    pub fn worker_port(&self) -> u16 {
        self.worker_port
    }

    pub fn parent_url(&self) -> &str {
        &self.parent_url
    }

    pub fn aux_urls(&self) -> &[String] {
        &self.aux_urls
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    pub fn set_listen_address(&mut self, listen_address: String) {
        self.listen_address = listen_address;
    }

    pub fn set_worker_port(&mut self, worker_port: u16) {
        self.worker_port = worker_port;
    }

    pub fn set_parent_url(&mut self, parent_url: String) {
        self.parent_url = parent_url;
    }

    pub fn set_aux_urls(&mut self, aux_urls: Vec<String>) {
        self.aux_urls = aux_urls;
    }

    pub fn set_log_file(&mut self, log_file: Option<PathBuf>) {
        if let Some(path) = log_file {
            self.log_file = Some(path);
        }
    }

    /// Address the worker listener binds to.
    pub fn listen_socket(&self) -> ProxyResult<SocketAddr> {
        let ip: IpAddr = self
            .listen_address
            .parse()
            .map_err(|_| ProxyError::InvalidListenAddress(self.listen_address.clone()))?;
        Ok(SocketAddr::new(ip, self.worker_port))
    }

    pub fn parent_endpoint(&self) -> ProxyResult<Endpoint> {
        parse_endpoint(&self.parent_url)
    }

    /// Parses the auxiliary urls. Exactly one is supported.
    pub fn aux_endpoints(&self) -> ProxyResult<Vec<Endpoint>> {
        if self.aux_urls.len() != 1 {
            return Err(ProxyError::UnsupportedAuxCount(self.aux_urls.len()));
        }
        self.aux_urls.iter().map(|url| parse_endpoint(url)).collect()
    }
}

fn parse_endpoint(url: &str) -> ProxyResult<Endpoint> {
    url.parse().map_err(|reason| ProxyError::InvalidEndpoint {
        url: url.to_string(),
        reason,
    })
}

fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

fn default_worker_port() -> u16 {
    DEFAULT_WORKER_PORT
}

fn default_parent_url() -> String {
    DEFAULT_PARENT_URL.to_string()
}

fn default_aux_urls() -> Vec<String> {
    vec![DEFAULT_AUX_URL.to_string()]
}
