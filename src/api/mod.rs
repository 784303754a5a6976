// file: src/api/mod.rs
// version: 1.0.0
// guid: 6b2d8e07-f4a1-4c93-b58e-0a7c1e3d9f62

//! Platform control API: bootstrap and host registry

pub mod client;

pub use client::{HttpConnector, PlatformClient};

use crate::{config::ComponentsConfig, error::InstallError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Versioned path of the bootstrap call
pub const BOOTSTRAP_PATH: &str = "/1.3/install/bootstrap";

/// Versioned path of the host registry
pub const HOSTS_PATH: &str = "/1.3/install/hosts";

/// Payload of the one-shot bootstrap call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupOptions {
    pub login: String,
    pub password: String,
    /// API URL the call is sent to
    #[serde(skip)]
    pub target: String,
    pub target_name: String,
    /// Worker node addresses known to the platform from the start
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BootstrapResponse {
    pub token: String,
}

/// Connection material of one machine, as submitted to the registry
#[derive(Debug, Clone, PartialEq)]
pub struct HostRecord {
    pub name: String,
    pub driver_name: String,
    /// Opaque driver descriptor
    pub driver: serde_json::Value,
    pub ssh_private_key: String,
    pub ca_cert: String,
    pub ca_private_key: String,
}

impl HostRecord {
    /// Form fields of the registration request
    pub fn form_fields(&self) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![
            ("driver", serde_json::to_string(&self.driver)?),
            ("name", self.name.clone()),
            ("driverName", self.driver_name.clone()),
            ("sshPrivateKey", self.ssh_private_key.clone()),
            ("caCert", self.ca_cert.clone()),
            ("caPrivateKey", self.ca_private_key.clone()),
        ])
    }
}

/// Host as returned by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledHost {
    pub name: String,
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub driver: serde_json::Value,
    #[serde(default)]
    pub ssh_private_key: String,
}

/// Calls the orchestrator and CLI make against a platform API
#[async_trait::async_trait]
pub trait PlatformApi: Send + Sync {
    /// Initialize the API; the returned token authenticates later calls
    async fn bootstrap(&self, opts: &SetupOptions) -> Result<BootstrapResponse>;

    async fn register_host(&self, record: &HostRecord) -> Result<()>;

    async fn list_hosts(&self) -> Result<Vec<InstalledHost>>;

    async fn get_host(&self, name: &str) -> Result<InstalledHost>;
}

/// Opens API handles once the manager address is known
pub trait ApiConnector: Send + Sync {
    fn connect(&self, base_url: &str, token: Option<&str>) -> Result<Arc<dyn PlatformApi>>;
}

/// `http://<manager>:<port>`
pub fn api_url(manager_address: &str, port: u16) -> String {
    format!("http://{}:{}", manager_address, port)
}

/// Bootstrap the freshly installed API on the manager.
///
/// Single attempt; any failure is a `BootstrapError`.
pub async fn bootstrap(
    api: &dyn PlatformApi,
    target: &str,
    config: &ComponentsConfig,
    nodes: Vec<String>,
) -> Result<BootstrapResponse> {
    let opts = SetupOptions {
        login: config.admin_email.clone(),
        password: config.admin_password.clone(),
        target: target.to_string(),
        target_name: config.target_name.clone(),
        nodes,
    };

    info!(
        "Bootstrapping platform API at {} with {} nodes",
        opts.target,
        opts.nodes.len()
    );
    api.bootstrap(&opts)
        .await
        .map_err(|e| InstallError::BootstrapError(format!("{}: {}", opts.target, e)))
}
