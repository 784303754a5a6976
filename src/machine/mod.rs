// file: src/machine/mod.rs
// version: 1.0.0
// guid: 0b7e4d2c-61a9-4f35-8d0e-5c9a2e71b604

//! Provisioned machines and the provisioner capability

pub mod descriptor;
pub mod docker_machine;
pub mod pool;

pub use descriptor::DriverDescriptor;
pub use docker_machine::DockerMachine;
pub use pool::{provision_machines, select_apps_pool};

use crate::{config::DriverOpts, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle state of a machine as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineState {
    Provisioning,
    Running,
    Unreachable,
    Deleted,
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioning => write!(f, "provisioning"),
            Self::Running => write!(f, "running"),
            Self::Unreachable => write!(f, "unreachable"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// A host brought up by a provisioner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    /// Stable machine name, unique per provisioner storage
    pub name: String,
    pub driver_name: String,
    /// Opaque driver state, persisted verbatim on registration
    pub driver: serde_json::Value,
    /// Public / management address
    pub ip: String,
    /// Address on the private network shared by the fleet
    pub private_ip: String,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub ssh_key_path: PathBuf,
    /// Directory holding ca.pem and ca-key.pem
    pub ca_path: PathBuf,
    pub state: MachineState,
}

/// Infrastructure driver able to create and destroy machines.
///
/// Handles are used by a single run at a time and must be closed on every
/// exit path.
#[async_trait::async_trait]
pub trait MachineProvisioner: Send + Sync {
    /// Create one machine with the given flat option set
    async fn provision_machine(&self, opts: &DriverOpts) -> Result<Machine>;

    /// Destroy every machine this provisioner manages
    async fn delete_all(&self) -> Result<()>;

    /// Release the provisioner handle
    async fn close(&self) -> Result<()>;
}
