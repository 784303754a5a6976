// file: src/cluster/mod.rs
// version: 1.0.0
// guid: 5d18c7a2-93fe-4e06-b4a1-2c7f0e9d83b5

//! Cluster formation over provisioned machines

pub mod swarm;

pub use swarm::{SwarmCluster, SwarmDriver};

use crate::{error::InstallError, machine::Machine, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// One member of a formed cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub address: String,
    pub state: String,
    pub is_manager: bool,
}

/// Published port of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub published: u16,
    pub target: u16,
}

/// Everything needed to run a component as a cluster service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub image: String,
    pub replicas: u32,
    pub network: String,
    pub ports: Vec<PortMapping>,
    pub env: BTreeMap<String, String>,
    pub args: Vec<String>,
}

/// Deployed state of a service
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceInfo {
    pub ports: Vec<String>,
    pub replicas: u32,
}

/// A formed cluster able to run platform components
#[async_trait::async_trait]
pub trait ServiceCluster: Send + Sync {
    /// Current membership
    async fn cluster_info(&self) -> Result<Vec<NodeInfo>>;

    /// The elected manager
    fn manager(&self) -> &NodeInfo;

    /// Run a service on the cluster
    async fn run_component(&self, spec: &ServiceSpec) -> Result<()>;

    /// Query a running service
    async fn component_status(&self, name: &str) -> Result<ServiceInfo>;

    /// Release the cluster handle
    async fn close(&self) -> Result<()>;
}

/// Clustering technology that joins machines together.
///
/// The manager is picked among the first `manager_candidates` machines,
/// in order; every other machine joins as a worker.
#[async_trait::async_trait]
pub trait ClusterDriver: Send + Sync {
    async fn create_cluster(
        &self,
        machines: &[Machine],
        manager_candidates: usize,
    ) -> Result<Box<dyn ServiceCluster>>;
}

/// Join `machines` into one cluster with exactly one manager.
///
/// Every failure, including a cluster that comes up with the wrong shape,
/// is reported as a `ClusterError`. No retries.
pub async fn form(
    driver: &dyn ClusterDriver,
    machines: &[Machine],
    manager_candidates: usize,
) -> Result<Box<dyn ServiceCluster>> {
    if machines.is_empty() {
        return Err(InstallError::cluster("no machines to form a cluster"));
    }
    if manager_candidates == 0 || manager_candidates > machines.len() {
        return Err(InstallError::cluster(format!(
            "manager candidates must be between 1 and {}, got {}",
            machines.len(),
            manager_candidates
        )));
    }

    let cluster = driver
        .create_cluster(machines, manager_candidates)
        .await
        .map_err(as_cluster_error)?;

    if let Err(e) = check_membership(cluster.as_ref(), machines.len()).await {
        if let Err(close_err) = cluster.close().await {
            warn!("Failed to close malformed cluster: {}", close_err);
        }
        return Err(e);
    }

    info!(
        "Cluster formed with {} members, manager at {}",
        machines.len(),
        cluster.manager().address
    );
    Ok(cluster)
}

async fn check_membership(cluster: &dyn ServiceCluster, expected: usize) -> Result<()> {
    let nodes = cluster.cluster_info().await.map_err(as_cluster_error)?;

    let managers = nodes.iter().filter(|n| n.is_manager).count();
    if managers != 1 {
        return Err(InstallError::cluster(format!(
            "expected exactly one manager, found {}",
            managers
        )));
    }
    if nodes.len() != expected {
        return Err(InstallError::cluster(format!(
            "expected {} cluster members, found {}",
            expected,
            nodes.len()
        )));
    }
    Ok(())
}

fn as_cluster_error(e: InstallError) -> InstallError {
    match e {
        already @ InstallError::ClusterError(_) => already,
        other => InstallError::cluster(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeClusterDriver, FakeProvisioner};
    use crate::machine::provision_machines;
    use crate::config::HostOptions;

    async fn machines(count: usize) -> Vec<Machine> {
        let provisioner = FakeProvisioner::new("core");
        provision_machines(&provisioner, count, &HostOptions::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_form_single_manager() -> Result<()> {
        let machines = machines(3).await;
        let driver = FakeClusterDriver::new();
        let cluster = form(&driver, &machines, 3).await?;

        let nodes = cluster.cluster_info().await?;
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes.iter().filter(|n| n.is_manager).count(), 1);
        assert_eq!(cluster.manager().address, machines[0].ip);
        Ok(())
    }

    #[tokio::test]
    async fn test_form_wraps_driver_failure() {
        let machines = machines(2).await;
        let driver = FakeClusterDriver::new().failing();
        let result = form(&driver, &machines, 2).await;
        assert!(matches!(result, Err(InstallError::ClusterError(_))));
    }

    #[tokio::test]
    async fn test_form_rejects_two_managers() {
        let machines = machines(2).await;
        let driver = FakeClusterDriver::new().with_extra_manager();
        let result = form(&driver, &machines, 2).await;

        assert!(matches!(result, Err(InstallError::ClusterError(_))));
        assert!(driver.log().contains(&"close".to_string()));
    }

    #[tokio::test]
    async fn test_form_rejects_bad_candidates() {
        let machines = machines(2).await;
        let driver = FakeClusterDriver::new();

        assert!(form(&driver, &machines, 0).await.is_err());
        assert!(form(&driver, &machines, 3).await.is_err());
        assert!(form(&driver, &[], 1).await.is_err());
    }
}
