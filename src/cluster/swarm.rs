// file: src/cluster/swarm.rs
// version: 1.0.0
// guid: e6a20f48-7b1c-4d93-95e2-0c8d3f6a1b77

//! Docker swarm mode cluster driven over SSH

use super::{ClusterDriver, NodeInfo, ServiceCluster, ServiceInfo, ServiceSpec};
use crate::{
    error::InstallError, machine::Machine, network::RemoteShell, utils::process::shell_quote,
    Result,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SWARM_PORT: u16 = 2377;

const NODE_INSPECT: &str =
    "sudo docker node ls -q | xargs sudo docker node inspect --format '{{.Status.Addr}}|{{.Status.State}}|{{.Spec.Role}}'";

const SERVICE_INSPECT_FORMAT: &str =
    "'{{.Spec.Mode.Replicated.Replicas}}|{{range .Endpoint.Ports}}{{.PublishedPort}},{{end}}'";

/// Forms swarm clusters; the first manager candidate that accepts
/// `swarm init` becomes the manager and every other machine joins as worker
pub struct SwarmDriver {
    shell: Arc<dyn RemoteShell>,
    network: String,
}

impl SwarmDriver {
    pub fn new(shell: Arc<dyn RemoteShell>, network: impl Into<String>) -> Self {
        Self {
            shell,
            network: network.into(),
        }
    }

    /// Initialise the swarm on the first candidate that accepts it
    async fn init_manager<'a>(&self, candidates: &'a [Machine]) -> Result<(usize, &'a Machine)> {
        let mut last_error = None;
        for (index, candidate) in candidates.iter().enumerate() {
            info!("Initializing swarm on {}", candidate.name);
            let init = format!(
                "sudo docker swarm init --advertise-addr {}",
                shell_quote(&candidate.private_ip)
            );
            match self.shell.run(candidate, &init).await {
                Ok(_) => return Ok((index, candidate)),
                Err(e) => {
                    warn!("Swarm init failed on {}: {}", candidate.name, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| InstallError::cluster("no manager candidates")))
    }
}

#[async_trait::async_trait]
impl ClusterDriver for SwarmDriver {
    async fn create_cluster(
        &self,
        machines: &[Machine],
        manager_candidates: usize,
    ) -> Result<Box<dyn ServiceCluster>> {
        if machines.is_empty() {
            return Err(InstallError::cluster("no machines to form a cluster"));
        }
        let candidates = &machines[..manager_candidates.clamp(1, machines.len())];
        let (manager_index, manager) = self.init_manager(candidates).await?;

        self.shell
            .run(
                manager,
                &format!(
                    "sudo docker network create --driver overlay --attachable {}",
                    shell_quote(&self.network)
                ),
            )
            .await?;

        let token = self
            .shell
            .run(manager, "sudo docker swarm join-token -q worker")
            .await?
            .trim()
            .to_string();

        let manager_addr = format!("{}:{}", manager.private_ip, SWARM_PORT);
        let workers = machines
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != manager_index)
            .map(|(_, m)| m);
        for worker in workers {
            info!("Joining {} to the swarm", worker.name);
            self.shell
                .run(
                    worker,
                    &format!(
                        "sudo docker swarm join --token {} {}",
                        shell_quote(&token),
                        shell_quote(&manager_addr)
                    ),
                )
                .await?;
        }

        Ok(Box::new(SwarmCluster {
            manager: manager.clone(),
            manager_node: NodeInfo {
                address: manager.ip.clone(),
                state: "ready".to_string(),
                is_manager: true,
            },
            shell: Arc::clone(&self.shell),
        }))
    }
}

/// Handle over a formed swarm, all calls go through the manager
pub struct SwarmCluster {
    manager: Machine,
    manager_node: NodeInfo,
    shell: Arc<dyn RemoteShell>,
}

#[async_trait::async_trait]
impl ServiceCluster for SwarmCluster {
    async fn cluster_info(&self) -> Result<Vec<NodeInfo>> {
        let out = self.shell.run(&self.manager, NODE_INSPECT).await?;
        parse_nodes(&out)
    }

    fn manager(&self) -> &NodeInfo {
        &self.manager_node
    }

    async fn run_component(&self, spec: &ServiceSpec) -> Result<()> {
        info!("Creating service {} from {}", spec.name, spec.image);
        self.shell
            .run(&self.manager, &service_create_command(spec))
            .await?;
        Ok(())
    }

    async fn component_status(&self, name: &str) -> Result<ServiceInfo> {
        let out = self
            .shell
            .run(
                &self.manager,
                &format!(
                    "sudo docker service inspect --format {} {}",
                    SERVICE_INSPECT_FORMAT,
                    shell_quote(name)
                ),
            )
            .await?;
        parse_service_info(&out)
    }

    async fn close(&self) -> Result<()> {
        debug!("Releasing swarm handle on {}", self.manager.name);
        Ok(())
    }
}

pub(crate) fn service_create_command(spec: &ServiceSpec) -> String {
    let mut parts = vec![
        "sudo docker service create".to_string(),
        format!("--name {}", shell_quote(&spec.name)),
        format!("--network {}", shell_quote(&spec.network)),
        format!("--replicas {}", spec.replicas),
    ];
    for port in &spec.ports {
        parts.push(format!("--publish {}:{}", port.published, port.target));
    }
    for (key, value) in &spec.env {
        parts.push(format!("--env {}", shell_quote(&format!("{}={}", key, value))));
    }
    parts.push(shell_quote(&spec.image));
    parts.extend(spec.args.iter().map(|arg| shell_quote(arg)));
    parts.join(" ")
}

/// Parse `addr|state|role` lines
pub(crate) fn parse_nodes(out: &str) -> Result<Vec<NodeInfo>> {
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split('|').collect();
            match fields.as_slice() {
                [addr, state, role] => Ok(NodeInfo {
                    address: addr.to_string(),
                    state: state.to_string(),
                    is_manager: *role == "manager",
                }),
                _ => Err(InstallError::cluster(format!(
                    "unexpected node description: {}",
                    line
                ))),
            }
        })
        .collect()
}

/// Parse `replicas|port,port,` output
pub(crate) fn parse_service_info(out: &str) -> Result<ServiceInfo> {
    let line = out.trim();
    let (replicas, ports) = line
        .split_once('|')
        .ok_or_else(|| InstallError::cluster(format!("unexpected service status: {}", line)))?;

    let replicas = replicas.trim().parse().map_err(|_| {
        InstallError::cluster(format!("unexpected replica count: {}", replicas))
    })?;
    let ports = ports
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();

    Ok(ServiceInfo { ports, replicas })
}
