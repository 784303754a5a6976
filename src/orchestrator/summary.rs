// file: src/orchestrator/summary.rs
// version: 1.0.0
// guid: 2c8f5a17-e6b3-4d90-a1c4-96d07b3e2f58

//! Installation report and its console rendering

use crate::{
    cluster::{NodeInfo, ServiceCluster},
    components::ComponentCatalog,
    machine::Machine,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;
use uuid::Uuid;

/// One row of the components table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentRow {
    pub name: String,
    pub ports: String,
    /// Replica count, or the status error
    pub replicas: String,
}

/// Everything a successful run produced
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub session_id: Uuid,
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub core_machines: Vec<Machine>,
    pub apps_machines: Vec<Machine>,
    pub manager: Option<NodeInfo>,
    pub target_label: String,
    pub target_url: Option<String>,
    pub cluster_nodes: Vec<NodeInfo>,
    /// Set when membership could not be read for the summary
    pub cluster_error: Option<String>,
    pub components: Vec<ComponentRow>,
    pub registered_hosts: Vec<String>,
    pub warnings: Vec<String>,
}

impl InstallReport {
    pub fn new(name: &str, target_label: &str) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            name: name.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            core_machines: Vec::new(),
            apps_machines: Vec::new(),
            manager: None,
            target_label: target_label.to_string(),
            target_url: None,
            cluster_nodes: Vec::new(),
            cluster_error: None,
            components: Vec::new(),
            registered_hosts: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Query the cluster for the overview tables. Status errors end up in
    /// the tables, they never fail the run.
    pub async fn collect_status(&mut self, cluster: &dyn ServiceCluster, catalog: &ComponentCatalog) {
        match cluster.cluster_info().await {
            Ok(nodes) => self.cluster_nodes = nodes,
            Err(e) => self.cluster_error = Some(format!("failed to retrieve cluster info: {}", e)),
        }

        self.components = Vec::with_capacity(catalog.len());
        for component in catalog.iter() {
            let row = match component.status(cluster).await {
                Ok(info) => ComponentRow {
                    name: component.name().to_string(),
                    ports: info.ports.join(","),
                    replicas: info.replicas.to_string(),
                },
                Err(e) => ComponentRow {
                    name: component.name().to_string(),
                    ports: "?".to_string(),
                    replicas: e.to_string(),
                },
            };
            self.components.push(row);
        }
    }

    /// Plain text overview, one table per section
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "--- Installation Overview ---");
        let _ = writeln!(out, "Core Hosts:");
        let _ = writeln!(out, "{:<20} {:<12} {:<8}", "IP", "State", "Manager");
        let _ = writeln!(out, "{:-<42}", "");
        match &self.cluster_error {
            Some(e) => {
                let _ = writeln!(out, "{}", e);
            }
            None => {
                for node in &self.cluster_nodes {
                    let _ = writeln!(
                        out,
                        "{:<20} {:<12} {:<8}",
                        node.address, node.state, node.is_manager
                    );
                }
            }
        }

        let _ = writeln!(out, "\nCore Components:");
        let _ = writeln!(out, "{:<16} {:<16} {:<10}", "Component", "Ports", "Replicas");
        let _ = writeln!(out, "{:-<44}", "");
        for row in &self.components {
            let _ = writeln!(out, "{:<16} {:<16} {:<10}", row.name, row.ports, row.replicas);
        }

        let _ = writeln!(out, "\nApps Hosts:");
        let _ = writeln!(out, "{:<24} {:<16} {:<16}", "Name", "Address", "Private Address");
        let _ = writeln!(out, "{:-<58}", "");
        for machine in &self.apps_machines {
            let _ = writeln!(
                out,
                "{:<24} {:<16} {:<16}",
                machine.name, machine.ip, machine.private_ip
            );
        }

        if let Some(url) = &self.target_url {
            let _ = writeln!(out, "\nTarget {} registered at {}", self.target_label, url);
        }

        out
    }
}
