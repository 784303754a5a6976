// file: src/components/catalog.rs
// version: 1.0.0
// guid: 8f4c0a96-1d2e-4b7f-a5c3-6e90d2b1f847

//! Built-in platform components

use super::{Component, ComponentCatalog};
use crate::{
    cluster::{PortMapping, ServiceCluster, ServiceInfo, ServiceSpec},
    config::ComponentsConfig,
    Result,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Port the API listens on inside its container
const API_CONTAINER_PORT: u16 = 8080;

type EnvBuilder = fn(&ComponentsConfig) -> BTreeMap<String, String>;
type PortsBuilder = fn(&ComponentsConfig) -> Vec<PortMapping>;

/// A component deployed as a single cluster service
pub struct ServiceComponent {
    name: &'static str,
    image: &'static str,
    args: &'static [&'static str],
    ports: PortsBuilder,
    env: EnvBuilder,
}

impl ServiceComponent {
    /// Service description for this component under `config`
    pub fn spec(&self, config: &ComponentsConfig) -> ServiceSpec {
        ServiceSpec {
            name: self.name.to_string(),
            image: self.image.to_string(),
            replicas: 1,
            network: config.network.clone(),
            ports: (self.ports)(config),
            env: (self.env)(config),
            args: self.args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

#[async_trait::async_trait]
impl Component for ServiceComponent {
    fn name(&self) -> &str {
        self.name
    }

    async fn install(&self, cluster: &dyn ServiceCluster, config: &ComponentsConfig) -> Result<()> {
        let spec = self.spec(config);
        debug!("Installing {} as {:?}", self.name, spec);
        cluster.run_component(&spec).await
    }

    async fn status(&self, cluster: &dyn ServiceCluster) -> Result<ServiceInfo> {
        cluster.component_status(self.name).await
    }
}

fn no_ports(_: &ComponentsConfig) -> Vec<PortMapping> {
    Vec::new()
}

fn no_env(_: &ComponentsConfig) -> BTreeMap<String, String> {
    BTreeMap::new()
}

fn router_ports(_: &ComponentsConfig) -> Vec<PortMapping> {
    vec![PortMapping { published: 80, target: 8989 }]
}

fn registry_ports(_: &ComponentsConfig) -> Vec<PortMapping> {
    vec![PortMapping { published: 5000, target: 5000 }]
}

fn registry_env(_: &ComponentsConfig) -> BTreeMap<String, String> {
    BTreeMap::from([(
        "REGISTRY_STORAGE_DELETE_ENABLED".to_string(),
        "true".to_string(),
    )])
}

fn api_ports(config: &ComponentsConfig) -> Vec<PortMapping> {
    vec![PortMapping {
        published: config.api_port,
        target: API_CONTAINER_PORT,
    }]
}

fn api_env(_: &ComponentsConfig) -> BTreeMap<String, String> {
    [
        ("MONGODB_ADDR", "mongodb:27017"),
        ("REDIS_ADDR", "redis:6379"),
        ("REGISTRY_ADDR", "registry:5000"),
        ("ROUTER_ADDR", "http://planb:8989"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// mongodb -> redis -> planb -> registry -> paas-api
pub fn default_catalog() -> ComponentCatalog {
    ComponentCatalog::new(vec![
        Box::new(ServiceComponent {
            name: "mongodb",
            image: "mongo:3.2",
            args: &[],
            ports: no_ports,
            env: no_env,
        }),
        Box::new(ServiceComponent {
            name: "redis",
            image: "redis:3.2",
            args: &[],
            ports: no_ports,
            env: no_env,
        }),
        Box::new(ServiceComponent {
            name: "planb",
            image: "tsuru/planb:v1",
            args: &[
                "--listen",
                ":8989",
                "--read-redis-host",
                "redis",
                "--write-redis-host",
                "redis",
            ],
            ports: router_ports,
            env: no_env,
        }),
        Box::new(ServiceComponent {
            name: "registry",
            image: "registry:2",
            args: &[],
            ports: registry_ports,
            env: registry_env,
        }),
        Box::new(ServiceComponent {
            name: "paas-api",
            image: "tsuru/api:v1",
            args: &[],
            ports: api_ports,
            env: api_env,
        }),
    ])
}
