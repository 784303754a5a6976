// file: src/components/mod.rs
// version: 1.0.0
// guid: 2e9b6d41-c05a-4f7e-8a93-d17c4b5e0f26

//! Platform components and their installation order

pub mod catalog;
pub mod sequencer;

pub use catalog::{default_catalog, ServiceComponent};
pub use sequencer::install_all;

use crate::{
    cluster::{ServiceCluster, ServiceInfo},
    config::ComponentsConfig,
    Result,
};

/// A named, installable piece of the platform
#[async_trait::async_trait]
pub trait Component: Send + Sync {
    /// Display name, also the service name on the cluster
    fn name(&self) -> &str;

    async fn install(&self, cluster: &dyn ServiceCluster, config: &ComponentsConfig) -> Result<()>;

    async fn status(&self, cluster: &dyn ServiceCluster) -> Result<ServiceInfo>;
}

/// Ordered, immutable list of components. Later entries may depend on
/// earlier ones being reachable.
pub struct ComponentCatalog {
    components: Vec<Box<dyn Component>>,
}

impl ComponentCatalog {
    pub fn new(components: Vec<Box<dyn Component>>) -> Self {
        Self { components }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Component> {
        self.components.iter().map(|c| c.as_ref())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|c| c.name().to_string()).collect()
    }
}

impl Default for ComponentCatalog {
    fn default() -> Self {
        default_catalog()
    }
}
