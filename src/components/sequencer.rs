// file: src/components/sequencer.rs
// version: 1.0.0
// guid: b3d7e1f0-6a24-4c58-9e0b-41f8c2a7d6e3

//! Ordered component installation

use super::ComponentCatalog;
use crate::{
    cluster::ServiceCluster, config::ComponentsConfig, error::InstallError,
    reporter::InstallReporter, Result,
};
use tracing::{error, info};

/// Install every component in catalog order, stopping at the first failure.
///
/// Components installed before the failure stay on the cluster.
pub async fn install_all(
    catalog: &ComponentCatalog,
    cluster: &dyn ServiceCluster,
    config: &ComponentsConfig,
    reporter: &dyn InstallReporter,
) -> Result<()> {
    let total = catalog.len();

    for (index, component) in catalog.iter().enumerate() {
        info!("Installing component {}/{}: {}", index + 1, total, component.name());
        reporter.component_started(component.name());

        if let Err(e) = component.install(cluster, config).await {
            error!("Component {} failed: {}", component.name(), e);
            return Err(InstallError::ComponentInstallError {
                component: component.name().to_string(),
                reason: e.to_string(),
            });
        }

        reporter.component_installed(component.name());
    }

    info!("All {} components installed", total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterDriver;
    use crate::components::Component;
    use crate::config::HostOptions;
    use crate::fakes::{FakeClusterDriver, FakeComponent, FakeProvisioner, RecordingReporter};
    use crate::machine::provision_machines;
    use std::sync::{Arc, Mutex};

    async fn cluster() -> Box<dyn ServiceCluster> {
        let provisioner = FakeProvisioner::new("core");
        let machines = provision_machines(&provisioner, 1, &HostOptions::new())
            .await
            .unwrap();
        FakeClusterDriver::new()
            .create_cluster(&machines, 1)
            .await
            .unwrap()
    }

    fn catalog(log: &Arc<Mutex<Vec<String>>>, failing: &str) -> ComponentCatalog {
        let components: Vec<Box<dyn Component>> = ["A", "B", "C"]
            .into_iter()
            .map(|name| {
                Box::new(FakeComponent::new(name, Arc::clone(log)).failing_if(name == failing))
                    as Box<dyn Component>
            })
            .collect();
        ComponentCatalog::new(components)
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let reporter = RecordingReporter::new();
        let cluster = cluster().await;

        let err = install_all(
            &catalog(&log, "B"),
            cluster.as_ref(),
            &ComponentsConfig::new("paas"),
            &reporter,
        )
        .await
        .unwrap_err();

        assert_eq!(*log.lock().unwrap(), vec!["A".to_string(), "B".to_string()]);
        match err {
            InstallError::ComponentInstallError { component, .. } => assert_eq!(component, "B"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            reporter.events(),
            vec!["start:A", "done:A", "start:B"]
        );
    }

    #[tokio::test]
    async fn test_installs_all_in_order() -> Result<()> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let reporter = RecordingReporter::new();
        let cluster = cluster().await;

        install_all(
            &catalog(&log, ""),
            cluster.as_ref(),
            &ComponentsConfig::new("paas"),
            &reporter,
        )
        .await?;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["A".to_string(), "B".to_string(), "C".to_string()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_default_catalog_runs_services() -> Result<()> {
        let provisioner = FakeProvisioner::new("core");
        let machines = provision_machines(&provisioner, 1, &HostOptions::new()).await?;
        let driver = FakeClusterDriver::new();
        let cluster = driver.create_cluster(&machines, 1).await?;

        install_all(
            &ComponentCatalog::default(),
            cluster.as_ref(),
            &ComponentsConfig::new("paas"),
            &RecordingReporter::new(),
        )
        .await?;

        let runs: Vec<String> = driver
            .log()
            .into_iter()
            .filter(|entry| entry.starts_with("run:"))
            .collect();
        assert_eq!(
            runs,
            vec!["run:mongodb", "run:redis", "run:planb", "run:registry", "run:paas-api"]
        );
        Ok(())
    }
}
