// file: src/orchestrator/mod.rs
// version: 1.0.0
// guid: a5d0c3e8-1f47-4b96-9e2a-c70b8d4f6e13

//! Installation run
//!
//! Stages run strictly in order and the first fatal error ends the run.
//! Nothing is rolled back: machines created before a failure stay up until
//! an explicit `uninstall`. The provisioner and cluster handles are closed
//! on every exit path.

pub mod fixup;
pub mod summary;

pub use summary::{ComponentRow, InstallReport};

use crate::{
    api::{self, ApiConnector, PlatformApi},
    cluster::{self, ClusterDriver, ServiceCluster},
    components::{install_all, ComponentCatalog},
    config::{validator::validate_plan, InstallationPlan, TargetStore},
    error::{InstallError, Stage},
    logging::with_async_operation_span,
    machine::{provision_machines, select_apps_pool, Machine, MachineProvisioner},
    network::RemoteShell,
    registry,
    reporter::{InstallReporter, TracingReporter},
    Result,
};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Drives one installation from a resolved plan
pub struct Installer {
    plan: InstallationPlan,
    provisioner: Arc<dyn MachineProvisioner>,
    cluster_driver: Arc<dyn ClusterDriver>,
    shell: Arc<dyn RemoteShell>,
    connector: Arc<dyn ApiConnector>,
    targets: TargetStore,
    catalog: ComponentCatalog,
    reporter: Arc<dyn InstallReporter>,
    cancel: CancellationToken,
}

impl Installer {
    pub fn new(
        plan: InstallationPlan,
        provisioner: Arc<dyn MachineProvisioner>,
        cluster_driver: Arc<dyn ClusterDriver>,
        shell: Arc<dyn RemoteShell>,
        connector: Arc<dyn ApiConnector>,
        targets: TargetStore,
    ) -> Self {
        Self {
            plan,
            provisioner,
            cluster_driver,
            shell,
            connector,
            targets,
            catalog: ComponentCatalog::default(),
            reporter: Arc::new(TracingReporter),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: ComponentCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn InstallReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Stop before the next stage once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn plan(&self) -> &InstallationPlan {
        &self.plan
    }

    /// Run every stage
    pub async fn run(&self) -> Result<InstallReport> {
        info!(
            "Installing {} with driver {} ({} core hosts, {} apps hosts)",
            self.plan.name, self.plan.driver.name, self.plan.core_hosts, self.plan.apps_hosts
        );

        let result = self.run_provisioned().await;

        if let Err(e) = self.provisioner.close().await {
            warn!("Failed to close provisioner: {}", e);
        }

        match &result {
            Ok(report) => info!("Installation {} finished", report.session_id),
            Err(e) => warn!("Installation aborted: {}", e),
        }
        result
    }

    async fn run_provisioned(&self) -> Result<InstallReport> {
        let mut report = InstallReport::new(&self.plan.name, &self.plan.components.target_name);

        self.stage(Stage::Preflight, self.preflight()).await?;

        let core = self
            .stage(
                Stage::ProvisionCore,
                provision_machines(
                    self.provisioner.as_ref(),
                    self.plan.core_hosts,
                    &self.plan.core_driver_opts,
                ),
            )
            .await?;
        report.core_machines = core.clone();

        let cluster = self
            .stage(
                Stage::FormCluster,
                cluster::form(self.cluster_driver.as_ref(), &core, core.len()),
            )
            .await?;

        let result = self.run_on_cluster(cluster.as_ref(), &core, report).await;

        if let Err(e) = cluster.close().await {
            warn!("Failed to close cluster: {}", e);
        }
        result
    }

    async fn run_on_cluster(
        &self,
        cluster: &dyn ServiceCluster,
        core: &[Machine],
        mut report: InstallReport,
    ) -> Result<InstallReport> {
        report.manager = Some(cluster.manager().clone());

        self.stage(
            Stage::InstallComponents,
            install_all(
                &self.catalog,
                cluster,
                &self.plan.components,
                self.reporter.as_ref(),
            ),
        )
        .await?;

        let apps = self
            .stage(
                Stage::ProvisionApps,
                select_apps_pool(self.provisioner.as_ref(), &self.plan, core),
            )
            .await?;
        report.apps_machines = apps.clone();

        let target = api::api_url(&cluster.manager().address, self.plan.components.api_port);
        let platform = self
            .stage(Stage::Bootstrap, self.bootstrap(&target, &apps))
            .await?;
        report.target_url = Some(target);

        let warnings = self
            .stage(Stage::Fixup, async {
                Ok::<_, InstallError>(fixup::apply(self.shell.as_ref(), core).await)
            })
            .await?;
        self.warn_all(&mut report, warnings);

        self.stage(Stage::Summary, async {
            report.collect_status(cluster, &self.catalog).await;
            Ok::<_, InstallError>(())
        })
        .await?;
        self.reporter.overview(&report);

        let all_machines: Vec<Machine> = core.iter().chain(apps.iter()).cloned().collect();
        let registration = self
            .stage(
                Stage::RegisterHosts,
                registry::register_all(platform.as_ref(), &all_machines),
            )
            .await?;
        report.registered_hosts = registration.registered;
        self.warn_all(&mut report, registration.warnings);

        report.finished_at = Some(Utc::now());
        Ok(report)
    }

    async fn preflight(&self) -> Result<()> {
        validate_plan(&self.plan)?;

        let label = &self.plan.components.target_name;
        if self.targets.exists(label).await? {
            return Err(InstallError::config(format!(
                "target {} already exists, remove it or pick another target name",
                label
            )));
        }
        Ok(())
    }

    /// Bootstrap the API, then record it as the current target
    async fn bootstrap(&self, target: &str, apps: &[Machine]) -> Result<Arc<dyn PlatformApi>> {
        let platform = self.connector.connect(target, None)?;
        let nodes = apps.iter().map(|m| m.private_ip.clone()).collect();

        let response =
            api::bootstrap(platform.as_ref(), target, &self.plan.components, nodes).await?;

        let label = &self.plan.components.target_name;
        self.targets.add(label, target).await?;
        self.targets.set_current(label, Some(&response.token)).await?;

        self.connector.connect(target, Some(&response.token))
    }

    async fn stage<T, F>(&self, stage: Stage, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            warn!("Cancelled before {}", stage);
            return Err(InstallError::Cancelled(stage));
        }

        self.reporter.stage_started(stage);
        let result = with_async_operation_span(stage.as_str(), work)
            .await
            .map_err(|e| e.in_stage(stage));
        match &result {
            Ok(_) => self.reporter.stage_completed(stage),
            Err(e) => self.reporter.stage_failed(stage, e),
        }
        result
    }

    fn warn_all(&self, report: &mut InstallReport, warnings: Vec<String>) {
        for warning in warnings {
            self.reporter.warning(&warning);
            report.warnings.push(warning);
        }
    }
}

/// Destroy every machine of the plan's installation and forget its target.
///
/// The provisioner is closed whether or not deletion succeeded.
pub async fn uninstall(
    provisioner: &dyn MachineProvisioner,
    targets: &TargetStore,
    target_label: &str,
) -> Result<()> {
    let deleted = provisioner.delete_all().await;
    if let Err(e) = provisioner.close().await {
        warn!("Failed to close provisioner: {}", e);
    }
    deleted?;
    info!("Machines successfully removed");

    if targets.remove(target_label).await? {
        info!("Target {} removed", target_label);
    }
    Ok(())
}
