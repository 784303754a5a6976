// file: src/fakes/mod.rs
// version: 1.0.0
// guid: 0d5e8b3f-a9c2-4e71-b6f4-28c1d7e09a5b

//! In-memory capability implementations
//!
//! Every fake records what it was asked to do so tests can assert on the
//! exact sequence of calls. None of them touch the network or the disk.

use crate::{
    api::{
        ApiConnector, BootstrapResponse, HostRecord, InstalledHost, PlatformApi, SetupOptions,
    },
    cluster::{ClusterDriver, NodeInfo, ServiceCluster, ServiceInfo, ServiceSpec},
    components::Component,
    config::{ComponentsConfig, DriverOpts},
    error::{InstallError, Stage},
    machine::{Machine, MachineProvisioner, MachineState},
    network::RemoteShell,
    orchestrator::InstallReport,
    reporter::InstallReporter,
    Result,
};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct ProvisionerState {
    calls: Vec<DriverOpts>,
    live: Vec<Machine>,
    deleted: bool,
    closed: bool,
}

/// Provisioner handing out `<prefix>-<n>` machines on 10.0.0.0/24
pub struct FakeProvisioner {
    prefix: String,
    fail_at: Option<usize>,
    state: Mutex<ProvisionerState>,
}

impl FakeProvisioner {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            fail_at: None,
            state: Mutex::new(ProvisionerState::default()),
        }
    }

    /// Fail the call with this zero-based index
    pub fn fail_at(mut self, call: usize) -> Self {
        self.fail_at = Some(call);
        self
    }

    /// Options of every call made, failed ones included
    pub fn calls(&self) -> Vec<DriverOpts> {
        lock(&self.state).calls.clone()
    }

    pub fn live_machines(&self) -> Vec<Machine> {
        lock(&self.state).live.clone()
    }

    pub fn deleted(&self) -> bool {
        lock(&self.state).deleted
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

#[async_trait::async_trait]
impl MachineProvisioner for FakeProvisioner {
    async fn provision_machine(&self, opts: &DriverOpts) -> Result<Machine> {
        let mut state = lock(&self.state);
        let call = state.calls.len();
        state.calls.push(opts.clone());

        if self.fail_at == Some(call) {
            return Err(InstallError::ProcessError {
                command: "create".to_string(),
                exit_code: Some(1),
                stderr: "quota exceeded".to_string(),
            });
        }

        let n = state.live.len() + 1;
        let name = format!("{}-{}", self.prefix, n);
        let ip = format!("10.0.0.{}", n);
        let private_ip = format!("192.168.0.{}", n);
        let machine = Machine {
            driver: json!({ "IPAddress": ip, "PrivateIPAddress": private_ip }),
            ssh_key_path: PathBuf::from(format!("/nonexistent/machines/{}/id_rsa", name)),
            ca_path: PathBuf::from("/nonexistent/certs"),
            name,
            driver_name: "fake".to_string(),
            ip,
            private_ip,
            ssh_user: "root".to_string(),
            ssh_port: 22,
            state: MachineState::Running,
        };
        state.live.push(machine.clone());
        Ok(machine)
    }

    async fn delete_all(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.live.clear();
        state.deleted = true;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        lock(&self.state).closed = true;
        Ok(())
    }
}

/// Cluster driver whose clusters run services in memory
pub struct FakeClusterDriver {
    fail: bool,
    extra_manager: bool,
    failing_components: HashSet<String>,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeClusterDriver {
    pub fn new() -> Self {
        Self {
            fail: false,
            extra_manager: false,
            failing_components: HashSet::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every `create_cluster` call fails
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Clusters report a second manager
    pub fn with_extra_manager(mut self) -> Self {
        self.extra_manager = true;
        self
    }

    /// Running the named component fails
    pub fn failing_component(mut self, name: &str) -> Self {
        self.failing_components.insert(name.to_string());
        self
    }

    /// `create:<n>`, `run:<name>` and `close` entries, in call order
    pub fn log(&self) -> Vec<String> {
        lock(&self.log).clone()
    }
}

impl Default for FakeClusterDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ClusterDriver for FakeClusterDriver {
    async fn create_cluster(
        &self,
        machines: &[Machine],
        _manager_candidates: usize,
    ) -> Result<Box<dyn ServiceCluster>> {
        lock(&self.log).push(format!("create:{}", machines.len()));
        if self.fail {
            return Err(InstallError::ssh("connection refused"));
        }

        let mut nodes: Vec<NodeInfo> = machines
            .iter()
            .enumerate()
            .map(|(i, m)| NodeInfo {
                address: m.ip.clone(),
                state: "ready".to_string(),
                is_manager: i == 0,
            })
            .collect();
        if self.extra_manager {
            if let Some(node) = nodes.get_mut(1) {
                node.is_manager = true;
            }
        }
        let manager = nodes
            .first()
            .cloned()
            .ok_or_else(|| InstallError::cluster("no machines"))?;

        Ok(Box::new(FakeCluster {
            manager,
            nodes,
            failing_components: self.failing_components.clone(),
            services: Mutex::new(BTreeMap::new()),
            log: Arc::clone(&self.log),
        }))
    }
}

/// Cluster created by `FakeClusterDriver`
pub struct FakeCluster {
    manager: NodeInfo,
    nodes: Vec<NodeInfo>,
    failing_components: HashSet<String>,
    services: Mutex<BTreeMap<String, ServiceSpec>>,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl ServiceCluster for FakeCluster {
    async fn cluster_info(&self) -> Result<Vec<NodeInfo>> {
        Ok(self.nodes.clone())
    }

    fn manager(&self) -> &NodeInfo {
        &self.manager
    }

    async fn run_component(&self, spec: &ServiceSpec) -> Result<()> {
        lock(&self.log).push(format!("run:{}", spec.name));
        if self.failing_components.contains(&spec.name) {
            return Err(InstallError::ProcessError {
                command: "docker service create".to_string(),
                exit_code: Some(1),
                stderr: format!("image for {} not found", spec.name),
            });
        }
        lock(&self.services).insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn component_status(&self, name: &str) -> Result<ServiceInfo> {
        let services = lock(&self.services);
        let spec = services
            .get(name)
            .ok_or_else(|| InstallError::cluster(format!("service {} not found", name)))?;
        Ok(ServiceInfo {
            ports: spec.ports.iter().map(|p| p.published.to_string()).collect(),
            replicas: spec.replicas,
        })
    }

    async fn close(&self) -> Result<()> {
        lock(&self.log).push("close".to_string());
        Ok(())
    }
}

/// Component that records its installation in a shared log
pub struct FakeComponent {
    name: String,
    fail: bool,
    cancels: Option<CancellationToken>,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeComponent {
    pub fn new(name: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.into(),
            fail: false,
            cancels: None,
            log,
        }
    }

    pub fn failing_if(mut self, fail: bool) -> Self {
        self.fail = fail;
        self
    }

    /// Cancel `token` while installing, as an operator interrupt would
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancels = Some(token);
        self
    }
}

#[async_trait::async_trait]
impl Component for FakeComponent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn install(&self, _cluster: &dyn ServiceCluster, _config: &ComponentsConfig) -> Result<()> {
        lock(&self.log).push(self.name.clone());
        if let Some(token) = &self.cancels {
            token.cancel();
        }
        if self.fail {
            return Err(InstallError::cluster(format!("{} refused to start", self.name)));
        }
        Ok(())
    }

    async fn status(&self, _cluster: &dyn ServiceCluster) -> Result<ServiceInfo> {
        Ok(ServiceInfo {
            ports: Vec::new(),
            replicas: 1,
        })
    }
}

/// Remote shell answering from canned responses
#[derive(Default)]
pub struct FakeShell {
    responses: Vec<(String, String)>,
    failures: Vec<String>,
    commands: Mutex<Vec<(String, String)>>,
}

impl FakeShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `pattern` with `output`
    pub fn respond(mut self, pattern: &str, output: &str) -> Self {
        self.responses.push((pattern.to_string(), output.to_string()));
        self
    }

    /// Fail commands containing `pattern`
    pub fn fail_on(mut self, pattern: &str) -> Self {
        self.failures.push(pattern.to_string());
        self
    }

    /// `(machine name, command)` pairs in call order
    pub fn commands(&self) -> Vec<(String, String)> {
        lock(&self.commands).clone()
    }
}

#[async_trait::async_trait]
impl RemoteShell for FakeShell {
    async fn run(&self, machine: &Machine, command: &str) -> Result<String> {
        lock(&self.commands).push((machine.name.clone(), command.to_string()));

        if self.failures.iter().any(|p| command.contains(p.as_str())) {
            return Err(InstallError::ProcessError {
                command: command.to_string(),
                exit_code: Some(1),
                stderr: "fake failure".to_string(),
            });
        }

        Ok(self
            .responses
            .iter()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct ApiState {
    bootstraps: Vec<SetupOptions>,
    registrations: Vec<HostRecord>,
    connections: Vec<(String, Option<String>)>,
}

/// Platform API keeping registered hosts in memory.
///
/// Clones share state, so a handle given to an installer can be inspected
/// afterwards.
#[derive(Clone, Default)]
pub struct FakePlatformApi {
    fail_bootstrap: bool,
    fail_register_after: Option<usize>,
    state: Arc<Mutex<ApiState>>,
}

impl FakePlatformApi {
    pub const TOKEN: &'static str = "fake-token";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_bootstrap(mut self) -> Self {
        self.fail_bootstrap = true;
        self
    }

    /// Accept `count` registrations, reject the next ones
    pub fn fail_register_after(mut self, count: usize) -> Self {
        self.fail_register_after = Some(count);
        self
    }

    pub fn token(&self) -> String {
        Self::TOKEN.to_string()
    }

    pub fn bootstraps(&self) -> Vec<SetupOptions> {
        lock(&self.state).bootstraps.clone()
    }

    /// Accepted registrations
    pub fn registrations(&self) -> Vec<HostRecord> {
        lock(&self.state).registrations.clone()
    }

    /// `(base url, token)` of every `connect` call
    pub fn connections(&self) -> Vec<(String, Option<String>)> {
        lock(&self.state).connections.clone()
    }
}

fn installed(record: &HostRecord) -> InstalledHost {
    InstalledHost {
        name: record.name.clone(),
        driver_name: record.driver_name.clone(),
        driver: record.driver.clone(),
        ssh_private_key: record.ssh_private_key.clone(),
    }
}

#[async_trait::async_trait]
impl PlatformApi for FakePlatformApi {
    async fn bootstrap(&self, opts: &SetupOptions) -> Result<BootstrapResponse> {
        lock(&self.state).bootstraps.push(opts.clone());
        if self.fail_bootstrap {
            return Err(InstallError::ApiError {
                status: 503,
                message: "api not ready".to_string(),
            });
        }
        Ok(BootstrapResponse { token: self.token() })
    }

    async fn register_host(&self, record: &HostRecord) -> Result<()> {
        let mut state = lock(&self.state);
        if self.fail_register_after == Some(state.registrations.len()) {
            return Err(InstallError::ApiError {
                status: 500,
                message: "storage unavailable".to_string(),
            });
        }
        state.registrations.push(record.clone());
        Ok(())
    }

    async fn list_hosts(&self) -> Result<Vec<InstalledHost>> {
        Ok(lock(&self.state).registrations.iter().map(installed).collect())
    }

    async fn get_host(&self, name: &str) -> Result<InstalledHost> {
        lock(&self.state)
            .registrations
            .iter()
            .rev()
            .find(|r| r.name == name)
            .map(installed)
            .ok_or_else(|| InstallError::ApiError {
                status: 404,
                message: format!("host {} not found", name),
            })
    }
}

impl ApiConnector for FakePlatformApi {
    fn connect(&self, base_url: &str, token: Option<&str>) -> Result<Arc<dyn PlatformApi>> {
        lock(&self.state)
            .connections
            .push((base_url.to_string(), token.map(String::from)));
        Ok(Arc::new(self.clone()))
    }
}

/// Reporter that keeps every notification as a string
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
    overview: Mutex<Option<InstallReport>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `stage:`, `stage-done:`, `stage-failed:`, `start:`, `done:`,
    /// `warning:` and `overview` entries
    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("warning:").map(String::from))
            .collect()
    }

    /// Last overview reported
    pub fn overview(&self) -> Option<InstallReport> {
        lock(&self.overview).clone()
    }

    fn push(&self, event: String) {
        lock(&self.events).push(event);
    }
}

impl InstallReporter for RecordingReporter {
    fn stage_started(&self, stage: Stage) {
        self.push(format!("stage:{}", stage));
    }

    fn stage_completed(&self, stage: Stage) {
        self.push(format!("stage-done:{}", stage));
    }

    fn stage_failed(&self, stage: Stage, _error: &InstallError) {
        self.push(format!("stage-failed:{}", stage));
    }

    fn component_started(&self, name: &str) {
        self.push(format!("start:{}", name));
    }

    fn component_installed(&self, name: &str) {
        self.push(format!("done:{}", name));
    }

    fn warning(&self, message: &str) {
        self.push(format!("warning:{}", message));
    }

    fn overview(&self, report: &InstallReport) {
        self.push("overview".to_string());
        *lock(&self.overview) = Some(report.clone());
    }
}
