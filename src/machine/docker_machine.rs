// file: src/machine/docker_machine.rs
// version: 1.0.0
// guid: 4a9f0c63-d1e7-45b2-8c3a-7f25e6b01d94

//! Machine provisioner backed by the docker-machine binary

use super::{DriverDescriptor, Machine, MachineProvisioner, MachineState};
use crate::{
    config::{validator::CA_FILES, DriverOpts, InstallationPlan},
    error::InstallError,
    utils::process::run_checked,
    Result,
};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

const BINARY: &str = "docker-machine";

/// docker-machine wrapper scoped to one installation's storage path
pub struct DockerMachine {
    binary: PathBuf,
    storage_path: PathBuf,
    name: String,
    driver_name: String,
    global_opts: DriverOpts,
    ca_path: Option<PathBuf>,
    docker_hub_mirror: Option<String>,
    next_index: Mutex<usize>,
    supported_flags: OnceCell<Option<HashSet<String>>>,
}

impl DockerMachine {
    /// Create a provisioner storing machines under `<home>/installs/<name>`
    pub async fn new(home: &Path, plan: &InstallationPlan) -> Result<Self> {
        let binary = which::which(BINARY).map_err(|e| {
            InstallError::provision(format!("{} not found in PATH: {}", BINARY, e))
        })?;

        let storage_path = home.join("installs").join(&plan.name);
        tokio::fs::create_dir_all(storage_path.join("machines")).await?;
        let existing = highest_machine_index(&storage_path, &plan.name).await?;
        debug!(
            "docker-machine storage at {} numbers machines after {}",
            storage_path.display(),
            existing
        );

        Ok(Self {
            binary,
            storage_path,
            name: plan.name.clone(),
            driver_name: plan.driver.name.clone(),
            global_opts: plan.driver.options.clone(),
            ca_path: plan.ca_path.clone(),
            docker_hub_mirror: plan.docker_hub_mirror.clone(),
            next_index: Mutex::new(existing),
            supported_flags: OnceCell::new(),
        })
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "--storage-path".to_string(),
            self.storage_path.display().to_string(),
        ];
        if let Some(ca_path) = &self.ca_path {
            args.push("--tls-ca-cert".to_string());
            args.push(ca_path.join(CA_FILES[0]).display().to_string());
            args.push("--tls-ca-key".to_string());
            args.push(ca_path.join(CA_FILES[1]).display().to_string());
        }
        args
    }

    async fn run(&self, args: Vec<String>, context: &str) -> Result<String> {
        let mut full = self.base_args();
        full.extend(args);
        run_checked(&self.binary, &full, context).await
    }

    /// Flags the driver accepts, `None` when the driver help cannot be read
    async fn supported_flags(&self) -> &Option<HashSet<String>> {
        self.supported_flags
            .get_or_init(|| async {
                let args = vec![
                    "create".to_string(),
                    "--driver".to_string(),
                    self.driver_name.clone(),
                    "--help".to_string(),
                ];
                match self.run(args, "driver help").await {
                    Ok(help) => parse_flags(&help).ok(),
                    Err(e) => {
                        warn!("Unable to list {} driver flags: {}", self.driver_name, e);
                        None
                    }
                }
            })
            .await
    }

    async fn inspect(&self, name: &str) -> Result<Machine> {
        let raw = self
            .run(vec!["inspect".to_string(), name.to_string()], "inspect")
            .await?;
        let mut machine = parse_inspect(name, &raw, &self.storage_path)?;

        if machine.ip.is_empty() {
            let ip = self
                .run(vec!["ip".to_string(), name.to_string()], "ip")
                .await?
                .trim()
                .to_string();
            if machine.private_ip.is_empty() {
                machine.private_ip = ip.clone();
            }
            machine.ip = ip;
        }

        Ok(machine)
    }

    async fn list_names(&self) -> Result<Vec<String>> {
        let out = self
            .run(vec!["ls".to_string(), "-q".to_string()], "list machines")
            .await?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}

#[async_trait::async_trait]
impl MachineProvisioner for DockerMachine {
    async fn provision_machine(&self, opts: &DriverOpts) -> Result<Machine> {
        let name = {
            let mut next = self.next_index.lock().await;
            *next += 1;
            format!("{}-{}", self.name, *next)
        };

        let mut merged = self.global_opts.clone();
        merged.extend(opts.iter().map(|(k, v)| (k.clone(), v.clone())));

        let merged = match self.supported_flags().await {
            Some(flags) => {
                let (kept, skipped) = filter_supported(merged, flags);
                for key in skipped {
                    warn!("Driver {} does not support option {}, ignoring it", self.driver_name, key);
                }
                kept
            }
            None => merged,
        };

        let mut args = vec![
            "create".to_string(),
            "--driver".to_string(),
            self.driver_name.clone(),
        ];
        if let Some(mirror) = &self.docker_hub_mirror {
            args.push("--engine-registry-mirror".to_string());
            args.push(mirror.clone());
        }
        args.extend(option_args(&merged));
        args.push(name.clone());

        info!("Creating machine {} with driver {}", name, self.driver_name);
        self.run(args, "create machine").await?;

        self.inspect(&name).await
    }

    async fn delete_all(&self) -> Result<()> {
        for name in self.list_names().await? {
            info!("Removing machine {}", name);
            self.run(
                vec!["rm".to_string(), "-y".to_string(), name.clone()],
                "remove machine",
            )
            .await?;
        }

        match tokio::fs::remove_dir_all(&self.storage_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing docker-machine provisioner for {}", self.name);
        Ok(())
    }
}

/// Highest `n` among the `<name>-<n>` machine directories, 0 when none
async fn highest_machine_index(storage_path: &Path, name: &str) -> Result<usize> {
    let prefix = format!("{}-", name);
    let mut entries = tokio::fs::read_dir(storage_path.join("machines")).await?;
    let mut highest = 0;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let index = entry
            .file_name()
            .to_str()
            .and_then(|dir| dir.strip_prefix(&prefix))
            .and_then(|suffix| suffix.parse::<usize>().ok());
        if let Some(index) = index {
            highest = highest.max(index);
        }
    }
    Ok(highest)
}

/// Turn an option set into `--key value` pairs
pub(crate) fn option_args(opts: &DriverOpts) -> Vec<String> {
    let mut args = Vec::new();
    for (key, value) in opts {
        let flag = format!("--{}", key);
        match value {
            Value::Null | Value::Bool(false) => {}
            Value::Bool(true) => args.push(flag),
            Value::String(s) => {
                args.push(flag);
                args.push(s.clone());
            }
            Value::Array(items) => {
                for item in items {
                    args.push(flag.clone());
                    args.push(scalar_to_string(item));
                }
            }
            other => {
                args.push(flag);
                args.push(scalar_to_string(other));
            }
        }
    }
    args
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Split options into those the driver knows and the names of the rest
pub(crate) fn filter_supported(opts: DriverOpts, flags: &HashSet<String>) -> (DriverOpts, Vec<String>) {
    let mut skipped = Vec::new();
    let kept = opts
        .into_iter()
        .filter(|(key, _)| {
            let known = flags.contains(key);
            if !known {
                skipped.push(key.clone());
            }
            known
        })
        .collect();
    (kept, skipped)
}

pub(crate) fn parse_flags(help: &str) -> Result<HashSet<String>> {
    let re = Regex::new(r"--([a-z0-9][a-z0-9-]*)")
        .map_err(|e| InstallError::config(format!("Invalid regex pattern: {}", e)))?;
    Ok(re.captures_iter(help).map(|cap| cap[1].to_string()).collect())
}

/// Build a machine from `docker-machine inspect` output
pub(crate) fn parse_inspect(name: &str, raw: &str, storage_path: &Path) -> Result<Machine> {
    let doc: Value = serde_json::from_str(raw)?;
    let driver = doc.get("Driver").cloned().unwrap_or(Value::Null);
    let descriptor = DriverDescriptor(&driver);

    let driver_name = doc
        .get("DriverName")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let ip = descriptor.ip().map(str::to_string).unwrap_or_default();
    let private_ip = descriptor.private_ip().unwrap_or_default().to_string();
    let ssh_key_path = descriptor
        .ssh_key_path()
        .unwrap_or_else(|| storage_path.join("machines").join(name).join("id_rsa"));
    let ca_path = doc
        .pointer("/HostOptions/AuthOptions/CertDir")
        .and_then(Value::as_str)
        .map(PathBuf::from)
        .unwrap_or_else(|| storage_path.join("certs"));

    Ok(Machine {
        name: name.to_string(),
        driver_name,
        ip,
        private_ip,
        ssh_user: descriptor.ssh_user().to_string(),
        ssh_port: descriptor.ssh_port(),
        ssh_key_path,
        ca_path,
        state: MachineState::Running,
        driver,
    })
}
