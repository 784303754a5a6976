// file: src/config/mod.rs
// version: 2.0.0
// guid: a1b2c3d4-e5f6-7a8b-9c0d-1e2f3a4b5c6d

//! Configuration module for the PaaS installer
//!
//! Holds the fully resolved installation plan, the per-host driver option
//! matrices and the local target store.

pub mod loader;
pub mod targets;
pub mod validator;

pub use loader::ConfigLoader;
pub use targets::{Target, TargetStore};

use crate::{error::InstallError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use ::validator::Validate;

/// Well-known port the platform API listens on
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default platform name, also used as target label
pub const DEFAULT_NAME: &str = "paas";

/// Driver used when no configuration file is given
pub const DEFAULT_DRIVER: &str = "virtualbox";

/// Flat option set handed to the provisioner for a single machine
pub type DriverOpts = BTreeMap<String, Value>;

/// Per-host driver options: option name -> candidate values.
///
/// Machine `i` of a pool receives, for every key, the value at position
/// `i % len(values)`. Every list holds at least one value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostOptions(BTreeMap<String, Vec<Value>>);

impl HostOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a list of candidate values, rejecting empty lists
    pub fn insert(&mut self, key: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let key = key.into();
        if values.is_empty() {
            return Err(InstallError::config(format!(
                "driver option {} must have at least one value",
                key
            )));
        }
        self.0.insert(key, values);
        Ok(())
    }

    /// Pin an option to a single value for every host
    pub fn pin(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), vec![value]);
    }

    pub fn get(&self, key: &str) -> Option<&[Value]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Options for the machine at `index` in its pool
    pub fn for_index(&self, index: usize) -> DriverOpts {
        self.0
            .iter()
            .map(|(key, values)| (key.clone(), values[index % values.len()].clone()))
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for HostOptions {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut opts = HostOptions::new();
        for (key, value) in iter {
            opts.pin(key, value);
        }
        opts
    }
}

/// Infrastructure driver settings shared by every machine
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct DriverConfig {
    /// docker-machine driver name (virtualbox, amazonec2, ...)
    #[validate(length(min = 1))]
    pub name: String,
    /// Global driver options applied to every host
    pub options: DriverOpts,
}

/// Settings consumed by the platform components
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct ComponentsConfig {
    /// Label registered locally for the installed platform
    #[validate(length(min = 1))]
    pub target_name: String,
    /// Admin user created on bootstrap
    #[validate(email)]
    pub admin_email: String,
    #[validate(length(min = 6))]
    pub admin_password: String,
    pub api_port: u16,
    /// Overlay network shared by the components
    #[validate(length(min = 1))]
    pub network: String,
}

impl ComponentsConfig {
    pub fn new(target_name: impl Into<String>) -> Self {
        Self {
            target_name: target_name.into(),
            admin_email: "admin@example.com".to_string(),
            admin_password: "admin123".to_string(),
            api_port: DEFAULT_API_PORT,
            network: "paas".to_string(),
        }
    }
}

/// Fully resolved installation plan. Built once per run, never mutated after.
#[derive(Debug, Clone, PartialEq, Serialize, Validate)]
pub struct InstallationPlan {
    #[validate(length(min = 1))]
    pub name: String,
    pub driver: DriverConfig,
    /// Directory holding ca.pem and ca-key.pem
    pub ca_path: Option<PathBuf>,
    pub docker_hub_mirror: Option<String>,
    #[validate(range(min = 1))]
    pub core_hosts: usize,
    pub core_driver_opts: HostOptions,
    pub apps_hosts: usize,
    pub dedicated_apps_hosts: bool,
    pub apps_driver_opts: HostOptions,
    pub components: ComponentsConfig,
}

impl InstallationPlan {
    /// Plan before derived values are injected
    pub(crate) fn base() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            driver: DriverConfig {
                name: DEFAULT_DRIVER.to_string(),
                options: DriverOpts::new(),
            },
            ca_path: None,
            docker_hub_mirror: None,
            core_hosts: 1,
            core_driver_opts: HostOptions::new(),
            apps_hosts: 1,
            dedicated_apps_hosts: false,
            apps_driver_opts: HostOptions::new(),
            components: ComponentsConfig::new(DEFAULT_NAME),
        }
    }

    /// Core hosts always expose the API port, whatever the user configured
    pub(crate) fn inject_derived(mut self) -> Self {
        let key = open_port_option(&self.driver.name);
        self.core_driver_opts
            .pin(key, Value::String(self.components.api_port.to_string()));
        self
    }
}

impl Default for InstallationPlan {
    fn default() -> Self {
        Self::base().inject_derived()
    }
}

/// Driver option that opens the API port on a machine
pub fn open_port_option(driver_name: &str) -> String {
    format!("{}-open-port", driver_name)
}
