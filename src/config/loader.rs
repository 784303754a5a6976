// file: src/config/loader.rs
// version: 2.0.0
// guid: d4e5f6g7-h8i9-0123-4567-890123defghi

//! Configuration file loading and environment variable substitution
//!
//! The document is a nested YAML mapping addressed with `a:b:c` paths.
//! Recognized keys overlay the default plan one field at a time; anything
//! else is ignored. `${VAR}` placeholders are expanded only inside the
//! string values of recognized keys.

use super::{validator::validate_plan, DriverOpts, HostOptions, InstallationPlan};
use crate::{error::InstallError, Result};
use regex::Regex;
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
    env_vars: HashMap<String, String>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            env_vars: std::env::vars().collect(),
        }
    }

    /// Resolve the installation plan, falling back to defaults without a file
    pub fn resolve<P: AsRef<Path>>(&self, path: Option<P>) -> Result<InstallationPlan> {
        let Some(path) = path else {
            debug!("No configuration file given, using default plan");
            return Ok(InstallationPlan::default());
        };

        let content = fs::read_to_string(&path).map_err(|e| {
            InstallError::config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        self.resolve_str(&content)
    }

    /// Resolve the installation plan from document contents
    pub fn resolve_str(&self, content: &str) -> Result<InstallationPlan> {
        let doc: Value = serde_yaml::from_str(content)
            .map_err(|e| InstallError::config(format!("Malformed configuration: {}", e)))?;

        if !doc.is_null() && !doc.is_mapping() {
            return Err(InstallError::config(
                "configuration document must be a mapping",
            ));
        }

        let plan = self.overlay(InstallationPlan::base(), &doc)?.inject_derived();
        validate_plan(&plan)?;
        Ok(plan)
    }

    /// Expand environment variables in configuration content
    fn expand_env_vars(&self, content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| InstallError::config(format!("Invalid regex pattern: {}", e)))?;

        let mut missing_vars = Vec::new();
        let result = re.replace_all(content, |cap: &regex::Captures<'_>| {
            match self.env_vars.get(&cap[1]) {
                Some(value) => value.clone(),
                None => {
                    missing_vars.push(cap[1].to_string());
                    String::new()
                }
            }
        });

        if !missing_vars.is_empty() {
            return Err(InstallError::config(format!(
                "Missing environment variables: {}",
                missing_vars.join(", ")
            )));
        }

        Ok(result.into_owned())
    }

    fn overlay(&self, mut plan: InstallationPlan, doc: &Value) -> Result<InstallationPlan> {
        if let Some(name) = self.expanded_string(doc, "name")? {
            plan.name = name;
        }
        if let Some(driver) = self.expanded_string(doc, "driver:name")? {
            plan.driver.name = driver;
        }
        if let Some(mirror) = self.expanded_string(doc, "docker-hub-mirror")? {
            plan.docker_hub_mirror = Some(mirror);
        }
        if let Some(opts) = lookup(doc, "driver:options") {
            plan.driver.options = self.parse_driver_opts(opts, "driver:options")?;
        }
        if let Some(ca_path) = self.expanded_string(doc, "ca-path")? {
            plan.ca_path = Some(expand_path(&ca_path)?);
        }
        if let Some(size) = get_usize(doc, "hosts:core:size")? {
            plan.core_hosts = size;
        }
        if let Some(size) = get_usize(doc, "hosts:apps:size")? {
            plan.apps_hosts = size;
        }
        if let Some(dedicated) = get_bool(doc, "hosts:apps:dedicated")? {
            plan.dedicated_apps_hosts = dedicated;
        }
        if let Some(opts) = lookup(doc, "hosts:core:driver:options") {
            plan.core_driver_opts = self.parse_host_options(opts, "hosts:core:driver:options")?;
        }
        if let Some(opts) = lookup(doc, "hosts:apps:driver:options") {
            plan.apps_driver_opts = self.parse_host_options(opts, "hosts:apps:driver:options")?;
        }

        plan.components.target_name = plan.name.clone();
        if let Some(target) = self.expanded_string(doc, "components:target-name")? {
            plan.components.target_name = target;
        }
        if let Some(email) = self.expanded_string(doc, "components:admin:email")? {
            plan.components.admin_email = email;
        }
        if let Some(password) = self.expanded_string(doc, "components:admin:password")? {
            plan.components.admin_password = password;
        }

        Ok(plan)
    }

    fn parse_driver_opts(&self, value: &Value, path: &str) -> Result<DriverOpts> {
        let mapping = value
            .as_mapping()
            .ok_or_else(|| InstallError::config(format!("failed to parse {}: not a mapping", path)))?;

        let mut opts = DriverOpts::new();
        for (key, value) in mapping {
            opts.insert(string_key(key, path)?, self.expand_value(to_json(value, path)?)?);
        }
        Ok(opts)
    }

    /// Scalars become single-element lists, sequences are kept as-is
    fn parse_host_options(&self, value: &Value, path: &str) -> Result<HostOptions> {
        let mapping = value
            .as_mapping()
            .ok_or_else(|| InstallError::config(format!("failed to parse {}: not a mapping", path)))?;

        let mut opts = HostOptions::new();
        for (key, value) in mapping {
            let key = string_key(key, path)?;
            let values = match value {
                Value::Sequence(items) => items
                    .iter()
                    .map(|item| self.expand_value(to_json(item, path)?))
                    .collect::<Result<Vec<_>>>()?,
                scalar => vec![self.expand_value(to_json(scalar, path)?)?],
            };
            opts.insert(key, values)?;
        }
        Ok(opts)
    }

    fn expanded_string(&self, doc: &Value, path: &str) -> Result<Option<String>> {
        get_string(doc, path)?
            .map(|raw| self.expand_env_vars(&raw))
            .transpose()
    }

    /// Expand placeholders in every string of an option value
    fn expand_value(&self, value: serde_json::Value) -> Result<serde_json::Value> {
        Ok(match value {
            serde_json::Value::String(s) => serde_json::Value::String(self.expand_env_vars(&s)?),
            serde_json::Value::Array(items) => serde_json::Value::Array(
                items
                    .into_iter()
                    .map(|item| self.expand_value(item))
                    .collect::<Result<_>>()?,
            ),
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| Ok((k, self.expand_value(v)?)))
                    .collect::<Result<_>>()?,
            ),
            other => other,
        })
    }

    /// Set environment variable for substitution
    pub fn set_env_var(&mut self, key: String, value: String) {
        self.env_vars.insert(key, value);
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk a `a:b:c` path; explicit nulls count as absent
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split(':') {
        current = current.as_mapping()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

fn get_string(doc: &Value, path: &str) -> Result<Option<String>> {
    match lookup(doc, path) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(type_error(path, "a string", other)),
    }
}

fn get_usize(doc: &Value, path: &str) -> Result<Option<usize>> {
    match lookup(doc, path) {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| type_error(path, "a non-negative integer", &Value::Number(n.clone()))),
        Some(other) => Err(type_error(path, "a non-negative integer", other)),
    }
}

fn get_bool(doc: &Value, path: &str) -> Result<Option<bool>> {
    match lookup(doc, path) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(type_error(path, "a boolean", other)),
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> InstallError {
    InstallError::config(format!("{} must be {}, got {:?}", path, expected, got))
}

fn to_json(value: &Value, path: &str) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| InstallError::config(format!("unsupported value under {}: {}", path, e)))
}

fn string_key(key: &Value, path: &str) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        other => Err(InstallError::config(format!(
            "option names under {} must be strings, got {:?}",
            path, other
        ))),
    }
}

fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| InstallError::config(format!("Invalid path {}: {}", raw, e)))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_env_var_expansion() {
        let mut loader = ConfigLoader::new();
        loader.set_env_var("TEST_VAR".to_string(), "test_value".to_string());

        let content = "key: ${TEST_VAR}";
        let result = loader.expand_env_vars(content).unwrap();
        assert_eq!(result, "key: test_value");
    }

    #[test]
    fn test_missing_env_var() {
        let loader = ConfigLoader::new();
        let content = "key: ${PAAS_INSTALLER_MISSING_VAR}";

        let result = loader.expand_env_vars(content);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Missing environment variables"));
    }

    #[test]
    fn test_placeholders_outside_recognized_keys_ignored() {
        let loader = ConfigLoader::new();
        let plan = loader
            .resolve_str(
                "# export ${PAAS_INSTALLER_UNSET_TOKEN} before running\nnotes: \"${PAAS_INSTALLER_UNSET_TOKEN}\"\nhosts:\n  core:\n    size: 3\n",
            )
            .unwrap();

        let mut expected = InstallationPlan::default();
        expected.core_hosts = 3;
        assert_eq!(plan, expected);
    }

    #[test]
    fn test_placeholder_in_recognized_key_must_be_set() {
        let loader = ConfigLoader::new();
        let result = loader.resolve_str("name: ${PAAS_INSTALLER_UNSET_TOKEN}\n");

        let err = result.unwrap_err();
        assert!(matches!(err, InstallError::ConfigError(_)));
        assert!(err.to_string().contains("PAAS_INSTALLER_UNSET_TOKEN"));
    }

    #[test]
    fn test_placeholders_in_option_lists_expanded() {
        let mut loader = ConfigLoader::new();
        loader.set_env_var("ZONE".to_string(), "b".to_string());

        let plan = loader
            .resolve_str("hosts:\n  apps:\n    driver:\n      options:\n        zone: [a, \"${ZONE}\"]\n")
            .unwrap();
        assert_eq!(
            plan.apps_driver_opts.get("zone"),
            Some(&[json!("a"), json!("b")][..])
        );
    }

    #[test]
    fn test_resolve_without_path_is_default() {
        let loader = ConfigLoader::new();
        let plan = loader.resolve(None::<&Path>).unwrap();
        assert_eq!(plan, InstallationPlan::default());
    }

    #[test]
    fn test_core_size_only_changes_core_hosts() {
        let loader = ConfigLoader::new();
        let plan = loader.resolve_str("hosts:\n  core:\n    size: 3\n").unwrap();

        let mut expected = InstallationPlan::default();
        expected.core_hosts = 3;
        assert_eq!(plan, expected);
    }

    #[test]
    fn test_empty_document_is_default() {
        let loader = ConfigLoader::new();
        let plan = loader.resolve_str("").unwrap();
        assert_eq!(plan, InstallationPlan::default());
    }

    #[test]
    fn test_full_document() {
        let mut loader = ConfigLoader::new();
        loader.set_env_var("AWS_SECRET".to_string(), "s3cr3t".to_string());

        let plan = loader
            .resolve_str(
                r#"
name: paas-ec2
docker-hub-mirror: https://mirror.example.com
driver:
  name: amazonec2
  options:
    amazonec2-access-key: AKIA
    amazonec2-secret-key: ${AWS_SECRET}
hosts:
  core:
    size: 2
    driver:
      options:
        amazonec2-zone: [a, b]
        amazonec2-instance-type: t2.large
  apps:
    size: 4
    dedicated: true
    driver:
      options:
        amazonec2-zone: c
"#,
            )
            .unwrap();

        assert_eq!(plan.name, "paas-ec2");
        assert_eq!(plan.components.target_name, "paas-ec2");
        assert_eq!(plan.driver.name, "amazonec2");
        assert_eq!(plan.driver.options["amazonec2-secret-key"], json!("s3cr3t"));
        assert_eq!(
            plan.docker_hub_mirror.as_deref(),
            Some("https://mirror.example.com")
        );
        assert_eq!(plan.core_hosts, 2);
        assert_eq!(plan.apps_hosts, 4);
        assert!(plan.dedicated_apps_hosts);
        assert_eq!(
            plan.core_driver_opts.get("amazonec2-zone"),
            Some(&[json!("a"), json!("b")][..])
        );
        assert_eq!(
            plan.core_driver_opts.get("amazonec2-instance-type"),
            Some(&[json!("t2.large")][..])
        );
        assert_eq!(
            plan.core_driver_opts.get("amazonec2-open-port"),
            Some(&[json!("8080")][..])
        );
        assert_eq!(
            plan.apps_driver_opts.get("amazonec2-zone"),
            Some(&[json!("c")][..])
        );
        assert!(plan.apps_driver_opts.get("amazonec2-open-port").is_none());
    }

    #[test]
    fn test_open_port_cannot_be_overridden() {
        let loader = ConfigLoader::new();
        let plan = loader
            .resolve_str(
                "hosts:\n  core:\n    driver:\n      options:\n        virtualbox-open-port: [\"9999\", \"7777\"]\n",
            )
            .unwrap();
        assert_eq!(
            plan.core_driver_opts.get("virtualbox-open-port"),
            Some(&[json!("8080")][..])
        );
    }

    #[test]
    fn test_options_block_must_be_mapping() {
        let loader = ConfigLoader::new();
        let result = loader.resolve_str("hosts:\n  core:\n    driver:\n      options: [a, b]\n");
        assert!(matches!(result, Err(InstallError::ConfigError(_))));
    }

    #[test]
    fn test_malformed_document() {
        let loader = ConfigLoader::new();
        let result = loader.resolve_str("name: [unterminated\n");
        assert!(matches!(result, Err(InstallError::ConfigError(_))));
    }

    #[test]
    fn test_empty_option_list_rejected() {
        let loader = ConfigLoader::new();
        let result = loader.resolve_str("hosts:\n  apps:\n    driver:\n      options:\n        zone: []\n");
        assert!(matches!(result, Err(InstallError::ConfigError(_))));
    }

    #[test]
    fn test_wrong_type_rejected() {
        let loader = ConfigLoader::new();
        let result = loader.resolve_str("hosts:\n  core:\n    size: three\n");
        assert!(matches!(result, Err(InstallError::ConfigError(_))));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let loader = ConfigLoader::new();
        let plan = loader.resolve_str("whatever: 1\nhosts:\n  spare: true\n").unwrap();
        assert_eq!(plan, InstallationPlan::default());
    }

    #[test]
    fn test_resolve_from_file() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name: from-file\nhosts:\n  apps:\n    size: 0\n").unwrap();

        let loader = ConfigLoader::new();
        let plan = loader.resolve(Some(file.path()))?;

        assert_eq!(plan.name, "from-file");
        assert_eq!(plan.apps_hosts, 0);
        Ok(())
    }

    #[test]
    fn test_resolve_missing_file() {
        let loader = ConfigLoader::new();
        let result = loader.resolve(Some("/nonexistent/paas-installer.yml"));
        assert!(matches!(result, Err(InstallError::ConfigError(_))));
    }
}
