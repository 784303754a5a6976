// file: src/registry/mod.rs
// version: 1.0.0
// guid: f2a9c6d0-3e71-4b58-8d24-7c0e5b1a9f36

//! Host registration with the platform
//!
//! Key material is read best-effort: a missing file registers an empty value
//! and yields a warning. Submitting a record is not best-effort; the first
//! rejected host stops the remaining registrations.

use crate::{
    api::{HostRecord, PlatformApi},
    config::validator::CA_FILES,
    error::InstallError,
    machine::Machine,
    Result,
};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// A value that may have been degraded, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestEffort<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T> BestEffort<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn degraded(value: T, warning: impl Into<String>) -> Self {
        Self {
            value,
            warning: Some(warning.into()),
        }
    }

    /// Take the value, moving any warning into `warnings`
    pub fn collect_into(self, warnings: &mut Vec<String>) -> T {
        if let Some(w) = self.warning {
            warnings.push(w);
        }
        self.value
    }
}

/// Read a text file, falling back to an empty string
pub async fn read_best_effort(path: &Path, what: &str) -> BestEffort<String> {
    match tokio::fs::read(path).await {
        Ok(bytes) => BestEffort::ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            let message = format!("failed to read {} {}: {}", what, path.display(), e);
            warn!("{}", message);
            BestEffort::degraded(String::new(), message)
        }
    }
}

/// One machine per distinct name. A later machine replaces an earlier one
/// with the same name but keeps the earlier position.
pub fn dedupe_by_name<'a>(machines: impl IntoIterator<Item = &'a Machine>) -> Vec<Machine> {
    let mut unique: Vec<Machine> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for machine in machines {
        match positions.get(&machine.name) {
            Some(&pos) => unique[pos] = machine.clone(),
            None => {
                positions.insert(machine.name.clone(), unique.len());
                unique.push(machine.clone());
            }
        }
    }
    unique
}

/// Registration payload for `machine`, with read warnings
pub async fn host_record(machine: &Machine) -> BestEffort<HostRecord> {
    let mut warnings = Vec::new();

    let ssh_private_key = read_best_effort(&machine.ssh_key_path, "private ssh key file")
        .await
        .collect_into(&mut warnings);
    let ca_cert = read_best_effort(&machine.ca_path.join(CA_FILES[0]), "ca file")
        .await
        .collect_into(&mut warnings);
    let ca_private_key = read_best_effort(&machine.ca_path.join(CA_FILES[1]), "ca private key file")
        .await
        .collect_into(&mut warnings);

    let record = HostRecord {
        name: machine.name.clone(),
        driver_name: machine.driver_name.clone(),
        driver: machine.driver.clone(),
        ssh_private_key,
        ca_cert,
        ca_private_key,
    };

    BestEffort {
        value: record,
        warning: (!warnings.is_empty()).then(|| warnings.join("; ")),
    }
}

/// Outcome of a completed registration pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    pub registered: Vec<String>,
    pub warnings: Vec<String>,
}

/// Register every distinct machine, in first-seen order
pub async fn register_all(api: &dyn PlatformApi, machines: &[Machine]) -> Result<RegistrationReport> {
    let mut report = RegistrationReport::default();

    for machine in dedupe_by_name(machines) {
        let record = host_record(&machine).await.collect_into(&mut report.warnings);

        api.register_host(&record)
            .await
            .map_err(|e| InstallError::RegistrationError {
                host: machine.name.clone(),
                reason: e.to_string(),
            })?;

        info!("Host {} registered", machine.name);
        report.registered.push(machine.name);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostOptions;
    use crate::fakes::{FakePlatformApi, FakeProvisioner};
    use crate::machine::provision_machines;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    async fn machines(count: usize) -> Vec<Machine> {
        provision_machines(&FakeProvisioner::new("paas"), count, &HostOptions::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_same_name_registers_once() -> Result<()> {
        let mut ms = machines(1).await;
        let mut twin = ms[0].clone();
        twin.driver = json!({"IPAddress": "172.16.0.9"});
        ms.push(twin);

        let api = FakePlatformApi::new();
        let report = register_all(&api, &ms).await?;

        let registered = api.registrations();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].driver, json!({"IPAddress": "172.16.0.9"}));
        assert_eq!(report.registered, vec!["paas-1".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_dedupe_keeps_first_position() {
        let ms = machines(3).await;

        let mut replacement = ms[0].clone();
        replacement.ip = "10.9.9.9".to_string();
        let mixed = vec![ms[1].clone(), ms[0].clone(), ms[2].clone(), replacement, ms[1].clone()];

        let unique = dedupe_by_name(&mixed);
        let names: Vec<_> = unique.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["paas-2", "paas-1", "paas-3"]);
        assert_eq!(unique[1].ip, "10.9.9.9");
    }

    #[tokio::test]
    async fn test_missing_key_material_is_a_warning() -> Result<()> {
        let ms = machines(1).await;

        let api = FakePlatformApi::new();
        let report = register_all(&api, &ms).await?;

        assert_eq!(api.registrations().len(), 1);
        assert_eq!(api.registrations()[0].ssh_private_key, "");
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("private ssh key file"));
        assert!(report.warnings[0].contains("ca private key file"));
        Ok(())
    }

    #[tokio::test]
    async fn test_reads_key_material() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(dir.path().join("id_rsa"), "PRIVATE")?;
        fs::write(dir.path().join("ca.pem"), "CERT")?;
        fs::write(dir.path().join("ca-key.pem"), "CAKEY")?;

        let mut machine = machines(1).await.remove(0);
        machine.ssh_key_path = dir.path().join("id_rsa");
        machine.ca_path = dir.path().to_path_buf();

        let record = host_record(&machine).await;
        assert!(record.warning.is_none());
        assert_eq!(record.value.ssh_private_key, "PRIVATE");
        assert_eq!(record.value.ca_cert, "CERT");
        assert_eq!(record.value.ca_private_key, "CAKEY");
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_failure_stops_registration() {
        let ms = machines(3).await;
        let api = FakePlatformApi::new().fail_register_after(1);

        let err = register_all(&api, &ms).await.unwrap_err();

        match err {
            InstallError::RegistrationError { host, .. } => assert_eq!(host, "paas-2"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(api.registrations().len(), 1);
    }
}
