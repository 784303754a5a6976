// file: src/config/validator.rs
// version: 2.0.0
// guid: e5f6g7h8-i9j0-1234-5678-90abcdef1234

use super::InstallationPlan;
use crate::{error::InstallError, Result};
use std::path::Path;
use tracing::debug;
use validator::Validate;

/// Files expected inside a configured CA directory
pub const CA_FILES: [&str; 2] = ["ca.pem", "ca-key.pem"];

/// Validate a resolved plan before anything touches the infrastructure
pub fn validate_plan(plan: &InstallationPlan) -> Result<()> {
    debug!("Validating installation plan {}", plan.name);

    plan.validate()
        .map_err(|e| InstallError::config(format!("invalid installation plan: {}", e)))?;
    plan.driver
        .validate()
        .map_err(|e| InstallError::config(format!("invalid driver configuration: {}", e)))?;
    plan.components
        .validate()
        .map_err(|e| InstallError::config(format!("invalid components configuration: {}", e)))?;

    if let Some(ca_path) = &plan.ca_path {
        validate_ca_path(ca_path)?;
    }

    Ok(())
}

fn validate_ca_path(ca_path: &Path) -> Result<()> {
    if !ca_path.is_dir() {
        return Err(InstallError::config(format!(
            "ca-path {} is not a directory",
            ca_path.display()
        )));
    }

    for file in CA_FILES {
        if !ca_path.join(file).is_file() {
            return Err(InstallError::config(format!(
                "ca-path {} is missing {}",
                ca_path.display(),
                file
            )));
        }
    }

    Ok(())
}
