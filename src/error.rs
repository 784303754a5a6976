// file: src/error.rs
// version: 3.0.0
// guid: 57b83a63-07b6-4534-aa6c-51e8797254e0

//! Error taxonomy for the installer

use std::fmt;
use thiserror::Error;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, InstallError>;

/// Stages of an installation run, used to tag fatal errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preflight,
    ProvisionCore,
    FormCluster,
    InstallComponents,
    ProvisionApps,
    Bootstrap,
    Fixup,
    Summary,
    RegisterHosts,
}

impl Stage {
    /// Human readable stage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Preflight => "pre-install checks",
            Stage::ProvisionCore => "core hosts provisioning",
            Stage::FormCluster => "cluster formation",
            Stage::InstallComponents => "components installation",
            Stage::ProvisionApps => "apps hosts provisioning",
            Stage::Bootstrap => "api bootstrap",
            Stage::Fixup => "post-provision fixup",
            Stage::Summary => "installation summary",
            Stage::RegisterHosts => "hosts registration",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types for the installer
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Provision error: {0}")]
    ProvisionError(String),

    #[error("{context}: {source}")]
    ProvisionFailed {
        context: String,
        #[source]
        source: Box<InstallError>,
    },

    #[error("Cluster error: {0}")]
    ClusterError(String),

    #[error("error installing {component}: {reason}")]
    ComponentInstallError { component: String, reason: String },

    #[error("Bootstrap error: {0}")]
    BootstrapError(String),

    #[error("failed to register host {host}: {reason}")]
    RegistrationError { host: String, reason: String },

    #[error("SSH error: {0}")]
    SshError(String),

    #[error("Command '{command}' failed (exit code {exit_code:?}): {stderr}")]
    ProcessError {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Installation cancelled before {0}")]
    Cancelled(Stage),

    #[error("{stage} failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<InstallError>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl InstallError {
    /// Wrap this error with the stage it happened in
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            already @ InstallError::StageFailed { .. } => already,
            cancelled @ InstallError::Cancelled(_) => cancelled,
            other => InstallError::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage the error was raised in, if it was tagged with one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            InstallError::StageFailed { stage, .. } => Some(*stage),
            InstallError::Cancelled(stage) => Some(*stage),
            _ => None,
        }
    }

    /// Innermost cause, skipping stage wrappers
    pub fn root(&self) -> &InstallError {
        match self {
            InstallError::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new provisioning error
    pub fn provision(msg: impl Into<String>) -> Self {
        Self::ProvisionError(msg.into())
    }

    /// Wrap a provisioner failure with the machine it was creating
    pub fn provision_failed(context: impl Into<String>, source: InstallError) -> Self {
        Self::ProvisionFailed {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Create a new cluster error
    pub fn cluster(msg: impl Into<String>) -> Self {
        Self::ClusterError(msg.into())
    }

    /// Create a new SSH error
    pub fn ssh(msg: impl Into<String>) -> Self {
        Self::SshError(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_stage_wraps_once() {
        let err = InstallError::provision("no capacity")
            .in_stage(Stage::ProvisionCore)
            .in_stage(Stage::ProvisionApps);

        assert_eq!(err.stage(), Some(Stage::ProvisionCore));
        assert!(matches!(err.root(), InstallError::ProvisionError(_)));
    }

    #[test]
    fn test_stage_message_carries_cause() {
        let err = InstallError::ComponentInstallError {
            component: "redis".to_string(),
            reason: "image not found".to_string(),
        }
        .in_stage(Stage::InstallComponents);

        let msg = err.to_string();
        assert!(msg.starts_with("components installation failed"));
        assert!(msg.contains("error installing redis: image not found"));
    }

    #[test]
    fn test_cancelled_is_not_rewrapped() {
        let err = InstallError::Cancelled(Stage::Bootstrap).in_stage(Stage::Fixup);
        assert_eq!(err.stage(), Some(Stage::Bootstrap));
    }
}
