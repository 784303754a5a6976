// file: src/config/targets.rs
// version: 1.0.0
// guid: 3f0c2a51-8e4d-4b7a-9c16-d2e85b0f7a43

//! Local registry of installed platform targets
//!
//! Layout under the installer home:
//! - `targets.yml`: label -> API URL
//! - `target`: label of the current target
//! - `token`: API token of the current target

use crate::{error::InstallError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const TARGETS_FILE: &str = "targets.yml";
const CURRENT_FILE: &str = "target";
const TOKEN_FILE: &str = "token";

/// A registered platform endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub label: String,
    pub url: String,
    pub token: Option<String>,
}

/// File backed store of known targets
#[derive(Debug, Clone)]
pub struct TargetStore {
    home: PathBuf,
}

impl TargetStore {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// `~/.paas`
    pub fn default_home() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".paas"))
            .ok_or_else(|| InstallError::config("unable to determine home directory"))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// All registered targets
    pub async fn load(&self) -> Result<BTreeMap<String, String>> {
        let path = self.home.join(TARGETS_FILE);
        match fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_yaml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, label: &str) -> Result<bool> {
        Ok(self.load().await?.contains_key(label))
    }

    /// Register a target, replacing any previous URL for the label
    pub async fn add(&self, label: &str, url: &str) -> Result<()> {
        let mut targets = self.load().await?;
        targets.insert(label.to_string(), url.to_string());
        self.save(&targets).await?;
        info!("Target {} registered at {}", label, url);
        Ok(())
    }

    /// Remove a target; returns false when it was not registered
    pub async fn remove(&self, label: &str) -> Result<bool> {
        let mut targets = self.load().await?;
        if targets.remove(label).is_none() {
            return Ok(false);
        }
        self.save(&targets).await?;

        if self.current_label().await?.as_deref() == Some(label) {
            remove_if_exists(&self.home.join(CURRENT_FILE)).await?;
            remove_if_exists(&self.home.join(TOKEN_FILE)).await?;
        }

        info!("Target {} removed", label);
        Ok(true)
    }

    /// Make `label` the current target and store its token
    pub async fn set_current(&self, label: &str, token: Option<&str>) -> Result<()> {
        if !self.exists(label).await? {
            return Err(InstallError::config(format!("unknown target {}", label)));
        }
        fs::create_dir_all(&self.home).await?;
        fs::write(self.home.join(CURRENT_FILE), label).await?;
        match token {
            Some(token) => fs::write(self.home.join(TOKEN_FILE), token).await?,
            None => remove_if_exists(&self.home.join(TOKEN_FILE)).await?,
        }
        debug!("Current target set to {}", label);
        Ok(())
    }

    /// The current target, if one was selected
    pub async fn current(&self) -> Result<Option<Target>> {
        let Some(label) = self.current_label().await? else {
            return Ok(None);
        };
        let targets = self.load().await?;
        let Some(url) = targets.get(&label) else {
            return Ok(None);
        };
        let token = read_trimmed(&self.home.join(TOKEN_FILE)).await?;
        Ok(Some(Target {
            label,
            url: url.clone(),
            token,
        }))
    }

    async fn current_label(&self) -> Result<Option<String>> {
        read_trimmed(&self.home.join(CURRENT_FILE)).await
    }

    async fn save(&self, targets: &BTreeMap<String, String>) -> Result<()> {
        fs::create_dir_all(&self.home).await?;
        fs::write(self.home.join(TARGETS_FILE), serde_yaml::to_string(targets)?).await?;
        Ok(())
    }
}

async fn read_trimmed(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => {
            let trimmed = content.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
