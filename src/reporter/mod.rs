// file: src/reporter/mod.rs
// version: 2.0.0
// guid: c8e1f374-5b9a-4d02-a6e7-13f0d9b28c5a

//! Progress reporting for installation runs

use crate::{
    error::{InstallError, Stage},
    orchestrator::InstallReport,
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info, warn};

/// Receives progress notifications from an installation run.
///
/// Notifications are observational only; a reporter cannot fail a run.
pub trait InstallReporter: Send + Sync {
    fn stage_started(&self, stage: Stage);

    fn stage_completed(&self, stage: Stage);

    fn stage_failed(&self, stage: Stage, error: &InstallError);

    fn component_started(&self, name: &str);

    fn component_installed(&self, name: &str);

    /// Non-fatal problem worth showing the operator
    fn warning(&self, message: &str);

    /// Cluster and component overview, sent before hosts are registered
    fn overview(&self, report: &InstallReport);
}

/// Interactive reporter: a spinner per stage, coloured status lines
pub struct ConsoleReporter {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn replace_spinner(&self, next: Option<ProgressBar>) -> Option<ProgressBar> {
        match self.spinner.lock() {
            Ok(mut guard) => std::mem::replace(&mut *guard, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        }
    }

    /// Print above the spinner when one is active
    fn line(&self, text: String) {
        let guard = match self.spinner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_ref() {
            Some(pb) => pb.println(text),
            None => println!("{}", text),
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallReporter for ConsoleReporter {
    fn stage_started(&self, stage: Stage) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(Self::spinner_style());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(format!("{}...", stage));

        if let Some(previous) = self.replace_spinner(Some(pb)) {
            previous.finish_and_clear();
        }
    }

    fn stage_completed(&self, stage: Stage) {
        if let Some(pb) = self.replace_spinner(None) {
            pb.finish_and_clear();
        }
        println!("{} {}", "✓".green().bold(), stage.to_string().green());
    }

    fn stage_failed(&self, stage: Stage, error: &InstallError) {
        if let Some(pb) = self.replace_spinner(None) {
            pb.finish_and_clear();
        }
        eprintln!("{} {}: {}", "✗".red().bold(), stage.to_string().red(), error.root());
    }

    fn component_started(&self, name: &str) {
        self.line(format!("  {} Installing {}", "→".cyan(), name.bold()));
    }

    fn component_installed(&self, name: &str) {
        self.line(format!("  {} {} successfully installed!", "✓".green(), name));
    }

    fn warning(&self, message: &str) {
        self.line(format!("{} {}", "⚠".yellow().bold(), message.yellow()));
    }

    fn overview(&self, report: &InstallReport) {
        self.line(report.render());
    }
}

/// Non-interactive reporter that only emits tracing events
#[derive(Debug, Default)]
pub struct TracingReporter;

impl InstallReporter for TracingReporter {
    fn stage_started(&self, stage: Stage) {
        info!(stage = stage.as_str(), "Stage started");
    }

    fn stage_completed(&self, stage: Stage) {
        info!(stage = stage.as_str(), "Stage completed");
    }

    fn stage_failed(&self, stage: Stage, error: &InstallError) {
        error!(stage = stage.as_str(), error = %error.root(), "Stage failed");
    }

    fn component_started(&self, name: &str) {
        info!(component = name, "Installing component");
    }

    fn component_installed(&self, name: &str) {
        info!(component = name, "Component installed");
    }

    fn warning(&self, message: &str) {
        warn!("{}", message);
    }

    fn overview(&self, report: &InstallReport) {
        info!(
            nodes = report.cluster_nodes.len(),
            components = report.components.len(),
            apps_hosts = report.apps_machines.len(),
            "Installation overview"
        );
        for row in &report.components {
            info!(component = %row.name, ports = %row.ports, replicas = %row.replicas, "Component status");
        }
    }
}
