// file: src/cli/commands.rs
// version: 2.0.0
// guid: 3d9f0b72-6e15-4a8c-b2d7-e048a1c5f963

//! Command implementations for the CLI

use crate::{
    api::{HttpConnector, InstalledHost, PlatformApi, PlatformClient},
    cluster::SwarmDriver,
    config::{ConfigLoader, TargetStore},
    error::InstallError,
    machine::{DockerMachine, DriverDescriptor},
    network::SshShell,
    orchestrator::{self, Installer},
    reporter::{ConsoleReporter, InstallReporter, TracingReporter},
    Result,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Resolve the state directory, `~/.paas` unless overridden
pub fn resolve_home(home: Option<PathBuf>) -> Result<PathBuf> {
    match home {
        Some(home) => Ok(home),
        None => TargetStore::default_home(),
    }
}

/// Provision hosts and install the platform
pub async fn install_command(
    home: &Path,
    config: Option<PathBuf>,
    json_output: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let plan = ConfigLoader::new().resolve(config.as_ref())?;
    info!("Running pre-install checks...");

    let provisioner = DockerMachine::new(home, &plan).await?;
    let shell = Arc::new(SshShell);
    let cluster_driver = SwarmDriver::new(shell.clone(), plan.components.network.clone());
    let reporter: Arc<dyn InstallReporter> = if json_output {
        Arc::new(TracingReporter)
    } else {
        Arc::new(ConsoleReporter::new())
    };

    let installer = Installer::new(
        plan,
        Arc::new(provisioner),
        Arc::new(cluster_driver),
        shell,
        Arc::new(HttpConnector),
        TargetStore::new(home),
    )
    .with_reporter(reporter)
    .with_cancellation(cancel);

    let report = installer.run().await?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        info!(
            "Installation finished, {} hosts registered",
            report.registered_hosts.len()
        );
    }
    Ok(())
}

/// Destroy every host of an installation
pub async fn uninstall_command(home: &Path, config: Option<PathBuf>) -> Result<()> {
    let plan = ConfigLoader::new().resolve(config.as_ref())?;
    let provisioner = DockerMachine::new(home, &plan).await?;

    orchestrator::uninstall(
        &provisioner,
        &TargetStore::new(home),
        &plan.components.target_name,
    )
    .await?;

    println!("Uninstall finished successfully!");
    Ok(())
}

async fn current_client(home: &Path) -> Result<PlatformClient> {
    let target = TargetStore::new(home)
        .current()
        .await?
        .ok_or_else(|| InstallError::config("no current target, run install first"))?;
    debug!("Using target {} at {}", target.label, target.url);

    Ok(PlatformClient::new(&target.url)?.with_token(target.token.as_deref()))
}

/// List hosts registered on the current target
pub async fn install_host_list_command(home: &Path) -> Result<()> {
    let client = current_client(home).await?;
    let hosts = client.list_hosts().await?;

    if hosts.is_empty() {
        info!("No hosts registered");
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    writeln!(
        stdout,
        "{:<24} {:<14} {:<16} {}",
        "Name", "Driver Name", "Address", "Driver"
    )?;
    writeln!(stdout, "{:-<80}", "")?;
    for host in &hosts {
        write_host_row(&mut stdout, host)?;
    }

    info!("Found {} hosts", hosts.len());
    Ok(())
}

fn write_host_row(out: &mut impl Write, host: &InstalledHost) -> Result<()> {
    let address = DriverDescriptor(&host.driver).ip().unwrap_or("-");
    let driver = serde_json::to_string_pretty(&host.driver)?;
    let mut lines = driver.lines();

    writeln!(
        out,
        "{:<24} {:<14} {:<16} {}",
        host.name,
        host.driver_name,
        address,
        lines.next().unwrap_or_default()
    )?;
    for line in lines {
        writeln!(out, "{:<56} {}", "", line)?;
    }
    writeln!(out, "{:-<80}", "")?;
    Ok(())
}

/// `ssh` arguments for `host`, using `key_path` as identity
pub fn ssh_args(host: &InstalledHost, key_path: &Path, remote: &[String]) -> Result<Vec<String>> {
    let descriptor = DriverDescriptor(&host.driver);
    let ip = descriptor.ip()?;

    let mut args = vec![
        "-i".to_string(),
        key_path.display().to_string(),
        "-p".to_string(),
        descriptor.ssh_port().to_string(),
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        format!("{}@{}", descriptor.ssh_user(), ip),
    ];
    args.extend(remote.iter().cloned());
    Ok(args)
}

/// Open a shell, or run `args`, on a registered host
pub async fn install_ssh_command(home: &Path, hostname: &str, args: &[String]) -> Result<()> {
    let client = current_client(home).await?;
    let host = client.get_host(hostname).await?;

    let ssh = which::which("ssh")
        .map_err(|e| InstallError::config(format!("ssh client not found: {}", e)))?;

    let mut key = tempfile::Builder::new().prefix("paas-ssh-").tempfile()?;
    key.write_all(host.ssh_private_key.as_bytes())?;
    key.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(key.path(), std::fs::Permissions::from_mode(0o600))?;
    }

    let ssh_args = ssh_args(&host, key.path(), args)?;
    debug!("Running {} {}", ssh.display(), ssh_args.join(" "));

    let status = Command::new(&ssh).args(&ssh_args).status().await?;
    if !status.success() {
        return Err(InstallError::ProcessError {
            command: format!("ssh {}", hostname),
            exit_code: status.code(),
            stderr: String::new(),
        });
    }
    Ok(())
}
