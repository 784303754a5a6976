// file: src/network/executor.rs
// version: 2.0.0
// guid: exec0001-2345-6789-abcd-ef0123456789

//! Remote command execution on provisioned machines

use super::ssh::SshClient;
use crate::{error::InstallError, machine::Machine, Result};

/// Runs shell commands on a machine
#[async_trait::async_trait]
pub trait RemoteShell: Send + Sync {
    /// Execute `command` on `machine` and return its stdout
    async fn run(&self, machine: &Machine, command: &str) -> Result<String>;
}

/// `RemoteShell` over a fresh SSH session per command
#[derive(Debug, Default, Clone, Copy)]
pub struct SshShell;

#[async_trait::async_trait]
impl RemoteShell for SshShell {
    async fn run(&self, machine: &Machine, command: &str) -> Result<String> {
        let machine = machine.clone();
        let command = command.to_string();

        tokio::task::spawn_blocking(move || {
            let mut client = SshClient::new();
            client.connect(
                &machine.ip,
                machine.ssh_port,
                &machine.ssh_user,
                &machine.ssh_key_path,
            )?;
            client.execute_with_output(&command)
        })
        .await
        .map_err(|e| InstallError::ssh(format!("SSH task failed: {}", e)))?
    }
}
