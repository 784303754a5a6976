// file: src/network/ssh.rs
// version: 2.0.0
// guid: t0u1v2w3-x4y5-6789-0123-456789tuvwxy

//! SSH client for remote commands on provisioned machines
//!
//! `ssh2` is blocking; callers run it on the blocking thread pool.

use crate::{error::InstallError, Result};
use ssh2::Session;
use std::io::Read;
use std::net::TcpStream;
use std::path::Path;
use tracing::{debug, error, info};

/// SSH client for remote operations
pub struct SshClient {
    session: Option<Session>,
    host: String,
}

impl SshClient {
    /// Create a new SSH client
    pub fn new() -> Self {
        Self {
            session: None,
            host: String::new(),
        }
    }

    /// Connect with a private key file
    pub fn connect(&mut self, host: &str, port: u16, username: &str, key_path: &Path) -> Result<()> {
        info!("Connecting to {}:{} as {}", host, port, username);

        let tcp = TcpStream::connect((host, port))
            .map_err(|e| InstallError::ssh(format!("Failed to connect to {}: {}", host, e)))?;

        let mut session = Session::new()
            .map_err(|e| InstallError::ssh(format!("Failed to create SSH session: {}", e)))?;

        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| InstallError::ssh(format!("SSH handshake failed: {}", e)))?;

        session
            .userauth_pubkey_file(username, None, key_path, None)
            .map_err(|e| {
                InstallError::ssh(format!(
                    "SSH authentication with {} failed: {}",
                    key_path.display(),
                    e
                ))
            })?;

        if !session.authenticated() {
            return Err(InstallError::ssh("SSH authentication failed"));
        }

        self.session = Some(session);
        self.host = host.to_string();

        debug!("SSH connection established to {}", host);
        Ok(())
    }

    /// Execute command and return output
    pub fn execute_with_output(&mut self, command: &str) -> Result<String> {
        debug!("Executing on {}: {}", self.host, command);

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| InstallError::ssh("No active SSH session"))?;

        let mut channel = session
            .channel_session()
            .map_err(|e| InstallError::ssh(format!("Failed to create SSH channel: {}", e)))?;

        channel
            .exec(command)
            .map_err(|e| InstallError::ssh(format!("Failed to execute command: {}", e)))?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        channel
            .read_to_string(&mut stdout)
            .map_err(|e| InstallError::ssh(format!("Failed to read stdout: {}", e)))?;
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|e| InstallError::ssh(format!("Failed to read stderr: {}", e)))?;

        channel
            .wait_close()
            .map_err(|e| InstallError::ssh(format!("Failed to close SSH channel: {}", e)))?;

        let exit_status = channel
            .exit_status()
            .map_err(|e| InstallError::ssh(format!("Failed to get exit status: {}", e)))?;

        if exit_status != 0 {
            error!("Command failed on {} with exit code {}", self.host, exit_status);
            return Err(InstallError::ProcessError {
                command: command.to_string(),
                exit_code: Some(exit_status),
                stderr: if stderr.trim().is_empty() { stdout } else { stderr },
            });
        }

        Ok(stdout)
    }

    /// Disconnect SSH session
    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = session.disconnect(None, "", None);
            debug!("SSH session to {} disconnected", self.host);
        }
    }
}

impl Drop for SshClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl Default for SshClient {
    fn default() -> Self {
        Self::new()
    }
}
