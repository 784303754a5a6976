// file: src/utils/process.rs
// version: 1.0.0
// guid: 9e3d5b17-0c2f-4a88-b6d1-e47a20c95f3b

//! Local process execution helpers

use crate::{error::InstallError, Result};
use std::ffi::OsStr;
use tokio::process::Command;
use tracing::debug;

/// Run a program and return its stdout, failing on a non-zero exit
pub async fn run_checked<S: AsRef<OsStr>>(program: S, args: &[String], context: &str) -> Result<String> {
    let program = program.as_ref();
    let rendered = format!("{} {}", program.to_string_lossy(), args.join(" "));
    debug!("Executing command for {}: {}", context, rendered);

    let output = Command::new(program).args(args).output().await.map_err(|e| {
        InstallError::ProcessError {
            command: rendered.clone(),
            exit_code: None,
            stderr: format!("failed to execute {}: {}", context, e),
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        return Err(InstallError::ProcessError {
            command: rendered,
            exit_code: output.status.code(),
            stderr: if stderr.is_empty() { stdout } else { stderr },
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Quote a value for a POSIX shell
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@%+".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
