// file: src/machine/descriptor.rs
// version: 1.0.0
// guid: c82f1e0d-4b3a-49d6-b7e5-1a60f9d2c3e8

//! Read-only accessors over docker-machine driver state.
//!
//! The descriptor stays an opaque JSON document; only the handful of fields
//! needed to reach a host over SSH are looked up, by their docker-machine
//! names.

use crate::{error::InstallError, Result};
use serde_json::Value;
use std::path::PathBuf;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SSH_USER: &str = "root";

/// Borrowed view over a driver descriptor
#[derive(Debug, Clone, Copy)]
pub struct DriverDescriptor<'a>(pub &'a Value);

impl<'a> DriverDescriptor<'a> {
    fn str_field(&self, key: &str) -> Option<&'a str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Public address, required to reach the host at all
    pub fn ip(&self) -> Result<&'a str> {
        self.str_field("IPAddress").ok_or_else(|| {
            InstallError::validation("driver descriptor has no IPAddress".to_string())
        })
    }

    /// Private address, falling back to the public one
    pub fn private_ip(&self) -> Option<&'a str> {
        self.str_field("PrivateIPAddress")
            .or_else(|| self.str_field("IPAddress"))
    }

    pub fn ssh_user(&self) -> &'a str {
        self.str_field("SSHUser").unwrap_or(DEFAULT_SSH_USER)
    }

    pub fn ssh_port(&self) -> u16 {
        self.0
            .get("SSHPort")
            .and_then(Value::as_u64)
            .and_then(|port| u16::try_from(port).ok())
            .filter(|port| *port != 0)
            .unwrap_or(DEFAULT_SSH_PORT)
    }

    pub fn ssh_key_path(&self) -> Option<PathBuf> {
        self.str_field("SSHKeyPath").map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_descriptor() {
        let value = json!({
            "IPAddress": "54.1.2.3",
            "PrivateIPAddress": "172.31.0.4",
            "SSHUser": "ubuntu",
            "SSHPort": 2222,
            "SSHKeyPath": "/home/me/.paas/machines/paas-1/id_rsa",
        });
        let d = DriverDescriptor(&value);

        assert_eq!(d.ip().unwrap(), "54.1.2.3");
        assert_eq!(d.private_ip(), Some("172.31.0.4"));
        assert_eq!(d.ssh_user(), "ubuntu");
        assert_eq!(d.ssh_port(), 2222);
        assert_eq!(
            d.ssh_key_path(),
            Some(PathBuf::from("/home/me/.paas/machines/paas-1/id_rsa"))
        );
    }

    #[test]
    fn test_defaults() {
        let value = json!({ "IPAddress": "192.168.99.100", "SSHPort": 0, "PrivateIPAddress": "" });
        let d = DriverDescriptor(&value);

        assert_eq!(d.private_ip(), Some("192.168.99.100"));
        assert_eq!(d.ssh_user(), "root");
        assert_eq!(d.ssh_port(), 22);
        assert!(d.ssh_key_path().is_none());
    }

    #[test]
    fn test_missing_ip() {
        let value = json!({});
        assert!(DriverDescriptor(&value).ip().is_err());
    }
}
