// file: src/lib.rs
// version: 3.0.0
// guid: d82472d1-7f0f-4eb4-b0a3-6e1547103eb4

//! # paas-installer
//!
//! Bootstraps a multi-host PaaS: provisions machines through docker-machine,
//! joins them into a swarm, installs the platform components in order,
//! bootstraps the control API and registers every host with it.
//!
//! The run is driven by [`orchestrator::Installer`] over capability traits
//! ([`machine::MachineProvisioner`], [`cluster::ClusterDriver`],
//! [`network::RemoteShell`], [`api::PlatformApi`]); [`fakes`] holds
//! in-memory variants of each.

pub mod api;
pub mod cli;
pub mod cluster;
pub mod components;
pub mod config;
pub mod error;
pub mod fakes;
pub mod logging;
pub mod machine;
pub mod network;
pub mod orchestrator;
pub mod registry;
pub mod reporter;
pub mod utils;

pub use error::{InstallError, Result, Stage};

/// Version information for the installer
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
