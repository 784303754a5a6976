// file: src/cli/args.rs
// version: 2.0.0
// guid: 8b6e2f41-d9a3-4c07-95e1-3a7f0c2d8b64

//! Command line argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "paas-installer")]
#[command(about = "Provision hosts and install a PaaS control plane on them")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Installer state directory (targets, machine storage)
    #[arg(long, global = true, env = "PAAS_HOME", help = "State directory [default: ~/.paas]")]
    pub home: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision hosts and install the platform
    Install {
        #[arg(short, long, help = "Installation configuration file (YAML)")]
        config: Option<PathBuf>,
    },

    /// Destroy every host of an installation
    Uninstall {
        #[arg(short, long, help = "Installation configuration file (YAML)")]
        config: Option<PathBuf>,
    },

    /// List hosts registered by installations on the current target
    InstallHostList,

    /// Log into or run a command on an installed host with SSH
    InstallSsh {
        /// Registered host name
        hostname: String,

        /// Remote command and its arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_install_ssh_trailing_args() {
        let cli = Cli::try_parse_from([
            "paas-installer",
            "install-ssh",
            "paas-1",
            "ls",
            "-la",
            "/tmp",
        ])
        .unwrap();

        match cli.command {
            Commands::InstallSsh { hostname, args } => {
                assert_eq!(hostname, "paas-1");
                assert_eq!(args, vec!["ls", "-la", "/tmp"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "paas-installer",
            "install",
            "-c",
            "install.yml",
            "--home",
            "/tmp/paas",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/paas")));
        assert!(matches!(
            cli.command,
            Commands::Install { config: Some(ref c) } if c == &PathBuf::from("install.yml")
        ));
    }
}
