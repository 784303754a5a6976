// file: src/main.rs
// version: 2.0.0
// guid: 6f2a9d14-c3b8-4e57-a0d1-87e5b2f4c960

//! paas-installer - main entry point

use clap::Parser;
use paas_installer::{
    cli::{commands::*, Cli, Commands},
    logging::logger,
    Result,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose, cli.quiet)?;
    } else {
        logger::init_logger(cli.verbose, cli.quiet)?;
    }

    let home = resolve_home(cli.home)?;

    match cli.command {
        Commands::Install { config } => {
            install_command(&home, config, cli.json_logs, interrupt_token()).await
        }
        Commands::Uninstall { config } => uninstall_command(&home, config).await,
        Commands::InstallHostList => install_host_list_command(&home).await,
        Commands::InstallSsh { hostname, args } => {
            install_ssh_command(&home, &hostname, &args).await
        }
    }
}

/// Token cancelled by the first Ctrl+C. In-flight remote calls cannot be
/// interrupted, so the run stops before its next stage; a second Ctrl+C
/// exits immediately.
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Received Ctrl+C, stopping after the current stage...");
        on_interrupt.cancel();

        if signal::ctrl_c().await.is_ok() {
            warn!("Received second Ctrl+C, exiting");
            std::process::exit(130);
        }
    });
    cancel
}
