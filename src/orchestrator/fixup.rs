// file: src/orchestrator/fixup.rs
// version: 1.0.0
// guid: 7e3b1d95-c084-4a2f-b7d6-5f9e0a18c3d2

//! Post-provision firewall fixup on core hosts

use crate::{machine::Machine, network::RemoteShell};
use tracing::{debug, warn};

/// Isolation rules the overlay network driver may leave between the bridges
pub const FIXUP_COMMANDS: [&str; 2] = [
    "PATH=$PATH:/usr/sbin/:/usr/local/sbin; sudo iptables -D DOCKER-ISOLATION -i docker_gwbridge -o docker0 -j DROP",
    "PATH=$PATH:/usr/sbin/:/usr/local/sbin; sudo iptables -D DOCKER-ISOLATION -i docker0 -o docker_gwbridge -j DROP",
];

/// Remove the isolation rules on every machine. Never fails; each failed
/// command becomes a warning.
pub async fn apply(shell: &dyn RemoteShell, machines: &[Machine]) -> Vec<String> {
    let mut warnings = Vec::new();

    for machine in machines {
        for command in FIXUP_COMMANDS {
            match shell.run(machine, command).await {
                Ok(_) => debug!("Removed isolation rule on {}", machine.name),
                Err(e) => {
                    let message = format!(
                        "failed to apply iptables rule on {}: {}. Maybe it is not needed anymore?",
                        machine.name, e
                    );
                    warn!("{}", message);
                    warnings.push(message);
                }
            }
        }
    }

    warnings
}
