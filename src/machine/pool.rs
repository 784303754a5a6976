// file: src/machine/pool.rs
// version: 1.0.0
// guid: 7c41e9a8-2d35-4b60-a1f7-93e0d58c2b1f

//! Machine pool allocation
//!
//! Machines are requested strictly one after the other. A failure aborts the
//! pool, and machines created before the failure are left running: the
//! provisioner remains the source of truth and cleanup is the job of an
//! explicit uninstall.

use super::{Machine, MachineProvisioner};
use crate::{
    config::{HostOptions, InstallationPlan},
    error::InstallError,
    Result,
};
use tracing::{debug, info};

/// Provision `count` machines, machine `i` taking option value `i % len`
pub async fn provision_machines(
    provisioner: &dyn MachineProvisioner,
    count: usize,
    opts: &HostOptions,
) -> Result<Vec<Machine>> {
    let mut machines = Vec::with_capacity(count);

    for index in 0..count {
        let machine_opts = opts.for_index(index);
        debug!("Provisioning machine {}/{} with {:?}", index + 1, count, machine_opts);

        let machine = provisioner
            .provision_machine(&machine_opts)
            .await
            .map_err(|e| {
                InstallError::provision_failed(
                    format!("failed to provision machine {}/{}", index + 1, count),
                    e,
                )
            })?;

        info!("Machine {} provisioned at {}", machine.name, machine.ip);
        machines.push(machine);
    }

    Ok(machines)
}

/// Pick the machines that will host applications.
///
/// - dedicated: `apps_hosts` fresh machines
/// - more apps hosts than core hosts: the deficit is provisioned and the
///   fresh machines come first, followed by every core machine
/// - otherwise the first `apps_hosts` core machines are reused
pub async fn select_apps_pool(
    provisioner: &dyn MachineProvisioner,
    plan: &InstallationPlan,
    core_machines: &[Machine],
) -> Result<Vec<Machine>> {
    if plan.dedicated_apps_hosts {
        info!("Provisioning {} dedicated apps hosts", plan.apps_hosts);
        return provision_machines(provisioner, plan.apps_hosts, &plan.apps_driver_opts).await;
    }

    if plan.apps_hosts > core_machines.len() {
        let deficit = plan.apps_hosts - core_machines.len();
        info!(
            "Reusing {} core hosts and provisioning {} apps hosts",
            core_machines.len(),
            deficit
        );
        let mut pool = provision_machines(provisioner, deficit, &plan.apps_driver_opts)
            .await
            .map_err(|e| InstallError::provision_failed("failed to provision pool hosts", e))?;
        pool.extend_from_slice(core_machines);
        return Ok(pool);
    }

    info!("Reusing {} core hosts as apps hosts", plan.apps_hosts);
    Ok(core_machines[..plan.apps_hosts].to_vec())
}
