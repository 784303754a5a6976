// file: tests/integration_test.rs
// version: 2.0.0
// guid: 4b0e7d26-a8f3-4c19-b5e2-f61d9c3a07b8

//! End-to-end installation runs over in-memory infrastructure

use paas_installer::{
    cluster::SwarmDriver,
    config::{loader::ConfigLoader, TargetStore},
    fakes::{FakeClusterDriver, FakePlatformApi, FakeProvisioner, FakeShell, RecordingReporter},
    orchestrator::Installer,
    InstallError, Result, Stage,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

const CONFIG: &str = r#"
name: paas-it
driver:
  name: amazonec2
  options:
    amazonec2-region: us-east-1
hosts:
  core:
    size: 2
    driver:
      options:
        amazonec2-zone: [a, b]
  apps:
    size: 2
    dedicated: true
    driver:
      options:
        amazonec2-instance-type: [t2.small, t2.large]
components:
  admin:
    email: ops@example.com
    password: s3cr3t-pass
"#;

#[tokio::test]
async fn test_install_from_config_file() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("install.yml");
    tokio::fs::write(&config_path, CONFIG).await?;

    let plan = ConfigLoader::new().resolve(Some(&config_path))?;
    let provisioner = Arc::new(FakeProvisioner::new("paas-it"));
    let driver = Arc::new(FakeClusterDriver::new());
    let api = FakePlatformApi::new();
    let reporter = Arc::new(RecordingReporter::new());

    let report = Installer::new(
        plan,
        provisioner.clone(),
        driver.clone(),
        Arc::new(FakeShell::new()),
        Arc::new(api.clone()),
        TargetStore::new(temp_dir.path().join("home")),
    )
    .with_reporter(reporter.clone())
    .run()
    .await?;

    let calls = provisioner.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0]["amazonec2-zone"], json!("a"));
    assert_eq!(calls[1]["amazonec2-zone"], json!("b"));
    assert_eq!(calls[0]["amazonec2-open-port"], json!("8080"));
    assert_eq!(calls[2]["amazonec2-instance-type"], json!("t2.small"));
    assert_eq!(calls[3]["amazonec2-instance-type"], json!("t2.large"));
    assert!(calls[2].get("amazonec2-open-port").is_none());

    assert_eq!(report.core_machines.len(), 2);
    assert_eq!(report.apps_machines.len(), 2);
    assert!(report
        .apps_machines
        .iter()
        .all(|m| !report.core_machines.contains(m)));

    let bootstraps = api.bootstraps();
    assert_eq!(bootstraps[0].login, "ops@example.com");
    assert_eq!(bootstraps[0].target_name, "paas-it");
    assert_eq!(bootstraps[0].nodes, vec!["192.168.0.3", "192.168.0.4"]);
    assert_eq!(api.registrations().len(), 4);

    let events = reporter.events();
    let stages: Vec<_> = events.iter().filter(|e| e.starts_with("stage:")).collect();
    assert_eq!(stages.len(), 9);
    assert_eq!(stages[0], "stage:pre-install checks");
    assert_eq!(stages[8], "stage:hosts registration");
    Ok(())
}

#[tokio::test]
async fn test_swarm_install_over_remote_shell() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let plan = ConfigLoader::new().resolve_str("hosts:\n  core:\n    size: 2\n")?;

    let shell = Arc::new(
        FakeShell::new()
            .respond("join-token", "SWMTKN-1-xyz\n")
            .respond(
                "node inspect",
                "192.168.0.1|ready|manager\n192.168.0.2|ready|worker\n",
            )
            .respond("service inspect", "1|80,\n")
            .fail_on("-i docker0 -o docker_gwbridge"),
    );
    let api = FakePlatformApi::new();

    let report = Installer::new(
        plan,
        Arc::new(FakeProvisioner::new("paas")),
        Arc::new(SwarmDriver::new(shell.clone(), "paas")),
        shell.clone(),
        Arc::new(api.clone()),
        TargetStore::new(temp_dir.path()),
    )
    .run()
    .await?;

    assert_eq!(report.cluster_nodes.len(), 2);
    assert_eq!(report.components.len(), 5);
    assert!(report.components.iter().all(|c| c.replicas == "1"));

    let creates: Vec<_> = shell
        .commands()
        .into_iter()
        .filter(|(_, cmd)| cmd.starts_with("sudo docker service create"))
        .map(|(machine, cmd)| (machine, cmd.split_whitespace().nth(5).unwrap_or_default().to_string()))
        .collect();
    assert_eq!(
        creates,
        vec![
            ("paas-1".to_string(), "mongodb".to_string()),
            ("paas-1".to_string(), "redis".to_string()),
            ("paas-1".to_string(), "planb".to_string()),
            ("paas-1".to_string(), "registry".to_string()),
            ("paas-1".to_string(), "paas-api".to_string()),
        ]
    );

    // one failed iptables rule per core host
    let fixup_warnings = report
        .warnings
        .iter()
        .filter(|w| w.contains("iptables"))
        .count();
    assert_eq!(fixup_warnings, 2);
    assert_eq!(api.registrations().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_cluster_failure_keeps_core_machines() {
    let temp_dir = TempDir::new().unwrap();
    let provisioner = Arc::new(FakeProvisioner::new("paas"));
    let plan = ConfigLoader::new()
        .resolve_str("hosts:\n  core:\n    size: 3\n")
        .unwrap();

    let err = Installer::new(
        plan,
        provisioner.clone(),
        Arc::new(FakeClusterDriver::new().failing()),
        Arc::new(FakeShell::new()),
        Arc::new(FakePlatformApi::new()),
        TargetStore::new(temp_dir.path()),
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::FormCluster));
    assert!(matches!(err.root(), InstallError::ClusterError(_)));
    assert!(err.to_string().starts_with("cluster formation failed"));
    assert_eq!(provisioner.live_machines().len(), 3);
    assert!(!provisioner.deleted());
    assert!(provisioner.is_closed());
}

#[tokio::test]
async fn test_overview_reported_when_registration_fails() {
    let temp_dir = TempDir::new().unwrap();
    let plan = ConfigLoader::new()
        .resolve_str("hosts:\n  core:\n    size: 2\n  apps:\n    size: 1\n")
        .unwrap();
    let reporter = Arc::new(RecordingReporter::new());

    let err = Installer::new(
        plan,
        Arc::new(FakeProvisioner::new("paas")),
        Arc::new(FakeClusterDriver::new()),
        Arc::new(FakeShell::new()),
        Arc::new(FakePlatformApi::new().fail_register_after(0)),
        TargetStore::new(temp_dir.path()),
    )
    .with_reporter(reporter.clone())
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::RegisterHosts));

    let overview = reporter.overview().expect("overview before registration");
    assert_eq!(overview.cluster_nodes.len(), 2);
    assert_eq!(overview.components.len(), 5);
    assert!(overview.render().contains("Core Components:"));
}
