
use camcommander::config_loader::{load_config, wait_for_config, CONFIG_FILE_ENV};
use camcommander::core::orchestrator::Orchestrator;
use camcommander::errors::AppError;
use camcommander::operations::check_op::check_all_sources;
use common_test_utils::{shared, FakeAgent};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

fn daemon_config(scratch: &Path, source_type: &str) -> String {
    format!(
        r#"
application:
  backend_endpoint: "tcp://127.0.0.1:0"
  frontend_endpoint: "tcp://127.0.0.1:0"
  scratch_dir: "{scratch}"
  shutdown_grace_secs: 2
sources:
  - name: cam1
    type: {source_type}
    path: /www/cams
    interval: 1
    destinations:
      - name: mirror
        path: /srv/mirror
watchers:
  - name: console
    type: console
"#,
        scratch = scratch.display(),
        source_type = source_type,
    )
}

#[tokio::test(start_paused = true)]
async fn missing_config_is_retried_until_it_appears() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camcommander.yaml");
    let waiter = {
        let path = path.clone();
        tokio::spawn(async move { wait_for_config(&path, Duration::from_secs(60)).await })
    };

    tokio::time::sleep(Duration::from_secs(150)).await;
    assert!(!waiter.is_finished());

    std::fs::write(&path, daemon_config(dir.path(), "rsync")).unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    let config = waiter.await.unwrap().unwrap();
    assert_eq!(config.sources[0].name, "cam1");
}

#[tokio::test]
async fn malformed_config_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camcommander.yaml");
    std::fs::write(&path, "sources: [unterminated").unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), wait_for_config(&path, Duration::from_secs(60)))
        .await
        .expect("a broken file should fail immediately");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[tokio::test]
async fn daemon_runs_cycles_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camcommander.yaml");
    std::fs::write(&path, daemon_config(dir.path(), "rsync")).unwrap();

    let agent = shared(FakeAgent::new().with_fetches(vec![Ok(vec!["a.jpg"])]));
    let orchestrator = Orchestrator::new(path, false).with_agent(agent.clone());
    let shutdown = orchestrator.shutdown_token();
    let running = tokio::spawn(orchestrator.run());

    tokio::time::timeout(Duration::from_secs(10), async {
        while agent.deliveries().is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("the fetcher never shipped its first batch");

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(10), running).await.unwrap().unwrap();
    assert!(result.is_ok(), "orchestrator failed: {:?}", result);
    assert_eq!(agent.delivered_to(), ["mirror"]);
    assert!(dir.path().join("cam1").is_dir());
}

#[tokio::test]
async fn shutdown_while_waiting_for_config_is_clean() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(dir.path().join("missing.yaml"), false);
    let shutdown = orchestrator.shutdown_token();
    let running = tokio::spawn(orchestrator.run());

    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn unknown_worker_type_stops_startup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camcommander.yaml");
    std::fs::write(&path, daemon_config(dir.path(), "bogus")).unwrap();

    let agent = shared(FakeAgent::new());
    let result = Orchestrator::new(path, false).with_agent(agent.clone()).run().await;

    assert!(result.is_err());
    assert_eq!(agent.fetch_calls(), 0);
}

#[tokio::test]
async fn unbindable_broker_endpoint_stops_startup() {
    let dir = tempfile::tempdir().unwrap();
    let occupied = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();
    let path = dir.path().join("camcommander.yaml");
    let yaml = daemon_config(dir.path(), "rsync").replace(
        "backend_endpoint: \"tcp://127.0.0.1:0\"",
        &format!("backend_endpoint: \"tcp://127.0.0.1:{}\"", port),
    );
    std::fs::write(&path, yaml).unwrap();

    let agent = shared(FakeAgent::new());
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        Orchestrator::new(path, false).with_agent(agent.clone()).run(),
    )
    .await
    .expect("a bind failure should end startup at once");

    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to bind backend endpoint"), "{:#}", err);
    assert_eq!(agent.fetch_calls(), 0);
    drop(occupied);
}

#[tokio::test]
async fn check_mode_visits_every_source_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camcommander.yaml");
    let yaml = format!(
        r#"
application:
  scratch_dir: "{}"
sources:
  - name: north
    type: rsync
    path: /www/cams
    destinations:
      - {{ name: north-mirror, path: /srv/a }}
      - {{ name: north-backup, path: /srv/b }}
  - name: south
    type: rsync
    path: /www/cams
    destinations:
      - {{ name: south-mirror, path: /srv/c }}
"#,
        dir.path().display()
    );
    std::fs::write(&path, yaml).unwrap();
    let config = load_config(&path).unwrap();

    let agent = shared(FakeAgent::new().with_fetches(vec![Ok(vec!["x.jpg"]), Ok(vec!["y.jpg"])]));
    let mut results = check_all_sources(&config, agent.clone()).await;
    results.sort();

    assert_eq!(results, [("north".to_string(), 1), ("south".to_string(), 1)]);
    assert_eq!(agent.fetch_calls(), 2);
    assert_eq!(agent.delivered_to(), ["north-backup", "north-mirror", "south-mirror"]);
}

#[test]
fn binary_exits_nonzero_on_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camcommander.yaml");
    std::fs::write(&path, daemon_config(dir.path(), "bogus")).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_camcommander"))
        .arg("check")
        .env(CONFIG_FILE_ENV, &path)
        .status()
        .unwrap();
    assert!(!status.success());
}
