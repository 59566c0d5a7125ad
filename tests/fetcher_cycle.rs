
use camcommander::fetcher::{Fetcher, RsyncFetcher};
use common_test_utils::{channel_sink, drain, shared, source, FakeAgent};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn only_jpg_paths_become_notifications() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = shared(FakeAgent::new().with_fetches(vec![Ok(vec![
        "receiving incremental file list",
        "2024/05/01/",
        "2024/05/01/cam1_0001.jpg",
        "2024/05/01/cam1_0001.png",
        "2024/05/01/cam1_0002.jpg",
        "sent 1,234 bytes  received 56,789 bytes",
    ])]));
    let (sink, mut rx) = channel_sink();
    let mut fetcher = RsyncFetcher::with_sink(source("cam1", &[]), tmp.path().join("cam1"), sink, agent.clone());

    assert_eq!(fetcher.retrieve_cycle().await, 2);

    let published = drain(&mut rx);
    let artifacts: Vec<&str> = published.iter().map(|n| n.artifact.as_str()).collect();
    assert_eq!(artifacts, ["2024/05/01/cam1_0001.jpg", "2024/05/01/cam1_0002.jpg"]);
    assert!(published.iter().all(|n| n.source == "cam1"));
    assert!(tmp.path().join("cam1").is_dir());
}

#[tokio::test]
async fn same_path_is_published_once_per_cycle() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = shared(FakeAgent::new().with_fetches(vec![Ok(vec!["a.jpg", "a.jpg", "b.jpg"])]));
    let (sink, mut rx) = channel_sink();
    let mut fetcher = RsyncFetcher::with_sink(source("cam1", &[]), tmp.path().to_path_buf(), sink, agent);

    assert_eq!(fetcher.retrieve_cycle().await, 2);
    assert_eq!(drain(&mut rx).len(), 2);
}

#[tokio::test]
async fn failed_retrieval_counts_as_nothing_new_and_next_cycle_proceeds() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = shared(FakeAgent::new().with_fetches(vec![Err("ssh: connect to host cam1 port 22: No route to host"), Ok(vec!["c.jpg"])]));
    let (sink, mut rx) = channel_sink();
    let mut fetcher = RsyncFetcher::with_sink(source("cam1", &["mirror"]), tmp.path().to_path_buf(), sink, agent.clone());

    assert_eq!(fetcher.check_source().await, 0);
    assert!(agent.deliveries().is_empty());

    assert_eq!(fetcher.check_source().await, 1);
    assert_eq!(drain(&mut rx).len(), 1);
    assert_eq!(agent.delivered_to(), ["mirror"]);
}

#[tokio::test]
async fn retention_prunes_only_after_new_images() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = shared(FakeAgent::new().with_fetches(vec![Ok(vec!["notes.txt"]), Ok(vec!["a.jpg"])]));
    let mut config = source("cam1", &[]);
    config.retention = Some(14);
    let (sink, _rx) = channel_sink();
    let mut fetcher = RsyncFetcher::with_sink(config, tmp.path().to_path_buf(), sink, agent.clone());

    fetcher.check_source().await;
    assert_eq!(agent.prune_calls(), 0);
    fetcher.check_source().await;
    assert_eq!(agent.prune_calls(), 1);
}

#[tokio::test]
async fn no_retention_means_no_prune() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = shared(FakeAgent::new().with_fetches(vec![Ok(vec!["a.jpg"])]));
    let (sink, _rx) = channel_sink();
    let mut fetcher = RsyncFetcher::with_sink(source("cam1", &[]), tmp.path().to_path_buf(), sink, agent.clone());

    assert_eq!(fetcher.check_source().await, 1);
    assert_eq!(agent.prune_calls(), 0);
}

#[tokio::test]
async fn deliveries_use_the_source_scratch_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let scratch = tmp.path().join("cam1");
    let agent = shared(FakeAgent::new().with_fetches(vec![Ok(vec!["a.jpg"])]));
    let (sink, _rx) = channel_sink();
    let mut fetcher = RsyncFetcher::with_sink(source("cam1", &["north", "south"]), scratch.clone(), sink, agent.clone());

    fetcher.check_source().await;
    let deliveries = agent.deliveries();
    assert_eq!(deliveries.len(), 2);
    assert!(deliveries.iter().all(|(_, dir)| *dir == scratch));
}

#[tokio::test(start_paused = true)]
async fn one_cycle_per_interval() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = shared(FakeAgent::new());
    let (sink, _rx) = channel_sink();
    let config = source("cam1", &[]);
    let interval = Duration::from_secs(config.interval);
    let mut fetcher = RsyncFetcher::with_sink(config, tmp.path().to_path_buf(), sink, agent.clone());

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let worker = tokio::spawn(async move { fetcher.start(token).await });

    // Cycles run at 0, I, 2I and 3I; stop halfway to the fifth.
    tokio::time::sleep(interval * 4 - interval / 2).await;
    shutdown.cancel();
    worker.await.unwrap();

    assert_eq!(agent.fetch_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_the_sleep_between_cycles() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = shared(FakeAgent::new());
    let (sink, _rx) = channel_sink();
    let mut config = source("cam1", &[]);
    config.interval = 3600;
    let mut fetcher = RsyncFetcher::with_sink(config, tmp.path().to_path_buf(), sink, agent.clone());

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let worker = tokio::spawn(async move { fetcher.start(token).await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), worker).await.unwrap().unwrap();
    assert_eq!(agent.fetch_calls(), 1);
}
