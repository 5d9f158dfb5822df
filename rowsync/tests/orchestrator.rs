#![cfg(feature = "test-utils")]

use std::time::Duration;

use rowsync::checkpoint::CheckpointStore;
use rowsync::checkpoint::file::FileCheckpointStore;
use rowsync::checkpoint::memory::MemoryCheckpointStore;
use rowsync::destination::memory::MemoryDestination;
use rowsync::error::ErrorKind;
use rowsync::orchestrator::Orchestrator;
use rowsync::test_utils::memory_extractor::MemoryExtractor;
use rowsync::test_utils::table::{test_record, test_table_config};
use rowsync::test_utils::test_destination_wrapper::TestDestinationWrapper;
use rowsync::workers::poller::PollerPhase;
use rowsync_telemetry::tracing::init_test_tracing;

#[tokio::test(start_paused = true)]
async fn pollers_deliver_every_active_table_until_shutdown() {
    init_test_tracing();

    let mut retired = test_table_config("retired", 5);
    retired.active = false;
    let tables = vec![
        test_table_config("history", 0),
        test_table_config("trends", 1_000),
        retired,
    ];

    let store = MemoryCheckpointStore::new();
    let extractor = MemoryExtractor::new();
    extractor.add_ids("history", 1..=10).await;
    extractor.add_ids("trends", 1_001..=1_030).await;
    extractor.add_ids("retired", 6..=7).await;
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());

    let delivered = destination.wait_for_records_count(40).await;

    let mut orchestrator =
        Orchestrator::new(tables, store.clone(), extractor.clone(), destination.clone());
    orchestrator.start().await.unwrap();

    delivered.notified().await;
    for table_name in ["history", "trends"] {
        let state = orchestrator.poller_state(table_name).unwrap();
        state.wait_for_phase(&[PollerPhase::Sleeping]).await;
    }
    assert!(orchestrator.poller_state("retired").is_none());

    orchestrator.shutdown_and_wait().await.unwrap();

    let checkpoints = store.checkpoints().await.unwrap();
    assert_eq!(checkpoints.get("history"), Some(&10));
    assert_eq!(checkpoints.get("trends"), Some(&1_030));
    // Inactive tables get a checkpoint but are never polled.
    assert_eq!(checkpoints.get("retired"), Some(&5));
    assert!(extractor.windows("retired").await.is_empty());
    assert!(destination.shutdown_called().await);

    // Records of each table arrive in query order.
    let history_records = destination
        .get_records()
        .await
        .into_iter()
        .filter(|record| record.starts_with("history,"))
        .collect::<Vec<_>>();
    assert_eq!(
        &history_records[..10],
        &(1..=10)
            .map(|id| test_record("history", id))
            .collect::<Vec<_>>()[..]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_poller_does_not_stop_other_tables() {
    init_test_tracing();

    let tables = vec![test_table_config("broken", 0), test_table_config("healthy", 0)];

    let store = MemoryCheckpointStore::new();
    let extractor = MemoryExtractor::new();
    extractor
        .fail_next("broken", ErrorKind::SourceQueryFailed)
        .await;
    extractor.add_ids("healthy", 1..=5).await;
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());

    let mut orchestrator =
        Orchestrator::new(tables, store.clone(), extractor.clone(), destination.clone());
    orchestrator.start().await.unwrap();

    let broken = orchestrator.poller_state("broken").unwrap();
    assert_eq!(
        broken.wait_for_phase(&[PollerPhase::Failed]).await,
        PollerPhase::Failed
    );

    // The healthy poller keeps picking up new rows.
    let last_record = test_record("healthy", 8);
    let delivered = destination
        .notify_on_batches(move |batches| batches.iter().flatten().any(|r| *r == last_record))
        .await;
    extractor.add_ids("healthy", 6..=8).await;
    delivered.notified().await;

    let err = orchestrator.shutdown_and_wait().await.unwrap_err();

    assert_eq!(err.kinds(), vec![ErrorKind::SourceQueryFailed]);
    assert_eq!(store.get_checkpoint("broken").await.unwrap(), 0);
    assert_eq!(store.get_checkpoint("healthy").await.unwrap(), 8);
}

#[tokio::test(start_paused = true)]
async fn start_without_active_tables_fails() {
    init_test_tracing();

    let mut table = test_table_config("history", 0);
    table.active = false;

    let mut orchestrator = Orchestrator::new(
        vec![table],
        MemoryCheckpointStore::new(),
        MemoryExtractor::new(),
        MemoryDestination::new(),
    );

    let err = orchestrator.start().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    // Never started, so there is nothing to wait for.
    orchestrator.wait().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restart_resumes_from_persisted_checkpoints() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoints.json");
    let tables = vec![test_table_config("history", 100)];

    let extractor = MemoryExtractor::new();
    extractor.add_ids("history", 113..=149).await;
    let destination = TestDestinationWrapper::wrap(MemoryDestination::new());

    let delivered = destination.wait_for_records_count(37).await;
    let mut orchestrator = Orchestrator::new(
        tables.clone(),
        FileCheckpointStore::new(&path),
        extractor.clone(),
        destination.clone(),
    );
    orchestrator.start().await.unwrap();
    delivered.notified().await;
    orchestrator
        .poller_state("history")
        .unwrap()
        .wait_for_phase(&[PollerPhase::Sleeping])
        .await;
    orchestrator.shutdown_and_wait().await.unwrap();

    // A fresh process reads the file written by the previous one.
    let extractor = MemoryExtractor::new();
    let store = FileCheckpointStore::new(&path);
    let mut orchestrator = Orchestrator::new(
        tables,
        store.clone(),
        extractor.clone(),
        MemoryDestination::new(),
    );
    orchestrator.start().await.unwrap();
    let state = orchestrator.poller_state("history").unwrap();
    tokio::time::timeout(
        Duration::from_secs(10),
        state.wait_for_phase(&[PollerPhase::Sleeping]),
    )
    .await
    .unwrap();
    orchestrator.shutdown_and_wait().await.unwrap();

    assert_eq!(store.get_checkpoint("history").await.unwrap(), 149);
    assert_eq!(extractor.windows("history").await[0].start_id, 149);
}
