//! End-to-end job lifecycle tests running real workers against a temporary
//! data directory. These spawn actual `sh` subprocesses and use real timers,
//! so the retry scenario takes a few seconds of wall clock.

use std::time::Duration;

use queuectl::app_state::AppState;
use queuectl::config::Settings;
use queuectl::models::job::JobStatus;
use queuectl::services::store::QueueSnapshot;
use tempfile::TempDir;

async fn state_in(dir: &TempDir) -> AppState {
    let settings = Settings {
        data_dir: dir.path().to_path_buf(),
    };
    AppState::init(&settings).await.expect("init state")
}

/// Poll the store until `predicate` holds or `timeout` elapses.
async fn wait_for(
    state: &AppState,
    timeout: Duration,
    predicate: impl Fn(&QueueSnapshot) -> bool,
) -> QueueSnapshot {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let snapshot = state.store.snapshot().await;
        if predicate(&snapshot) {
            return snapshot;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for queue condition; snapshot: active={} completed={} dead={}",
            snapshot.active.len(),
            snapshot.completed.len(),
            snapshot.dead.len()
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_three_workers_drain_five_jobs() {
    let dir = TempDir::new().unwrap();
    let state = state_in(&dir).await;

    for i in 0..5 {
        state.store.enqueue(&format!("echo job-{i}")).await.unwrap();
    }

    state.workers.start(3).await.unwrap();
    let snapshot = wait_for(&state, Duration::from_secs(10), |s| {
        s.completed.len() == 5
    })
    .await;
    state.workers.stop().await;

    assert!(snapshot.active.is_empty());
    assert!(snapshot.dead.is_empty());
    for job in &snapshot.completed {
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempts, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failing_job_retries_then_dead_letters() {
    let dir = TempDir::new().unwrap();
    let state = state_in(&dir).await;

    state
        .store
        .set_config_value("max-retries", "2")
        .await
        .unwrap();
    let job = state.store.enqueue("exit 1").await.unwrap();
    assert_eq!(job.max_retries, 2);

    // Attempt 1 fails, backoff 2s, attempt 2 fails and hits the ceiling.
    state.workers.start(1).await.unwrap();
    let snapshot = wait_for(&state, Duration::from_secs(15), |s| s.dead.len() == 1).await;
    state.workers.stop().await;

    assert!(snapshot.active.is_empty());
    assert!(snapshot.completed.is_empty());
    let dead = &snapshot.dead[0];
    assert_eq!(dead.id, job.id);
    assert_eq!(dead.status, JobStatus::Dead);
    assert_eq!(dead.attempts, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dlq_retry_reenters_active_exactly_once() {
    let dir = TempDir::new().unwrap();
    let state = state_in(&dir).await;

    state
        .store
        .set_config_value("max-retries", "1")
        .await
        .unwrap();
    let job = state.store.enqueue("exit 7").await.unwrap();

    state.workers.start(1).await.unwrap();
    wait_for(&state, Duration::from_secs(10), |s| s.dead.len() == 1).await;
    state.workers.stop().await;

    let requeued = state.store.requeue_from_dlq(job.id).await.unwrap();
    assert_eq!(requeued.status, JobStatus::Pending);
    assert_eq!(requeued.attempts, 0);

    let snapshot = state.store.snapshot().await;
    assert!(snapshot.dead.is_empty());
    let copies = snapshot
        .active
        .iter()
        .filter(|j| j.id == job.id)
        .count();
    assert_eq!(copies, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();

    let job_id = {
        let state = state_in(&dir).await;
        state.store.enqueue("echo one").await.unwrap();
        let job = state.store.enqueue("echo two").await.unwrap();
        state.store.flush().await.unwrap();
        job.id
    };

    // A fresh process sees the same jobs with the same ids and statuses.
    let state = state_in(&dir).await;
    let snapshot = state.store.snapshot().await;
    assert_eq!(snapshot.active.len(), 2);
    assert!(snapshot.active.iter().any(|j| j.id == job_id));
    assert!(snapshot
        .active
        .iter()
        .all(|j| j.status == JobStatus::Pending && j.attempts == 0));

    // And the pending work is still runnable after the restart.
    state.workers.start(2).await.unwrap();
    let snapshot = wait_for(&state, Duration::from_secs(10), |s| {
        s.completed.len() == 2
    })
    .await;
    state.workers.stop().await;
    assert!(snapshot.active.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_config_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let state = state_in(&dir).await;
        state
            .store
            .set_config_value("backoff-base", "4")
            .await
            .unwrap();
    }

    let state = state_in(&dir).await;
    let config = state.store.config().await;
    assert_eq!(config.backoff_base, 4);
    assert_eq!(config.max_retries, 3);
}
