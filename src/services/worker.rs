use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::models::job::ExecutionOutcome;
use crate::services::executor;
use crate::services::store::JobStore;

/// How long an idle worker sleeps before polling the queue again.
const IDLE_WAIT: Duration = Duration::from_secs(1);

struct PoolInner {
    shutdown_tx: Option<broadcast::Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

/// A pool of concurrent workers pulling jobs from the store.
///
/// Shutdown is cooperative: `stop` broadcasts one cancellation signal that
/// workers observe between iterations, so an in-flight subprocess always
/// finishes before its worker exits.
pub struct WorkerPool {
    store: Arc<JobStore>,
    inner: Mutex<PoolInner>,
    worker_count: AtomicUsize,
}

impl WorkerPool {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self {
            store,
            inner: Mutex::new(PoolInner {
                shutdown_tx: None,
                handles: Vec::new(),
            }),
            worker_count: AtomicUsize::new(0),
        }
    }

    /// Spawn `count` workers. Rejects a zero count and rejects starting a
    /// second pool while one is running.
    pub async fn start(&self, count: usize) -> Result<(), WorkerError> {
        if count == 0 {
            return Err(WorkerError::InvalidCount);
        }

        let mut inner = self.inner.lock().await;
        if inner.shutdown_tx.is_some() {
            return Err(WorkerError::AlreadyRunning);
        }

        let (shutdown_tx, _) = broadcast::channel(1);
        for worker_id in 1..=count {
            let store = Arc::clone(&self.store);
            let shutdown_rx = shutdown_tx.subscribe();
            inner
                .handles
                .push(tokio::spawn(worker_loop(worker_id, store, shutdown_rx)));
        }
        inner.shutdown_tx = Some(shutdown_tx);
        self.worker_count.store(count, Ordering::SeqCst);

        tracing::info!(count, "Workers started");
        Ok(())
    }

    /// Broadcast shutdown and wait for every worker to exit its loop.
    /// Returns how many workers were stopped; zero means there was nothing
    /// to stop, which is not an error.
    pub async fn stop(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let Some(shutdown_tx) = inner.shutdown_tx.take() else {
            tracing::info!("No active workers running");
            return 0;
        };

        let _ = shutdown_tx.send(());
        let stopped = inner.handles.len();
        for handle in inner.handles.drain(..) {
            let _ = handle.await;
        }
        self.worker_count.store(0, Ordering::SeqCst);

        tracing::info!(stopped, "Workers stopped gracefully");
        stopped
    }

    /// Number of workers currently running.
    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::SeqCst)
    }
}

async fn worker_loop(worker_id: usize, store: Arc<JobStore>, mut shutdown_rx: broadcast::Receiver<()>) {
    tracing::info!(worker_id, "Worker started");

    loop {
        match shutdown_rx.try_recv() {
            Err(TryRecvError::Empty) => {}
            _ => break,
        }

        let mut job = match store.claim_next_pending().await {
            Some(job) => job,
            None => {
                // Idle: poll again after a beat, but leave promptly on shutdown.
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(IDLE_WAIT) => {}
                }
                continue;
            }
        };

        // The attempt begins here, before its outcome is known.
        job.attempts += 1;
        job.touch();
        let job_id = job.id;

        tracing::info!(
            worker_id,
            %job_id,
            command = %job.command,
            attempts = job.attempts,
            "Processing job"
        );

        let outcome = executor::run(&job.command).await;
        match &outcome {
            ExecutionOutcome::Success { output } => {
                tracing::debug!(worker_id, %job_id, output = %output.trim_end(), "Job attempt succeeded");
            }
            ExecutionOutcome::Failure { output, error } => {
                tracing::warn!(
                    worker_id,
                    %job_id,
                    output = %output.trim_end(),
                    error = error.as_deref().unwrap_or(""),
                    "Job attempt failed"
                );
            }
        }

        if let Err(e) = Arc::clone(&store).resolve(job, outcome).await {
            // Resolution landed in memory; only the snapshot write failed.
            tracing::warn!(worker_id, %job_id, error = %e, "Failed to persist job resolution");
        }
    }

    tracing::info!(worker_id, "Worker stopping");
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("invalid worker count")]
    InvalidCount,

    #[error("workers already running; stop them before starting a new pool")]
    AlreadyRunning,
}
