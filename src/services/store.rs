use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::config::{ConfigKey, QueueConfig};
use crate::models::job::{ExecutionOutcome, Job, JobStatus};
use crate::services::persistence::{Persistence, PersistenceError, Sink};
use crate::services::retry;

/// The three job collections, guarded together by one lock.
#[derive(Default)]
struct Collections {
    /// Pending and processing jobs, in insertion order.
    active: Vec<Job>,
    completed: Vec<Job>,
    dead: Vec<Job>,
}

/// Point-in-time copies of all three collections, for listing and status.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub active: Vec<Job>,
    pub completed: Vec<Job>,
    pub dead: Vec<Job>,
}

/// In-memory job store with snapshot-on-mutation persistence.
///
/// All reads and writes of the three collections are serialized through a
/// single async mutex; the lock is held only for short scan/splice sections
/// and the snapshot write that follows each mutation. Subprocess execution
/// and backoff sleeps never run under the lock.
///
/// Persistence failures do not roll back the in-memory change: mutators
/// apply the change first, then return the save error, so an `Err` from
/// them means "memory updated, disk not".
pub struct JobStore {
    collections: Mutex<Collections>,
    config: RwLock<QueueConfig>,
    persistence: Persistence,
}

impl JobStore {
    /// Load all three job sinks and the config sink.
    ///
    /// Missing files are empty collections / default config; malformed
    /// content is fatal here so a corrupt state file never goes unnoticed.
    pub async fn load(persistence: Persistence) -> Result<Self, PersistenceError> {
        let active = persistence.load_jobs(Sink::Active).await?;
        let completed = persistence.load_jobs(Sink::Completed).await?;
        let dead = persistence.load_jobs(Sink::DeadLetter).await?;
        let config = persistence.load_config().await?;

        tracing::debug!(
            active = active.len(),
            completed = completed.len(),
            dead = dead.len(),
            "Loaded queue state"
        );

        Ok(Self {
            collections: Mutex::new(Collections {
                active,
                completed,
                dead,
            }),
            config: RwLock::new(config),
            persistence,
        })
    }

    /// Build a new pending job for `command` and append it to the active
    /// collection. The command is opaque: nothing is validated here, an
    /// unrunnable command simply fails at execution time.
    pub async fn enqueue(&self, command: &str) -> Result<Job, StoreError> {
        let max_retries = self.config.read().await.max_retries;
        let job = Job::new(command, max_retries);

        let mut collections = self.collections.lock().await;
        collections.active.push(job.clone());
        let queue_size = collections.active.len();
        let result = self.persist(&collections).await;
        drop(collections);

        tracing::info!(job_id = %job.id, command = %job.command, queue_size, "Job enqueued");
        result?;
        Ok(job)
    }

    /// Claim the oldest pending job: flip it to `Processing` and return a
    /// copy, or `None` when the queue has no pending work. The scan and the
    /// status flip happen atomically under the lock, so a job is claimed by
    /// at most one worker.
    pub async fn claim_next_pending(&self) -> Option<Job> {
        let mut collections = self.collections.lock().await;
        let job = collections
            .active
            .iter_mut()
            .find(|job| job.status == JobStatus::Pending)?;
        job.status = JobStatus::Processing;
        job.touch();
        Some(job.clone())
    }

    /// Resolve a finished execution attempt.
    ///
    /// Resolution is keyed by job id and idempotent: the job's entry is
    /// removed from `active` if still there, and `job` (the claimed copy,
    /// carrying the incremented attempt count) is authoritative either way,
    /// so a concurrently removed entry never drops an outcome.
    ///
    /// On failure below the retry ceiling the job is handed to a deferred
    /// re-admission task and belongs to no collection until the backoff
    /// delay elapses.
    pub async fn resolve(
        self: Arc<Self>,
        mut job: Job,
        outcome: ExecutionOutcome,
    ) -> Result<(), StoreError> {
        let config = *self.config.read().await;
        // Stricter of the ceiling captured at enqueue time and the live one.
        let ceiling = job.max_retries.min(config.max_retries);

        let mut collections = self.collections.lock().await;
        collections.active.retain(|j| j.id != job.id);

        match outcome {
            ExecutionOutcome::Success { .. } => {
                job.status = JobStatus::Completed;
                job.touch();
                tracing::info!(job_id = %job.id, attempts = job.attempts, "Job completed");
                collections.completed.push(job);
            }
            ExecutionOutcome::Failure { .. } if job.attempts >= ceiling => {
                job.status = JobStatus::Dead;
                job.touch();
                tracing::warn!(
                    job_id = %job.id,
                    attempts = job.attempts,
                    "Job moved to dead-letter queue"
                );
                collections.dead.push(job);
            }
            ExecutionOutcome::Failure { .. } => {
                let delay = retry::backoff_delay(config.backoff_base, job.attempts);
                job.status = JobStatus::Pending;
                // Advisory not-before marker; nothing gates on it.
                job.updated_at = Utc::now()
                    + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                tracing::info!(
                    job_id = %job.id,
                    attempts = job.attempts,
                    delay_secs = delay.as_secs(),
                    "Retry scheduled"
                );
                retry::schedule_readmission(Arc::clone(&self), job, delay);
            }
        }

        let result = self.persist(&collections).await;
        drop(collections);
        result.map_err(Into::into)
    }

    /// Append a job back to the active collection after its backoff delay.
    /// Called only by the re-admission task; holds the lock just long enough
    /// to append and snapshot.
    pub(crate) async fn readmit(&self, job: Job) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().await;
        let job_id = job.id;
        collections.active.push(job);
        let result = self.persist(&collections).await;
        drop(collections);

        tracing::info!(%job_id, "Job re-admitted after backoff");
        result.map_err(Into::into)
    }

    /// Move a dead-lettered job back into the active collection with a
    /// fresh retry budget.
    pub async fn requeue_from_dlq(&self, job_id: Uuid) -> Result<Job, StoreError> {
        let mut collections = self.collections.lock().await;
        let idx = collections
            .dead
            .iter()
            .position(|job| job.id == job_id)
            .ok_or(StoreError::NotFound(job_id))?;

        let mut job = collections.dead.remove(idx);
        job.status = JobStatus::Pending;
        job.attempts = 0;
        job.touch();
        collections.active.push(job.clone());
        let result = self.persist(&collections).await;
        drop(collections);

        tracing::info!(%job_id, "Job requeued from dead-letter queue");
        result?;
        Ok(job)
    }

    /// Point-in-time copies of all three collections, taken under the lock.
    pub async fn snapshot(&self) -> QueueSnapshot {
        let collections = self.collections.lock().await;
        QueueSnapshot {
            active: collections.active.clone(),
            completed: collections.completed.clone(),
            dead: collections.dead.clone(),
        }
    }

    /// Current queue-wide retry policy.
    pub async fn config(&self) -> QueueConfig {
        *self.config.read().await
    }

    /// Validate and apply one `config set` key/value pair, persisting the
    /// config sink on success. Validation failures mutate nothing.
    pub async fn set_config_value(&self, key: &str, value: &str) -> Result<QueueConfig, StoreError> {
        let parsed_key =
            ConfigKey::parse(key).ok_or_else(|| StoreError::UnknownConfigKey(key.to_string()))?;
        let parsed_value: u32 = value
            .parse()
            .map_err(|_| StoreError::InvalidConfigValue {
                key: key.to_string(),
                value: value.to_string(),
            })?;

        let mut config = self.config.write().await;
        match parsed_key {
            ConfigKey::MaxRetries => config.max_retries = parsed_value,
            ConfigKey::BackoffBase => config.backoff_base = parsed_value,
        }
        let updated = *config;
        drop(config);

        self.persistence.save_config(&updated).await?;
        tracing::info!(key, value, "Config updated");
        Ok(updated)
    }

    /// Persist all three job sinks, for graceful shutdown.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let collections = self.collections.lock().await;
        self.persist(&collections).await.map_err(Into::into)
    }

    async fn persist(&self, collections: &Collections) -> Result<(), PersistenceError> {
        self.persistence
            .save_jobs(Sink::Active, &collections.active)
            .await?;
        self.persistence
            .save_jobs(Sink::Completed, &collections.completed)
            .await?;
        self.persistence
            .save_jobs(Sink::DeadLetter, &collections.dead)
            .await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found in dead-letter queue")]
    NotFound(Uuid),

    #[error("unknown config key: {0}")]
    UnknownConfigKey(String),

    #[error("invalid value for {key}: {value:?} (must be a non-negative integer)")]
    InvalidConfigValue { key: String, value: String },

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}
