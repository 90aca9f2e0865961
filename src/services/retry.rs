use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::models::job::Job;
use crate::services::store::JobStore;

/// Exponential backoff delay for a job that has failed `attempts` times:
/// `backoff_base ^ attempts` seconds, floored at one second.
pub fn backoff_delay(backoff_base: u32, attempts: u32) -> Duration {
    let secs = u64::from(backoff_base).saturating_pow(attempts).max(1);
    Duration::from_secs(secs)
}

/// Hold `job` outside all collections for `delay`, then append it back to
/// the active queue as pending. The sleep happens on its own task; the
/// store lock is only taken for the final append-and-snapshot.
pub fn schedule_readmission(store: Arc<JobStore>, job: Job, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let job_id = job.id;
        if let Err(e) = store.readmit(job).await {
            // In-memory re-admission still happened; only the snapshot is stale.
            tracing::warn!(%job_id, error = %e, "Failed to persist re-admitted job");
        }
    })
}
