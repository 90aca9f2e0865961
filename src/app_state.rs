use std::sync::Arc;

use crate::config::Settings;
use crate::services::persistence::{Persistence, PersistenceError};
use crate::services::store::JobStore;
use crate::services::worker::WorkerPool;

/// Shared application state wiring the job store and worker pool.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<JobStore>,
    pub workers: Arc<WorkerPool>,
}

impl AppState {
    /// Load persisted queue state from the configured data directory and
    /// wire up the worker pool. Fails only on corrupt state files.
    pub async fn init(settings: &Settings) -> Result<Self, PersistenceError> {
        let persistence = Persistence::new(&settings.data_dir);
        let store = Arc::new(JobStore::load(persistence).await?);
        let workers = Arc::new(WorkerPool::new(Arc::clone(&store)));
        Ok(Self { store, workers })
    }
}
