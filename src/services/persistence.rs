use std::io::ErrorKind;
use std::path::PathBuf;

use crate::config::QueueConfig;
use crate::models::job::Job;

const ACTIVE_JOBS_FILE: &str = "active_jobs.json";
const COMPLETED_JOBS_FILE: &str = "completed_jobs.json";
const DLQ_JOBS_FILE: &str = "dlq_jobs.json";
const CONFIG_FILE: &str = "config.json";

/// Which persisted collection a load/save targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
    Active,
    Completed,
    DeadLetter,
}

impl Sink {
    fn file_name(self) -> &'static str {
        match self {
            Sink::Active => ACTIVE_JOBS_FILE,
            Sink::Completed => COMPLETED_JOBS_FILE,
            Sink::DeadLetter => DLQ_JOBS_FILE,
        }
    }
}

/// Snapshot-on-mutation persistence for the job collections and config.
///
/// Each sink is a whole-file overwrite of pretty-printed JSON. There is no
/// cross-file atomicity: a crash between writes can leave the sinks mutually
/// inconsistent, and nothing guards against concurrent external writers.
pub struct Persistence {
    data_dir: PathBuf,
}

impl Persistence {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    /// Load one job collection.
    ///
    /// A missing file is an empty collection. Other read errors fall back to
    /// empty with a warning. Malformed JSON is `Corrupt` and aborts startup.
    pub async fn load_jobs(&self, sink: Sink) -> Result<Vec<Job>, PersistenceError> {
        let path = self.path(sink.file_name());
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read job sink, treating as empty");
                return Ok(Vec::new());
            }
        };

        serde_json::from_slice(&data).map_err(|e| PersistenceError::Corrupt {
            path: path.clone(),
            source: e,
        })
    }

    /// Overwrite one job collection sink with the current contents.
    pub async fn save_jobs(&self, sink: Sink, jobs: &[Job]) -> Result<(), PersistenceError> {
        self.write_json(self.path(sink.file_name()), jobs).await
    }

    /// Load the persisted queue config; a missing file means defaults.
    pub async fn load_config(&self) -> Result<QueueConfig, PersistenceError> {
        let path = self.path(CONFIG_FILE);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(QueueConfig::default()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config, using defaults");
                return Ok(QueueConfig::default());
            }
        };

        serde_json::from_slice(&data).map_err(|e| PersistenceError::Corrupt { path, source: e })
    }

    pub async fn save_config(&self, config: &QueueConfig) -> Result<(), PersistenceError> {
        self.write_json(self.path(CONFIG_FILE), config).await
    }

    async fn write_json<T: serde::Serialize + ?Sized>(
        &self,
        path: PathBuf,
        value: &T,
    ) -> Result<(), PersistenceError> {
        let data = serde_json::to_vec_pretty(value).map_err(PersistenceError::Serialize)?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|source| PersistenceError::Write { path, source })?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("corrupt state file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobStatus;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_sink_is_empty() {
        let dir = TempDir::new().unwrap();
        let persistence = Persistence::new(dir.path());
        let jobs = persistence.load_jobs(Sink::Active).await.unwrap();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_missing_config_is_defaults() {
        let dir = TempDir::new().unwrap();
        let persistence = Persistence::new(dir.path());
        let config = persistence.load_config().await.unwrap();
        assert_eq!(config, QueueConfig::default());
    }

    #[tokio::test]
    async fn test_jobs_round_trip() {
        let dir = TempDir::new().unwrap();
        let persistence = Persistence::new(dir.path());

        let mut job = Job::new("echo hi", 3);
        job.status = JobStatus::Processing;
        job.attempts = 2;
        persistence
            .save_jobs(Sink::Active, std::slice::from_ref(&job))
            .await
            .unwrap();

        let loaded = persistence.load_jobs(Sink::Active).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, job.id);
        assert_eq!(loaded[0].status, JobStatus::Processing);
        assert_eq!(loaded[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let persistence = Persistence::new(dir.path());

        let config = QueueConfig {
            max_retries: 7,
            backoff_base: 5,
        };
        persistence.save_config(&config).await.unwrap();
        assert_eq!(persistence.load_config().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_corrupt_sink_is_fatal() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("dlq_jobs.json"), b"{not json")
            .await
            .unwrap();

        let persistence = Persistence::new(dir.path());
        let err = persistence.load_jobs(Sink::DeadLetter).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt { .. }));
    }
}
