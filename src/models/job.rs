use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a job in the queue lifecycle.
///
/// `Failed` is reserved: it is accepted when loading persisted state and in
/// list filters, but the engine itself only ever produces the other four.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

/// A unit of work: an opaque shell command plus its lifecycle bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub command: String,
    pub status: JobStatus,
    /// Executions begun so far. Incremented before each attempt's outcome
    /// is known; never decreases.
    pub attempts: u32,
    /// Retry ceiling captured from the global config at enqueue time.
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every transition. While a retry is scheduled this holds
    /// the future re-admission instant as advisory metadata.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build a fresh pending job for `command` with the given retry ceiling.
    pub fn new(command: impl Into<String>, max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            command: command.into(),
            status: JobStatus::Pending,
            attempts: 0,
            max_retries,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Result of running a job's command to completion.
///
/// Execution failures are not system errors; they feed the retry/DLQ state
/// machine. `output` is combined stdout + stderr, lossily decoded.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Success {
        output: String,
    },
    Failure {
        output: String,
        /// Spawn/wait error description, if the process never ran cleanly.
        error: Option<String>,
    },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let job = Job::new("echo hi", 3);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_retries, 3);
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        let back: JobStatus = serde_json::from_str("\"dead\"").unwrap();
        assert_eq!(back, JobStatus::Dead);
    }

    #[test]
    fn test_status_display_matches_filter_input() {
        use std::str::FromStr;
        assert_eq!(JobStatus::Pending.to_string(), "pending");
        assert_eq!(JobStatus::from_str("failed").unwrap(), JobStatus::Failed);
        assert!(JobStatus::from_str("bogus").is_err());
    }
}
