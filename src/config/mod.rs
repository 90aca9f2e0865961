use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Process-level settings resolved from the environment.
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Directory holding the queue's JSON state files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Settings {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::prefixed("QUEUECTL_").from_env()
    }
}

/// Queue-wide retry policy, persisted to its own sink and applied to newly
/// enqueued jobs. Mutated only through `config set`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueConfig {
    /// Retry ceiling stamped onto jobs at enqueue time.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Exponentiation base for the backoff delay, in seconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base: u32,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base() -> u32 {
    2
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base: default_backoff_base(),
        }
    }
}

/// Keys accepted by `config set`, in any of the spellings the original CLI
/// took (`max-retries`, `max_retries`, `maxretries`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    MaxRetries,
    BackoffBase,
}

impl ConfigKey {
    pub fn parse(key: &str) -> Option<Self> {
        match key.to_lowercase().as_str() {
            "max-retries" | "max_retries" | "maxretries" => Some(Self::MaxRetries),
            "backoff-base" | "backoff_base" | "backoffbase" => Some(Self::BackoffBase),
            _ => None,
        }
    }
}
