//! queuectl — local background job queue
//!
//! This library provides the job lifecycle engine behind the queuectl CLI:
//! an in-memory job store snapshotted to JSON files, a pool of concurrent
//! workers executing shell commands, exponential-backoff retries, and a
//! dead-letter queue for jobs that exhaust their retry budget.

pub mod app_state;
pub mod config;
pub mod models;
pub mod services;
