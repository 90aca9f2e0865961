mod app_state;
mod config;
mod models;
mod services;

use std::process::ExitCode;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use app_state::AppState;
use config::Settings;
use models::job::{Job, JobStatus};

#[derive(Parser)]
#[command(name = "queuectl", about = "A lightweight background job queue system")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a job to the queue
    Enqueue {
        /// Shell command to execute
        command: String,
    },
    /// List jobs in the queue by state
    List {
        /// Filter jobs by state (pending, processing, completed, failed, dead)
        #[arg(long)]
        state: Option<String>,
    },
    /// Show summary of all job states and active workers
    Status,
    /// Manage the dead-letter queue
    Dlq {
        #[command(subcommand)]
        command: DlqCommands,
    },
    /// Manage background workers
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },
    /// Manage configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Flush queue state to disk and terminate
    Exit,
}

#[derive(Subcommand)]
enum DlqCommands {
    /// List all jobs in the dead-letter queue
    List,
    /// Retry a specific job from the dead-letter queue
    Retry { job_id: String },
}

#[derive(Subcommand)]
enum WorkerCommands {
    /// Start one or more workers; runs until Ctrl+C
    Start {
        /// Number of workers to start
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Stop all active workers gracefully
    Stop,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set a configuration parameter (max-retries, backoff-base)
    Set { key: String, value: String },
    /// Show current configuration settings
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings from environment: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Corrupt state files are the only fatal startup condition.
    let state = match AppState::init(&settings).await {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Failed to load queue state: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, state: &AppState) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Enqueue { command } => {
            let job = state.store.enqueue(&command).await?;
            let queue_size = state.store.snapshot().await.active.len();
            println!("Job queued: {} ({}) — queue size {}", job.id, job.command, queue_size);
        }

        Commands::List { state: filter } => {
            let filter = match filter.as_deref() {
                Some(s) => Some(
                    JobStatus::from_str(&s.to_lowercase())
                        .map_err(|_| format!("unknown state filter: {s}"))?,
                ),
                None => None,
            };
            let snapshot = state.store.snapshot().await;
            let all_jobs: Vec<Job> = snapshot
                .active
                .into_iter()
                .chain(snapshot.completed)
                .chain(snapshot.dead)
                .collect();
            print_job_table(&all_jobs, filter);
        }

        Commands::Status => {
            let snapshot = state.store.snapshot().await;
            let config = state.store.config().await;
            let total = snapshot.active.len() + snapshot.completed.len() + snapshot.dead.len();
            if total == 0 {
                println!("No jobs currently in system.");
                return Ok(());
            }

            let count = |status: JobStatus| {
                snapshot
                    .active
                    .iter()
                    .chain(&snapshot.completed)
                    .chain(&snapshot.dead)
                    .filter(|job| job.status == status)
                    .count()
            };

            println!("queuectl system status");
            println!("----------------------");
            println!("Jobs summary:");
            println!("  Pending:     {}", count(JobStatus::Pending));
            println!("  Processing:  {}", count(JobStatus::Processing));
            println!("  Completed:   {}", count(JobStatus::Completed));
            println!("  Failed:      {}", count(JobStatus::Failed));
            println!("  Dead:        {}", count(JobStatus::Dead));
            println!("  Total jobs:  {total}");
            println!();
            println!("Active workers: {}", state.workers.worker_count());
            println!("DLQ size:       {}", snapshot.dead.len());
            println!();
            println!("Config:");
            println!("  Max retries:  {}", config.max_retries);
            println!("  Backoff base: {}", config.backoff_base);
        }

        Commands::Dlq { command } => match command {
            DlqCommands::List => {
                let snapshot = state.store.snapshot().await;
                if snapshot.dead.is_empty() {
                    println!("Dead-letter queue is empty.");
                    return Ok(());
                }
                println!("Dead-letter queue jobs:");
                for job in &snapshot.dead {
                    println!(
                        "• ID: {} | Command: {} | Attempts: {}/{} | Last updated: {}",
                        job.id,
                        job.command,
                        job.attempts,
                        job.max_retries,
                        format_time(job.updated_at)
                    );
                }
            }
            DlqCommands::Retry { job_id } => {
                let job_id =
                    Uuid::parse_str(&job_id).map_err(|_| format!("invalid job id: {job_id}"))?;
                let job = state.store.requeue_from_dlq(job_id).await?;
                println!("Job {} requeued for processing.", job.id);
            }
        },

        Commands::Worker { command } => match command {
            WorkerCommands::Start { count } => {
                state.workers.start(count).await?;
                println!("Workers running... Press Ctrl+C to stop.");
                tokio::signal::ctrl_c().await?;
                println!("\nStopping workers...");
                graceful_shutdown(state).await;
            }
            WorkerCommands::Stop => {
                // Workers only live inside a `worker start` process; here
                // this reports the no-op rather than failing.
                if state.workers.stop().await == 0 {
                    println!("No active workers running.");
                } else {
                    println!("Workers stopped gracefully.");
                }
            }
        },

        Commands::Config { command } => match command {
            ConfigCommands::Set { key, value } => {
                let updated = state.store.set_config_value(&key, &value).await?;
                println!(
                    "Config updated: max-retries={} backoff-base={}",
                    updated.max_retries, updated.backoff_base
                );
            }
            ConfigCommands::Show => {
                let config = state.store.config().await;
                println!("Current configuration:");
                println!("  Max retries:  {}", config.max_retries);
                println!("  Backoff base: {}", config.backoff_base);
            }
        },

        Commands::Exit => {
            graceful_shutdown(state).await;
            println!("Exiting queuectl. Goodbye!");
        }
    }

    Ok(())
}

/// Stop any running workers, then persist all queue state.
async fn graceful_shutdown(state: &AppState) {
    state.workers.stop().await;
    match state.store.flush().await {
        Ok(()) => println!("All queue data saved."),
        Err(e) => eprintln!("Failed to persist jobs: {e}"),
    }
}

fn print_job_table(jobs: &[Job], filter: Option<JobStatus>) {
    if jobs.is_empty() {
        println!("No jobs available.");
        return;
    }

    match filter {
        Some(status) => println!("Listing jobs with state: {status}"),
        None => println!("Listing jobs (all states):"),
    }

    println!("{}", "-".repeat(95));
    println!(
        "{:<36} {:<15} {:<12} {:<10} {:<20}",
        "ID", "Command", "Status", "Attempts", "Updated at"
    );
    println!("{}", "-".repeat(95));

    let mut shown = 0;
    for job in jobs {
        if filter.is_some_and(|status| job.status != status) {
            continue;
        }
        let command = if job.command.chars().count() > 15 {
            let head: String = job.command.chars().take(12).collect();
            format!("{head}...")
        } else {
            job.command.clone()
        };
        println!(
            "{:<36} {:<15} {:<12} {:<10} {:<20}",
            job.id,
            command,
            job.status.to_string(),
            job.attempts,
            format_time(job.updated_at)
        );
        shown += 1;
    }

    if shown == 0 {
        println!("  No jobs match the specified state.");
    }
    println!("{}", "-".repeat(95));
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%d %b %y %H:%M UTC").to_string()
}
