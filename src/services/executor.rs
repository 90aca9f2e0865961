use tokio::process::Command;

use crate::models::job::ExecutionOutcome;

/// Run a job's command through the platform shell and capture combined
/// stdout + stderr.
///
/// Exit status 0 is `Success`; anything else, including a failure to spawn
/// the shell at all, is `Failure`. No timeout is imposed: a hung command
/// blocks its worker until the process exits.
pub async fn run(command: &str) -> ExecutionOutcome {
    match shell_command(command).output().await {
        Ok(out) => {
            let mut combined = out.stdout;
            combined.extend_from_slice(&out.stderr);
            let output = String::from_utf8_lossy(&combined).into_owned();

            if out.status.success() {
                ExecutionOutcome::Success { output }
            } else {
                let error = match out.status.code() {
                    Some(code) => format!("exit status {code}"),
                    None => "terminated by signal".to_string(),
                };
                ExecutionOutcome::Failure {
                    output,
                    error: Some(error),
                }
            }
        }
        Err(e) => ExecutionOutcome::Failure {
            output: String::new(),
            error: Some(format!("failed to spawn command: {e}")),
        },
    }
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
