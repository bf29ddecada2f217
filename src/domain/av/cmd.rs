use async_trait::async_trait;
use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Runs an external media tool with an argument vector (never through a shell).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<Output>;
}

/// `ToolRunner` backed by `tokio::process`, with an optional wall-clock limit.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<Output> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(program, ?args, "running tool");

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("{} timed out after {}s", program, limit.as_secs()),
                    )
                })?,
            None => command.output().await,
        }
    }
}

/// Turns a finished process into `Ok(stdout)` or a readable failure reason.
pub fn check_output(program: &str, result: io::Result<Output>) -> Result<Vec<u8>, String> {
    let output = result.map_err(|e| format!("could not run {}: {}", program, e))?;
    if output.status.success() {
        return Ok(output.stdout);
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    tracing::warn!(program, status = %output.status, stderr = %stderr.trim(), "tool exited with failure");
    Err(format!("{} exited with {}: {}", program, output.status, stderr.trim()))
}
