use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Captured output of a finished child process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Last few lines of stderr, for actionable fatal-error messages.
    pub fn stderr_tail(&self, lines: usize) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        text.lines()
            .rev()
            .take(lines)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Runs an external binary. Production code shells out via
/// [`tokio::process::Command`]; tests substitute a fake so C1/C3/C8 never
/// need a real `ffmpeg`/`ffprobe`/`yt-dlp` on the test machine, mirroring how
/// `scribble::backend::Backend` is injected into `Scribble<B>`.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args`, aborting if it runs longer than `timeout`.
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<ProcessOutput>;

    /// Cheap presence check (e.g. `ffmpeg -version`), used to turn a missing
    /// binary into an actionable `TranscoderUnavailable` instead of a raw
    /// spawn failure.
    async fn is_available(&self, program: &str) -> bool {
        self.run(program, &["-version".to_string()], Duration::from_secs(5))
            .await
            .map(|out| out.success)
            .unwrap_or(false)
    }
}

/// Default [`ProcessRunner`] that spawns real child processes.
#[derive(Debug, Clone, Default)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<ProcessOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.kill_on_drop(true);

        let child = cmd
            .output();

        match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => Ok(ProcessOutput {
                success: output.status.success(),
                stdout: output.stdout,
                stderr: output.stderr,
            }),
            Ok(Err(err)) => Err(Error::from(err)),
            Err(_) => Err(Error::msg(format!(
                "`{program}` timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }
}
