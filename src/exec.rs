//! ffmpeg process execution with timeout and cancellation.
//!
//! The controller talks to the [`EngineRunner`] trait; the real
//! implementation shells out to ffmpeg via the argument vector built by
//! the composer, never through a shell. Tests substitute a fake runner.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("ffmpeg not found: {0}")]
    NotFound(String),

    #[error("engine failed with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    #[error("engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether a correction round could plausibly fix this failure.
    /// Timeouts, cancellation, and a missing binary are environmental,
    /// not pipeline defects.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Failed { .. })
    }
}

/// Captured run of one engine invocation.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub stderr: String,
}

#[async_trait]
pub trait EngineRunner: Send + Sync {
    /// Run the engine with an already-assembled argument vector.
    async fn run(
        &self,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<EngineOutput, EngineError>;
}

/// Runs the real ffmpeg binary.
#[derive(Debug)]
pub struct FfmpegRunner {
    program: PathBuf,
}

impl FfmpegRunner {
    /// Use an explicit binary path, or discover `ffmpeg` on PATH.
    pub fn discover(explicit: Option<&std::path::Path>) -> Result<Self, EngineError> {
        let program = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(EngineError::NotFound(path.display().to_string()));
                }
                path.to_path_buf()
            }
            None => which::which("ffmpeg")
                .map_err(|_| EngineError::NotFound("ffmpeg (not on PATH)".to_string()))?,
        };
        Ok(Self { program })
    }

    pub fn program(&self) -> &std::path::Path {
        &self.program
    }
}

#[async_trait]
impl EngineRunner for FfmpegRunner {
    async fn run(
        &self,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<EngineOutput, EngineError> {
        tracing::debug!(program = %self.program.display(), ?args, "spawning engine");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr_pipe = child.stderr.take();

        let wait = async {
            let mut stderr = String::new();
            if let Some(mut pipe) = stderr_pipe {
                use tokio::io::AsyncReadExt;
                pipe.read_to_string(&mut stderr).await?;
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, stderr))
        };

        let (status, stderr) = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = tokio::time::timeout(timeout, wait) => match result {
                Ok(inner) => inner?,
                Err(_) => return Err(EngineError::Timeout(timeout)),
            },
        };

        if !status.success() {
            return Err(EngineError::Failed {
                status: status.code().unwrap_or(-1),
                stderr: tail_lines(&stderr, 30),
            });
        }

        Ok(EngineOutput {
            stderr: tail_lines(&stderr, 30),
        })
    }
}

/// Keep the last `n` lines of engine stderr; the failure reason is at
/// the end and full progress logs would bloat correction prompts.
fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_the_last_lines() {
        let text = (1..=40).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let tail = tail_lines(&text, 30);
        assert!(tail.starts_with("line 11"));
        assert!(tail.ends_with("line 40"));
    }

    #[test]
    fn failed_runs_are_retryable_but_timeouts_are_not() {
        assert!(EngineError::Failed { status: 1, stderr: String::new() }.is_retryable());
        assert!(!EngineError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!EngineError::Cancelled.is_retryable());
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let err = FfmpegRunner::discover(Some(std::path::Path::new(
            "/nonexistent/ffmpeg-for-test",
        )))
        .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn cancellation_wins_over_a_running_process() {
        // `sleep` stands in for the engine.
        let Ok(path) = which::which("sleep") else {
            return;
        };
        let runner = FfmpegRunner { program: path };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = runner
            .run(&["5".to_string()], Duration::from_secs(10), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Cancelled));
    }
}
