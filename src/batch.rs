//! Batch execution: the same instruction applied across many files.
//!
//! Jobs run concurrently under a semaphore; one failed job never stops
//! the rest unless `continue_on_error` is off, in which case remaining
//! jobs are cancelled through the shared token.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::BatchConfig;
use crate::controller::{EditController, EditJob};

/// Result of one job within a batch.
#[derive(Debug)]
pub struct JobResult {
    pub input: PathBuf,
    pub output: PathBuf,
    pub attempts: u32,
    pub error: Option<String>,
}

impl JobResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<JobResult>,
    pub elapsed_secs: f64,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Derive each job's output path: `<output_dir>/<stem>_edited.<ext>`.
fn output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "mp4".to_string());
    output_dir.join(format!("{stem}_edited.{ext}"))
}

/// Run `instruction` over every input file.
///
/// Result order matches input order regardless of completion order.
pub async fn run_batch(
    controller: EditController,
    instruction: &str,
    inputs: &[PathBuf],
    output_dir: &Path,
    config: &BatchConfig,
    cancel: CancellationToken,
) -> BatchReport {
    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let mut handles = Vec::with_capacity(inputs.len());

    for input in inputs {
        let controller = controller.clone();
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let job = EditJob {
            instruction: instruction.to_string(),
            inputs: vec![input.clone()],
            output: output_path(input, output_dir),
        };
        let stop_on_error = !config.continue_on_error;

        handles.push(tokio::spawn(async move {
            // Closed semaphore means the batch was aborted.
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    return JobResult {
                        input: job.inputs[0].clone(),
                        output: job.output.clone(),
                        attempts: 0,
                        error: Some("batch aborted".to_string()),
                    }
                }
            };

            let result = controller.run(&job, &cancel).await;
            let (attempts, error) = match result {
                Ok(outcome) => {
                    tracing::info!(input = %job.inputs[0].display(), attempts = outcome.attempts, "job done");
                    (outcome.attempts, None)
                }
                Err(e) => {
                    tracing::error!(input = %job.inputs[0].display(), error = %e, "job failed");
                    if stop_on_error {
                        cancel.cancel();
                    }
                    (0, Some(e.to_string()))
                }
            };

            JobResult {
                input: job.inputs[0].clone(),
                output: job.output.clone(),
                attempts,
                error,
            }
        }));
    }

    let mut report = BatchReport::default();
    for handle in handles {
        match handle.await {
            Ok(result) => report.results.push(result),
            Err(e) => tracing::error!(error = %e, "batch task panicked"),
        }
    }
    report.elapsed_secs = started.elapsed().as_secs_f64();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_keep_stem_and_extension() {
        let out = output_path(Path::new("/media/clip.mov"), Path::new("/tmp/out"));
        assert_eq!(out, Path::new("/tmp/out/clip_edited.mov"));
    }

    #[test]
    fn extensionless_inputs_fall_back_to_mp4() {
        let out = output_path(Path::new("/media/raw_capture"), Path::new("."));
        assert_eq!(out, Path::new("./raw_capture_edited.mp4"));
    }
}
