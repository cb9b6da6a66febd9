//! The edit controller: propose, compose, validate, execute, correct.
//!
//! One controller instance serves many jobs. A job walks the pipeline
//! lifecycle (`Pending` through `Succeeded`); every engine failure that
//! looks like a pipeline defect triggers a bounded correction round in
//! which the model sees the scrubbed stderr and proposes a replacement
//! pipeline. Environmental failures (missing binary, timeout,
//! cancellation) never burn correction rounds.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clipforge_skills::{Builtins, CommandPlan, Composer, Pipeline, PipelineState, SkillRegistry};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{EngineConfig, RetryConfig};
use crate::exec::{EngineError, EngineRunner};
use crate::instruction::{decode_response, DecodeError, InstructionSet};
use crate::llm::{catalog_digest, EditRequest, InstructionProvider};
use crate::scrub::Scrubber;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("model response could not be decoded: {0}")]
    InstructionParse(#[from] DecodeError),

    #[error("instruction provider error: {0}")]
    Provider(#[source] anyhow::Error),

    #[error(transparent)]
    Compose(#[from] clipforge_skills::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("command rejected after {attempts} attempts: {diagnostics}")]
    CommandRejected {
        attempts: u32,
        /// Scrubbed engine diagnostics from the final attempt.
        diagnostics: String,
        /// The last instruction set the model proposed, for audit.
        instructions: Box<InstructionSet>,
    },

    #[error("cancelled")]
    Cancelled,
}

/// One requested edit: instruction plus bound media.
#[derive(Debug, Clone)]
pub struct EditJob {
    pub instruction: String,
    /// Primary input first, extra inputs after in binding order.
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
}

/// A successful run, with everything worth reporting to the caller.
#[derive(Debug)]
pub struct EditOutcome {
    pub interpretation: String,
    pub plan: CommandPlan,
    pub warnings: Vec<String>,
    /// Execution attempts consumed, 1 for a first-try success.
    pub attempts: u32,
}

pub struct EditController {
    registry: Arc<SkillRegistry>,
    builtins: Arc<Builtins>,
    provider: Arc<dyn InstructionProvider>,
    runner: Arc<dyn EngineRunner>,
    scrubber: Arc<Scrubber>,
    retry: RetryConfig,
    engine: EngineConfig,
}

impl Clone for EditController {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            builtins: Arc::clone(&self.builtins),
            provider: Arc::clone(&self.provider),
            runner: Arc::clone(&self.runner),
            scrubber: Arc::clone(&self.scrubber),
            retry: self.retry.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl EditController {
    pub fn new(
        registry: Arc<SkillRegistry>,
        builtins: Arc<Builtins>,
        provider: Arc<dyn InstructionProvider>,
        runner: Arc<dyn EngineRunner>,
        retry: RetryConfig,
        engine: EngineConfig,
    ) -> Self {
        Self {
            registry,
            builtins,
            provider,
            runner,
            scrubber: Arc::new(Scrubber::new()),
            retry,
            engine,
        }
    }

    /// Run one job end to end.
    pub async fn run(
        &self,
        job: &EditJob,
        cancel: &CancellationToken,
    ) -> Result<EditOutcome, ControllerError> {
        let request = self.request_for(job);
        let mut state = PipelineState::Pending;

        let mut raw = self
            .provider
            .propose(&request)
            .await
            .map_err(ControllerError::Provider)?;
        let mut set = self.decode_with_retry(&request, raw.clone()).await?;

        let budget = self.retry.execution_retries;
        let mut attempts = 0u32;
        let mut last_error = String::new();

        loop {
            attempts += 1;
            if cancel.is_cancelled() {
                return Err(ControllerError::Cancelled);
            }

            advance(&mut state, PipelineState::Normalizing);

            match self.attempt(job, &set, &mut state, cancel).await {
                Ok(mut outcome) => {
                    advance(&mut state, PipelineState::Succeeded);
                    outcome.interpretation = set.interpretation.clone();
                    // Model-side caveats ahead of composition warnings.
                    if !set.warnings.is_empty() {
                        let mut warnings = set.warnings.clone();
                        warnings.append(&mut outcome.warnings);
                        outcome.warnings = warnings;
                    }
                    outcome.attempts = attempts;
                    return Ok(outcome);
                }
                Err(AttemptError::Fatal(e)) => {
                    state = PipelineState::Failed;
                    return Err(e);
                }
                Err(AttemptError::Correctable(reason)) => {
                    // Scrubbed once here; the log line, the correction
                    // prompt, and the terminal error all carry the
                    // redacted text.
                    let reason = self.scrubber.scrub(&reason);
                    tracing::warn!(attempt = attempts, %reason, "attempt failed");
                    last_error = reason;
                }
            }

            if attempts > budget {
                state = PipelineState::Failed;
                return Err(ControllerError::CommandRejected {
                    attempts,
                    diagnostics: last_error,
                    instructions: Box::new(set),
                });
            }

            // Correction round: the model sees the scrubbed failure and
            // proposes a replacement pipeline.
            raw = self
                .provider
                .correct(&request, &raw, &last_error)
                .await
                .map_err(ControllerError::Provider)?;
            set = self.decode_with_retry(&request, raw.clone()).await?;
            state = PipelineState::Pending;
        }
    }

    /// Compose and plan without touching the engine. Used by `--dry-run`
    /// to show what would be executed.
    pub async fn preview(&self, job: &EditJob) -> Result<(InstructionSet, CommandPlan), ControllerError> {
        let request = self.request_for(job);
        let raw = self
            .provider
            .propose(&request)
            .await
            .map_err(ControllerError::Provider)?;
        let set = self.decode_with_retry(&request, raw).await?;
        let plan = self.plan(job, &set.pipeline)?;
        Ok((set, plan))
    }

    fn request_for(&self, job: &EditJob) -> EditRequest {
        EditRequest {
            instruction: job.instruction.clone(),
            skills_digest: catalog_digest(&self.registry),
            extra_inputs: job.inputs.len().saturating_sub(1),
        }
    }

    /// Decode a response, re-asking the provider up to the decode budget
    /// when the response is not valid JSON.
    async fn decode_with_retry(
        &self,
        request: &EditRequest,
        mut raw: String,
    ) -> Result<InstructionSet, ControllerError> {
        let mut remaining = self.retry.decode_retries;
        loop {
            match decode_response(&raw) {
                Ok(set) => return Ok(set),
                Err(e) if remaining > 0 => {
                    remaining -= 1;
                    tracing::warn!(error = %e, "undecodable response, re-asking");
                    raw = self
                        .provider
                        .correct(request, &raw, &format!("response was not valid: {e}"))
                        .await
                        .map_err(ControllerError::Provider)?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn plan(&self, job: &EditJob, pipeline: &Pipeline) -> Result<CommandPlan, ControllerError> {
        // The declared extra-input count must match what the caller
        // actually bound; the model does not get to invent inputs.
        let mut pipeline = pipeline.clone();
        pipeline.extra_inputs = job.inputs.len().saturating_sub(1);
        let composer = Composer::new(&self.registry, &self.builtins);
        Ok(composer.plan(&pipeline, &job.inputs, &job.output)?)
    }

    async fn attempt(
        &self,
        job: &EditJob,
        set: &InstructionSet,
        state: &mut PipelineState,
        cancel: &CancellationToken,
    ) -> Result<EditOutcome, AttemptError> {
        // Compose-stage rejections (e.g. a multi-input skill with no
        // extra input bound) are the model's to fix.
        let plan = match self.plan(job, &set.pipeline) {
            Ok(plan) => plan,
            Err(ControllerError::Compose(e)) => {
                return Err(AttemptError::Correctable(format!("pipeline rejected: {e}")))
            }
            Err(e) => return Err(AttemptError::Fatal(e)),
        };
        for warning in &plan.warnings {
            tracing::warn!(%warning, "composition");
        }
        if plan.video_chain.is_none()
            && plan.audio_chain.is_none()
            && plan.filter_complex.is_none()
            && plan.output_options.is_empty()
        {
            // Every step was dropped; give the model a chance to pick
            // real skills.
            return Err(AttemptError::Correctable(format!(
                "no valid steps remained: {}",
                plan.warnings.join("; ")
            )));
        }
        advance(state, PipelineState::Composed);

        let dry_timeout = Duration::from_secs(self.engine.dry_run_timeout_secs);
        self.engine_step(plan.to_dry_run_args(), dry_timeout, cancel)
            .await?;
        advance(state, PipelineState::DryRunValidated);

        let full_timeout = Duration::from_secs(self.engine.timeout_secs);
        self.engine_step(plan.to_args(), full_timeout, cancel).await?;
        advance(state, PipelineState::Executed);

        Ok(EditOutcome {
            interpretation: String::new(),
            warnings: plan.warnings.clone(),
            plan,
            attempts: 0,
        })
    }

    async fn engine_step(
        &self,
        args: Vec<String>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), AttemptError> {
        match self.runner.run(&args, timeout, cancel).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_retryable() => Err(AttemptError::Correctable(e.to_string())),
            Err(EngineError::Cancelled) => Err(AttemptError::Fatal(ControllerError::Cancelled)),
            Err(e) => Err(AttemptError::Fatal(e.into())),
        }
    }
}

enum AttemptError {
    /// Worth a correction round.
    Correctable(String),
    /// Ends the job immediately.
    Fatal(ControllerError),
}

/// Move the lifecycle forward, enforcing the transition table.
fn advance(state: &mut PipelineState, next: PipelineState) {
    debug_assert!(
        state.can_transition(next),
        "invalid transition {state:?} -> {next:?}"
    );
    tracing::debug!(from = ?state, to = ?next, "state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::EngineOutput;
    use crate::llm::ScriptedProvider;
    use async_trait::async_trait;
    use clipforge_skills::standard_catalog;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysOkRunner {
        calls: AtomicU32,
    }

    #[async_trait]
    impl EngineRunner for AlwaysOkRunner {
        async fn run(
            &self,
            _args: &[String],
            _timeout: Duration,
            _cancel: &CancellationToken,
        ) -> Result<EngineOutput, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EngineOutput {
                stderr: String::new(),
            })
        }
    }

    fn controller(provider: ScriptedProvider, runner: Arc<dyn EngineRunner>) -> EditController {
        let mut registry = SkillRegistry::new();
        registry.register_all(standard_catalog());
        EditController::new(
            Arc::new(registry),
            Arc::new(Builtins::standard()),
            Arc::new(provider),
            runner,
            RetryConfig::default(),
            EngineConfig::default(),
        )
    }

    fn job() -> EditJob {
        EditJob {
            instruction: "darken the clip".to_string(),
            inputs: vec![PathBuf::from("in.mp4")],
            output: PathBuf::from("out.mp4"),
        }
    }

    #[tokio::test]
    async fn clean_run_uses_one_attempt_and_two_engine_calls() {
        let provider = ScriptedProvider::new([
            r#"{"interpretation": "darken", "pipeline": {"steps": [{"skill": "brightness", "params": {"value": -0.2}}]}}"#,
        ]);
        let runner = Arc::new(AlwaysOkRunner {
            calls: AtomicU32::new(0),
        });
        let ctl = controller(provider, runner.clone());

        let outcome = ctl.run(&job(), &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.interpretation, "darken");
        // Dry run plus real run.
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_before_start_is_reported() {
        let provider = ScriptedProvider::new([
            r#"{"pipeline": {"steps": [{"skill": "mute", "params": {}}]}}"#,
        ]);
        let runner = Arc::new(AlwaysOkRunner {
            calls: AtomicU32::new(0),
        });
        let ctl = controller(provider, runner);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = ctl.run(&job(), &cancel).await.unwrap_err();
        assert!(matches!(err, ControllerError::Cancelled));
    }

    #[tokio::test]
    async fn preview_plans_without_engine_calls() {
        let provider = ScriptedProvider::new([
            r#"{"pipeline": {"steps": [{"skill": "grayscale", "params": {}}]}}"#,
        ]);
        let runner = Arc::new(AlwaysOkRunner {
            calls: AtomicU32::new(0),
        });
        let ctl = controller(provider, runner.clone());

        let (_, plan) = ctl.preview(&job()).await.unwrap();
        assert_eq!(plan.video_chain.as_deref(), Some("hue=s=0"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }
}
