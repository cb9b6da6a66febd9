//! Pipeline data model and lifecycle state machine.

use serde::{Deserialize, Serialize};

/// One model-proposed skill invocation, pre-resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Skill name as written by the model; resolved (exact, alias, or
    /// fuzzy) during composition.
    pub skill: String,

    /// Raw parameter mapping of arbitrary JSON shape.
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl PipelineStep {
    pub fn new(skill: impl Into<String>) -> Self {
        Self {
            skill: skill.into(),
            params: serde_json::Map::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// An ordered sequence of steps plus the count of bound extra inputs.
///
/// A pipeline is created fresh per request (or per retry attempt) and is
/// immutable once composed; retries build new pipelines, never patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pipeline {
    pub steps: Vec<PipelineStep>,

    /// Number of extra media inputs bound beyond the primary at stream
    /// index 0. Extra input `i` (0-based binding order) occupies stream
    /// index `i + 1`.
    #[serde(default)]
    pub extra_inputs: usize,
}

impl Pipeline {
    pub fn new(steps: Vec<PipelineStep>) -> Self {
        Self {
            steps,
            extra_inputs: 0,
        }
    }

    pub fn with_extra_inputs(mut self, count: usize) -> Self {
        self.extra_inputs = count;
        self
    }
}

/// Lifecycle of one compile-and-execute attempt sequence.
///
/// Failures at `DryRunValidated` or `Executed` may re-enter `Normalizing`
/// with a fresh pipeline from the retry controller, within its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Normalizing,
    Composed,
    DryRunValidated,
    Executed,
    Succeeded,
    Failed,
}

impl PipelineState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Pending, Normalizing)
                | (Normalizing, Composed)
                | (Normalizing, Failed)
                | (Composed, DryRunValidated)
                | (Composed, Failed)
                | (DryRunValidated, Executed)
                | (DryRunValidated, Normalizing)
                | (DryRunValidated, Failed)
                | (Executed, Succeeded)
                | (Executed, Normalizing)
                | (Executed, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Succeeded | PipelineState::Failed)
    }
}
