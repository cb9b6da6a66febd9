//! Decoding of model responses into pipelines.
//!
//! The model is asked for a single JSON object. Responses routinely
//! arrive wrapped in markdown code fences or with prose around the
//! object, so decoding strips fences and slices out the outermost
//! object before parsing. Anything that still fails to parse is a
//! decode error the controller may retry once.

use clipforge_skills::Pipeline;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("response contained no JSON object")]
    NoJson,

    #[error("invalid instruction JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("pipeline has no steps")]
    EmptyPipeline,
}

/// A decoded model proposal: the model's reading of the instruction
/// plus the pipeline it wants to run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstructionSet {
    /// The model's one-line restatement of what it understood.
    #[serde(default)]
    pub interpretation: String,

    /// Caveats the model chose to attach (lossy edits, guessed
    /// parameters). Carried through to the edit outcome.
    #[serde(default)]
    pub warnings: Vec<String>,

    pub pipeline: Pipeline,
}

/// Decode a raw model response into an [`InstructionSet`].
pub fn decode_response(raw: &str) -> Result<InstructionSet, DecodeError> {
    let body = extract_json(raw).ok_or(DecodeError::NoJson)?;
    let set: InstructionSet = serde_json::from_str(body)?;
    if set.pipeline.steps.is_empty() {
        return Err(DecodeError::EmptyPipeline);
    }
    Ok(set)
}

/// Slice the outermost JSON object out of a response, tolerating code
/// fences and surrounding prose.
fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();

    // Prefer a fenced block when one exists.
    let candidate = if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        // Skip a language tag like `json` on the fence line.
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        }
    } else {
        trimmed
    };

    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    (end > start).then(|| &candidate[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_bare_json() {
        let raw = r#"{"interpretation": "darken", "pipeline": {"steps": [{"skill": "brightness", "params": {"value": -0.2}}]}}"#;
        let set = decode_response(raw).unwrap();
        assert_eq!(set.interpretation, "darken");
        assert_eq!(set.pipeline.steps.len(), 1);
        assert_eq!(set.pipeline.steps[0].skill, "brightness");
    }

    #[test]
    fn strips_code_fences() {
        let raw = "Here you go:\n```json\n{\"pipeline\": {\"steps\": [{\"skill\": \"mute\", \"params\": {}}]}}\n```\nLet me know!";
        let set = decode_response(raw).unwrap();
        assert_eq!(set.pipeline.steps[0].skill, "mute");
        assert!(set.interpretation.is_empty());
    }

    #[test]
    fn keeps_model_warnings() {
        let raw = r#"{"interpretation": "speed up", "warnings": ["audio pitch will shift"], "pipeline": {"steps": [{"skill": "speed", "params": {"factor": 2}}]}}"#;
        let set = decode_response(raw).unwrap();
        assert_eq!(set.warnings, vec!["audio pitch will shift".to_string()]);
    }

    #[test]
    fn missing_warnings_defaults_to_empty() {
        let raw = r#"{"pipeline": {"steps": [{"skill": "mute", "params": {}}]}}"#;
        let set = decode_response(raw).unwrap();
        assert!(set.warnings.is_empty());
    }

    #[test]
    fn missing_extra_inputs_defaults_to_zero() {
        let raw = r#"{"pipeline": {"steps": [{"skill": "blur", "params": {}}]}}"#;
        let set = decode_response(raw).unwrap();
        assert_eq!(set.pipeline.extra_inputs, 0);
    }

    #[test]
    fn rejects_prose_without_json() {
        let err = decode_response("I cannot edit that video.").unwrap_err();
        assert!(matches!(err, DecodeError::NoJson));
    }

    #[test]
    fn rejects_empty_step_list() {
        let raw = r#"{"pipeline": {"steps": []}}"#;
        let err = decode_response(raw).unwrap_err();
        assert!(matches!(err, DecodeError::EmptyPipeline));
    }

    #[test]
    fn rejects_malformed_json() {
        let raw = r#"{"pipeline": {"steps": [{"skill": }]}}"#;
        let err = decode_response(raw).unwrap_err();
        assert!(matches!(err, DecodeError::Parse(_)));
    }
}
