//! Trait definition for instruction providers.
//!
//! An [`InstructionProvider`] turns a natural-language edit request into
//! a raw model response (expected to be JSON, decoded by
//! [`crate::instruction`]). The controller only ever talks to the trait;
//! tests and offline use drive it with [`ScriptedProvider`].

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clipforge_skills::{GenerationRule, SkillRegistry};

/// Everything a provider gets to see about one edit request.
#[derive(Debug, Clone)]
pub struct EditRequest {
    /// The user's natural-language instruction.
    pub instruction: String,
    /// One line per available skill, built by [`catalog_digest`].
    pub skills_digest: String,
    /// Number of extra media inputs bound beyond the primary.
    pub extra_inputs: usize,
}

/// A backend that proposes and corrects edit pipelines.
#[async_trait]
pub trait InstructionProvider: Send + Sync {
    /// Provider name for logs (e.g. "openai", "scripted").
    fn name(&self) -> &str;

    /// Propose a pipeline for the request. Returns the raw response
    /// text; decoding happens in the controller.
    async fn propose(&self, request: &EditRequest) -> Result<String>;

    /// Ask for a corrected pipeline after `previous` failed with
    /// `error`. The error text is already scrubbed by the caller.
    async fn correct(&self, request: &EditRequest, previous: &str, error: &str) -> Result<String>;
}

/// Render the registry as the per-request skill digest: one line per
/// skill with its parameters, bounds, and defaults.
pub fn catalog_digest(registry: &SkillRegistry) -> String {
    let mut lines = Vec::with_capacity(registry.len());
    for skill in registry.iter() {
        let mut params = Vec::new();
        for spec in &skill.params {
            let mut desc = format!("{}: {:?}", spec.name, spec.kind);
            if let (Some(min), Some(max)) = (spec.min, spec.max) {
                desc.push_str(&format!(" [{min}..{max}]"));
            }
            if spec.required {
                desc.push_str(" (required)");
            } else if let Some(default) = &spec.default {
                desc.push_str(&format!(" (default {})", default.render()));
            }
            params.push(desc);
        }
        let kind = match &skill.rule {
            GenerationRule::Template(_) => "filter",
            GenerationRule::SubPipeline(_) => "composite",
            GenerationRule::Builtin(_) => "multi-input",
        };
        lines.push(format!(
            "- {} ({kind}): {}",
            skill.name,
            if params.is_empty() {
                "no parameters".to_string()
            } else {
                params.join(", ")
            }
        ));
    }
    lines.join("\n")
}

/// A provider that replays a fixed sequence of responses.
///
/// Each call to [`propose`](InstructionProvider::propose) or
/// [`correct`](InstructionProvider::correct) pops the next response;
/// running out is an error. Correction prompts are recorded for
/// assertions.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    corrections: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            corrections: Mutex::new(Vec::new()),
        }
    }

    /// The error texts passed to `correct`, in call order.
    pub fn correction_errors(&self) -> Vec<String> {
        self.corrections.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn pop(&self) -> Result<String> {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted provider ran out of responses"))
    }
}

#[async_trait]
impl InstructionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn propose(&self, _request: &EditRequest) -> Result<String> {
        self.pop()
    }

    async fn correct(&self, _request: &EditRequest, _previous: &str, error: &str) -> Result<String> {
        self.corrections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(error.to_string());
        self.pop()
    }
}

/// Chat-completions provider for OpenAI-compatible endpoints.
pub struct OpenAiProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

/// Request/response timeout for the model endpoint.
const MODEL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

impl OpenAiProvider {
    pub fn new(model: impl Into<String>, endpoint: Option<&str>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(MODEL_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn system_prompt(request: &EditRequest) -> String {
        format!(
            "You translate video-editing instructions into JSON pipelines.\n\
             Respond with one JSON object: {{\"interpretation\": \"...\", \
             \"warnings\": [\"...\"], \
             \"pipeline\": {{\"steps\": [{{\"skill\": \"name\", \"params\": {{...}}}}]}}}}.\n\
             The warnings list is optional; use it for caveats about the edit.\n\
             Use only these skills:\n{}\n\
             {} extra media inputs are bound; reference them via the \
             \"source\" parameter (1-based). Do not invent skills or inputs.",
            request.skills_digest, request.extra_inputs
        )
    }

    async fn chat(&self, system: String, turns: Vec<serde_json::Value>) -> Result<String> {
        let mut messages = vec![serde_json::json!({"role": "system", "content": system})];
        messages.extend(turns);

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.2,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("model request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("model endpoint returned {status}: {text}");
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .context("model response was not JSON")?;
        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("model response had no content"))
    }
}

#[async_trait]
impl InstructionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn propose(&self, request: &EditRequest) -> Result<String> {
        self.chat(
            Self::system_prompt(request),
            vec![serde_json::json!({"role": "user", "content": request.instruction})],
        )
        .await
    }

    async fn correct(&self, request: &EditRequest, previous: &str, error: &str) -> Result<String> {
        self.chat(
            Self::system_prompt(request),
            vec![
                serde_json::json!({"role": "user", "content": request.instruction}),
                serde_json::json!({"role": "assistant", "content": previous}),
                serde_json::json!({"role": "user", "content": format!(
                    "That pipeline failed:\n{error}\nRespond with a corrected JSON pipeline only."
                )}),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_skills::standard_catalog;

    #[tokio::test]
    async fn scripted_provider_replays_in_order() {
        let provider = ScriptedProvider::new(["first", "second"]);
        let request = EditRequest {
            instruction: "darken".to_string(),
            skills_digest: String::new(),
            extra_inputs: 0,
        };
        assert_eq!(provider.propose(&request).await.unwrap(), "first");
        assert_eq!(
            provider.correct(&request, "first", "boom").await.unwrap(),
            "second"
        );
        assert_eq!(provider.correction_errors(), vec!["boom".to_string()]);
        assert!(provider.propose(&request).await.is_err());
    }

    #[test]
    fn digest_lists_every_skill() {
        let mut registry = SkillRegistry::new();
        registry.register_all(standard_catalog());
        let digest = catalog_digest(&registry);
        for name in registry.names() {
            assert!(digest.contains(name), "digest missing {name}");
        }
        assert!(digest.contains("required"));
    }
}
