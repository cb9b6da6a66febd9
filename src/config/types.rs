use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    /// Extra skill-pack files loaded on top of the standard catalog.
    #[serde(default)]
    pub packs: Vec<PathBuf>,
}

/// Settings for the instruction model backing `edit` and `batch`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub name: String,

    /// Override the provider endpoint. The provider default is used when
    /// unset.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Environment variable holding the API key. The key itself never
    /// lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Explicit ffmpeg path; discovered on PATH when unset.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Maximum seconds for a full render.
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,

    /// Maximum seconds for a null-muxer dry run.
    #[serde(default = "default_dry_run_timeout")]
    pub dry_run_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Re-asks after an undecodable model response.
    #[serde(default = "default_decode_retries")]
    pub decode_retries: u32,

    /// Correction rounds after a failed dry run or render.
    #[serde(default = "default_execution_retries")]
    pub execution_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Jobs rendered concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Keep going after a job fails.
    #[serde(default = "default_true")]
    pub continue_on_error: bool,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "CLIPFORGE_API_KEY".to_string()
}

fn default_engine_timeout() -> u64 {
    600
}

fn default_dry_run_timeout() -> u64 {
    30
}

fn default_decode_retries() -> u32 {
    1
}

fn default_execution_retries() -> u32 {
    2
}

fn default_concurrency() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            endpoint: None,
            api_key_env: default_api_key_env(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            timeout_secs: default_engine_timeout(),
            dry_run_timeout_secs: default_dry_run_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            decode_retries: default_decode_retries(),
            execution_retries: default_execution_retries(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            continue_on_error: default_true(),
        }
    }
}
