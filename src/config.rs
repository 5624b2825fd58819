use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Benchmark configuration shared by all exams in a Run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BenchConfig {
    /// OpenAI-compatible API endpoint
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Environment variable name containing the API key
    #[serde(default = "default_env_var_api_key")]
    pub env_var_api_key: String,
    /// Prompt template with {utterance}, {alternatives} and {footer} markers
    pub prompt_template: String,
    /// Footer appended for zero-shot prompting
    #[serde(default)]
    pub zero_shot_footer: String,
    /// Footer appended when chain-of-thought is requested
    #[serde(default)]
    pub chain_of_thought_footer: String,
    /// System prompt text; empty means no system message
    #[serde(default)]
    pub system_prompt: String,
    /// Temperature for response generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens for response generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Minimum expected length of a bare answer
    pub answer_min: usize,
    /// Maximum expected length of a bare answer
    pub answer_max: usize,
    /// Tag the model is asked to wrap its answer in
    #[serde(default = "default_answer_tag")]
    pub answer_tag: String,
    /// Invocation attempts per row before the Run aborts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_api_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_env_var_api_key() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    22
}

fn default_answer_tag() -> String {
    "resposta".to_string()
}

fn default_max_attempts() -> u32 {
    25
}

impl BenchConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}
