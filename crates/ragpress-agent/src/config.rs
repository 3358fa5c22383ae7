use ragpress_core::{RagpressError, RagpressResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which OpenAI-compatible service the backend talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// api.openai.com
    #[default]
    OpenAi,
    /// OpenRouter, which wants attribution headers.
    OpenRouter,
    /// Groq cloud inference, OpenAI-compatible.
    Groq,
    /// Any other OpenAI-compatible server (set `api_base_url`); the API key
    /// is optional.
    Custom,
}

/// Model and API configuration, passed explicitly to the backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Service the requests go to.
    #[serde(default)]
    pub provider: LlmProvider,
    /// Chat model, e.g. `gpt-4o-mini`.
    pub model_id: String,
    /// Bearer token. Blank counts as unset.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Overrides the provider's default endpoint.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Model for `/v1/embeddings`.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Length of the vectors the embedder produces. Must be non-zero.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion token cap per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Model calls allowed in one tool loop.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// HTTP request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimension() -> usize {
    1536
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_max_turns() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

impl ModelConfig {
    /// Config for `model_id` on OpenAI with every other field defaulted.
    pub fn openai(model_id: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model_id: model_id.into(),
            api_key,
            api_base_url: None,
            embedding_model: default_embedding_model(),
            embedding_dimension: default_embedding_dimension(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_turns: default_max_turns(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// API root without a trailing slash; paths such as `/v1/chat/completions`
    /// are appended to it.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
                LlmProvider::Custom => "http://localhost:8080",
            }
        }
    }

    /// The configured API key, ignoring blank values.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// The API key, or a user-facing error when the provider needs one.
    pub fn require_api_key(&self) -> RagpressResult<Option<&str>> {
        match (self.api_key(), self.provider) {
            (Some(key), _) => Ok(Some(key)),
            (None, LlmProvider::Custom) => Ok(None),
            (None, _) => Err(RagpressError::MissingConfig(
                "No API key configured. Set OPENAI_API_KEY or `api_key` under [model].".into(),
            )),
        }
    }

    /// The API key with everything but its prefix and last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        match self.api_key() {
            Some(key) => mask_secret(key),
            None => "(not set)".to_string(),
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model_id", &self.model_id)
            .field("api_key", &self.masked_api_key())
            .field("api_base_url", &self.api_base_url)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimension", &self.embedding_dimension)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_turns", &self.max_turns)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// `sk-…wxyz` for long secrets, asterisks for short ones.
fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let prefix: String = chars[..3].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}…{suffix}")
}
