use ragpress_agent::ModelConfig;
use ragpress_core::{RagpressError, RagpressResult};
use ragpress_memory::{ContextBuilder, FusionPolicy, SearchMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Contents of `ragpress.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagpressConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Documents per embeddings request.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            embed_batch_size: default_embed_batch_size(),
        }
    }
}

/// Which embedder turns documents and queries into vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// The `/v1/embeddings` endpoint of the configured provider.
    #[default]
    OpenAi,
    /// Offline hashing embedder.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub fusion: FusionPolicy,
    #[serde(default)]
    pub embedder: EmbedderKind,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
    #[serde(default = "default_per_document_chars")]
    pub per_document_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            fusion: FusionPolicy::default(),
            embedder: EmbedderKind::default(),
            default_limit: default_limit(),
            context_chars: default_context_chars(),
            per_document_chars: default_per_document_chars(),
        }
    }
}

impl RetrievalConfig {
    pub fn context_builder(&self) -> ContextBuilder {
        ContextBuilder::new(self.context_chars, self.per_document_chars)
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/ragpress.db")
}
fn default_embed_batch_size() -> usize {
    32
}
fn default_limit() -> usize {
    5
}
fn default_context_chars() -> usize {
    6000
}
fn default_per_document_chars() -> usize {
    1500
}

impl RagpressConfig {
    /// Parses and validates a config document.
    pub fn from_toml(source: &str) -> RagpressResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| RagpressError::Config(e.to_string()))?;
        if config.model.embedding_dimension == 0 {
            return Err(RagpressError::Config(
                "model.embedding_dimension must be greater than zero".into(),
            ));
        }
        Ok(config)
    }

    /// Reads and parses the config file, then fills a missing API key from
    /// `env_api_key` (normally `OPENAI_API_KEY`).
    pub async fn load(path: &Path, env_api_key: Option<String>) -> RagpressResult<Self> {
        let source = tokio::fs::read_to_string(path).await.map_err(|e| {
            RagpressError::Config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        let mut config = Self::from_toml(&source)?;
        config.apply_env_api_key(env_api_key);
        Ok(config)
    }

    /// A key in the file wins over the environment.
    pub fn apply_env_api_key(&mut self, env_api_key: Option<String>) {
        if self.model.api_key().is_none() {
            if let Some(key) = env_api_key.filter(|k| !k.trim().is_empty()) {
                self.model.api_key = Some(key);
            }
        }
    }

    /// The config as TOML, with the API key masked.
    pub fn to_masked_toml(&self) -> RagpressResult<String> {
        let mut shown = self.clone();
        shown.model.api_key = Some(self.model.masked_api_key());
        toml::to_string_pretty(&shown).map_err(|e| RagpressError::Config(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[model]
model_id = "gpt-4o-mini"
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = RagpressConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.model.model_id, "gpt-4o-mini");
        assert_eq!(config.store.path, PathBuf::from("./data/ragpress.db"));
        assert_eq!(config.store.embed_batch_size, 32);
        assert_eq!(config.retrieval.mode, SearchMode::Hybrid);
        assert_eq!(config.retrieval.fusion, FusionPolicy::LexicalFirst);
        assert_eq!(config.retrieval.embedder, EmbedderKind::OpenAi);
        assert_eq!(config.retrieval.default_limit, 5);
        assert_eq!(config.retrieval.context_chars, 6000);
        assert_eq!(config.retrieval.per_document_chars, 1500);
    }

    #[test]
    fn test_full_config() {
        let config = RagpressConfig::from_toml(
            r#"
[model]
provider = "openrouter"
model_id = "openai/gpt-4o-mini"
api_key = "sk-or-file-key-0000"
max_turns = 3

[store]
path = "/var/lib/ragpress/posts.db"

[retrieval]
mode = "lexical"
embedder = "local"
fusion = { reciprocal_rank = { k = 30.0 } }
"#,
        )
        .unwrap();
        assert_eq!(config.model.max_turns, 3);
        assert_eq!(config.retrieval.mode, SearchMode::Lexical);
        assert_eq!(config.retrieval.embedder, EmbedderKind::Local);
        assert_eq!(
            config.retrieval.fusion,
            FusionPolicy::ReciprocalRank { k: 30.0 }
        );
    }

    #[test]
    fn test_missing_model_id_is_config_error() {
        let err = RagpressConfig::from_toml("[model]\nprovider = \"groq\"\n").unwrap_err();
        assert!(matches!(err, RagpressError::Config(_)));
    }

    #[test]
    fn test_zero_embedding_dimension_is_config_error() {
        let err = RagpressConfig::from_toml(
            "[model]\nmodel_id = \"gpt-4o-mini\"\nembedding_dimension = 0\n",
        )
        .unwrap_err();
        assert!(matches!(err, RagpressError::Config(_)));
    }

    #[test]
    fn test_env_key_fills_missing_only() {
        let mut config = RagpressConfig::from_toml(MINIMAL).unwrap();
        config.apply_env_api_key(Some("sk-from-env-1234".into()));
        assert_eq!(config.model.api_key.as_deref(), Some("sk-from-env-1234"));

        config.apply_env_api_key(Some("sk-other-9999".into()));
        assert_eq!(config.model.api_key.as_deref(), Some("sk-from-env-1234"));
    }

    #[test]
    fn test_masked_toml_hides_key() {
        let mut config = RagpressConfig::from_toml(MINIMAL).unwrap();
        config.model.api_key = Some("sk-proj-verysecretvalue-abcd".into());
        let shown = config.to_masked_toml().unwrap();
        assert!(!shown.contains("verysecret"));
        assert!(shown.contains("sk-…abcd"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragpress.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = RagpressConfig::load(&path, Some("sk-env-key-5678".into()))
            .await
            .unwrap();
        assert_eq!(config.model.masked_api_key(), "sk-…5678");

        let missing = RagpressConfig::load(&dir.path().join("nope.toml"), None).await;
        assert!(matches!(missing, Err(RagpressError::Config(_))));
    }
}
