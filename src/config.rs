// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{RagError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_API_KEY_ENV: &str = "ANYSCALE_API_KEY";
pub const DEFAULT_PAPER_URL: &str = "https://arxiv.org/pdf/2309.16039.pdf";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub source: SourceConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub url: String,
    pub cache_dir: Option<PathBuf>,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Hosted,
    Hashing,
    Local,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub api_base: String,
    pub dimension: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Memory,
    Lancedb,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    pub backend: IndexBackend,
    pub uri: String,
    pub table_name: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    pub api_key_env: String,
    /// Resolved from `api_key_env` at load time, never written back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_context_chars: usize,
    pub timeout_secs: u64,
    pub system_prompt: Option<String>,
    /// Overrides the built-in question-answering prompt; must contain
    /// `{context_str}` and `{query_str}`.
    pub qa_template: Option<String>,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let defaults = config::Config::try_from(&Self::default_config())
            .map_err(|e| RagError::Config(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder
                .add_source(config::File::from(Path::new("config/default.toml")).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("PAPER_RAG")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let mut config: Config = settings
            .try_deserialize()
            .map_err(|e| RagError::Config(e.to_string()))?;

        config.resolve_api_key();
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when it exists, otherwise the built-in defaults layered
    /// with `config/default.toml` and the environment. Errors are returned in
    /// both cases.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(Some(path));
        }

        warn!(
            "Config file {} not found, using default configuration",
            path.display()
        );
        Self::load(None)
    }

    pub fn default_config() -> Self {
        Self {
            source: SourceConfig {
                url: DEFAULT_PAPER_URL.to_string(),
                cache_dir: Some(PathBuf::from("data/downloads")),
                timeout_secs: 60,
                user_agent: format!("paper_rag/{}", env!("CARGO_PKG_VERSION")),
            },
            embedding: EmbeddingConfig {
                provider: EmbeddingProvider::Hosted,
                model: "BAAI/bge-large-en-v1.5".to_string(),
                api_base: "https://api.endpoints.anyscale.com/v1".to_string(),
                dimension: 1024,
                batch_size: 32,
            },
            index: IndexConfig {
                backend: IndexBackend::Memory,
                uri: "data/lancedb".to_string(),
                table_name: "chunks".to_string(),
                chunk_size: 1024,
                chunk_overlap: 20,
                top_k: 2,
            },
            llm: LlmConfig {
                api_base: "https://api.endpoints.anyscale.com/v1".to_string(),
                model: "meta-llama/Llama-2-70b-chat-hf".to_string(),
                api_key_env: DEFAULT_API_KEY_ENV.to_string(),
                api_key: None,
                temperature: 0.1,
                max_tokens: 256,
                max_context_chars: 12_000,
                timeout_secs: 120,
                system_prompt: None,
                qa_template: None,
            },
        }
    }

    fn resolve_api_key(&mut self) {
        if self.llm.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
            return;
        }
        self.llm.api_key = std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
    }

    /// The bearer credential shared by the chat and hosted embedding endpoints.
    pub fn require_api_key(&self) -> Result<&str> {
        self.llm
            .api_key
            .as_deref()
            .ok_or_else(|| RagError::MissingApiKey(self.llm.api_key_env.clone()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.index.chunk_size == 0 {
            return Err(RagError::Config(
                "chunk_size must be greater than 0".to_string(),
            ));
        }

        if self.index.chunk_overlap >= self.index.chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.index.chunk_overlap, self.index.chunk_size
            )));
        }

        if self.index.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than 0".to_string()));
        }

        if self.embedding.dimension == 0 {
            return Err(RagError::Config(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }

        crate::utils::Validator::validate_batch_size(self.embedding.batch_size)
            .map_err(|e| RagError::Config(e.to_string()))?;

        for url in [&self.embedding.api_base, &self.llm.api_base] {
            crate::utils::Validator::validate_url(url)
                .map_err(|e| RagError::Config(e.to_string()))?;
        }

        if let Some(template) = &self.llm.qa_template {
            crate::llm::PromptTemplate::with_custom_template(template.clone())?;
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(RagError::Config(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.index.top_k, 2);
        assert_eq!(config.llm.api_key_env, "ANYSCALE_API_KEY");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = Config::default_config();
        config.index.chunk_size = 20;
        config.index.chunk_overlap = 20;
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn test_invalid_api_base_rejected() {
        let mut config = Config::default_config();
        config.llm.api_base = "api.endpoints.anyscale.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_require_api_key() {
        let mut config = Config::default_config();
        config.llm.api_key_env = "PAPER_RAG_TEST_UNSET_KEY".to_string();
        config.llm.api_key = None;
        assert!(matches!(
            config.require_api_key(),
            Err(RagError::MissingApiKey(name)) if name == "PAPER_RAG_TEST_UNSET_KEY"
        ));

        config.llm.api_key = Some("secret".to_string());
        assert_eq!(config.require_api_key().unwrap(), "secret");
    }

    #[test]
    fn test_load_partial_file_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[index]\nbackend = \"lancedb\"\ntop_k = 4\n\n[embedding]\nprovider = \"hashing\"\ndimension = 64\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.index.backend, IndexBackend::Lancedb);
        assert_eq!(config.index.top_k, 4);
        assert_eq!(config.index.chunk_size, 1024);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);
        assert_eq!(config.embedding.dimension, 64);
        assert_eq!(config.llm.model, "meta-llama/Llama-2-70b-chat-hf");
    }

    #[test]
    fn test_missing_config_file_still_resolves_api_key() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();

        let expected = std::env::var(&config.llm.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        assert_eq!(config.llm.api_key, expected);
    }

    #[test]
    fn test_existing_config_file_resolves_api_key_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        // PATH is always present in the test environment.
        fs::write(&path, "[llm]\napi_key_env = \"PATH\"\n").unwrap();

        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.llm.api_key, std::env::var("PATH").ok());
    }

    #[test]
    fn test_invalid_config_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[index]\nchunk_size = 8\nchunk_overlap = 8\n").unwrap();

        assert!(matches!(
            Config::load_or_default(&path),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let mut config = Config::default_config();
        config.llm.api_key = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
