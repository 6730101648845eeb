// file: src/index/embeddings.rs
// description: sentence embedding backends (hosted endpoint, offline hashing, local onnx)
// reference: https://docs.endpoints.anyscale.com (OpenAI-compatible /v1/embeddings)

use crate::config::{Config, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::parser::patterns::TERM;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

pub enum Embedder {
    Hosted(HostedEmbeddingClient),
    Hashing(HashingEmbedder),
    #[cfg(feature = "local-embeddings")]
    Local(LocalEmbedder),
}

impl Embedder {
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedding = &config.embedding;
        match embedding.provider {
            EmbeddingProvider::Hosted => {
                let api_key = config.require_api_key()?.to_string();
                Ok(Embedder::Hosted(HostedEmbeddingClient::new(
                    embedding.api_base.clone(),
                    api_key,
                    embedding.model.clone(),
                    embedding.dimension,
                    Duration::from_secs(config.llm.timeout_secs),
                )?))
            }
            EmbeddingProvider::Hashing => {
                Ok(Embedder::Hashing(HashingEmbedder::new(embedding.dimension)))
            }
            #[cfg(feature = "local-embeddings")]
            EmbeddingProvider::Local => Ok(Embedder::Local(LocalEmbedder::new(
                &embedding.model,
                embedding.dimension,
            )?)),
            #[cfg(not(feature = "local-embeddings"))]
            EmbeddingProvider::Local => Err(RagError::Config(
                "embedding provider 'local' requires the local-embeddings feature".to_string(),
            )),
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Embedder::Hosted(client) => client.dimension,
            Embedder::Hashing(hashing) => hashing.dimension,
            #[cfg(feature = "local-embeddings")]
            Embedder::Local(local) => local.dimension,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Embedder::Hosted(client) => format!("hosted:{}", client.model),
            Embedder::Hashing(hashing) => format!("hashing:{}d", hashing.dimension),
            #[cfg(feature = "local-embeddings")]
            Embedder::Local(local) => format!("local:{}", local.model_name),
        }
    }

    pub async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = match self {
            Embedder::Hosted(client) => client.embed(texts).await?,
            Embedder::Hashing(hashing) => texts.iter().map(|t| hashing.embed(t)).collect(),
            #[cfg(feature = "local-embeddings")]
            Embedder::Local(local) => local.embed(texts.to_vec()).await?,
        };

        if embeddings.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let expected = self.dimension();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
            return Err(RagError::Embedding(format!(
                "Embedding dimension {} does not match configured dimension {}",
                bad.len(),
                expected
            )));
        }

        Ok(embeddings)
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RagError::Embedding("No embedding returned for query".to_string()))
    }
}

pub struct HostedEmbeddingClient {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl HostedEmbeddingClient {
    pub fn new(
        api_base: String,
        api_key: String,
        model: String,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Embedding(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model,
            dimension,
        })
    }

    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.api_base);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        debug!(
            "Requesting {} embeddings from {} ({})",
            texts.len(),
            url,
            self.model
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to send embedding request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Embedding(format!(
                "Embedding request failed with status {}: {}",
                status, error_text
            )));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            RagError::Embedding(format!("Failed to parse embedding response: {}", e))
        })?;

        Ok(order_by_index(parsed.data))
    }
}

/// Endpoints may return items out of order; `index` restores input order.
fn order_by_index(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    data.into_iter().map(|d| d.embedding).collect()
}

/// Deterministic bag-of-words embedding via feature hashing. No network, no
/// model weights; good enough for lexical retrieval and for tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for term in TERM.find_iter(text) {
            let term = term.as_str().to_lowercase();
            let digest = Sha256::digest(term.as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            let hash = u64::from_le_bytes(head);

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model: std::sync::Arc<fastembed::TextEmbedding>,
    model_name: String,
    dimension: usize,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(model_name: &str, dimension: usize) -> Result<Self> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model = match model_name {
            "BAAI/bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
            "BAAI/bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
            "BAAI/bge-large-en-v1.5" => EmbeddingModel::BGELargeENV15,
            "sentence-transformers/all-MiniLM-L6-v2" => EmbeddingModel::AllMiniLML6V2,
            other => {
                return Err(RagError::Config(format!(
                    "Unsupported local embedding model: {}",
                    other
                )));
            }
        };

        let embedding = TextEmbedding::try_new(InitOptions::new(model))
            .map_err(|e| RagError::Embedding(format!("Failed to load {}: {}", model_name, e)))?;

        Ok(Self {
            model: std::sync::Arc::new(embedding),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    pub async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = std::sync::Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| RagError::Embedding(e.to_string()))
    }
}
