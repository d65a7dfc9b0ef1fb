//! Embedding client for generating vector representations
//!
//! Supports OpenAI and Ollama embedding APIs. Both clients truncate input
//! to the configured length and L2-normalize the returned vector so that
//! inner-product search over the store equals cosine similarity. The same
//! client configuration must be used at ingestion and query time; a
//! mismatch silently degrades result quality.

use async_trait::async_trait;
use papyrus_core::{EmbeddingConfig, EmbeddingProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Result, VectorError};

// ============================================================================
// Embedding Trait
// ============================================================================

/// Trait for embedding generation
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Generate a normalized embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate normalized embeddings for multiple texts (batch)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;
}

/// Truncate to the model's configured input length.
pub fn truncate_input(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Scale a vector to unit L2 norm. A zero vector is returned unchanged.
pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

// ============================================================================
// OpenAI Embedding Client
// ============================================================================

/// OpenAI embedding API client
pub struct OpenAiEmbedding {
    client: Client,
    api_key: String,
    model: String,
    dimension: usize,
    input_length: usize,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbedding {
    /// Create a new OpenAI embedding client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, input_length: usize) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "text-embedding-3-small" => 1536,
            "text-embedding-3-large" => 3072,
            "text-embedding-ada-002" => 1536,
            _ => 1536, // Default
        };

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model,
            dimension,
            input_length,
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| VectorError::ConfigError("OpenAI API key required".to_string()))?;

        Ok(Self::new(
            api_key.clone(),
            config.model.clone(),
            config.input_length,
        ))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| VectorError::EmbeddingError("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = OpenAiEmbeddingRequest {
            input: texts
                .iter()
                .map(|t| truncate_input(t, self.input_length))
                .collect(),
            model: self.model.clone(),
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| VectorError::EmbeddingError(format!("Embedding request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VectorError::EmbeddingError(format!(
                "OpenAI embedding error: {error_text}"
            )));
        }

        let result: OpenAiEmbeddingResponse = response.json().await.map_err(|e| {
            VectorError::EmbeddingError(format!("Failed to parse embedding response: {e}"))
        })?;

        // Sort by index, extract, normalize
        let mut embeddings: Vec<_> = result.data.into_iter().collect();
        embeddings.sort_by_key(|e| e.index);

        Ok(embeddings
            .into_iter()
            .map(|e| l2_normalize(e.embedding))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Ollama Embedding Client
// ============================================================================

/// Ollama embedding API client
pub struct OllamaEmbedding {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    input_length: usize,
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedding {
    /// Create a new Ollama embedding client
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        input_length: usize,
        timeout_secs: u64,
    ) -> Self {
        let model = model.into();
        let dimension = match model.as_str() {
            "all-minilm" => 384,
            "nomic-embed-text" => 768,
            "mxbai-embed-large" => 1024,
            _ => 384, // Default: MiniLM-class sentence models
        };

        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            model,
            dimension,
            input_length,
        }
    }

    /// Create from config
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(
            config.ollama_url.clone(),
            config.model.clone(),
            config.input_length,
            config.timeout_secs,
        )
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = OllamaEmbeddingRequest {
            model: self.model.clone(),
            prompt: truncate_input(text, self.input_length),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                VectorError::EmbeddingError(format!("Ollama embedding request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VectorError::EmbeddingError(format!(
                "Ollama embedding error: {error_text}"
            )));
        }

        let result: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            VectorError::EmbeddingError(format!("Failed to parse embedding response: {e}"))
        })?;

        Ok(l2_normalize(result.embedding))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Ollama doesn't have native batch embedding, so we process sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an embedding client from config
pub fn create_embedding_client(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingClient>> {
    match config.provider {
        EmbeddingProvider::OpenAI => Ok(Box::new(OpenAiEmbedding::from_config(config)?)),
        EmbeddingProvider::Ollama => Ok(Box::new(OllamaEmbedding::from_config(config))),
    }
}

// ============================================================================
// Tests
// ============================================================================
