//! Papyrus Vector - Embedding and vector store abstraction
//!
//! Provides the embedding client (OpenAI or Ollama over HTTP), the vector
//! store handle (Qdrant), and the semantic query adapter. The store handle
//! is an explicit session object with an open-at-startup lifecycle; nothing
//! here keeps ambient global connection state.
//!
//! Inserted rows are buffered in the handle and written on [`VectorStore::flush`],
//! so callers control the durability points. Similarity is inner product
//! over L2-normalized vectors, which is equivalent to cosine similarity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod embedding;
pub mod qdrant_store;
pub mod query;

pub use embedding::{create_embedding_client, EmbeddingClient, OllamaEmbedding, OpenAiEmbedding};
pub use qdrant_store::QdrantStore;
pub use query::{group_by_document, search_documents, GroupedDocument};

// ============================================================================
// Error Types
// ============================================================================

/// Errors from embedding and vector store operations
#[derive(Error, Debug)]
pub enum VectorError {
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Vector store error: {0}")]
    StoreError(String),

    #[error("Search error: {0}")]
    SearchError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, VectorError>;

// ============================================================================
// Row and Hit Types
// ============================================================================

/// One indexed row: a single content chunk with its document metadata and
/// embedding. All rows of a document share the `document_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRow {
    #[serde(rename = "documentId")]
    pub document_id: String,

    pub title: String,

    pub date: String,

    pub authors: String,

    #[serde(rename = "abstract")]
    pub abstract_text: String,

    pub keywords: String,

    pub category: String,

    /// Chunk text, at most 1024 characters
    pub content: String,

    /// Target partition, fixed at insertion time
    pub partition: String,

    /// Embedding of `content`; dimension fixed by the collection schema
    #[serde(skip)]
    pub content_vector: Vec<f32>,
}

/// A chunk-level search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHit {
    pub document_id: String,
    pub title: String,
    pub date: String,
    pub authors: String,
    pub abstract_text: String,
    pub keywords: String,
    pub category: String,
    pub content: String,
    pub score: f32,
}

// ============================================================================
// Store Trait
// ============================================================================

/// Vector database session handle.
///
/// Opened once at startup and passed to the components that need it.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection with the configured schema if it is absent.
    async fn ensure_collection(&self) -> Result<()>;

    /// Make a partition available for insertion and scoped search.
    async fn ensure_partition(&self, partition: &str) -> Result<()>;

    /// Buffer one row for insertion. Durable only after [`Self::flush`].
    async fn insert(&self, row: ChunkRow) -> Result<()>;

    /// Write all buffered rows durably. Returns how many rows were written.
    async fn flush(&self) -> Result<usize>;

    /// Similarity search over the given partitions (all partitions when
    /// empty), optionally narrowed by one `field = value` condition.
    async fn search(
        &self,
        query_vector: &[f32],
        partitions: &[String],
        limit: usize,
        filter: Option<(String, String)>,
    ) -> Result<Vec<ScoredHit>>;

    /// Primary keys of every row belonging to a document. Computes delete
    /// candidates; the delete itself is not wired through.
    async fn candidate_point_ids(&self, document_id: &str) -> Result<Vec<String>>;
}
