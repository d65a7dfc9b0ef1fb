//! Papyrus configuration management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.
//!
//! The embedding model and the vector dimension are configured here and
//! must agree with what was used at ingestion time; a mismatch silently
//! degrades search quality, so this layer is the single enforcement point.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Vector store connection and schema
    pub vector: VectorStoreConfig,

    /// Embedding model configuration
    pub embedding: EmbeddingConfig,

    /// Paper ingestion pipeline
    pub ingest: IngestConfig,

    /// TEI batch conversion
    pub convert: ConvertConfig,

    /// YouTube collector
    pub youtube: YoutubeConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("QDRANT_URL") {
            config.vector.url = url;
        }
        if let Ok(collection) = std::env::var("PAPYRUS_COLLECTION") {
            config.vector.collection = collection;
        }
        if let Ok(partition) = std::env::var("PAPYRUS_PARTITION") {
            config.vector.partition = partition;
        }
        if let Ok(dim) = std::env::var("PAPYRUS_VECTOR_DIM") {
            config.vector.dimension = dim.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PAPYRUS_VECTOR_DIM".to_string(),
                value: dim,
            })?;
        }

        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.embedding.openai_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.embedding.ollama_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }

        // YouTube credentials rotate across runs; comma-separated list
        if let Ok(keys) = std::env::var("YOUTUBE_API_KEYS") {
            config.youtube.api_keys = keys
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }
}

/// Vector store connection and collection schema
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Qdrant gRPC URL
    pub url: String,

    /// Collection name
    pub collection: String,

    /// Default partition documents are written to
    pub partition: String,

    /// Vector dimension (must match embedding model)
    pub dimension: usize,

    /// Accuracy/build-time tuning parameter for the ANN index
    pub index_clusters: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection: "mypapers".to_string(),
            partition: "papers".to_string(),
            dimension: 384, // all-MiniLM sentence embeddings
            index_clusters: 1024,
        }
    }
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider to use
    pub provider: EmbeddingProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Embedding model name
    pub model: String,

    /// Input text is truncated to this many characters before embedding
    pub input_length: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            openai_api_key: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "all-minilm".to_string(),
            input_length: 512,
            timeout_secs: 60,
        }
    }
}

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAI,
    Ollama,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Paper ingestion pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Folder holding unprocessed document records
    pub source_dir: PathBuf,

    /// Folder that quarantines records which failed ingestion
    pub not_processed_dir: PathBuf,

    /// Checkpoint file listing ingested source paths
    pub checkpoint_file: PathBuf,

    /// Flush the store and save the checkpoint every this many insertions
    pub flush_every: usize,

    /// Stop after this many files in one run
    pub max_files_per_run: usize,

    /// Chunk size in characters
    pub chunk_size: usize,

    /// Chunk overlap in characters
    pub chunk_overlap: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data/papers"),
            not_processed_dir: PathBuf::from("data/not_processed"),
            checkpoint_file: PathBuf::from("data/processed_files.json"),
            flush_every: 20,
            max_files_per_run: 500,
            chunk_size: 512,
            chunk_overlap: 20,
        }
    }
}

/// TEI batch conversion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Input files must end with this suffix
    pub input_suffix: String,

    /// What to do when two inputs produce the same output name
    pub collision_policy: CollisionPolicy,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input_suffix: ".tei.xml".to_string(),
            collision_policy: CollisionPolicy::Overwrite,
        }
    }
}

/// Policy for duplicate output names in the batch converter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Later inputs silently overwrite earlier output (original behavior)
    Overwrite,
    /// Fail the colliding file, keep the batch going
    Error,
}

/// YouTube collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    /// API credentials, tried one per run in order
    pub api_keys: Vec<String>,

    /// Index into `api_keys` for this run
    pub api_key_index: usize,

    /// Seed list of channels with fetch flags
    pub channels_file: PathBuf,

    /// Aggregate output keyed by channel id
    pub api_data_file: PathBuf,

    /// Directory for per-channel video list checkpoints
    pub video_lists_dir: PathBuf,

    /// Stop after this many channels in one run
    pub max_channels_per_run: usize,

    /// Page size for the uploads listing
    pub page_size: usize,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            api_key_index: 0,
            channels_file: PathBuf::from("data/channels.json"),
            api_data_file: PathBuf::from("data/yt_api_data.json"),
            video_lists_dir: PathBuf::from("data/video_lists"),
            max_channels_per_run: 10,
            page_size: 25,
        }
    }
}

impl YoutubeConfig {
    /// The credential selected for this run
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api_keys
            .get(self.api_key_index)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::MissingRequired("YOUTUBE_API_KEYS".to_string()))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.vector.dimension, 384);
        assert_eq!(config.ingest.flush_every, 20);
        assert_eq!(config.ingest.chunk_size, 512);
        assert_eq!(config.embedding.input_length, 512);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(
            "openai".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::OpenAI
        );
        assert_eq!(
            "ollama".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Ollama
        );
        assert!("invalid".parse::<EmbeddingProvider>().is_err());
    }

    #[test]
    fn test_api_key_selection() {
        let mut config = YoutubeConfig::default();
        assert!(config.api_key().is_err());

        config.api_keys = vec!["k0".to_string(), "k1".to_string()];
        config.api_key_index = 1;
        assert_eq!(config.api_key().unwrap(), "k1");
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            [vector]
            url = "http://qdrant:6334"
            collection = "papers_test"
            partition = "notes"
            dimension = 384
            index_clusters = 256
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.vector.collection, "papers_test");
        assert_eq!(config.vector.partition, "notes");
    }
}
