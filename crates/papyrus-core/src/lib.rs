//! Papyrus Core - Domain models, configuration, and checkpoint records
//!
//! This crate defines the shared pieces used by every papyrus pipeline:
//! - Document records produced by TEI extraction
//! - Channel and video records for the YouTube collector
//! - Checkpoint files (the single source of truth for completed work)
//! - Common error types
//! - Configuration management

pub mod checkpoint;
pub mod config;

pub use checkpoint::{read_json_file, write_json_file, IngestCheckpoint};
pub use config::{
    AppConfig, CollisionPolicy, ConfigError, ConvertConfig, EmbeddingConfig, EmbeddingProvider,
    IngestConfig, LoggingConfig, VectorStoreConfig, YoutubeConfig,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for papyrus operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {message}")]
    MalformedJson { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================================================
// Document Records
// ============================================================================

/// A structured record extracted from one TEI-XML document.
///
/// `title` is the one mandatory field; everything else is best-effort.
/// Serializes to the output document JSON
/// `{title, date, authors, abstract, keywords, latex_doc}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Document title, truncated to [`PaperRecord::TITLE_CAP`] characters
    pub title: String,

    /// Publication date, as written in the source
    pub date: Option<String>,

    /// Authors in document order
    pub authors: Vec<String>,

    /// Abstract text
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,

    /// Keyword terms
    pub keywords: Vec<String>,

    /// Synthesized markup document (title/author/date declarations,
    /// abstract, sections, equations, bibliography)
    pub latex_doc: String,
}

impl PaperRecord {
    /// Titles longer than this are truncated to fit the downstream
    /// fixed-width storage field.
    pub const TITLE_CAP: usize = 1000;

    pub fn new(title: impl Into<String>) -> Self {
        let mut title: String = title.into();
        if title.chars().count() > Self::TITLE_CAP {
            title = title.chars().take(Self::TITLE_CAP).collect();
        }
        Self {
            title,
            date: None,
            authors: Vec::new(),
            abstract_text: None,
            keywords: Vec::new(),
            latex_doc: String::new(),
        }
    }

    /// Authors joined for hashing and storage ("A. One, B. Two")
    pub fn authors_joined(&self) -> String {
        self.authors.join(", ")
    }
}

// ============================================================================
// YouTube Records
// ============================================================================

/// Per-channel fetch state, seeded from a channel-id list and mutated in
/// place as fetch stages complete. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    #[serde(rename = "channelID")]
    pub channel_id: String,

    pub fetched_statistics: bool,

    pub fetched_videos: bool,
}

impl ChannelState {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            fetched_statistics: false,
            fetched_videos: false,
        }
    }
}

/// Per-video fetch state, owned by its parent channel's video list file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoState {
    #[serde(rename = "videoId")]
    pub video_id: String,

    pub fetched_video: bool,
}

impl VideoState {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            fetched_video: false,
        }
    }
}

/// Everything fetched for one channel: raw statistics payload plus the
/// accumulated per-video payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelData {
    pub statistics: serde_json::Value,

    pub videos: Vec<serde_json::Value>,
}

/// Aggregate collector output, keyed by channel id. BTreeMap keeps the
/// serialized file stable across runs.
pub type ApiData = BTreeMap<String, ChannelData>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paper_record_truncates_title() {
        let long = "x".repeat(PaperRecord::TITLE_CAP + 50);
        let record = PaperRecord::new(long);
        assert_eq!(record.title.chars().count(), PaperRecord::TITLE_CAP);
    }

    #[test]
    fn paper_record_json_round_trip() {
        let record = PaperRecord {
            title: "Spin Networks".to_string(),
            date: Some("2023-08-17".to_string()),
            authors: vec!["M. Amaral".to_string(), "K. Irwin".to_string()],
            abstract_text: Some("We study spin networks.".to_string()),
            keywords: vec!["quantum gravity".to_string()],
            latex_doc: "\\title{Spin Networks}\n".to_string(),
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: PaperRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }

    #[test]
    fn paper_record_wire_field_names() {
        let record = PaperRecord::new("T");
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("abstract").is_some());
        assert!(value.get("latex_doc").is_some());
        assert!(value.get("abstract_text").is_none());
    }

    #[test]
    fn channel_state_wire_field_names() {
        let state = ChannelState::new("UC123");
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value.get("channelID").unwrap(), "UC123");
        assert_eq!(value.get("fetched_statistics").unwrap(), false);
        assert_eq!(value.get("fetched_videos").unwrap(), false);
    }

    #[test]
    fn video_state_wire_field_names() {
        let state = VideoState::new("abc");
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value.get("videoId").unwrap(), "abc");
    }
}
