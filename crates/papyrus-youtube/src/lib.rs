//! Papyrus YouTube - Checkpointed collection and table flattening
//!
//! Fetches channel statistics and per-video metadata from the YouTube Data
//! API with per-channel and per-video checkpoint files, so interrupted runs
//! resume where they stopped and quota-bounded batches can rotate across
//! credentials. A separate, pure flattening pass turns the accumulated JSON
//! into channel and video tables with trending/category joins and derived
//! engagement statistics.

use thiserror::Error;

pub mod api;
pub mod collect;
pub mod seed;
pub mod tables;

pub use api::{YoutubeApi, YoutubeClient};
pub use collect::{Collector, CollectReport};
pub use seed::seed_channels_from_csv;
pub use tables::{
    dedup_by_key, enrich_tables, flatten_tables, merge_tables, top_videos, write_csv, ChannelRow,
    VideoRow,
};

/// Errors from YouTube collection and flattening
#[derive(Error, Debug)]
pub enum YoutubeError {
    /// The current credential ran out of quota. Fatal to the run; the
    /// operator re-invokes with the next credential.
    #[error("API quota exceeded for the current credential")]
    QuotaExceeded,

    /// Any other API error payload
    #[error("YouTube API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(String),

    #[error(transparent)]
    Core(#[from] papyrus_core::CoreError),
}

pub type Result<T> = std::result::Result<T, YoutubeError>;
