//! Papyrus Ingest - Checkpointed embedding and indexing pipeline
//!
//! Pulls converted paper records from a folder, cleans and chunks their
//! content, embeds each chunk, and inserts the rows into the vector store.
//! Progress is checkpointed to a JSON file after every K successful
//! insertions and at end of run, so a crash loses at most the unflushed
//! tail and a re-run never re-ingests a checkpointed file.

use thiserror::Error;

pub mod chunk;
pub mod clean;
pub mod pipeline;

pub use chunk::split_text;
pub use clean::{clean_description, clean_latex};
pub use pipeline::{document_id, Ingestor, IngestReport};

/// Errors from the ingestion pipeline
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] papyrus_core::CoreError),

    #[error(transparent)]
    Vector(#[from] papyrus_vector::VectorError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
