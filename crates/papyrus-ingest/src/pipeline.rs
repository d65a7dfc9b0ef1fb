//! The ingestion pipeline.
//!
//! Per run: load the checkpoint, then pull one unprocessed record at a
//! time: extract fields, embed each content chunk, insert the rows, mark
//! the file processed, and delete it from the source folder. A file that
//! fails is moved to the quarantine folder and never aborts the batch.
//! Every K successful files the store is flushed and the checkpoint saved;
//! both always happen once more at loop exit.

use std::path::{Path, PathBuf};

use papyrus_core::{IngestCheckpoint, IngestConfig, PaperRecord};
use papyrus_vector::{ChunkRow, EmbeddingClient, VectorStore};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::clean::{clean_description, clean_latex};
use crate::chunk::split_text;
use crate::{IngestError, Result};

/// Storage field caps, matching the collection schema.
const DATE_CAP: usize = 250;
const KEYWORDS_CAP: usize = 1000;
const AUTHORS_CAP: usize = 1000;
const TITLE_CAP: usize = 900;
const ABSTRACT_CAP: usize = 4000;
const CATEGORY_CAP: usize = 250;
const CONTENT_CAP: usize = 1024;

/// Values above this length get a cleaning pass before truncation.
const CLEAN_THRESHOLD: usize = 1000;
const ABSTRACT_CLEAN_THRESHOLD: usize = 4000;

/// Partition whose content is plain prose rather than markup.
const NOTES_PARTITION: &str = "notes";

/// Outcome counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Files ingested and deleted from the source folder
    pub ingested_files: usize,

    /// Chunk rows inserted
    pub inserted_chunks: usize,

    /// Files moved to the quarantine folder
    pub quarantined: usize,
}

/// Content hash identifying one logical document across its chunk rows.
pub fn document_id(title: &str, authors: &str, date: &str) -> String {
    let combined = format!("{title}-{authors}-{date}");
    hex::encode(Sha256::digest(combined.as_bytes()))
}

/// The checkpointed embedding/indexing ingestor.
pub struct Ingestor<'a> {
    store: &'a dyn VectorStore,
    embedder: &'a dyn EmbeddingClient,
    config: &'a IngestConfig,
    partition: String,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        store: &'a dyn VectorStore,
        embedder: &'a dyn EmbeddingClient,
        config: &'a IngestConfig,
        partition: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
            partition: partition.into(),
        }
    }

    /// Run one bounded, resumable ingestion batch.
    pub async fn run(&self) -> Result<IngestReport> {
        let mut checkpoint = IngestCheckpoint::load(&self.config.checkpoint_file)?;
        let mut report = IngestReport::default();

        // Whatever ends the loop, the durability point below still runs.
        let outcome = self.process_batch(&mut checkpoint, &mut report).await;
        let flushed = self.store.flush().await;
        let saved = checkpoint.save(&self.config.checkpoint_file);
        outcome?;
        flushed?;
        saved?;

        info!(
            ingested = report.ingested_files,
            chunks = report.inserted_chunks,
            quarantined = report.quarantined,
            "ingestion run finished"
        );

        Ok(report)
    }

    async fn process_batch(
        &self,
        checkpoint: &mut IngestCheckpoint,
        report: &mut IngestReport,
    ) -> Result<()> {
        let mut since_flush = 0usize;

        while report.ingested_files + report.quarantined < self.config.max_files_per_run {
            let Some(next) = self.pull_next_file(&checkpoint)? else {
                break;
            };
            let (file, category) = next;
            let file_key = file.display().to_string();

            match self.ingest_file(&file, &category).await {
                Ok(chunks) => {
                    // The checkpoint is the source of truth; the source file
                    // only exists while it is still unprocessed.
                    std::fs::remove_file(&file).map_err(|e| IngestError::Io {
                        path: file_key.clone(),
                        source: e,
                    })?;

                    checkpoint.mark_processed(&file_key);
                    report.ingested_files += 1;
                    report.inserted_chunks += chunks;
                    since_flush += 1;

                    if since_flush >= self.config.flush_every {
                        self.store.flush().await?;
                        checkpoint.save(&self.config.checkpoint_file)?;
                        since_flush = 0;
                    }
                }
                Err(err) => {
                    warn!(file = %file_key, error = %err, "quarantining unprocessable file");
                    self.quarantine(&file)?;
                    report.quarantined += 1;
                }
            }
        }

        Ok(())
    }

    /// First unprocessed record in the source folder, with its category
    /// derived from the relative directory path.
    fn pull_next_file(
        &self,
        checkpoint: &IngestCheckpoint,
    ) -> Result<Option<(PathBuf, String)>> {
        let mut files = Vec::new();
        collect_json_files(&self.config.source_dir, &mut files)?;

        for file in files {
            if checkpoint.contains(&file.display().to_string()) {
                continue;
            }
            let category = category_for(&self.config.source_dir, &file);
            return Ok(Some((file, category)));
        }

        Ok(None)
    }

    async fn ingest_file(&self, file: &Path, category: &str) -> Result<usize> {
        let record: PaperRecord = papyrus_core::read_json_file(file)?;

        let title = cap_field(&record.title, CLEAN_THRESHOLD, TITLE_CAP);
        let date = cap_field(record.date.as_deref().unwrap_or(""), CLEAN_THRESHOLD, DATE_CAP);
        let authors = cap_field(&record.authors_joined(), CLEAN_THRESHOLD, AUTHORS_CAP);
        let abstract_text = cap_field(
            record.abstract_text.as_deref().unwrap_or(""),
            ABSTRACT_CLEAN_THRESHOLD,
            ABSTRACT_CAP,
        );
        let keywords = cap_field(&record.keywords.join(", "), CLEAN_THRESHOLD, KEYWORDS_CAP);
        let category = cap_field(category, CLEAN_THRESHOLD, CATEGORY_CAP);

        let content = if self.partition == NOTES_PARTITION {
            clean_description(&record.latex_doc)
        } else {
            clean_latex(&record.latex_doc)
        };

        let doc_id = document_id(&title, &authors, &date);
        let mut inserted = 0;

        for chunk in split_text(&content, self.config.chunk_size, self.config.chunk_overlap) {
            let text = if chunk.len() > self.config.chunk_size {
                clean_description(&chunk)
            } else {
                chunk
            };

            let vector = self.embedder.embed(&text).await?;

            self.store
                .insert(ChunkRow {
                    document_id: doc_id.clone(),
                    title: title.clone(),
                    date: date.clone(),
                    authors: authors.clone(),
                    abstract_text: abstract_text.clone(),
                    keywords: keywords.clone(),
                    category: category.clone(),
                    content: truncate_chars(&text, CONTENT_CAP),
                    partition: self.partition.clone(),
                    content_vector: vector,
                })
                .await?;
            inserted += 1;
        }

        Ok(inserted)
    }

    fn quarantine(&self, file: &Path) -> Result<()> {
        std::fs::create_dir_all(&self.config.not_processed_dir).map_err(|e| IngestError::Io {
            path: self.config.not_processed_dir.display().to_string(),
            source: e,
        })?;

        let target = self
            .config
            .not_processed_dir
            .join(file.file_name().unwrap_or_default());

        std::fs::rename(file, &target).map_err(|e| IngestError::Io {
            path: file.display().to_string(),
            source: e,
        })
    }
}

/// `None`/empty fields become "Unknown"; over-long values are cleaned
/// before being truncated to the storage cap.
fn cap_field(value: &str, clean_threshold: usize, cap: usize) -> String {
    if value.is_empty() {
        return "Unknown".to_string();
    }

    let value = if value.len() > clean_threshold {
        clean_description(value)
    } else {
        value.to_string()
    };

    truncate_chars(&value, cap)
}

fn truncate_chars(value: &str, cap: usize) -> String {
    if value.chars().count() <= cap {
        value.to_string()
    } else {
        value.chars().take(cap).collect()
    }
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| IngestError::Io {
            path: dir.display().to_string(),
            source: e,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }

    Ok(())
}

/// Category label from the file's directory relative to the source root,
/// separators replaced with underscores. Files at the root take the root
/// folder's name.
fn category_for(root: &Path, file: &Path) -> String {
    let rel = file
        .parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .unwrap_or_else(|| Path::new(""));

    if rel.as_os_str().is_empty() {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("_")
    }
}
