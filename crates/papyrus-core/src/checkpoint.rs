//! Checkpoint files
//!
//! Every pipeline persists its progress as a JSON checkpoint: a flat list of
//! ingested file paths for paper ingestion, channel/video flag lists for the
//! YouTube collector. Checkpoints are read once at start and fully rewritten
//! at each flush point; they are the single source of truth for "has this
//! unit of work been done".
//!
//! Files are deserialized into the strongly typed records of this crate at
//! the boundary; a shape mismatch fails fast instead of propagating
//! partially-shaped data into the pipelines.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::{CoreError, Result};

/// Read a typed JSON file, failing fast on malformed shapes.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| CoreError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    serde_json::from_str(&content).map_err(|e| CoreError::MalformedJson {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Rewrite a typed JSON file in full. Parent directories are created as
/// needed so checkpoints can live next to the data they describe.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }

    let content = serde_json::to_string_pretty(value).map_err(|e| CoreError::MalformedJson {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    std::fs::write(path, content).map_err(|e| CoreError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

/// Append-only list of source files that have been ingested into the vector
/// store. Persisted after every flush and at end of run.
#[derive(Debug, Clone, Default)]
pub struct IngestCheckpoint {
    paths: Vec<String>,
    seen: HashSet<String>,
}

impl IngestCheckpoint {
    /// Load a checkpoint, returning an empty one when the file does not
    /// exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let paths: Vec<String> = read_json_file(path)?;
        let seen = paths.iter().cloned().collect();
        Ok(Self { paths, seen })
    }

    /// Persist the full list. Called only at defined-safe points.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_file(path, &self.paths)
    }

    /// Record a newly ingested source path.
    pub fn mark_processed(&mut self, source: impl Into<String>) {
        let source = source.into();
        if self.seen.insert(source.clone()) {
            self.paths.push(source);
        }
    }

    /// Whether this source path was already ingested in an earlier run.
    pub fn contains(&self, source: &str) -> bool {
        self.seen.contains(source)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

/// Checkpoint path for one channel's video list.
pub fn video_list_path(dir: &Path, channel_id: &str) -> PathBuf {
    dir.join(format!("{channel_id}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelState;

    #[test]
    fn load_missing_checkpoint_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = IngestCheckpoint::load(&dir.path().join("none.json")).unwrap();
        assert!(checkpoint.is_empty());
    }

    #[test]
    fn checkpoint_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("processed.json");

        let mut checkpoint = IngestCheckpoint::default();
        checkpoint.mark_processed("papers/b.json");
        checkpoint.mark_processed("papers/a.json");
        checkpoint.mark_processed("papers/b.json"); // duplicate is ignored
        checkpoint.save(&file).unwrap();

        let loaded = IngestCheckpoint::load(&file).unwrap();
        assert_eq!(loaded.paths(), &["papers/b.json", "papers/a.json"]);
        assert!(loaded.contains("papers/a.json"));
        assert!(!loaded.contains("papers/c.json"));
    }

    #[test]
    fn malformed_checkpoint_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("processed.json");
        std::fs::write(&file, "{\"not\": \"a list\"}").unwrap();

        let err = IngestCheckpoint::load(&file).unwrap_err();
        assert!(matches!(err, CoreError::MalformedJson { .. }));
    }

    #[test]
    fn channel_list_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("channels.json");

        let mut channels = vec![ChannelState::new("UCa"), ChannelState::new("UCb")];
        channels[0].fetched_statistics = true;
        write_json_file(&file, &channels).unwrap();

        let loaded: Vec<ChannelState> = read_json_file(&file).unwrap();
        assert_eq!(loaded, channels);
    }
}
