//! Batch TEI conversion.
//!
//! Walks a source directory tree, extracts every file matching the
//! configured suffix, and mirrors the relative directory structure into a
//! destination tree with one JSON record per input. A file that fails
//! extraction (most commonly for a missing title) is logged and skipped;
//! the batch never aborts on a single bad input.

use std::path::{Path, PathBuf};

use papyrus_core::{CollisionPolicy, ConvertConfig};
use tracing::{info, warn};

use crate::extract::extract_document;
use crate::namer::file_name_for;
use crate::{Result, TeiError};

/// Outcome counters for one conversion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertReport {
    /// Records written
    pub converted: usize,

    /// Inputs skipped after an extraction failure
    pub skipped: usize,

    /// Output names that already existed when written
    pub collisions: usize,
}

/// Convert every matching file under `src` into a record under `dst`.
pub fn convert_tree(src: &Path, dst: &Path, config: &ConvertConfig) -> Result<ConvertReport> {
    let mut files = Vec::new();
    collect_files(src, &config.input_suffix, &mut files)?;

    let mut report = ConvertReport::default();

    for file in files {
        match convert_file(&file, src, dst, config, &mut report) {
            Ok(()) => report.converted += 1,
            Err(TeiError::MissingTitle) => {
                warn!(file = %file.display(), "skipping document without a title");
                report.skipped += 1;
            }
            Err(TeiError::NameCollision(name)) => {
                warn!(file = %file.display(), name, "skipping colliding output name");
                report.skipped += 1;
            }
            Err(err) => {
                warn!(file = %file.display(), error = %err, "skipping unconvertible document");
                report.skipped += 1;
            }
        }
    }

    info!(
        converted = report.converted,
        skipped = report.skipped,
        collisions = report.collisions,
        "batch conversion finished"
    );

    Ok(report)
}

/// Recursive directory walk, sorted per directory so runs are
/// deterministic.
fn collect_files(dir: &Path, suffix: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| TeiError::IoError {
            path: dir.display().to_string(),
            source: e,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_files(&path, suffix, out)?;
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix))
        {
            out.push(path);
        }
    }

    Ok(())
}

fn convert_file(
    file: &Path,
    src: &Path,
    dst: &Path,
    config: &ConvertConfig,
    report: &mut ConvertReport,
) -> Result<()> {
    let xml = std::fs::read_to_string(file).map_err(|e| TeiError::IoError {
        path: file.display().to_string(),
        source: e,
    })?;

    let record = extract_document(&xml)?;

    // Mirror the file's relative directory under the destination root.
    let rel_dir = file
        .parent()
        .and_then(|p| p.strip_prefix(src).ok())
        .unwrap_or_else(|| Path::new(""));
    let out_dir = dst.join(rel_dir);
    std::fs::create_dir_all(&out_dir).map_err(|e| TeiError::IoError {
        path: out_dir.display().to_string(),
        source: e,
    })?;

    let out_path = out_dir.join(file_name_for(&record.title));
    if out_path.exists() {
        report.collisions += 1;
        match config.collision_policy {
            CollisionPolicy::Overwrite => {
                warn!(name = %out_path.display(), "overwriting colliding output");
            }
            CollisionPolicy::Error => {
                return Err(TeiError::NameCollision(out_path.display().to_string()));
            }
        }
    }

    let json =
        serde_json::to_string_pretty(&record).map_err(|e| TeiError::JsonError(e.to_string()))?;
    std::fs::write(&out_path, json).map_err(|e| TeiError::IoError {
        path: out_path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use papyrus_core::PaperRecord;

    fn tei(title: &str) -> String {
        format!(
            "<TEI><teiHeader><fileDesc><titleStmt><title>{title}</title></titleStmt></fileDesc></teiHeader></TEI>"
        )
    }

    #[test]
    fn converts_and_mirrors_tree() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        std::fs::create_dir_all(src.path().join("physics/gravity")).unwrap();
        std::fs::write(src.path().join("a.tei.xml"), tei("Top Level")).unwrap();
        std::fs::write(
            src.path().join("physics/gravity/b.tei.xml"),
            tei("Deep Paper"),
        )
        .unwrap();
        std::fs::write(src.path().join("physics/notes.txt"), "not tei").unwrap();

        let report =
            convert_tree(src.path(), dst.path(), &ConvertConfig::default()).unwrap();
        assert_eq!(report.converted, 2);
        assert_eq!(report.skipped, 0);

        assert!(dst.path().join("top_level.json").exists());
        assert!(dst
            .path()
            .join("physics/gravity/deep_paper.json")
            .exists());

        let json = std::fs::read_to_string(dst.path().join("top_level.json")).unwrap();
        let record: PaperRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.title, "Top Level");
    }

    #[test]
    fn failing_file_is_isolated() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        std::fs::write(src.path().join("a.tei.xml"), tei("Paper A")).unwrap();
        std::fs::write(src.path().join("b.tei.xml"), tei("")).unwrap(); // no title
        std::fs::write(src.path().join("c.tei.xml"), "<broken").unwrap();
        std::fs::write(src.path().join("d.tei.xml"), tei("Paper D")).unwrap();

        let report =
            convert_tree(src.path(), dst.path(), &ConvertConfig::default()).unwrap();
        assert_eq!(report.converted, 2);
        assert_eq!(report.skipped, 2);
        assert!(dst.path().join("paper_a.json").exists());
        assert!(dst.path().join("paper_d.json").exists());
    }

    #[test]
    fn collision_policy_overwrite_keeps_last() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        // Same title from two inputs produces the same output name
        std::fs::write(src.path().join("a.tei.xml"), tei("Same Title")).unwrap();
        std::fs::write(src.path().join("b.tei.xml"), tei("Same  Title")).unwrap();

        let report =
            convert_tree(src.path(), dst.path(), &ConvertConfig::default()).unwrap();
        assert_eq!(report.converted, 2);
        assert_eq!(report.collisions, 1);
        assert!(dst.path().join("same_title.json").exists());
    }

    #[test]
    fn collision_policy_error_skips_later_file() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        std::fs::write(src.path().join("a.tei.xml"), tei("Same Title")).unwrap();
        std::fs::write(src.path().join("b.tei.xml"), tei("Same  Title")).unwrap();

        let config = ConvertConfig {
            collision_policy: CollisionPolicy::Error,
            ..Default::default()
        };
        let report = convert_tree(src.path(), dst.path(), &config).unwrap();
        assert_eq!(report.converted, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.collisions, 1);
    }
}
