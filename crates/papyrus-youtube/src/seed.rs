//! Seed-list conversion.
//!
//! Turns a single-column CSV of channel ids into the JSON seed list the
//! collector consumes, with both fetch flags reset.

use std::path::Path;

use papyrus_core::{write_json_file, ChannelState};
use tracing::info;

use crate::{Result, YoutubeError};

/// Convert a channel-id CSV into a fresh seed list.
pub fn seed_channels_from_csv(csv_path: &Path, json_path: &Path) -> Result<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(csv_path)
        .map_err(|e| YoutubeError::Csv(e.to_string()))?;

    let mut channels = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| YoutubeError::Csv(e.to_string()))?;
        let Some(channel_id) = record.get(0).map(str::trim) else {
            continue;
        };
        if channel_id.is_empty() {
            continue;
        }
        channels.push(ChannelState::new(channel_id));
    }

    write_json_file(json_path, &channels)?;
    info!(channels = channels.len(), file = %json_path.display(), "seed list written");

    Ok(channels.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use papyrus_core::read_json_file;

    #[test]
    fn csv_becomes_unfetched_seed_list() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("channels.csv");
        let json_path = dir.path().join("channels.json");

        std::fs::write(&csv_path, "UCaaa\nUCbbb\n\nUCccc\n").unwrap();

        let count = seed_channels_from_csv(&csv_path, &json_path).unwrap();
        assert_eq!(count, 3);

        let channels: Vec<ChannelState> = read_json_file(&json_path).unwrap();
        assert_eq!(channels.len(), 3);
        assert_eq!(channels[0].channel_id, "UCaaa");
        assert!(!channels[0].fetched_statistics);
        assert!(!channels[0].fetched_videos);
    }
}
