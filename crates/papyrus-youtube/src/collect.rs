//! The channel collection loop.
//!
//! Each channel moves through two stages tracked by its seed-list flags:
//! statistics fetched, then videos fetched. Every stage transition is
//! persisted immediately (aggregate data, seed list, and per-channel video
//! list), so an aborted run resumes exactly where it stopped. The run ends
//! after the configured number of channels have had work done, or when a
//! credential error propagates up.

use papyrus_core::checkpoint::video_list_path;
use papyrus_core::{read_json_file, write_json_file, ApiData, ChannelState, VideoState, YoutubeConfig};
use tracing::{info, warn};

use crate::api::YoutubeApi;
use crate::Result;

/// Outcome counters for one collection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Channels that had at least one fetch stage executed
    pub channels_processed: usize,

    /// Channels whose statistics were fetched this run
    pub statistics_fetched: usize,

    /// Channels whose video list completed this run
    pub videos_fetched: usize,
}

/// The checkpointed YouTube collector.
pub struct Collector<'a> {
    client: &'a dyn YoutubeApi,
    config: &'a YoutubeConfig,
}

impl<'a> Collector<'a> {
    pub fn new(client: &'a dyn YoutubeApi, config: &'a YoutubeConfig) -> Self {
        Self { client, config }
    }

    /// Run one bounded, resumable collection batch.
    pub async fn run(&self) -> Result<CollectReport> {
        let mut channels: Vec<ChannelState> = read_json_file(&self.config.channels_file)?;

        let mut api_data: ApiData = if self.config.api_data_file.exists() {
            read_json_file(&self.config.api_data_file)?
        } else {
            ApiData::default()
        };

        let mut report = CollectReport::default();

        for index in 0..channels.len() {
            if report.channels_processed >= self.config.max_channels_per_run {
                break;
            }

            let channel_id = channels[index].channel_id.clone();
            let mut worked = false;

            if !channels[index].fetched_statistics {
                let statistics = self.client.channel_statistics(&channel_id).await?;
                api_data.entry(channel_id.clone()).or_default().statistics = statistics;
                channels[index].fetched_statistics = true;
                report.statistics_fetched += 1;
                worked = true;

                write_json_file(&self.config.api_data_file, &api_data)?;
                write_json_file(&self.config.channels_file, &channels)?;
            }

            if !channels[index].fetched_videos {
                self.fetch_channel_videos(&channel_id, &mut api_data).await?;
                channels[index].fetched_videos = true;
                report.videos_fetched += 1;
                worked = true;

                write_json_file(&self.config.channels_file, &channels)?;
            }

            if worked {
                report.channels_processed += 1;
            }
        }

        info!(
            channels = report.channels_processed,
            statistics = report.statistics_fetched,
            videos = report.videos_fetched,
            "collection run finished"
        );

        Ok(report)
    }

    /// Materialize the channel's video-id checkpoint if missing, then fetch
    /// every still-unfetched video, persisting after each one.
    async fn fetch_channel_videos(&self, channel_id: &str, api_data: &mut ApiData) -> Result<()> {
        let list_path = video_list_path(&self.config.video_lists_dir, channel_id);

        if !list_path.exists() {
            let video_ids = self
                .client
                .channel_video_ids(channel_id, self.config.page_size)
                .await?;

            if video_ids.is_empty() {
                warn!(channel_id, "channel has no uploads");
            }

            let list: Vec<VideoState> = video_ids.into_iter().map(VideoState::new).collect();
            write_json_file(&list_path, &list)?;
        }

        let mut videos: Vec<VideoState> = read_json_file(&list_path)?;

        for index in 0..videos.len() {
            if videos[index].fetched_video {
                continue;
            }

            let details = self.client.video_details(&videos[index].video_id).await?;

            api_data
                .entry(channel_id.to_string())
                .or_default()
                .videos
                .push(details);
            write_json_file(&self.config.api_data_file, api_data)?;

            videos[index].fetched_video = true;
            write_json_file(&list_path, &videos)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::YoutubeError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeApi {
        videos_per_channel: usize,
        calls: AtomicUsize,
        /// Fail once this many API calls have been made
        quota_after: Option<usize>,
    }

    impl FakeApi {
        fn new(videos_per_channel: usize) -> Self {
            Self {
                videos_per_channel,
                calls: AtomicUsize::new(0),
                quota_after: None,
            }
        }

        fn tick(&self) -> crate::Result<()> {
            let made = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.quota_after {
                Some(limit) if made >= limit => Err(YoutubeError::QuotaExceeded),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl YoutubeApi for FakeApi {
        async fn channel_statistics(&self, channel_id: &str) -> crate::Result<Value> {
            self.tick()?;
            Ok(json!({"items": [{"snippet": {"title": channel_id}}]}))
        }

        async fn channel_video_ids(
            &self,
            channel_id: &str,
            _page_size: usize,
        ) -> crate::Result<Vec<String>> {
            self.tick()?;
            Ok((0..self.videos_per_channel)
                .map(|i| format!("{channel_id}-v{i}"))
                .collect())
        }

        async fn video_details(&self, video_id: &str) -> crate::Result<Value> {
            self.tick()?;
            Ok(json!({"items": [{"id": video_id}]}))
        }
    }

    fn config(dir: &Path) -> YoutubeConfig {
        YoutubeConfig {
            channels_file: dir.join("channels.json"),
            api_data_file: dir.join("api_data.json"),
            video_lists_dir: dir.join("video_lists"),
            max_channels_per_run: 10,
            ..Default::default()
        }
    }

    fn seed(config: &YoutubeConfig, ids: &[&str]) {
        let channels: Vec<ChannelState> = ids.iter().map(|id| ChannelState::new(*id)).collect();
        write_json_file(&config.channels_file, &channels).unwrap();
    }

    #[tokio::test]
    async fn collects_statistics_and_videos_per_channel() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        seed(&config, &["UCa", "UCb"]);

        let api = FakeApi::new(2);
        let report = Collector::new(&api, &config).run().await.unwrap();

        assert_eq!(report.channels_processed, 2);
        assert_eq!(report.statistics_fetched, 2);
        assert_eq!(report.videos_fetched, 2);

        let api_data: ApiData = read_json_file(&config.api_data_file).unwrap();
        assert_eq!(api_data["UCa"].videos.len(), 2);
        assert!(api_data["UCa"].statistics.get("items").is_some());

        let channels: Vec<ChannelState> = read_json_file(&config.channels_file).unwrap();
        assert!(channels.iter().all(|c| c.fetched_statistics && c.fetched_videos));

        let videos: Vec<VideoState> =
            read_json_file(&video_list_path(&config.video_lists_dir, "UCa")).unwrap();
        assert!(videos.iter().all(|v| v.fetched_video));
    }

    #[tokio::test]
    async fn a_second_run_has_nothing_left_to_do() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        seed(&config, &["UCa"]);

        let api = FakeApi::new(1);
        Collector::new(&api, &config).run().await.unwrap();
        let calls_after_first = api.calls.load(Ordering::SeqCst);

        let report = Collector::new(&api, &config).run().await.unwrap();
        assert_eq!(report.channels_processed, 0);
        assert_eq!(api.calls.load(Ordering::SeqCst), calls_after_first);
    }

    #[tokio::test]
    async fn quota_exhaustion_aborts_but_a_rerun_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        seed(&config, &["UCa", "UCb"]);

        // Statistics + listing + 2 videos for UCa succeed, then quota
        let mut api = FakeApi::new(2);
        api.quota_after = Some(4);

        let err = Collector::new(&api, &config).run().await.unwrap_err();
        assert!(matches!(err, YoutubeError::QuotaExceeded));

        // First channel's progress survived the abort
        let channels: Vec<ChannelState> = read_json_file(&config.channels_file).unwrap();
        assert!(channels[0].fetched_statistics);
        assert!(channels[0].fetched_videos);
        assert!(!channels[1].fetched_statistics);

        // A fresh credential finishes the rest without refetching UCa
        let api = FakeApi::new(2);
        let report = Collector::new(&api, &config).run().await.unwrap();
        assert_eq!(report.channels_processed, 1);
        assert_eq!(api.calls.load(Ordering::SeqCst), 4);

        let api_data: ApiData = read_json_file(&config.api_data_file).unwrap();
        assert_eq!(api_data["UCa"].videos.len(), 2);
        assert_eq!(api_data["UCb"].videos.len(), 2);
    }

    #[tokio::test]
    async fn channel_without_uploads_still_advances() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        seed(&config, &["UCempty"]);

        let api = FakeApi::new(0);
        let report = Collector::new(&api, &config).run().await.unwrap();
        assert_eq!(report.videos_fetched, 1);

        let channels: Vec<ChannelState> = read_json_file(&config.channels_file).unwrap();
        assert!(channels[0].fetched_videos);

        let videos: Vec<VideoState> =
            read_json_file(&video_list_path(&config.video_lists_dir, "UCempty")).unwrap();
        assert!(videos.is_empty());
    }

    #[tokio::test]
    async fn max_channels_bounds_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.max_channels_per_run = 1;
        seed(&config, &["UCa", "UCb", "UCc"]);

        let api = FakeApi::new(1);
        let report = Collector::new(&api, &config).run().await.unwrap();
        assert_eq!(report.channels_processed, 1);

        let channels: Vec<ChannelState> = read_json_file(&config.channels_file).unwrap();
        assert!(channels[0].fetched_videos);
        assert!(!channels[1].fetched_statistics);
    }
}
