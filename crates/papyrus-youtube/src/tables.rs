//! Flattening and enrichment of collected YouTube data.
//!
//! Pure transformations over the already-fetched JSON: the nested
//! per-channel/per-video structure flattens into a channel table and a
//! video table, joined with a trending-video lookup and a category-name
//! lookup. Enrichment appends per-channel mean/standard-deviation columns
//! and per-video ratio-to-channel-average columns. Inputs are never
//! mutated; malformed payloads are logged and skipped.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::Path;

use papyrus_core::ApiData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{Result, YoutubeError};

// ============================================================================
// Table Rows
// ============================================================================

/// One row of the channel table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelRow {
    #[serde(rename = "channelId")]
    pub channel_id: String,
    #[serde(rename = "channelTitle")]
    pub channel_title: String,
    pub description: String,
    #[serde(rename = "publishedAt")]
    pub published_at: String,
    #[serde(rename = "videoCount")]
    pub video_count: String,
    #[serde(rename = "viewCount")]
    pub view_count: String,
    #[serde(rename = "subscriberCount")]
    pub subscriber_count: String,
    pub country: String,
    #[serde(rename = "customUrl")]
    pub custom_url: String,
    #[serde(rename = "topicCategories")]
    pub topic_categories: String,
    #[serde(rename = "madeForKids")]
    pub made_for_kids: String,
    pub keywords: String,
    #[serde(rename = "hasVideoTrending")]
    pub has_video_trending: bool,
    #[serde(rename = "numberVideoTrending")]
    pub number_video_trending: u32,
}

/// One row of the video table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoRow {
    #[serde(rename = "videoId")]
    pub video_id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "publishedAt")]
    pub published_at: String,
    #[serde(rename = "channelId")]
    pub channel_id: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    pub category: String,
    #[serde(rename = "viewCount")]
    pub view_count: String,
    #[serde(rename = "likeCount")]
    pub like_count: String,
    #[serde(rename = "commentCount")]
    pub comment_count: String,
    pub tags: String,
    #[serde(rename = "channelTitle")]
    pub channel_title: String,
    pub thumbnails: String,
    #[serde(rename = "isTrending")]
    pub is_trending: bool,
    pub duration: String,
    pub dimension: String,
    pub definition: String,
    pub caption: String,
    #[serde(rename = "licensedContent")]
    pub licensed_content: String,
    pub projection: String,
    #[serde(rename = "uploadStatus")]
    pub upload_status: String,
    #[serde(rename = "privacyStatus")]
    pub privacy_status: String,
    pub license: String,
    pub embeddable: String,
    #[serde(rename = "publicStatsViewable")]
    pub public_stats_viewable: String,
    #[serde(rename = "madeForKids")]
    pub made_for_kids: String,
    #[serde(rename = "favoriteCount")]
    pub favorite_count: String,
    #[serde(rename = "topicCategories")]
    pub topic_categories: String,
}

// ============================================================================
// Flattening
// ============================================================================

/// Flatten the aggregate API data into channel and video tables, joining in
/// the trending lookup (`{channelID: {"US_trends": [{"video_id": ...}]}}`)
/// and the category lookup (`{"items": [{"id", "snippet": {"title"}}]}`).
pub fn flatten_tables(
    api_data: &ApiData,
    trending: &Value,
    categories: &Value,
) -> (Vec<ChannelRow>, Vec<VideoRow>) {
    let category_names: HashMap<String, String> = categories
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let id = item.get("id").and_then(Value::as_str)?;
                    let title = item.pointer("/snippet/title").and_then(Value::as_str)?;
                    Some((id.to_string(), title.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    let mut channel_rows = Vec::new();
    let mut video_rows = Vec::new();

    for (channel_id, data) in api_data {
        match channel_row(channel_id, &data.statistics) {
            Some(row) => channel_rows.push(row),
            None => {
                warn!(channel_id, "malformed channel statistics payload, skipping");
                continue;
            }
        }

        for video in &data.videos {
            if video.is_null() || video.get("error").is_some() {
                warn!(channel_id, "empty video payload, skipping");
                continue;
            }
            match video_row(video, &category_names) {
                Some(row) => video_rows.push(row),
                None => warn!(channel_id, "malformed video payload, skipping"),
            }
        }
    }

    let mut channel_rows = dedup_by_key(channel_rows, |row| row.channel_id.clone());
    let mut video_rows = dedup_by_key(video_rows, |row| row.video_id.clone());

    join_trending(trending, &mut channel_rows, &mut video_rows);

    (channel_rows, video_rows)
}

fn channel_row(channel_id: &str, statistics: &Value) -> Option<ChannelRow> {
    let info = statistics.pointer("/items/0")?;
    let snippet = info.get("snippet")?;
    let stats = info.get("statistics")?;

    Some(ChannelRow {
        channel_id: channel_id.to_string(),
        channel_title: text(snippet, "title"),
        description: text(snippet, "description"),
        published_at: text(snippet, "publishedAt"),
        video_count: text(stats, "videoCount"),
        view_count: text(stats, "viewCount"),
        subscriber_count: text(stats, "subscriberCount"),
        country: text(snippet, "country"),
        custom_url: text(snippet, "customUrl"),
        topic_categories: joined_list(info.pointer("/topicDetails/topicCategories")),
        made_for_kids: info
            .pointer("/status/madeForKids")
            .map(value_text)
            .unwrap_or_else(|| "0".to_string()),
        keywords: info
            .pointer("/brandingSettings/channel/keywords")
            .map(value_text)
            .unwrap_or_default(),
        has_video_trending: false,
        number_video_trending: 0,
    })
}

fn video_row(video: &Value, category_names: &HashMap<String, String>) -> Option<VideoRow> {
    let info = video.pointer("/items/0")?;
    let snippet = info.get("snippet")?;
    let stats = info.get("statistics")?;
    let content = info.get("contentDetails")?;
    let status = info.get("status")?;

    let category_id = text(snippet, "categoryId");
    let category = category_names.get(&category_id).cloned().unwrap_or_default();

    Some(VideoRow {
        video_id: text(info, "id"),
        title: text(snippet, "title"),
        description: text(snippet, "description"),
        published_at: text(snippet, "publishedAt"),
        channel_id: text(snippet, "channelId"),
        category_id,
        category,
        view_count: text(stats, "viewCount"),
        like_count: text(stats, "likeCount"),
        comment_count: stats
            .get("commentCount")
            .map(value_text)
            .unwrap_or_else(|| "0".to_string()),
        tags: joined_list(snippet.get("tags")),
        channel_title: text(snippet, "channelTitle"),
        thumbnails: snippet
            .get("thumbnails")
            .map(Value::to_string)
            .unwrap_or_default(),
        is_trending: false,
        duration: text(content, "duration"),
        dimension: text(content, "dimension"),
        definition: text(content, "definition"),
        caption: text(content, "caption"),
        licensed_content: content
            .get("licensedContent")
            .map(value_text)
            .unwrap_or_default(),
        projection: text(content, "projection"),
        upload_status: text(status, "uploadStatus"),
        privacy_status: text(status, "privacyStatus"),
        license: text(status, "license"),
        embeddable: status.get("embeddable").map(value_text).unwrap_or_default(),
        public_stats_viewable: status
            .get("publicStatsViewable")
            .map(value_text)
            .unwrap_or_default(),
        made_for_kids: status
            .get("madeForKids")
            .map(value_text)
            .unwrap_or_else(|| "0".to_string()),
        favorite_count: stats
            .get("favoriteCount")
            .map(value_text)
            .unwrap_or_else(|| "0".to_string()),
        topic_categories: joined_list(info.pointer("/topicDetails/topicCategories")),
    })
}

/// Mark trending channels and videos from the trending lookup.
fn join_trending(trending: &Value, channels: &mut [ChannelRow], videos: &mut [VideoRow]) {
    let Some(trending) = trending.as_object() else {
        return;
    };

    for (channel_id, entry) in trending {
        let Some(channel) = channels.iter_mut().find(|c| &c.channel_id == channel_id) else {
            continue;
        };
        channel.has_video_trending = true;

        let trends = entry
            .get("US_trends")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for trend in trends {
            let video_id = trend
                .get("video_id")
                .and_then(Value::as_str)
                .unwrap_or("0");
            if let Some(video) = videos.iter_mut().find(|v| v.video_id == video_id) {
                video.is_trending = true;
            }
            channel.number_video_trending += 1;
        }
    }
}

fn text(value: &Value, key: &str) -> String {
    value.get(key).map(value_text).unwrap_or_default()
}

/// Scalar payload value as plain text; nested values fall back to JSON.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn joined_list(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(value_text)
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_default()
}

/// Keep the first occurrence of every key, preserving order.
pub fn dedup_by_key<T, K: Eq + Hash>(rows: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(key(row)))
        .collect()
}

// ============================================================================
// CSV output
// ============================================================================

/// Write rows to a CSV table.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| YoutubeError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| YoutubeError::Csv(e.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| YoutubeError::Csv(e.to_string()))?;
    }
    writer.flush().map_err(|e| YoutubeError::Csv(e.to_string()))?;

    Ok(())
}

fn read_csv(path: &Path) -> Result<(csv::StringRecord, Vec<csv::StringRecord>)> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| YoutubeError::Csv(e.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|e| YoutubeError::Csv(e.to_string()))?
        .clone();
    let rows = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| YoutubeError::Csv(e.to_string()))?;
    Ok((headers, rows))
}

fn write_records(
    path: &Path,
    headers: &csv::StringRecord,
    rows: &[csv::StringRecord],
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| YoutubeError::Csv(e.to_string()))?;
    writer
        .write_record(headers)
        .map_err(|e| YoutubeError::Csv(e.to_string()))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| YoutubeError::Csv(e.to_string()))?;
    }
    writer.flush().map_err(|e| YoutubeError::Csv(e.to_string()))?;
    Ok(())
}

/// Concatenate two tables with the same column structure.
pub fn merge_tables(first: &Path, second: &Path, output: &Path) -> Result<usize> {
    let (headers, mut rows) = read_csv(first)?;
    let (second_headers, second_rows) = read_csv(second)?;

    if headers != second_headers {
        return Err(YoutubeError::Csv(format!(
            "column mismatch between {} and {}",
            first.display(),
            second.display()
        )));
    }

    rows.extend(second_rows);
    write_records(output, &headers, &rows)?;
    Ok(rows.len())
}

// ============================================================================
// Enrichment
// ============================================================================

/// Count columns the statistics are computed over.
const COUNT_COLUMNS: [&str; 4] = ["viewCount", "likeCount", "commentCount", "favoriteCount"];

#[derive(Debug, Clone, Copy, Default)]
struct RunningStat {
    sum: f64,
    sum_squares: f64,
    count: usize,
}

impl RunningStat {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.sum_squares += value * value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Sample standard deviation; undefined below two observations.
    fn std(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        let n = self.count as f64;
        let variance = (self.sum_squares - self.sum * self.sum / n) / (n - 1.0);
        Some(variance.max(0.0).sqrt())
    }
}

/// Unparsable counts coerce to zero, matching the upstream tables.
fn numeric(value: &str) -> f64 {
    value.trim().parse::<f64>().unwrap_or(0.0)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| YoutubeError::Csv(format!("missing column {name}")))
}

/// Enrich the channel and video tables with per-channel statistics.
///
/// The channel table gains `<count>_mean` / `<count>_std` columns computed
/// over the channel's videos; the video table gains those plus
/// `<count>_to_avg_<count>_ratio` columns relating each video to its
/// channel's average. Channels without videos and undefined deviations
/// leave the cell empty.
pub fn enrich_tables(
    channels_in: &Path,
    videos_in: &Path,
    channels_out: &Path,
    videos_out: &Path,
) -> Result<()> {
    let (channel_headers, channel_rows) = read_csv(channels_in)?;
    let (video_headers, video_rows) = read_csv(videos_in)?;

    let video_channel_col = column_index(&video_headers, "channelId")?;
    let count_cols: Vec<usize> = COUNT_COLUMNS
        .iter()
        .map(|name| column_index(&video_headers, name))
        .collect::<Result<_>>()?;

    // Per-channel running stats for each count column
    let mut stats: HashMap<String, [RunningStat; 4]> = HashMap::new();
    for row in &video_rows {
        let channel_id = row.get(video_channel_col).unwrap_or_default().to_string();
        let entry = stats.entry(channel_id).or_default();
        for (slot, &col) in count_cols.iter().enumerate() {
            entry[slot].push(numeric(row.get(col).unwrap_or_default()));
        }
    }

    let stat_headers: Vec<String> = COUNT_COLUMNS
        .iter()
        .flat_map(|name| [format!("{name}_mean"), format!("{name}_std")])
        .collect();

    // Channel table: append the stat columns
    let channel_id_col = column_index(&channel_headers, "channelId")?;
    let mut out_headers = channel_headers.clone();
    for header in &stat_headers {
        out_headers.push_field(header);
    }

    let enriched_channels: Vec<csv::StringRecord> = channel_rows
        .iter()
        .map(|row| {
            let mut out = row.clone();
            match stats.get(row.get(channel_id_col).unwrap_or_default()) {
                Some(channel_stats) => {
                    for stat in channel_stats {
                        out.push_field(&format_float(stat.mean()));
                        out.push_field(&stat.std().map(format_float).unwrap_or_default());
                    }
                }
                None => {
                    for _ in 0..stat_headers.len() {
                        out.push_field("");
                    }
                }
            }
            out
        })
        .collect();

    write_records(channels_out, &out_headers, &enriched_channels)?;

    // Video table: stat columns plus ratio-to-average columns
    let mut out_headers = video_headers.clone();
    for header in &stat_headers {
        out_headers.push_field(header);
    }
    for name in COUNT_COLUMNS {
        out_headers.push_field(&format!("{name}_to_avg_{name}_ratio"));
    }

    let enriched_videos: Vec<csv::StringRecord> = video_rows
        .iter()
        .map(|row| {
            let mut out = row.clone();
            let channel_stats = stats.get(row.get(video_channel_col).unwrap_or_default());

            match channel_stats {
                Some(channel_stats) => {
                    for stat in channel_stats {
                        out.push_field(&format_float(stat.mean()));
                        out.push_field(&stat.std().map(format_float).unwrap_or_default());
                    }
                    for (slot, &col) in count_cols.iter().enumerate() {
                        let mean = channel_stats[slot].mean();
                        if mean == 0.0 {
                            out.push_field("");
                        } else {
                            let value = numeric(row.get(col).unwrap_or_default());
                            out.push_field(&format_float(value / mean));
                        }
                    }
                }
                None => {
                    for _ in 0..stat_headers.len() + COUNT_COLUMNS.len() {
                        out.push_field("");
                    }
                }
            }
            out
        })
        .collect();

    write_records(videos_out, &out_headers, &enriched_videos)?;

    Ok(())
}

fn format_float(value: f64) -> String {
    format!("{value}")
}

/// Top `n` videos per channel by view count.
pub fn top_videos(videos_in: &Path, output: &Path, n: usize) -> Result<usize> {
    let (headers, rows) = read_csv(videos_in)?;
    let channel_col = column_index(&headers, "channelId")?;
    let view_col = column_index(&headers, "viewCount")?;

    let mut by_channel: HashMap<String, Vec<csv::StringRecord>> = HashMap::new();
    let mut channel_order = Vec::new();
    for row in rows {
        let channel_id = row.get(channel_col).unwrap_or_default().to_string();
        if !by_channel.contains_key(&channel_id) {
            channel_order.push(channel_id.clone());
        }
        by_channel.entry(channel_id).or_default().push(row);
    }

    let mut out_rows = Vec::new();
    for channel_id in channel_order {
        let mut rows = by_channel.remove(&channel_id).unwrap_or_default();
        rows.sort_by(|a, b| {
            numeric(b.get(view_col).unwrap_or_default())
                .partial_cmp(&numeric(a.get(view_col).unwrap_or_default()))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out_rows.extend(rows.into_iter().take(n));
    }

    write_records(output, &headers, &out_rows)?;
    Ok(out_rows.len())
}

// ============================================================================
// Tests
// ============================================================================
