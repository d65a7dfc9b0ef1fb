//! YouTube Data API client.
//!
//! Thin sequential wrapper over the three endpoints the collector needs:
//! channel statistics, the paginated uploads listing, and per-video
//! details. Error payloads with code 403 mentioning quota become
//! [`YoutubeError::QuotaExceeded`], which aborts the whole run so the
//! operator can rotate to the next credential.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::info;

use crate::{Result, YoutubeError};

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// The three calls the collector needs from the video platform.
#[async_trait]
pub trait YoutubeApi: Send + Sync {
    /// Channel-level aggregate statistics and metadata.
    async fn channel_statistics(&self, channel_id: &str) -> Result<Value>;

    /// All video ids uploaded by a channel, newest first. A channel
    /// without uploads yields an empty list.
    async fn channel_video_ids(&self, channel_id: &str, page_size: usize) -> Result<Vec<String>>;

    /// Full metadata payload for a single video.
    async fn video_details(&self, video_id: &str) -> Result<Value>;
}

/// Parts requested for channel statistics.
const CHANNEL_PARTS: &str = "snippet,brandingSettings,contentDetails,statistics,topicDetails,status";

/// Parts requested for video details.
const VIDEO_PARTS: &str = "contentDetails,id,liveStreamingDetails,localizations,player,\
recordingDetails,snippet,statistics,status,topicDetails";

/// One credential's view of the YouTube Data API.
pub struct YoutubeClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl YoutubeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at a different endpoint root.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{endpoint}", self.base_url);
        let mut query: Vec<(&str, &str)> = params.to_vec();
        query.push(("key", self.api_key.as_str()));

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| YoutubeError::Http(format!("{endpoint} request failed: {e}")))?;

        response
            .json()
            .await
            .map_err(|e| YoutubeError::Http(format!("{endpoint} returned invalid JSON: {e}")))
    }
}

#[async_trait]
impl YoutubeApi for YoutubeClient {
    async fn channel_statistics(&self, channel_id: &str) -> Result<Value> {
        let data = self
            .get(
                "channels",
                &[("part", CHANNEL_PARTS), ("id", channel_id)],
            )
            .await?;
        check_api_error(&data)?;
        Ok(data)
    }

    /// Follows `nextPageToken` until the uploads listing is exhausted.
    async fn channel_video_ids(
        &self,
        channel_id: &str,
        page_size: usize,
    ) -> Result<Vec<String>> {
        let page_size = page_size.to_string();
        let mut video_ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("part", "snippet,id"),
                ("channelId", channel_id),
                ("order", "date"),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.as_str()));
            }

            let data = self.get("search", &params).await?;
            check_api_error(&data)?;

            match data.get("items").and_then(Value::as_array) {
                Some(items) => {
                    for item in items {
                        let kind = item
                            .pointer("/id/kind")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        if kind == "youtube#video" {
                            if let Some(id) =
                                item.pointer("/id/videoId").and_then(Value::as_str)
                            {
                                video_ids.push(id.to_string());
                            }
                        }
                    }
                }
                None => {
                    info!(channel_id, "no videos found for channel");
                    return Ok(Vec::new());
                }
            }

            match data.get("nextPageToken").and_then(Value::as_str) {
                Some(token) => page_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(video_ids)
    }

    async fn video_details(&self, video_id: &str) -> Result<Value> {
        let data = self
            .get("videos", &[("part", VIDEO_PARTS), ("id", video_id)])
            .await?;
        check_api_error(&data)?;
        Ok(data)
    }
}

/// Turn an API error payload into the matching error kind.
fn check_api_error(data: &Value) -> Result<()> {
    let Some(error) = data.get("error") else {
        return Ok(());
    };

    let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if code == 403 && message.to_lowercase().contains("quota") {
        return Err(YoutubeError::QuotaExceeded);
    }

    Err(YoutubeError::Api { code, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn quota_error_is_detected() {
        let data = json!({
            "error": {"code": 403, "message": "The request cannot be completed because you have exceeded your quota."}
        });
        assert!(matches!(
            check_api_error(&data),
            Err(YoutubeError::QuotaExceeded)
        ));
    }

    #[test]
    fn non_quota_403_is_a_plain_api_error() {
        let data = json!({"error": {"code": 403, "message": "forbidden"}});
        assert!(matches!(
            check_api_error(&data),
            Err(YoutubeError::Api { code: 403, .. })
        ));
    }

    #[test]
    fn payload_without_error_passes() {
        let data = json!({"items": []});
        assert!(check_api_error(&data).is_ok());
    }
}
