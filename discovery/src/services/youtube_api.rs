use crate::config::{DiscoveryConfig, SearchParams};
use crate::error::{classify_upstream_error, DiscoveryError};
use crate::models::{
    ApiErrorEnvelope, ListResponse, Playlist, PlaylistEntry, SearchItem, VideoDetails,
};
use async_trait::async_trait;
use log::{error, info};
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Free-text search, used with a topical category as the term.
    Topic { term: String },
    RelatedTo { video_id: String },
}

/// The upstream calls the query service depends on.
#[async_trait]
pub trait VideoApi: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<ListResponse<SearchItem>, DiscoveryError>;

    /// Statistics and content details for a batch of video ids.
    async fn video_details(&self, ids: &[String]) -> Result<ListResponse<VideoDetails>, DiscoveryError>;

    async fn playlists(&self, playlist_id: &str) -> Result<ListResponse<Playlist>, DiscoveryError>;

    async fn playlist_items(&self, playlist_id: &str) -> Result<ListResponse<PlaylistEntry>, DiscoveryError>;
}

/// `VideoApi` backed by the YouTube Data API v3.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    client: Client,
    base_url: String,
    api_key: String,
    params: SearchParams,
}

impl YouTubeClient {
    pub fn new(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            DiscoveryError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            params: config.search.clone(),
        })
    }

    fn search_params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let p = &self.params;
        match query {
            SearchQuery::Topic { term } => vec![
                ("part", "snippet".to_string()),
                ("q", term.clone()),
                ("type", p.result_type.clone()),
                ("maxResults", p.max_results.to_string()),
                ("videoEmbeddable", p.embeddable.to_string()),
                ("videoDuration", p.duration.clone()),
                ("order", p.order.clone()),
                ("relevanceLanguage", p.relevance_language.clone()),
            ],
            SearchQuery::RelatedTo { video_id } => vec![
                ("part", "snippet".to_string()),
                ("relatedToVideoId", video_id.clone()),
                ("type", p.result_type.clone()),
                ("maxResults", p.related_max_results.to_string()),
            ],
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, DiscoveryError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, endpoint)).map_err(|e| {
            DiscoveryError::Configuration(format!("Invalid API base URL {}: {e}", self.base_url))
        })?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .append_pair("key", &self.api_key);

        // Never log the full URL, it carries the API key.
        info!("Requesting {}/{}", self.base_url, endpoint);

        let response = self.client.get(url).send().await.map_err(|e| {
            error!("Request to {endpoint} failed: {e}");
            DiscoveryError::from(e)
        })?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let envelope: ApiErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();
            let reasons: Vec<String> = envelope
                .error
                .errors
                .iter()
                .filter_map(|e| e.reason.clone())
                .collect();
            error!(
                "{endpoint} returned HTTP {}: {} (reasons: {})",
                status.as_u16(),
                envelope.error.message,
                reasons.join(", ")
            );
            return Err(classify_upstream_error(
                status.as_u16(),
                &reasons,
                &envelope.error.message,
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse {endpoint} response: {e}");
            DiscoveryError::from(e)
        })
    }
}

#[async_trait]
impl VideoApi for YouTubeClient {
    // Documentation: https://developers.google.com/youtube/v3/docs/search/list
    async fn search(&self, query: &SearchQuery) -> Result<ListResponse<SearchItem>, DiscoveryError> {
        let params = self.search_params(query);
        self.get_json("search", &params).await
    }

    // Documentation: https://developers.google.com/youtube/v3/docs/videos
    async fn video_details(&self, ids: &[String]) -> Result<ListResponse<VideoDetails>, DiscoveryError> {
        if ids.is_empty() {
            return Ok(ListResponse::default());
        }
        let params = [
            ("part", "statistics,contentDetails".to_string()),
            ("id", ids.join(",")),
        ];
        self.get_json("videos", &params).await
    }

    async fn playlists(&self, playlist_id: &str) -> Result<ListResponse<Playlist>, DiscoveryError> {
        let params = [
            ("part", "snippet,status".to_string()),
            ("id", playlist_id.to_string()),
        ];
        self.get_json("playlists", &params).await
    }

    // Documentation: https://developers.google.com/youtube/v3/docs/playlistItems
    async fn playlist_items(&self, playlist_id: &str) -> Result<ListResponse<PlaylistEntry>, DiscoveryError> {
        let params = [
            ("part", "snippet".to_string()),
            ("playlistId", playlist_id.to_string()),
            ("maxResults", self.params.playlist_max_results.to_string()),
        ];
        self.get_json("playlistItems", &params).await
    }
}
