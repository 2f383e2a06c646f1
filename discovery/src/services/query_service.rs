use crate::cache::{SystemClock, TtlCache};
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, ErrorPolicy};
use crate::models::{Snippet, VideoDetails, VideoSummary};
use crate::services::youtube_api::{SearchQuery, VideoApi, YouTubeClient};
use log::{info, log};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;

pub const RANDOM_VIDEOS_KEY: &str = "randomVideos";
pub const ALL_CATEGORIES: &str = "All";

/// Random discovery is the primary content of the page: failures surface.
pub const RANDOM_VIDEOS_POLICY: ErrorPolicy = ErrorPolicy::Propagate;
/// Related videos are supplementary: failures resolve to an empty list.
pub const RELATED_VIDEOS_POLICY: ErrorPolicy = ErrorPolicy::EmptyOnError;
pub const CATEGORY_VIDEOS_POLICY: ErrorPolicy = ErrorPolicy::Propagate;
pub const PLAYLIST_VIDEOS_POLICY: ErrorPolicy = ErrorPolicy::Propagate;

pub fn related_videos_key(video_id: &str) -> String {
    format!("relatedVideos-{video_id}")
}

pub fn category_videos_key(category: &str) -> String {
    format!("categoryVideos-{category}")
}

pub fn playlist_videos_key(playlist_id: &str) -> String {
    format!("playlistVideos-{playlist_id}")
}

/// A search hit waiting to be joined with its statistics.
type Hit = (String, Snippet);

pub struct VideoQueryService {
    api: Arc<dyn VideoApi>,
    cache: TtlCache<Vec<VideoSummary>>,
    categories: Vec<String>,
}

impl VideoQueryService {
    pub fn new(
        api: Arc<dyn VideoApi>,
        cache: TtlCache<Vec<VideoSummary>>,
        categories: Vec<String>,
    ) -> Self {
        Self {
            api,
            cache,
            categories,
        }
    }

    /// Wires the real YouTube client and the wall clock.
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let api = Arc::new(YouTubeClient::new(config)?);
        let cache = TtlCache::new(config.cache_ttl, Arc::new(SystemClock));
        Ok(Self::new(api, cache, config.categories.clone()))
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Videos from one randomly chosen category, best rated first.
    pub async fn get_random_videos(&self) -> Result<Vec<VideoSummary>, DiscoveryError> {
        if let Some(videos) = self.cache.get(RANDOM_VIDEOS_KEY) {
            return Ok(videos);
        }

        let result = match self.pick_category() {
            Ok(category) => {
                info!("Fetching random videos for category: {category}");
                let query = SearchQuery::Topic {
                    term: category.clone(),
                };
                self.discover(&query, Some(category.as_str())).await
            }
            Err(e) => Err(e),
        };

        self.finish(RANDOM_VIDEOS_KEY, result, RANDOM_VIDEOS_POLICY)
    }

    /// Videos related to `video_id`. Never fails; any error yields an empty list.
    pub async fn get_related_videos(&self, video_id: &str) -> Vec<VideoSummary> {
        let key = related_videos_key(video_id);
        if let Some(videos) = self.cache.get(&key) {
            return videos;
        }

        info!("Fetching related videos for: {video_id}");
        let result = self
            .discover(
                &SearchQuery::RelatedTo {
                    video_id: video_id.to_string(),
                },
                None,
            )
            .await;

        self.finish(&key, result, RELATED_VIDEOS_POLICY)
            .unwrap_or_default()
    }

    /// Videos for a category chosen in the UI. "All" means random discovery.
    pub async fn get_category_videos(&self, category: &str) -> Result<Vec<VideoSummary>, DiscoveryError> {
        let category = category.trim();
        if category.is_empty() || category.eq_ignore_ascii_case(ALL_CATEGORIES) {
            return self.get_random_videos().await;
        }

        let key = category_videos_key(category);
        if let Some(videos) = self.cache.get(&key) {
            return Ok(videos);
        }

        info!("Fetching videos for category: {category}");
        let result = self
            .discover(
                &SearchQuery::Topic {
                    term: category.to_string(),
                },
                Some(category),
            )
            .await;

        self.finish(&key, result, CATEGORY_VIDEOS_POLICY)
    }

    /// Videos of a public playlist, in playlist order.
    pub async fn get_playlist_videos(&self, playlist_id: &str) -> Result<Vec<VideoSummary>, DiscoveryError> {
        let key = playlist_videos_key(playlist_id);
        if let Some(videos) = self.cache.get(&key) {
            return Ok(videos);
        }

        info!("Fetching playlist videos for: {playlist_id}");
        let result = self.fetch_playlist(playlist_id).await;
        self.finish(&key, result, PLAYLIST_VIDEOS_POLICY)
    }

    fn pick_category(&self) -> Result<String, DiscoveryError> {
        self.categories
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| DiscoveryError::Configuration("No discovery categories configured".to_string()))
    }

    async fn discover(
        &self,
        query: &SearchQuery,
        category: Option<&str>,
    ) -> Result<Vec<VideoSummary>, DiscoveryError> {
        let search = self.api.search(query).await?;

        let hits: Vec<Hit> = search
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id.map(|id| (id, item.snippet)))
            .collect();

        if hits.is_empty() {
            return Err(DiscoveryError::NoResults);
        }

        self.enrich(hits, category).await
    }

    async fn fetch_playlist(&self, playlist_id: &str) -> Result<Vec<VideoSummary>, DiscoveryError> {
        let playlist = self
            .api
            .playlists(playlist_id)
            .await?
            .items
            .into_iter()
            .next()
            .ok_or(DiscoveryError::PlaylistUnavailable)?;

        let privacy = playlist
            .status
            .and_then(|s| s.privacy_status)
            .unwrap_or_else(|| "unknown".to_string());
        if privacy != "public" {
            return Err(DiscoveryError::PlaylistNotPublic(privacy));
        }

        let hits: Vec<Hit> = self
            .api
            .playlist_items(playlist_id)
            .await?
            .items
            .into_iter()
            .filter_map(|entry| {
                let id = entry.snippet.resource_id.as_ref()?.video_id.clone()?;
                Some((id, entry.snippet))
            })
            .collect();

        if hits.is_empty() {
            return Err(DiscoveryError::NoResults);
        }

        self.enrich(hits, None).await
    }

    /// Second round trip: statistics and durations for every hit, joined by id.
    async fn enrich(
        &self,
        hits: Vec<Hit>,
        category: Option<&str>,
    ) -> Result<Vec<VideoSummary>, DiscoveryError> {
        let ids: Vec<String> = hits.iter().map(|(id, _)| id.clone()).collect();
        let details = self.api.video_details(&ids).await?;

        let by_id: HashMap<String, VideoDetails> = details
            .items
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();

        Ok(hits
            .into_iter()
            .map(|(id, snippet)| {
                let details = by_id.get(&id);
                build_summary(id, snippet, details, category)
            })
            .collect())
    }

    fn finish(
        &self,
        key: &str,
        result: Result<Vec<VideoSummary>, DiscoveryError>,
        policy: ErrorPolicy,
    ) -> Result<Vec<VideoSummary>, DiscoveryError> {
        match &result {
            Ok(videos) => {
                info!("Caching {} videos under '{key}'", videos.len());
                self.cache.insert(key, videos.clone());
            }
            Err(e) => log!(policy.log_level(), "Fetching '{key}' failed: {e:?}"),
        }
        policy.apply(result)
    }
}

fn build_summary(
    id: String,
    snippet: Snippet,
    details: Option<&VideoDetails>,
    category: Option<&str>,
) -> VideoSummary {
    let statistics = details.and_then(|d| d.statistics.as_ref());

    VideoSummary {
        thumbnail_url: snippet.thumbnails.best_url(),
        channel_thumbnail: snippet.thumbnails.small_url(),
        id,
        title: snippet.title,
        description: snippet.description,
        channel_title: snippet.channel_title,
        view_count: statistics
            .and_then(|s| s.view_count.clone())
            .unwrap_or_else(|| "0".to_string()),
        published_at: snippet.published_at,
        duration: details
            .and_then(|d| d.content_details.as_ref())
            .and_then(|c| c.duration.clone()),
        like_count: statistics.and_then(|s| s.like_count.clone()),
        subscriber_count: None,
        category: category.map(String::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::classify_upstream_error;
    use crate::models::{
        ContentDetails, ListResponse, Playlist, PlaylistEntry, PlaylistStatus, ResourceId,
        SearchItem, SearchItemId, Statistics, Thumbnail, Thumbnails,
    };
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(300);

    #[derive(Default)]
    struct FakeApi {
        search_items: Vec<SearchItem>,
        search_error: Option<DiscoveryError>,
        details: Vec<VideoDetails>,
        details_error: Option<DiscoveryError>,
        playlists: Vec<Playlist>,
        playlist_entries: Vec<PlaylistEntry>,
        search_calls: AtomicUsize,
        details_calls: AtomicUsize,
        queries: Mutex<Vec<SearchQuery>>,
        detail_requests: Mutex<Vec<Vec<String>>>,
    }

    impl FakeApi {
        fn search_count(&self) -> usize {
            self.search_calls.load(Ordering::SeqCst)
        }

        fn last_query(&self) -> Option<SearchQuery> {
            self.queries.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl VideoApi for FakeApi {
        async fn search(&self, query: &SearchQuery) -> Result<ListResponse<SearchItem>, DiscoveryError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.clone());
            match &self.search_error {
                Some(e) => Err(e.clone()),
                None => Ok(ListResponse {
                    items: self.search_items.clone(),
                }),
            }
        }

        async fn video_details(&self, ids: &[String]) -> Result<ListResponse<VideoDetails>, DiscoveryError> {
            self.details_calls.fetch_add(1, Ordering::SeqCst);
            self.detail_requests.lock().unwrap().push(ids.to_vec());
            match &self.details_error {
                Some(e) => Err(e.clone()),
                None => Ok(ListResponse {
                    items: self.details.clone(),
                }),
            }
        }

        async fn playlists(&self, _playlist_id: &str) -> Result<ListResponse<Playlist>, DiscoveryError> {
            Ok(ListResponse {
                items: self.playlists.clone(),
            })
        }

        async fn playlist_items(&self, _playlist_id: &str) -> Result<ListResponse<PlaylistEntry>, DiscoveryError> {
            Ok(ListResponse {
                items: self.playlist_entries.clone(),
            })
        }
    }

    fn snippet(title: &str) -> Snippet {
        Snippet {
            title: title.to_string(),
            description: format!("About {title}"),
            channel_title: "Channel".to_string(),
            published_at: "2024-04-01T10:00:00Z".to_string(),
            thumbnails: Thumbnails {
                default: Some(Thumbnail {
                    url: format!("https://i.ytimg.com/{title}/default.jpg"),
                }),
                medium: None,
                high: Some(Thumbnail {
                    url: format!("https://i.ytimg.com/{title}/hq.jpg"),
                }),
            },
            resource_id: None,
        }
    }

    fn search_item(id: &str) -> SearchItem {
        SearchItem {
            id: SearchItemId {
                video_id: Some(id.to_string()),
            },
            snippet: snippet(id),
        }
    }

    fn details(id: &str, views: &str, likes: Option<&str>, duration: &str) -> VideoDetails {
        VideoDetails {
            id: id.to_string(),
            statistics: Some(Statistics {
                view_count: Some(views.to_string()),
                like_count: likes.map(String::from),
            }),
            content_details: Some(ContentDetails {
                duration: Some(duration.to_string()),
            }),
        }
    }

    fn populated_api() -> FakeApi {
        FakeApi {
            search_items: vec![search_item("a1"), search_item("b2")],
            details: vec![
                details("b2", "2500", None, "PT5M9S"),
                details("a1", "1500000", Some("42"), "PT1H2M3S"),
            ],
            ..Default::default()
        }
    }

    fn service_with(api: Arc<FakeApi>, categories: &[&str]) -> (VideoQueryService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let cache = TtlCache::new(TTL, clock.clone());
        let categories = categories.iter().map(|c| c.to_string()).collect();
        (VideoQueryService::new(api, cache, categories), clock)
    }

    #[test]
    fn policies_are_explicit() {
        assert_eq!(RANDOM_VIDEOS_POLICY, ErrorPolicy::Propagate);
        assert_eq!(RELATED_VIDEOS_POLICY, ErrorPolicy::EmptyOnError);
        assert_eq!(CATEGORY_VIDEOS_POLICY, ErrorPolicy::Propagate);
        assert_eq!(PLAYLIST_VIDEOS_POLICY, ErrorPolicy::Propagate);
    }

    #[tokio::test]
    async fn random_videos_are_cached_within_ttl() {
        let api = Arc::new(populated_api());
        let (service, clock) = service_with(api.clone(), &["Music"]);

        let first = service.get_random_videos().await.unwrap();
        clock.advance(TTL - Duration::from_secs(1));
        let second = service.get_random_videos().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(api.search_count(), 1);
        assert_eq!(api.details_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn random_videos_refetch_after_ttl() {
        let api = Arc::new(populated_api());
        let (service, clock) = service_with(api.clone(), &["Music"]);

        service.get_random_videos().await.unwrap();
        clock.advance(TTL);
        service.get_random_videos().await.unwrap();
        service.get_random_videos().await.unwrap();

        assert_eq!(api.search_count(), 2);
    }

    #[tokio::test]
    async fn random_videos_search_the_chosen_category() {
        let api = Arc::new(populated_api());
        let (service, _clock) = service_with(api.clone(), &["Science"]);

        let videos = service.get_random_videos().await.unwrap();

        assert_eq!(
            api.last_query(),
            Some(SearchQuery::Topic {
                term: "Science".to_string()
            })
        );
        assert!(videos
            .iter()
            .all(|v| v.category.as_deref() == Some("Science")));
    }

    #[tokio::test]
    async fn random_videos_keep_search_order_and_join_statistics() {
        let api = Arc::new(populated_api());
        let (service, _clock) = service_with(api.clone(), &["Music"]);

        let videos = service.get_random_videos().await.unwrap();

        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b2"]);
        assert_eq!(
            *api.detail_requests.lock().unwrap(),
            vec![vec!["a1".to_string(), "b2".to_string()]]
        );

        let first = &videos[0];
        assert_eq!(first.view_count, "1500000");
        assert_eq!(first.like_count.as_deref(), Some("42"));
        assert_eq!(first.duration.as_deref(), Some("PT1H2M3S"));
        assert_eq!(first.thumbnail_url, "https://i.ytimg.com/a1/hq.jpg");
        assert_eq!(first.channel_thumbnail, "https://i.ytimg.com/a1/default.jpg");
        assert_eq!(first.subscriber_count, None);
        assert_eq!(videos[1].like_count, None);
    }

    #[tokio::test]
    async fn missing_statistics_default_instead_of_dropping() {
        let api = Arc::new(FakeApi {
            search_items: vec![search_item("a1"), search_item("zz")],
            details: vec![details("a1", "10", Some("1"), "PT45S")],
            ..Default::default()
        });
        let (service, _clock) = service_with(api, &["Music"]);

        let videos = service.get_random_videos().await.unwrap();

        assert_eq!(videos.len(), 2);
        let orphan = &videos[1];
        assert_eq!(orphan.id, "zz");
        assert_eq!(orphan.view_count, "0");
        assert_eq!(orphan.like_count, None);
        assert_eq!(orphan.subscriber_count, None);
        assert_eq!(orphan.duration, None);
    }

    #[tokio::test]
    async fn empty_search_fails_with_no_results_and_is_not_cached() {
        let api = Arc::new(FakeApi::default());
        let (service, _clock) = service_with(api.clone(), &["Music"]);

        assert_eq!(
            service.get_random_videos().await,
            Err(DiscoveryError::NoResults)
        );
        assert_eq!(
            service.get_random_videos().await,
            Err(DiscoveryError::NoResults)
        );
        assert_eq!(api.search_count(), 2);
        assert_eq!(api.details_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn quota_message_surfaces_as_quota_exceeded() {
        let api = Arc::new(FakeApi {
            search_error: Some(classify_upstream_error(
                403,
                &[],
                "The request cannot be completed because you have exceeded your quota.",
            )),
            ..Default::default()
        });
        let (service, _clock) = service_with(api, &["Music"]);

        assert_eq!(
            service.get_random_videos().await,
            Err(DiscoveryError::QuotaExceeded)
        );
    }

    #[tokio::test]
    async fn statistics_failure_propagates_for_random_videos() {
        let api = Arc::new(FakeApi {
            search_items: vec![search_item("a1")],
            details_error: Some(DiscoveryError::unknown("connection reset")),
            ..Default::default()
        });
        let (service, _clock) = service_with(api, &["Music"]);

        let err = service.get_random_videos().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::UnknownFailure { .. }));
    }

    #[tokio::test]
    async fn no_categories_is_a_configuration_error() {
        let api = Arc::new(populated_api());
        let (service, _clock) = service_with(api.clone(), &[]);

        let err = service.get_random_videos().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::Configuration(_)));
        assert_eq!(api.search_count(), 0);
    }

    #[tokio::test]
    async fn related_videos_query_by_video_and_cache_per_id() {
        let api = Arc::new(populated_api());
        let (service, _clock) = service_with(api.clone(), &["Music"]);

        let related = service.get_related_videos("xyz").await;
        assert_eq!(related.len(), 2);
        assert_eq!(
            api.last_query(),
            Some(SearchQuery::RelatedTo {
                video_id: "xyz".to_string()
            })
        );
        assert!(related.iter().all(|v| v.category.is_none()));

        service.get_related_videos("xyz").await;
        assert_eq!(api.search_count(), 1);

        service.get_related_videos("other").await;
        assert_eq!(api.search_count(), 2);
    }

    #[tokio::test]
    async fn related_videos_swallow_every_failure() {
        let failures = vec![
            DiscoveryError::InvalidCredential,
            DiscoveryError::QuotaExceeded,
            DiscoveryError::Upstream("Backend Error".to_string()),
            DiscoveryError::unknown("timed out"),
        ];

        for failure in failures {
            let api = Arc::new(FakeApi {
                search_error: Some(failure),
                ..Default::default()
            });
            let (service, _clock) = service_with(api, &["Music"]);
            assert!(service.get_related_videos("xyz").await.is_empty());
        }

        let empty = Arc::new(FakeApi::default());
        let (service, _clock) = service_with(empty, &["Music"]);
        assert!(service.get_related_videos("xyz").await.is_empty());

        let broken_details = Arc::new(FakeApi {
            search_items: vec![search_item("a1")],
            details_error: Some(DiscoveryError::QuotaExceeded),
            ..Default::default()
        });
        let (service, _clock) = service_with(broken_details, &["Music"]);
        assert!(service.get_related_videos("xyz").await.is_empty());
    }

    #[tokio::test]
    async fn all_category_shares_the_random_cache() {
        let api = Arc::new(populated_api());
        let (service, _clock) = service_with(api.clone(), &["Music"]);

        let from_filter = service.get_category_videos("all").await.unwrap();
        let random = service.get_random_videos().await.unwrap();

        assert_eq!(from_filter, random);
        assert_eq!(api.search_count(), 1);
    }

    #[tokio::test]
    async fn named_category_searches_that_topic() {
        let api = Arc::new(populated_api());
        let (service, _clock) = service_with(api.clone(), &["Music"]);

        let videos = service.get_category_videos("Travel").await.unwrap();

        assert_eq!(
            api.last_query(),
            Some(SearchQuery::Topic {
                term: "Travel".to_string()
            })
        );
        assert_eq!(videos[0].category.as_deref(), Some("Travel"));

        service.get_category_videos("Travel").await.unwrap();
        assert_eq!(api.search_count(), 1);
    }

    fn playlist(privacy: &str) -> Playlist {
        Playlist {
            status: Some(PlaylistStatus {
                privacy_status: Some(privacy.to_string()),
            }),
        }
    }

    fn playlist_entry(video_id: &str) -> PlaylistEntry {
        let mut snippet = snippet(video_id);
        snippet.resource_id = Some(ResourceId {
            video_id: Some(video_id.to_string()),
        });
        PlaylistEntry { snippet }
    }

    #[tokio::test]
    async fn playlist_videos_are_enriched() {
        let api = Arc::new(FakeApi {
            playlists: vec![playlist("public")],
            playlist_entries: vec![playlist_entry("b2"), playlist_entry("a1")],
            details: vec![details("a1", "7", None, "PT1M")],
            ..Default::default()
        });
        let (service, _clock) = service_with(api.clone(), &["Music"]);

        let videos = service.get_playlist_videos("PL1").await.unwrap();

        let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["b2", "a1"]);
        assert_eq!(videos[0].view_count, "0");
        assert_eq!(videos[1].view_count, "7");
        assert_eq!(api.search_count(), 0);
    }

    #[tokio::test]
    async fn private_playlist_is_rejected() {
        let api = Arc::new(FakeApi {
            playlists: vec![playlist("private")],
            playlist_entries: vec![playlist_entry("a1")],
            ..Default::default()
        });
        let (service, _clock) = service_with(api, &["Music"]);

        let err = service.get_playlist_videos("PL1").await.unwrap_err();
        assert_eq!(err, DiscoveryError::PlaylistNotPublic("private".to_string()));
        assert_eq!(
            err.to_string(),
            "Playlist is private. Please make it public to view the videos."
        );
    }

    #[tokio::test]
    async fn missing_or_empty_playlist_fails() {
        let api = Arc::new(FakeApi::default());
        let (service, _clock) = service_with(api, &["Music"]);
        assert_eq!(
            service.get_playlist_videos("PL404").await,
            Err(DiscoveryError::PlaylistUnavailable)
        );

        let empty = Arc::new(FakeApi {
            playlists: vec![playlist("public")],
            ..Default::default()
        });
        let (service, _clock) = service_with(empty, &["Music"]);
        assert_eq!(
            service.get_playlist_videos("PL1").await,
            Err(DiscoveryError::NoResults)
        );
    }
}
