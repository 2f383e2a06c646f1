use crate::error::DiscoveryError;
use env_logger::Builder;
use lazy_static::lazy_static;
use log::{info, LevelFilter};
use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

lazy_static! {
    /// Topics the discovery search draws from when no category is chosen.
    pub static ref DEFAULT_CATEGORIES: Vec<String> = [
        "Music",
        "Gaming",
        "News",
        "Sports",
        "Education",
        "Entertainment",
        "Technology",
        "Science",
        "Travel",
        "Food",
        "Fashion",
        "Art",
        "Comedy",
        "Fitness",
        "Business",
        "Politics",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
}

pub fn init_logger() {
    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
    info!("Starting video discovery...");
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

/// Fixed query parameters sent with every search call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub max_results: u32,
    pub related_max_results: u32,
    pub playlist_max_results: u32,
    pub result_type: String,
    pub embeddable: bool,
    pub duration: String,
    pub order: String,
    pub relevance_language: String,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_results: 50,
            related_max_results: 20,
            playlist_max_results: 50,
            result_type: "video".to_string(),
            embeddable: true,
            duration: "medium".to_string(),
            order: "rating".to_string(),
            relevance_language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub cache_ttl: Duration,
    pub categories: Vec<String>,
    pub request_timeout: Option<Duration>,
    pub search: SearchParams,
}

impl DiscoveryConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            categories: DEFAULT_CATEGORIES.clone(),
            request_timeout: None,
            search: SearchParams::default(),
        }
    }

    pub fn from_env() -> Result<Self, DiscoveryError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source. `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DiscoveryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("YOUTUBE_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DiscoveryError::Configuration("YOUTUBE_API_KEY must be set".to_string())
            })?;

        let mut config = Self::new(api_key.trim());

        if let Some(base_url) = lookup("YOUTUBE_API_BASE_URL").filter(|u| !u.is_empty()) {
            config.api_base_url = base_url.trim_end_matches('/').to_string();
        }

        if let Some(ttl) = lookup("CACHE_TTL_SECS") {
            let secs = ttl.trim().parse::<u64>().map_err(|_| {
                DiscoveryError::Configuration(format!("CACHE_TTL_SECS is not a number: {ttl}"))
            })?;
            config.cache_ttl = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup("DISCOVERY_CATEGORIES") {
            let categories: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect();
            if !categories.is_empty() {
                config.categories = categories;
            }
        }

        if let Some(timeout) = lookup("REQUEST_TIMEOUT_SECS") {
            let secs = timeout.trim().parse::<u64>().map_err(|_| {
                DiscoveryError::Configuration(format!(
                    "REQUEST_TIMEOUT_SECS is not a number: {timeout}"
                ))
            })?;
            config.request_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}
