//! Video discovery against the YouTube Data API: random category browsing,
//! related videos and playlists, shaped into `VideoSummary` records and kept
//! in a short-lived in-process cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use config::DiscoveryConfig;
pub use error::{DiscoveryError, ErrorPolicy};
pub use models::VideoSummary;
pub use services::{SearchQuery, VideoApi, VideoQueryService, YouTubeClient};
pub use utils::{format_duration, format_view_count};
