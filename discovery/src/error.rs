//! Error taxonomy for discovery calls and the policy deciding whether a
//! caller sees them.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscoveryError {
    #[error("Invalid API key. Please check your API key configuration.")]
    InvalidCredential,

    #[error("YouTube API quota exceeded. Please try again later.")]
    QuotaExceeded,

    #[error("No videos found.")]
    NoResults,

    #[error("Playlist not found or is private. Please check the playlist ID and make sure it's public.")]
    PlaylistUnavailable,

    #[error("Playlist is {0}. Please make it public to view the videos.")]
    PlaylistNotPublic(String),

    /// Any other message reported by the upstream API, passed through as-is.
    #[error("{0}")]
    Upstream(String),

    /// Network or decoding failure without a structured upstream message.
    /// `detail` is kept for logs only.
    #[error("Failed to fetch videos. Please try again later.")]
    UnknownFailure { detail: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DiscoveryError {
    pub fn unknown(detail: impl ToString) -> Self {
        DiscoveryError::UnknownFailure {
            detail: detail.to_string(),
        }
    }
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(err: reqwest::Error) -> Self {
        DiscoveryError::unknown(err)
    }
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        DiscoveryError::unknown(err)
    }
}

/// Maps a failed upstream response onto an error kind.
///
/// The transport status is checked first, then the structured `reason`
/// codes. Matching on message text is a fallback only: the wording is not
/// part of the API contract and may change without notice.
pub fn classify_upstream_error(status: u16, reasons: &[String], message: &str) -> DiscoveryError {
    match status {
        401 => return DiscoveryError::InvalidCredential,
        429 => return DiscoveryError::QuotaExceeded,
        _ => {}
    }

    for reason in reasons {
        match reason.as_str() {
            "keyInvalid" | "keyExpired" => return DiscoveryError::InvalidCredential,
            "quotaExceeded" | "dailyLimitExceeded" | "rateLimitExceeded"
            | "userRateLimitExceeded" => return DiscoveryError::QuotaExceeded,
            "playlistNotFound" => return DiscoveryError::PlaylistUnavailable,
            _ => {}
        }
    }

    if message.contains("API key not valid") {
        DiscoveryError::InvalidCredential
    } else if message.contains("quota") {
        DiscoveryError::QuotaExceeded
    } else if message.contains("playlist") {
        DiscoveryError::PlaylistUnavailable
    } else if message.trim().is_empty() {
        DiscoveryError::unknown(format!("HTTP {status} without error message"))
    } else {
        DiscoveryError::Upstream(message.to_string())
    }
}

/// What an operation does with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Return the error to the caller.
    Propagate,
    /// Log it and resolve to an empty result. Used for supplementary content.
    EmptyOnError,
}

impl ErrorPolicy {
    /// Level at which a failure handled under this policy is logged.
    pub fn log_level(self) -> log::Level {
        match self {
            ErrorPolicy::Propagate => log::Level::Error,
            ErrorPolicy::EmptyOnError => log::Level::Warn,
        }
    }

    pub fn apply<T>(self, result: Result<Vec<T>, DiscoveryError>) -> Result<Vec<T>, DiscoveryError> {
        match (self, result) {
            (_, Ok(items)) => Ok(items),
            (ErrorPolicy::Propagate, Err(e)) => Err(e),
            (ErrorPolicy::EmptyOnError, Err(_)) => Ok(Vec::new()),
        }
    }
}
