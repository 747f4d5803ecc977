use chrono::{DateTime, Utc};
use custodian_core::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GitHub responded with status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to decode GitHub response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Rate limit exhausted until {0}")]
    RateLimitExhausted(DateTime<Utc>),

    #[error("Invalid access token")]
    InvalidToken,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GitHubError>;

impl GitHubError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::NotFound(_))
    }
}

impl From<GitHubError> for SyncError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Io(e) => SyncError::Io(e),
            GitHubError::InvalidUrl(e) => SyncError::Configuration(format!("Invalid URL: {}", e)),
            GitHubError::InvalidToken => {
                SyncError::Configuration("Invalid GitHub access token".to_string())
            }
            other => SyncError::RemoteUnavailable(other.to_string()),
        }
    }
}
