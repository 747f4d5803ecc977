//! GitHub API client
//!
//! Centralizes GitHub API requests with consistent headers, status handling
//! and rate limit bookkeeping.

use std::time::Duration;

use chrono::{DateTime, Utc};
use custodian_core::RateBudget;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::error::{GitHubError, Result};

pub const USER_AGENT: &str = "custodian/0.1.0";
pub const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";
pub const RAW_ACCEPT_HEADER: &str = "application/vnd.github.raw+json";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin wrapper over [`reqwest::Client`] bound to one API root
#[derive(Debug)]
pub struct GitHubClient {
    http: Client,
    base: Url,
    last_budget: RwLock<Option<RateBudget>>,
}

impl GitHubClient {
    /// Create a client, authenticated when a token is given
    pub fn new(api_url: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("token {}", token))
                .map_err(|_| GitHubError::InvalidToken)?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base: normalize_base(api_url)?,
            last_budget: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Rate budget reported by the most recent response, if any
    pub async fn last_budget(&self) -> Option<RateBudget> {
        *self.last_budget.read().await
    }

    pub(crate) async fn record_budget(&self, budget: RateBudget) {
        *self.last_budget.write().await = Some(budget);
    }

    /// GET a JSON document relative to the API root
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.get(path, ACCEPT_HEADER).await?;
        response
            .json()
            .await
            .map_err(|e| GitHubError::Decode(format!("{}: {}", path, e)))
    }

    /// GET the raw content of a file through the contents API
    pub async fn get_raw(&self, path: &str) -> Result<String> {
        let response = self.get(path, RAW_ACCEPT_HEADER).await?;
        Ok(response.text().await?)
    }

    async fn get(&self, path: &str, accept: &str) -> Result<Response> {
        let url = self.base.join(path)?;
        debug!("GitHub request: {}", url);

        let response = self.http.get(url.clone()).header(ACCEPT, accept).send().await?;

        let budget = parse_rate_headers(response.headers());
        if let Some(budget) = budget {
            self.record_budget(budget).await;
        }

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(GitHubError::NotFound(url.to_string())),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
                if budget.is_some_and(|budget| budget.is_exhausted()) =>
            {
                let reset_at = budget.map(|budget| budget.reset_at).unwrap_or_else(Utc::now);
                warn!("GitHub rate limit exhausted until {}", reset_at);
                Err(GitHubError::RateLimitExhausted(reset_at))
            }
            status => Err(GitHubError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}

/// Make sure the API root ends with a slash so relative joins append to it
fn normalize_base(api_url: &str) -> Result<Url> {
    let mut base = Url::parse(api_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

/// Read `x-ratelimit-remaining` and `x-ratelimit-reset` from a response
pub fn parse_rate_headers(headers: &HeaderMap) -> Option<RateBudget> {
    let header = |name: &str| -> Option<i64> { headers.get(name)?.to_str().ok()?.parse().ok() };

    let remaining = header("x-ratelimit-remaining")?;
    let reset = header("x-ratelimit-reset")?;
    Some(RateBudget {
        remaining: u64::try_from(remaining).unwrap_or(0),
        reset_at: DateTime::from_timestamp(reset, 0)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate_headers() {
        let mut headers = HeaderMap::new();
        assert!(parse_rate_headers(&headers).is_none());

        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));
        let budget = parse_rate_headers(&headers).unwrap();
        assert_eq!(budget.remaining, 42);
        assert_eq!(budget.reset_at.timestamp(), 1_700_000_000);
        assert!(!budget.is_exhausted());

        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        assert!(parse_rate_headers(&headers).unwrap().is_exhausted());

        headers.insert("x-ratelimit-reset", HeaderValue::from_static("soon"));
        assert!(parse_rate_headers(&headers).is_none());
    }

    #[test]
    fn test_base_url_joins() {
        let client = GitHubClient::new("https://ghe.example.com/api/v3", None).unwrap();
        assert_eq!(
            client.base_url().join("rate_limit").unwrap().as_str(),
            "https://ghe.example.com/api/v3/rate_limit"
        );

        let client = GitHubClient::new(DEFAULT_API_URL, Some("abc123")).unwrap();
        assert_eq!(
            client.base_url().join("repos/hacs/default").unwrap().as_str(),
            "https://api.github.com/repos/hacs/default"
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            GitHubClient::new("not a url", None),
            Err(GitHubError::InvalidUrl(_))
        ));
        assert!(matches!(
            GitHubClient::new(DEFAULT_API_URL, Some("bad\ntoken")),
            Err(GitHubError::InvalidToken)
        ));
    }
}
