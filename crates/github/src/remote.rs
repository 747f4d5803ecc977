use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use custodian_core::{Category, CriticalAdvisory, RateBudget, RemoteSource, SyncError};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::GitHubClient;
use crate::error::GitHubError;

pub const DEFAULT_DATA_REPOSITORY: &str = "hacs/default";
const CRITICAL_FILE: &str = "critical";
const ORG_PAGE_SIZE: usize = 100;

/// GitHub organisation whose repositories belong to a category
pub fn category_organization(category: Category) -> Option<&'static str> {
    match category {
        Category::Integration => Some("custom-components"),
        Category::Plugin => Some("custom-cards"),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct OrgRepository {
    full_name: String,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: RateLimitCore,
}

#[derive(Debug, Deserialize)]
struct RateLimitCore {
    remaining: u64,
    reset: i64,
}

/// Remote source backed by the lists published in a GitHub data repository
pub struct GitHubRemote {
    client: Arc<GitHubClient>,
    data_repository: String,
}

impl GitHubRemote {
    pub fn new(client: Arc<GitHubClient>, data_repository: impl Into<String>) -> Self {
        Self {
            client,
            data_repository: data_repository.into(),
        }
    }

    pub fn data_repository(&self) -> &str {
        &self.data_repository
    }

    fn contents_path(&self, file: &str) -> String {
        format!("repos/{}/contents/{}", self.data_repository, file)
    }

    async fn get_data_file<T: DeserializeOwned>(&self, file: &str) -> Result<T, GitHubError> {
        let raw = self.client.get_raw(&self.contents_path(file)).await?;
        serde_json::from_str(&raw)
            .map_err(|e| GitHubError::Decode(format!("{}/{}: {}", self.data_repository, file, e)))
    }
}

#[async_trait]
impl RemoteSource for GitHubRemote {
    async fn get_default_lists(&self, list: &str) -> Result<Vec<String>, SyncError> {
        let names: Vec<String> = self.get_data_file(list).await?;
        debug!("Fetched {} entries from {}/{}", names.len(), self.data_repository, list);
        Ok(names)
    }

    async fn get_org_repositories(&self, category: Category) -> Result<Vec<String>, SyncError> {
        let Some(org) = category_organization(category) else {
            return Ok(Vec::new());
        };

        let mut names = Vec::new();
        for page in 1.. {
            let path = format!("orgs/{}/repos?per_page={}&page={}", org, ORG_PAGE_SIZE, page);
            let repositories: Vec<OrgRepository> = self.client.get_json(&path).await?;
            let last_page = repositories.len() < ORG_PAGE_SIZE;
            names.extend(org_repository_names(repositories));
            if last_page {
                break;
            }
        }
        debug!("Fetched {} repositories from organisation {}", names.len(), org);
        Ok(names)
    }

    async fn get_critical_advisories(&self) -> Result<Vec<CriticalAdvisory>, SyncError> {
        Ok(self.get_data_file(CRITICAL_FILE).await?)
    }

    async fn rate_budget(&self) -> Result<RateBudget, SyncError> {
        let fetched = match self.client.get_json::<RateLimitResponse>("rate_limit").await {
            Ok(response) => budget_from_response(response),
            Err(e) => Err(e),
        };
        match fetched {
            Ok(budget) => Ok(budget),
            Err(e) => match self.client.last_budget().await {
                Some(budget) => {
                    debug!("Rate limit endpoint failed ({}), using last seen headers", e);
                    Ok(budget)
                }
                None => Err(e.into()),
            },
        }
    }
}

fn org_repository_names(repositories: Vec<OrgRepository>) -> impl Iterator<Item = String> {
    repositories
        .into_iter()
        .filter(|repository| !repository.archived)
        .map(|repository| repository.full_name)
}

fn budget_from_response(response: RateLimitResponse) -> Result<RateBudget, GitHubError> {
    let core = response.resources.core;
    let reset_at = DateTime::from_timestamp(core.reset, 0)
        .ok_or_else(|| GitHubError::Decode(format!("invalid reset timestamp {}", core.reset)))?;
    Ok(RateBudget {
        remaining: core.remaining,
        reset_at,
    })
}
