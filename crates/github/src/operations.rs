use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use custodian_core::models::validate_full_name;
use custodian_core::{Category, RepositoryEntry, RepositoryOperations, RepositoryState, SyncError};
use serde::Deserialize;
use tracing::{debug, info};

use crate::api::GitHubClient;
use crate::error::GitHubError;

/// Repository metadata from `GET /repos/{owner}/{repo}`
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryInfo {
    pub id: u64,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
    pub default_branch: String,
}

impl RepositoryInfo {
    fn apply(&self, state: &mut RepositoryState) {
        state.id = Some(self.id.to_string());
        state.description = self.description.clone();
        state.stars = self.stargazers_count;
        state.last_updated = self.pushed_at;
        state.archived = self.archived;
    }
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
}

/// Repository operations against the GitHub API and the local install tree
pub struct GitHubOperations {
    client: Arc<GitHubClient>,
    install_root: PathBuf,
}

impl GitHubOperations {
    pub fn new(client: Arc<GitHubClient>, install_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            install_root: install_root.into(),
        }
    }

    async fn fetch_info(&self, full_name: &str) -> Result<RepositoryInfo, GitHubError> {
        self.client.get_json(&format!("repos/{}", full_name)).await
    }

    async fn latest_release(&self, full_name: &str) -> Result<Option<String>, GitHubError> {
        match self
            .client
            .get_json::<Release>(&format!("repos/{}/releases/latest", full_name))
            .await
        {
            Ok(release) => Ok(Some(release.tag_name)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Where a repository lives when it has no recorded local path
    pub fn default_path(&self, repository: &RepositoryEntry) -> PathBuf {
        self.install_root
            .join(repository.category().install_subdir())
            .join(repository.short_name())
    }
}

#[async_trait]
impl RepositoryOperations for GitHubOperations {
    async fn update(&self, repository: &RepositoryEntry) -> Result<(), SyncError> {
        let full_name = repository.full_name();
        let info = self
            .fetch_info(full_name)
            .await
            .map_err(|e| SyncError::operation_failed(full_name, e))?;
        let release = self
            .latest_release(full_name)
            .await
            .map_err(|e| SyncError::operation_failed(full_name, e))?;

        let mut state = repository.state_mut().await;
        info.apply(&mut state);
        match release {
            Some(tag) => state.available_version = Some(tag),
            None => debug!("{} has no releases", full_name),
        }
        if state.pending_update() {
            info!(
                "Update available for {}: {} -> {}",
                full_name,
                state.installed_version.as_deref().unwrap_or("unknown"),
                state.available_version.as_deref().unwrap_or("unknown")
            );
        }
        Ok(())
    }

    async fn refresh_common(&self, repository: &RepositoryEntry) -> Result<(), SyncError> {
        let info = self
            .fetch_info(repository.full_name())
            .await
            .map_err(|e| SyncError::operation_failed(repository.full_name(), e))?;
        info.apply(&mut *repository.state_mut().await);
        Ok(())
    }

    async fn register(
        &self,
        full_name: &str,
        category: Category,
    ) -> Result<RepositoryEntry, SyncError> {
        validate_full_name(full_name)?;
        let info = self
            .fetch_info(full_name)
            .await
            .map_err(|e| SyncError::operation_failed(full_name, e))?;

        let mut state = RepositoryState::default();
        info.apply(&mut state);
        debug!("Validated {} ({})", full_name, info.default_branch);
        RepositoryEntry::with_state(full_name, category, state)
    }

    async fn uninstall(&self, repository: &RepositoryEntry) -> Result<(), SyncError> {
        let path = repository
            .state()
            .await
            .local_path
            .clone()
            .unwrap_or_else(|| self.default_path(repository));

        remove_path(&path).await?;

        let mut state = repository.state_mut().await;
        state.installed = false;
        state.installed_version = None;
        state.local_path = None;
        info!("Uninstalled {}", repository.full_name());
        Ok(())
    }
}

async fn remove_path(path: &Path) -> std::io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Nothing to remove at {}", path.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DEFAULT_API_URL;
    use tempfile::TempDir;

    fn operations(root: &Path) -> GitHubOperations {
        let client = Arc::new(GitHubClient::new(DEFAULT_API_URL, None).unwrap());
        GitHubOperations::new(client, root)
    }

    fn installed(full_name: &str, category: Category, local_path: Option<PathBuf>) -> RepositoryEntry {
        RepositoryEntry::with_state(
            full_name,
            category,
            RepositoryState {
                installed: true,
                installed_version: Some("1.0.0".to_string()),
                local_path,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_repository_info_parsing() {
        let info: RepositoryInfo = serde_json::from_str(
            r#"{
                "id": 1296269,
                "full_name": "alice/theme-x",
                "description": null,
                "stargazers_count": 80,
                "pushed_at": "2011-01-26T19:06:43Z",
                "archived": false,
                "default_branch": "main"
            }"#,
        )
        .unwrap();

        let mut state = RepositoryState::default();
        info.apply(&mut state);
        assert_eq!(state.id.as_deref(), Some("1296269"));
        assert_eq!(state.stars, 80);
        assert!(state.last_updated.is_some());
        assert!(state.description.is_none());
    }

    #[test]
    fn test_default_path() {
        let temp_dir = TempDir::new().unwrap();
        let operations = operations(temp_dir.path());
        let entry = installed("alice/theme-x", Category::Theme, None);
        assert_eq!(
            operations.default_path(&entry),
            temp_dir.path().join("themes").join("theme-x")
        );
    }

    #[tokio::test]
    async fn test_uninstall_removes_default_path() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("custom_components").join("sensor");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("manifest.json"), "{}").unwrap();

        let operations = operations(temp_dir.path());
        let entry = installed("alice/sensor", Category::Integration, None);
        operations.uninstall(&entry).await.unwrap();

        assert!(!target.exists());
        let state = entry.state().await;
        assert!(!state.installed);
        assert!(state.installed_version.is_none());
    }

    #[tokio::test]
    async fn test_uninstall_removes_recorded_file() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("widget.js");
        std::fs::write(&target, "console.log('hi')").unwrap();

        let operations = operations(temp_dir.path());
        let entry = installed("bob/widget", Category::Plugin, Some(target.clone()));
        operations.uninstall(&entry).await.unwrap();

        assert!(!target.exists());
        assert!(entry.state().await.local_path.is_none());
    }

    #[tokio::test]
    async fn test_uninstall_missing_files_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let operations = operations(temp_dir.path());
        let entry = installed("carol/gone", Category::PythonScript, None);

        operations.uninstall(&entry).await.unwrap();
        assert!(!entry.is_installed().await);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_names() {
        let temp_dir = TempDir::new().unwrap();
        let operations = operations(temp_dir.path());
        let err = operations
            .register("not-a-repository", Category::Theme)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidRepositoryName(_)));
    }
}
