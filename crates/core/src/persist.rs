use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::traits::PersistentStore;

/// Key holding the persisted critical advisory records
pub const CRITICAL_KEY: &str = "critical";
/// Key holding the persisted repository records
pub const REPOSITORIES_KEY: &str = "repositories";

/// File-system backed key-value store, one JSON document per key
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub async fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{}.json", key)))
    }

    fn backup_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{}.json.backup", key)))
    }

    async fn read_value(path: &Path) -> Result<Option<Value>> {
        if !fs::try_exists(path).await? {
            return Ok(None);
        }
        let content = fs::read_to_string(path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        && !key.contains("..");
    if valid {
        Ok(())
    } else {
        Err(SyncError::Configuration(format!("Invalid store key: {}", key)))
    }
}

#[async_trait]
impl PersistentStore for JsonFileStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        let path = self.key_path(key)?;
        match Self::read_value(&path).await {
            Ok(value) => {
                debug!("Loaded '{}' from {}", key, path.display());
                Ok(value)
            }
            Err(e) => {
                warn!("Failed to load '{}' ({}), checking backup", key, e);
                // Corrupt state must never read as "nothing stored"
                match Self::read_value(&self.backup_path(key)?).await {
                    Ok(Some(backup)) => {
                        info!("Restored '{}' from backup", key);
                        Ok(Some(backup))
                    }
                    Ok(None) => Err(SyncError::persistence(
                        key,
                        format!("stored data is corrupted and no backup exists: {}", e),
                    )),
                    Err(backup_err) => Err(SyncError::persistence(
                        key,
                        format!(
                            "stored data is corrupted ({}) and the backup is unreadable ({})",
                            e, backup_err
                        ),
                    )),
                }
            }
        }
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        let path = self.key_path(key)?;
        let backup_path = self.backup_path(key)?;
        let temp_path = self.root.join(format!("{}.json.tmp", key));

        let content = serde_json::to_string_pretty(&value)
            .map_err(|e| SyncError::persistence(key, e))?;

        if fs::try_exists(&path).await.unwrap_or(false) {
            if let Err(e) = fs::copy(&path, &backup_path).await {
                warn!("Failed to create backup for '{}': {}", key, e);
            }
        }

        fs::write(&temp_path, content)
            .await
            .map_err(|e| SyncError::persistence(key, e))?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| SyncError::persistence(key, e))?;

        debug!("Saved '{}' to {}", key, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_missing_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path()).await.unwrap();

        assert_eq!(store.load(CRITICAL_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("data")).await.unwrap();

        let value = json!([{ "repository": "alice/theme-x", "acknowledged": false }]);
        store.save(CRITICAL_KEY, value.clone()).await.unwrap();

        assert_eq!(store.load(CRITICAL_KEY).await.unwrap(), Some(value));
        assert!(store.root().join("critical.json").exists());
    }

    #[tokio::test]
    async fn test_corrupted_file_falls_back_to_backup() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path()).await.unwrap();

        store.save(REPOSITORIES_KEY, json!(["first"])).await.unwrap();
        store.save(REPOSITORIES_KEY, json!(["second"])).await.unwrap();
        std::fs::write(temp_dir.path().join("repositories.json"), "{ not json").unwrap();

        let restored = store.load(REPOSITORIES_KEY).await.unwrap();
        assert_eq!(restored, Some(json!(["first"])));
    }

    #[tokio::test]
    async fn test_corrupted_file_without_backup_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path()).await.unwrap();

        for key in [CRITICAL_KEY, REPOSITORIES_KEY] {
            store.save(key, json!([])).await.unwrap();
            std::fs::write(temp_dir.path().join(format!("{}.json", key)), "{ truncated").unwrap();

            let err = store.load(key).await.unwrap_err();
            assert!(
                matches!(&err, SyncError::PersistenceFailure { key: failed, .. } if failed == key),
                "unexpected error for '{}': {}",
                key,
                err
            );
        }
    }

    #[tokio::test]
    async fn test_corrupted_file_and_backup_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path()).await.unwrap();

        store.save(CRITICAL_KEY, json!([])).await.unwrap();
        std::fs::write(temp_dir.path().join("critical.json"), "{ truncated").unwrap();
        std::fs::write(temp_dir.path().join("critical.json.backup"), "[{").unwrap();

        assert!(matches!(
            store.load(CRITICAL_KEY).await,
            Err(SyncError::PersistenceFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path()).await.unwrap();

        assert!(store.load("../escape").await.is_err());
        assert!(store.save("a/b", json!(1)).await.is_err());
    }
}
