use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::models::{RepositoryEntry, RepositoryRecord};
use crate::persist::REPOSITORIES_KEY;
use crate::traits::PersistentStore;

/// In-memory collection of known repositories.
///
/// Full names are unique ignoring case. Lookups scan linearly; the registry
/// holds hundreds of entries, not millions. A missing repository is `None`,
/// never an error.
#[derive(Debug, Default)]
pub struct RepositoryRegistry {
    repositories: Vec<Arc<RepositoryEntry>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RepositoryEntry>> {
        self.repositories.iter()
    }

    /// Get a repository by its remote id
    pub async fn get_by_id(&self, id: &str) -> Option<Arc<RepositoryEntry>> {
        for repository in &self.repositories {
            if repository.state().await.id.as_deref() == Some(id) {
                return Some(Arc::clone(repository));
            }
        }
        None
    }

    /// Get a repository by `owner/name`, ignoring case
    pub fn get_by_name(&self, full_name: &str) -> Option<Arc<RepositoryEntry>> {
        self.repositories
            .iter()
            .find(|repository| repository.matches_name(full_name))
            .cloned()
    }

    pub fn is_known(&self, full_name: &str) -> bool {
        self.repositories
            .iter()
            .any(|repository| repository.matches_name(full_name))
    }

    pub async fn sorted_by_display_name(&self) -> Vec<Arc<RepositoryEntry>> {
        let mut keyed = Vec::with_capacity(self.repositories.len());
        for repository in &self.repositories {
            keyed.push((repository.display_name().await, Arc::clone(repository)));
        }
        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
        keyed.into_iter().map(|(_, repository)| repository).collect()
    }

    pub fn sorted_by_full_name(&self) -> Vec<Arc<RepositoryEntry>> {
        let mut sorted = self.repositories.clone();
        sorted.sort_by(|a, b| a.full_name().cmp(b.full_name()));
        sorted
    }

    /// Repositories currently flagged as installed
    pub async fn installed(&self) -> Vec<Arc<RepositoryEntry>> {
        let mut installed = Vec::new();
        for repository in &self.repositories {
            if repository.is_installed().await {
                installed.push(Arc::clone(repository));
            }
        }
        installed
    }

    /// Add a repository.
    ///
    /// A repository whose name (or id) is already known is left alone unless
    /// `force` is set, in which case the existing entry is replaced. Returns
    /// whether the registry changed.
    pub async fn register(&mut self, entry: RepositoryEntry, force: bool) -> bool {
        let id = entry.state().await.id.clone();
        let by_id = match &id {
            Some(id) => self.get_by_id(id).await,
            None => None,
        };

        if !force && (self.is_known(entry.full_name()) || by_id.is_some()) {
            debug!("Repository {} is already registered", entry.full_name());
            return false;
        }

        self.unregister(entry.full_name());
        if let Some(existing) = by_id {
            self.unregister(existing.full_name());
        }

        debug!("Registered repository {}", entry.full_name());
        self.repositories.push(Arc::new(entry));
        true
    }

    /// Remove a repository, returning it if it was known
    pub fn unregister(&mut self, full_name: &str) -> Option<Arc<RepositoryEntry>> {
        let position = self
            .repositories
            .iter()
            .position(|repository| repository.matches_name(full_name))?;
        let removed = self.repositories.remove(position);
        debug!("Unregistered repository {}", removed.full_name());
        Some(removed)
    }

    pub async fn records(&self) -> Vec<RepositoryRecord> {
        let mut records = Vec::with_capacity(self.repositories.len());
        for repository in self.sorted_by_full_name() {
            records.push(repository.to_record().await);
        }
        records
    }

    /// Write the durable state of every repository under the `repositories` key
    pub async fn persist(&self, store: &dyn PersistentStore) -> Result<()> {
        let value = serde_json::to_value(self.records().await)
            .map_err(|e| SyncError::persistence(REPOSITORIES_KEY, e))?;
        store
            .save(REPOSITORIES_KEY, value)
            .await
            .map_err(|e| match e {
                SyncError::PersistenceFailure { .. } => e,
                other => SyncError::persistence(REPOSITORIES_KEY, other),
            })?;
        debug!("Persisted {} repositories", self.repositories.len());
        Ok(())
    }

    /// Rebuild the registry from the `repositories` key
    pub async fn restore(store: &dyn PersistentStore) -> Result<Self> {
        let Some(value) = store.load(REPOSITORIES_KEY).await? else {
            info!("No stored repositories, starting with an empty registry");
            return Ok(Self::new());
        };

        let records: Vec<RepositoryRecord> = serde_json::from_value(value)?;
        let mut registry = Self::new();
        for record in records {
            let full_name = record.full_name.clone();
            match RepositoryEntry::from_record(record) {
                Ok(entry) => {
                    if !registry.register(entry, false).await {
                        warn!("Skipping duplicate stored repository {}", full_name);
                    }
                }
                Err(e) => warn!("Skipping stored repository {}: {}", full_name, e),
            }
        }

        info!("Restored {} repositories", registry.len());
        Ok(registry)
    }
}
