//! Interfaces to the systems the reconciliation engine depends on.
//!
//! The engine never talks to the network, the disk or the host process
//! directly. Each concern sits behind one of these traits so the binary can
//! plug in real implementations and tests can plug in fakes.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{Category, CriticalAdvisory, RateBudget, RepositoryEntry};
use crate::notify::Topic;

/// Name of the default list that holds blacklisted repositories
pub const BLACKLIST_LIST: &str = "blacklist";

/// Remote source of truth for repository lists and advisories
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Get the default repository list for a category, or the blacklist when
    /// `list` is [`BLACKLIST_LIST`]
    async fn get_default_lists(&self, list: &str) -> Result<Vec<String>>;

    /// Get the repositories published by the organisation backing a category.
    ///
    /// Most categories have no such organisation.
    async fn get_org_repositories(&self, _category: Category) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Get the currently published critical advisories
    async fn get_critical_advisories(&self) -> Result<Vec<CriticalAdvisory>>;

    /// Read the remaining API quota
    async fn rate_budget(&self) -> Result<RateBudget>;
}

/// Host key-value store for durable state
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Load the value stored under `key`, `None` when nothing is stored
    async fn load(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`
    async fn save(&self, key: &str, value: Value) -> Result<()>;
}

/// Host event bus
pub trait NotificationBus: Send + Sync {
    /// Fire an event; delivery is best effort and never blocks
    fn publish(&self, topic: Topic, payload: Value);

    /// Raise an alert the user has to see
    fn urgent_alert(&self, title: &str, message: &str);
}

/// Control over the lifetime of the host process
pub trait HostControl: Send + Sync {
    /// Ask the host to restart after `delay`
    fn request_restart(&self, delay: Duration);
}

/// Per-repository operations executed by the task runner.
///
/// Implementations may only touch the state of the entry they are given.
#[async_trait]
pub trait RepositoryOperations: Send + Sync {
    /// Full refresh of an installed repository, including available version
    async fn update(&self, repository: &RepositoryEntry) -> Result<()>;

    /// Refresh of the metadata shared by all repositories
    async fn refresh_common(&self, repository: &RepositoryEntry) -> Result<()>;

    /// Validate a repository and build a new entry for it
    async fn register(&self, full_name: &str, category: Category) -> Result<RepositoryEntry>;

    /// Remove the installed files of a repository and clear its installed state
    async fn uninstall(&self, repository: &RepositoryEntry) -> Result<()>;
}
