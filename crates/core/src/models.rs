use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Result, SyncError};

/// Kind of add-on a repository provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Integration,
    Plugin,
    Theme,
    #[serde(rename = "appdaemon")]
    AppDaemon,
    PythonScript,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Integration,
        Category::Plugin,
        Category::Theme,
        Category::AppDaemon,
        Category::PythonScript,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Integration => "integration",
            Category::Plugin => "plugin",
            Category::Theme => "theme",
            Category::AppDaemon => "appdaemon",
            Category::PythonScript => "python_script",
        }
    }

    /// Directory, relative to the install root, that holds add-ons of this kind
    pub fn install_subdir(&self) -> &'static str {
        match self {
            Category::Integration => "custom_components",
            Category::Plugin => "www/community",
            Category::Theme => "themes",
            Category::AppDaemon => "appdaemon/apps",
            Category::PythonScript => "python_scripts",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SyncError::Configuration(format!("Unknown category: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalType {
    Blacklist,
    Critical,
}

/// Why a repository was pulled from circulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removal {
    pub removal_type: RemovalType,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub acknowledged: bool,
}

impl Removal {
    pub fn blacklisted() -> Self {
        Self {
            removal_type: RemovalType::Blacklist,
            reason: None,
            link: None,
            acknowledged: false,
        }
    }

    pub fn critical(record: &AdvisoryRecord) -> Self {
        Self {
            removal_type: RemovalType::Critical,
            reason: Some(record.reason.clone()),
            link: Some(record.link.clone()),
            acknowledged: record.acknowledged,
        }
    }
}

/// Mutable part of a repository entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryState {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub installed: bool,
    #[serde(default)]
    pub installed_version: Option<String>,
    #[serde(default)]
    pub available_version: Option<String>,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub removal: Option<Removal>,
}

impl RepositoryState {
    /// Whether the available version differs from the installed one
    pub fn pending_update(&self) -> bool {
        if !self.installed {
            return false;
        }
        match (&self.installed_version, &self.available_version) {
            (Some(installed), Some(available)) => {
                match (parse_version(installed), parse_version(available)) {
                    (Some(installed), Some(available)) => available > installed,
                    _ => installed != available,
                }
            }
            _ => false,
        }
    }
}

fn parse_version(raw: &str) -> Option<semver::Version> {
    semver::Version::parse(raw.trim_start_matches('v')).ok()
}

/// Durable form of a repository entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub full_name: String,
    pub category: Category,
    #[serde(flatten)]
    pub state: RepositoryState,
}

/// A tracked repository.
///
/// Identity (`full_name`, `category`) is fixed at creation. Everything else sits
/// behind a per-entry lock so a task can refresh its own entry while the
/// registry itself stays untouched.
#[derive(Debug)]
pub struct RepositoryEntry {
    full_name: String,
    category: Category,
    state: RwLock<RepositoryState>,
}

impl RepositoryEntry {
    pub fn new(full_name: impl Into<String>, category: Category) -> Result<Self> {
        Self::with_state(full_name, category, RepositoryState::default())
    }

    pub fn with_state(
        full_name: impl Into<String>,
        category: Category,
        state: RepositoryState,
    ) -> Result<Self> {
        let full_name = full_name.into();
        validate_full_name(&full_name)?;
        Ok(Self {
            full_name,
            category,
            state: RwLock::new(state),
        })
    }

    pub fn from_record(record: RepositoryRecord) -> Result<Self> {
        Self::with_state(record.full_name, record.category, record.state)
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Repository part of `owner/name`
    pub fn short_name(&self) -> &str {
        self.full_name
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.full_name)
    }

    pub fn matches_name(&self, full_name: &str) -> bool {
        self.full_name.eq_ignore_ascii_case(full_name)
    }

    pub async fn state(&self) -> RwLockReadGuard<'_, RepositoryState> {
        self.state.read().await
    }

    pub async fn state_mut(&self) -> RwLockWriteGuard<'_, RepositoryState> {
        self.state.write().await
    }

    pub async fn is_installed(&self) -> bool {
        self.state.read().await.installed
    }

    pub async fn display_name(&self) -> String {
        self.state
            .read()
            .await
            .display_name
            .clone()
            .unwrap_or_else(|| self.short_name().to_string())
    }

    pub async fn to_record(&self) -> RepositoryRecord {
        RepositoryRecord {
            full_name: self.full_name.clone(),
            category: self.category,
            state: self.state.read().await.clone(),
        }
    }
}

/// Check that a name has the `owner/name` shape
pub fn validate_full_name(full_name: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Err(SyncError::InvalidRepositoryName(format!(
            "'{}': {}",
            full_name, reason
        )))
    };

    let Some((owner, name)) = full_name.split_once('/') else {
        return invalid("expected owner/name");
    };
    if owner.is_empty() || name.is_empty() {
        return invalid("owner and name must not be empty");
    }
    if name.contains('/') || full_name.contains("..") || full_name.contains('\\') {
        return invalid("contains invalid path characters");
    }
    if full_name.len() > 255 {
        return invalid("name too long");
    }
    Ok(())
}

/// Advisory as published by the remote source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalAdvisory {
    pub repository: String,
    pub reason: String,
    pub link: String,
}

/// Advisory as persisted under the `critical` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryRecord {
    pub repository: String,
    pub reason: String,
    pub link: String,
    pub acknowledged: bool,
}

impl AdvisoryRecord {
    pub fn from_advisory(advisory: &CriticalAdvisory) -> Self {
        Self {
            repository: advisory.repository.clone(),
            reason: advisory.reason.clone(),
            link: advisory.link.clone(),
            acknowledged: true,
        }
    }
}

/// Remaining remote API quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBudget {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateBudget {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepKind {
    Startup,
    Installed,
    Full,
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepKind::Startup => f.write_str("startup"),
            SweepKind::Installed => f.write_str("installed"),
            SweepKind::Full => f.write_str("full"),
        }
    }
}
