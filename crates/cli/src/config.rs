use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use custodian_core::models::validate_full_name;
use custodian_core::{Category, ConcurrencyLimit, SchedulerConfig};
use custodian_github::{DEFAULT_API_URL, DEFAULT_DATA_REPOSITORY};
use directories::ProjectDirs;
use eyre::Result;
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Longest accepted sweep interval, one year
pub const MAX_INTERVAL_MINUTES: u64 = 365 * 24 * 60;
/// Longest accepted delay before a requested restart, one hour
pub const MAX_RESTART_DELAY_SECONDS: u64 = 60 * 60;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "all_categories")]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub tasks: TaskConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScheduleConfig {
    pub installed_interval_minutes: u64,
    pub full_interval_minutes: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TaskConfig {
    /// Upper bound on concurrent repository tasks, unbounded when absent
    #[serde(default)]
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HostConfig {
    pub restart_delay_seconds: u64,
    pub restart_exit_code: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GitHubConfig {
    pub data_repository: String,
    #[serde(default)]
    pub token: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: String,
    pub install_root: String,
}

fn all_categories() -> Vec<Category> {
    Category::ALL.to_vec()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            categories: all_categories(),
            schedule: ScheduleConfig::default(),
            tasks: TaskConfig::default(),
            host: HostConfig::default(),
            github: GitHubConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            installed_interval_minutes: 30,
            full_interval_minutes: 800,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            restart_delay_seconds: 5,
            restart_exit_code: 100,
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            data_repository: DEFAULT_DATA_REPOSITORY.to_string(),
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = get_default_data_dir();
        Self {
            path: data_dir.join("store").to_string_lossy().to_string(),
            install_root: data_dir.join("addons").to_string_lossy().to_string(),
        }
    }
}

impl Config {
    pub fn get_config_path() -> PathBuf {
        get_default_config_dir().join("config.json")
    }

    /// Load the configuration at `path`, writing the defaults there first when
    /// the file does not exist yet
    pub async fn load(path: &Path) -> Result<Self> {
        if !fs::try_exists(path).await? {
            let default_config = Self::default();
            default_config.save(path).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| eyre::eyre!("Invalid configuration in {}: {}", path.display(), e))?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    pub async fn reset(path: &Path) -> Result<Self> {
        let config = Self::default();
        config.save(path).await?;
        Ok(config)
    }

    /// Check the values a hand-edited file could get wrong
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(eyre::eyre!("At least one category is required"));
        }
        check_minutes(
            "schedule.installed_interval_minutes",
            self.schedule.installed_interval_minutes,
        )?;
        check_minutes(
            "schedule.full_interval_minutes",
            self.schedule.full_interval_minutes,
        )?;
        if self.host.restart_delay_seconds > MAX_RESTART_DELAY_SECONDS {
            return Err(eyre::eyre!(
                "host.restart_delay_seconds must be at most {}",
                MAX_RESTART_DELAY_SECONDS
            ));
        }
        if self.tasks.max_concurrent == Some(0) {
            return Err(eyre::eyre!("tasks.max_concurrent must be at least 1"));
        }
        validate_full_name(&self.github.data_repository)?;
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            installed_interval: minutes_to_duration(self.schedule.installed_interval_minutes),
            full_interval: minutes_to_duration(self.schedule.full_interval_minutes),
            restart_delay: Duration::from_secs(self.host.restart_delay_seconds),
            concurrency: ConcurrencyLimit::from(self.tasks.max_concurrent),
        }
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["categories"] => {
                let categories = value
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(Category::from_str)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                if categories.is_empty() {
                    return Err(eyre::eyre!("At least one category is required"));
                }
                self.categories = categories;
            }
            ["schedule", "installed_interval_minutes"] => {
                self.schedule.installed_interval_minutes = parse_minutes(value)?;
            }
            ["schedule", "full_interval_minutes"] => {
                self.schedule.full_interval_minutes = parse_minutes(value)?;
            }
            ["tasks", "max_concurrent"] => {
                self.tasks.max_concurrent = if value.is_empty() {
                    None
                } else {
                    match parse::<usize>(value)? {
                        0 => return Err(eyre::eyre!("max_concurrent must be at least 1")),
                        max => Some(max),
                    }
                };
            }
            ["host", "restart_delay_seconds"] => {
                let seconds = parse(value)?;
                if seconds > MAX_RESTART_DELAY_SECONDS {
                    return Err(eyre::eyre!(
                        "Restart delay must be at most {} seconds",
                        MAX_RESTART_DELAY_SECONDS
                    ));
                }
                self.host.restart_delay_seconds = seconds;
            }
            ["host", "restart_exit_code"] => {
                self.host.restart_exit_code = parse(value)?;
            }
            ["github", "data_repository"] => {
                validate_full_name(value)?;
                self.github.data_repository = value.to_string();
            }
            ["github", "token"] => {
                self.github.token = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            ["github", "api_url"] => {
                self.github.api_url = value.to_string();
            }
            ["storage", "path"] => {
                self.storage.path = value.to_string();
            }
            ["storage", "install_root"] => {
                self.storage.install_root = value.to_string();
            }
            _ => {
                return Err(eyre::eyre!("Unknown configuration key: {}", key));
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Result<String> {
        let parts: Vec<&str> = key.split('.').collect();

        let value = match parts.as_slice() {
            ["categories"] => self.categories_list(),
            ["schedule", "installed_interval_minutes"] => {
                self.schedule.installed_interval_minutes.to_string()
            }
            ["schedule", "full_interval_minutes"] => self.schedule.full_interval_minutes.to_string(),
            ["tasks", "max_concurrent"] => self
                .tasks
                .max_concurrent
                .map(|max| max.to_string())
                .unwrap_or_default(),
            ["host", "restart_delay_seconds"] => self.host.restart_delay_seconds.to_string(),
            ["host", "restart_exit_code"] => self.host.restart_exit_code.to_string(),
            ["github", "data_repository"] => self.github.data_repository.clone(),
            ["github", "token"] => self.github.token.clone().unwrap_or_default(),
            ["github", "api_url"] => self.github.api_url.clone(),
            ["storage", "path"] => self.storage.path.clone(),
            ["storage", "install_root"] => self.storage.install_root.clone(),
            _ => {
                return Err(eyre::eyre!("Unknown configuration key: {}", key));
            }
        };

        Ok(value)
    }

    pub fn show_all(&self) -> String {
        format!(
            "Configuration:\n\
             ├─ categories: {}\n\
             Schedule:\n\
             ├─ installed_interval_minutes: {}\n\
             └─ full_interval_minutes: {}\n\
             Tasks:\n\
             └─ max_concurrent: {}\n\
             Host:\n\
             ├─ restart_delay_seconds: {}\n\
             └─ restart_exit_code: {}\n\
             GitHub:\n\
             ├─ data_repository: {}\n\
             ├─ token: {}\n\
             └─ api_url: {}\n\
             Storage:\n\
             ├─ path: {}\n\
             └─ install_root: {}",
            self.categories_list(),
            self.schedule.installed_interval_minutes,
            self.schedule.full_interval_minutes,
            self.tasks
                .max_concurrent
                .map(|max| max.to_string())
                .unwrap_or_else(|| "(unbounded)".to_string()),
            self.host.restart_delay_seconds,
            self.host.restart_exit_code,
            self.github.data_repository,
            if self.github.token.is_some() {
                "(set)"
            } else {
                "(not set)"
            },
            self.github.api_url,
            self.storage.path,
            self.storage.install_root,
        )
    }

    fn categories_list(&self) -> String {
        self.categories
            .iter()
            .map(Category::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn parse<T: FromStr>(value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| eyre::eyre!("Invalid value: {}", value))
}

fn parse_minutes(value: &str) -> Result<u64> {
    let minutes = parse::<u64>(value)?;
    check_minutes("interval", minutes)?;
    Ok(minutes)
}

fn check_minutes(name: &str, minutes: u64) -> Result<()> {
    match minutes {
        0 => Err(eyre::eyre!("{} must be at least one minute", name)),
        minutes if minutes > MAX_INTERVAL_MINUTES => Err(eyre::eyre!(
            "{} must be at most {} minutes",
            name,
            MAX_INTERVAL_MINUTES
        )),
        _ => Ok(()),
    }
}

fn minutes_to_duration(minutes: u64) -> Duration {
    Duration::from_secs(minutes.min(MAX_INTERVAL_MINUTES) * 60)
}

/// Get the default configuration directory
fn get_default_config_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("org", "custodian", "custodian") {
        proj_dirs.config_dir().to_path_buf()
    } else {
        // Fallback to current directory if we can't determine project dirs
        PathBuf::from(".custodian").join("config")
    }
}

/// Get the default data directory
fn get_default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("org", "custodian", "custodian") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from(".custodian").join("data")
    }
}
