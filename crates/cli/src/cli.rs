use std::path::PathBuf;

use clap::ValueEnum;
use custodian_core::Category;

#[derive(clap::Parser, Debug)]
#[clap(name = "custodian", version, about = "Keeps tracked add-on repositories in sync")]
pub struct Cli {
    /// Use this configuration file instead of the default one
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Run the startup sweep, then keep reconciling on schedule
    Run,
    /// Run a single sweep and exit
    Sweep {
        /// Which sweep to run
        #[clap(value_enum)]
        kind: SweepTarget,
    },
    /// Start tracking a repository
    Register {
        /// Repository full name (owner/name)
        repository: String,
        /// Category the repository belongs to
        #[clap(value_parser = parse_category)]
        category: Category,
        /// Replace the repository if it is already tracked
        #[clap(long)]
        force: bool,
    },
    /// List tracked repositories
    List {
        /// Show only installed repositories
        #[clap(long)]
        installed: bool,
    },
    /// Inspect and acknowledge critical repositories
    Critical {
        #[clap(subcommand)]
        command: CriticalCommands,
    },
    /// Show the remaining GitHub API quota
    RateLimit,
    /// Manage configuration
    Config {
        #[clap(subcommand)]
        command: ConfigCommands,
    },
}

fn parse_category(value: &str) -> Result<Category, String> {
    value.parse().map_err(|e: custodian_core::SyncError| e.to_string())
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepTarget {
    /// Refresh installed repositories and re-check critical advisories
    Installed,
    /// Refresh every repository, rediscover and enforce the blacklist
    Full,
}

#[derive(clap::Subcommand, Debug)]
pub enum CriticalCommands {
    /// List stored critical advisories
    List,
    /// Acknowledge a critical advisory so it stops raising alerts
    Ack {
        /// Repository full name (owner/name)
        repository: String,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigCommands {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., schedule.installed_interval_minutes)
        key: String,
        /// Configuration value
        value: String,
    },
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },
    /// Show all configuration
    Show,
    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[clap(long)]
        force: bool,
    },
}
