pub mod config;
pub mod critical;
pub mod list;
pub mod rate_limit;
pub mod register;
pub mod run;
pub mod sweep;

use std::sync::Arc;

use custodian_core::{BroadcastBus, CommonState, JsonFileStore, ReconciliationScheduler, Services};
use custodian_github::{GitHubClient, GitHubOperations, GitHubRemote};
use eyre::Result;

use crate::config::Config;
use crate::host::ProcessHost;

pub use config::handle_config_command;
pub use critical::handle_critical_command;
pub use list::handle_list_command;
pub use rate_limit::handle_rate_limit_command;
pub use register::handle_register_command;
pub use run::handle_run_command;
pub use sweep::handle_sweep_command;

/// Collaborators wired from the configuration
pub struct App {
    pub config: Config,
    pub store: Arc<JsonFileStore>,
    pub remote: Arc<GitHubRemote>,
    pub bus: Arc<BroadcastBus>,
    pub host: Arc<ProcessHost>,
    pub services: Services,
}

impl App {
    pub async fn build(config: Config) -> Result<Self> {
        let store = Arc::new(JsonFileStore::new(&config.storage.path).await?);
        let client = Arc::new(GitHubClient::new(
            &config.github.api_url,
            config.github.token.as_deref(),
        )?);
        let remote = Arc::new(GitHubRemote::new(
            Arc::clone(&client),
            config.github.data_repository.clone(),
        ));
        let operations = Arc::new(GitHubOperations::new(
            client,
            config.storage.install_root.clone(),
        ));
        let bus = Arc::new(BroadcastBus::default());
        let host = Arc::new(ProcessHost::new());

        let services = Services {
            remote: remote.clone(),
            store: store.clone(),
            bus: bus.clone(),
            host: host.clone(),
            operations,
        };

        Ok(Self {
            config,
            store,
            remote,
            bus,
            host,
            services,
        })
    }

    /// Scheduler around the persisted registry
    pub async fn scheduler(&self) -> Result<ReconciliationScheduler> {
        let common = CommonState::new(self.config.categories.clone());
        let scheduler = ReconciliationScheduler::restore(
            self.services.clone(),
            common,
            self.config.scheduler_config(),
        )
        .await?;
        Ok(scheduler)
    }

    /// Exit code to leave with, if a restart was requested
    pub fn exit_code(&self) -> Option<i32> {
        self.host
            .restart_requested()
            .then_some(self.config.host.restart_exit_code)
    }
}
