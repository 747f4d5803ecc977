use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::SyncContext;
use crate::error::Result;
use crate::models::Removal;
use crate::traits::PersistentStore;

/// What a blacklist pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnforcementReport {
    /// Blacklisted repositories left in place because they are installed
    pub warned: Vec<String>,
    /// Blacklisted repositories dropped from the registry
    pub removed: Vec<String>,
}

/// Drops known, non-installed repositories that are on the blacklist
pub struct BlacklistEnforcer {
    store: Arc<dyn PersistentStore>,
}

impl BlacklistEnforcer {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    pub async fn enforce(&self, ctx: &mut SyncContext) -> Result<EnforcementReport> {
        let mut report = EnforcementReport::default();
        let names: Vec<String> = ctx.common.blacklist.iter().map(str::to_string).collect();

        for name in names {
            let Some(repository) = ctx.registry.get_by_name(&name) else {
                continue;
            };

            if repository.is_installed().await {
                warn!(
                    "You have {} installed, this repository has been blacklisted, please consider removing it",
                    repository.full_name()
                );
                let mut state = repository.state_mut().await;
                if state.removal.is_none() {
                    state.removal = Some(
                        ctx.common
                            .removed
                            .get(&name)
                            .cloned()
                            .unwrap_or_else(Removal::blacklisted),
                    );
                }
                report.warned.push(repository.full_name().to_string());
            } else {
                debug!("Removing blacklisted repository {}", repository.full_name());
                ctx.registry.unregister(&name);
                report.removed.push(repository.full_name().to_string());
            }
        }

        if !report.removed.is_empty() {
            ctx.registry.persist(self.store.as_ref()).await?;
        }
        Ok(report)
    }
}
