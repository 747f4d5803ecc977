//! Critical repository handling.
//!
//! A critical advisory marks a repository as unsafe. Every advisory is
//! blacklisted. An advisory seen for the first time whose repository is
//! installed triggers a forced uninstall and a single host restart request.
//! Advisories that were already persisted never trigger anything again, so
//! repeated runs against an unchanged feed are no-ops.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::context::{Services, SyncContext};
use crate::error::{Result, SyncError};
use crate::models::{AdvisoryRecord, CriticalAdvisory, Removal};
use crate::persist::CRITICAL_KEY;

pub const ALERT_TITLE: &str = "URGENT!";
pub const ALERT_MESSAGE: &str = "**Check the custodian panel!**";

/// What a guard run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardOutcome {
    /// Advisories in the fetched feed
    pub advisories: usize,
    /// Repositories uninstalled during this run
    pub forced_uninstalls: Vec<String>,
    pub restart_requested: bool,
}

pub struct CriticalRepositoryGuard {
    services: Services,
    restart_delay: Duration,
}

impl CriticalRepositoryGuard {
    pub fn new(services: Services, restart_delay: Duration) -> Self {
        Self {
            services,
            restart_delay,
        }
    }

    /// Advisory records as last persisted
    pub async fn stored_advisories(&self) -> Result<Vec<AdvisoryRecord>> {
        let stored = self
            .services
            .store
            .load(CRITICAL_KEY)
            .await
            .map_err(|e| match e {
                SyncError::PersistenceFailure { .. } => e,
                other => SyncError::persistence(CRITICAL_KEY, other),
            })?;
        match stored {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value)
                .map_err(|e| SyncError::persistence(CRITICAL_KEY, e)),
        }
    }

    async fn save_advisories(&self, records: &[AdvisoryRecord]) -> Result<()> {
        let value =
            serde_json::to_value(records).map_err(|e| SyncError::persistence(CRITICAL_KEY, e))?;
        self.services
            .store
            .save(CRITICAL_KEY, value)
            .await
            .map_err(|e| match e {
                SyncError::PersistenceFailure { .. } => e,
                other => SyncError::persistence(CRITICAL_KEY, other),
            })
    }

    /// Raise an urgent alert when a persisted advisory is unacknowledged.
    ///
    /// Returns whether the alert was raised. Never mutates anything.
    pub async fn startup_alert_check(&self) -> Result<bool> {
        let stored = self.stored_advisories().await?;
        if stored.iter().all(|record| record.acknowledged) {
            return Ok(false);
        }

        error!("{} Check the custodian panel!", ALERT_TITLE);
        self.services.bus.urgent_alert(ALERT_TITLE, ALERT_MESSAGE);
        Ok(true)
    }

    /// Reconcile local state with the remote advisory feed
    pub async fn reconcile(&self, ctx: &mut SyncContext) -> Result<GuardOutcome> {
        let critical = match self.services.remote.get_critical_advisories().await {
            Ok(critical) => critical,
            Err(e) => {
                warn!("Could not fetch critical repositories: {}", e);
                Vec::new()
            }
        };

        if critical.is_empty() {
            debug!("No critical repositories");
            return Ok(GuardOutcome::default());
        }

        let previously_seen: Vec<String> = self
            .stored_advisories()
            .await?
            .into_iter()
            .map(|record| record.repository)
            .collect();

        let mut outcome = GuardOutcome {
            advisories: critical.len(),
            ..Default::default()
        };
        let mut records = Vec::with_capacity(critical.len());

        for advisory in &critical {
            let record = self
                .handle_advisory(ctx, advisory, &previously_seen, &mut outcome)
                .await;
            records.push(record);
        }

        self.save_advisories(&records).await?;

        if !outcome.forced_uninstalls.is_empty() {
            error!(
                "Restarting host after removing {} critical repositories",
                outcome.forced_uninstalls.len()
            );
            self.services.host.request_restart(self.restart_delay);
            outcome.restart_requested = true;
        }

        Ok(outcome)
    }

    async fn handle_advisory(
        &self,
        ctx: &mut SyncContext,
        advisory: &CriticalAdvisory,
        previously_seen: &[String],
        outcome: &mut GuardOutcome,
    ) -> AdvisoryRecord {
        let name = advisory.repository.as_str();
        ctx.common.blacklist.insert(name);

        let mut record = AdvisoryRecord::from_advisory(advisory);
        let repository = ctx.registry.get_by_name(name);
        let newly_seen = !previously_seen
            .iter()
            .any(|seen| seen.eq_ignore_ascii_case(name));

        if let Some(repository) = &repository {
            if newly_seen && repository.is_installed().await {
                error!("Removing repository {}, it is marked as critical", name);
                record.acknowledged = false;
                outcome.forced_uninstalls.push(repository.full_name().to_string());

                ctx.registry.unregister(name);
                if let Err(e) = self.services.operations.uninstall(repository).await {
                    error!("Failed to uninstall critical repository {}: {}", name, e);
                }
            }
            repository.state_mut().await.removal = Some(Removal::critical(&record));
        }

        ctx.common.removed.record(name, Removal::critical(&record));
        record
    }

    /// Mark a persisted advisory as acknowledged, returning whether it existed
    pub async fn acknowledge(&self, repository: &str) -> Result<bool> {
        let mut records = self.stored_advisories().await?;
        let Some(record) = records
            .iter_mut()
            .find(|record| record.repository.eq_ignore_ascii_case(repository))
        else {
            return Ok(false);
        };

        if !record.acknowledged {
            record.acknowledged = true;
            self.save_advisories(&records).await?;
            info!("Acknowledged critical repository {}", repository);
        }
        Ok(true)
    }
}
