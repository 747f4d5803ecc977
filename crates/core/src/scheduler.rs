//! Recurring reconciliation sweeps.
//!
//! All sweeps run on the scheduler's own control flow: timers and "run now"
//! requests are multiplexed in a single loop, so a sweep always finishes before
//! the next one starts and the registry never needs a lock.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::blacklist::BlacklistEnforcer;
use crate::context::{CommonState, Services, StatusSnapshot, SyncContext, SystemStatus};
use crate::discovery::load_known_repositories;
use crate::error::{Result, SyncError};
use crate::guard::CriticalRepositoryGuard;
use crate::models::{Category, SweepKind, validate_full_name};
use crate::notify::Topic;
use crate::registry::RepositoryRegistry;
use crate::runner::{ConcurrencyLimit, RepositoryTask, TaskBatch, TaskRunner};
use crate::traits::NotificationBus;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub installed_interval: Duration,
    pub full_interval: Duration,
    pub restart_delay: Duration,
    pub concurrency: ConcurrencyLimit,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            installed_interval: Duration::from_secs(30 * 60),
            full_interval: Duration::from_secs(800 * 60),
            restart_delay: Duration::from_secs(5),
            concurrency: ConcurrencyLimit::Unbounded,
        }
    }
}

#[derive(Debug)]
enum SchedulerCommand {
    RunNow {
        kind: SweepKind,
        reply: oneshot::Sender<Result<()>>,
    },
    Register {
        full_name: String,
        category: Category,
        force: bool,
        reply: oneshot::Sender<Result<bool>>,
    },
    Shutdown,
}

/// Cloneable handle for talking to a running scheduler
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
    status: Arc<SystemStatus>,
}

impl SchedulerHandle {
    /// Run a sweep as soon as the current one finishes and wait for its result
    pub async fn run_now(&self, kind: SweepKind) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::RunNow { kind, reply })
            .await
            .map_err(|_| SyncError::SchedulerStopped)?;
        response.await.map_err(|_| SyncError::SchedulerStopped)?
    }

    /// Register a repository between sweeps, see
    /// [`ReconciliationScheduler::register_repository`]
    pub async fn register(&self, full_name: &str, category: Category, force: bool) -> Result<bool> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::Register {
                full_name: full_name.to_string(),
                category,
                force,
                reply,
            })
            .await
            .map_err(|_| SyncError::SchedulerStopped)?;
        response.await.map_err(|_| SyncError::SchedulerStopped)?
    }

    /// Stop the scheduler loop once the current sweep returns
    pub async fn shutdown(&self) {
        let _ = self.sender.send(SchedulerCommand::Shutdown).await;
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }
}

/// Holds the background task flag for the lifetime of a sweep.
///
/// The flag is cleared and the change published on drop, whether the sweep
/// finished or bailed out with an error.
struct BackgroundTask {
    status: Arc<SystemStatus>,
    bus: Arc<dyn NotificationBus>,
    kind: SweepKind,
}

impl BackgroundTask {
    fn begin(status: Arc<SystemStatus>, bus: Arc<dyn NotificationBus>, kind: SweepKind) -> Self {
        debug!("Starting {} sweep", kind);
        status.set_background_task(true);
        bus.publish(Topic::Status, status_payload(&status));
        Self { status, bus, kind }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.status.set_background_task(false);
        self.bus.publish(Topic::Status, status_payload(&self.status));
        debug!("Finished {} sweep", self.kind);
    }
}

fn status_payload(status: &SystemStatus) -> Value {
    let snapshot = status.snapshot();
    json!({
        "startup": snapshot.startup,
        "new": snapshot.new,
        "background_task": snapshot.background_task,
        "reloading_data": snapshot.reloading_data,
    })
}

/// Recurring timer registrations owned by the scheduler
#[derive(Debug, Default)]
struct TimerSet {
    installed: Option<Interval>,
    full: Option<Interval>,
}

impl TimerSet {
    fn arm(&mut self, config: &SchedulerConfig) {
        if self.installed.is_none() {
            self.installed = Some(recurring(config.installed_interval));
            info!("Armed installed sweep every {:?}", config.installed_interval);
        }
        if self.full.is_none() {
            self.full = Some(recurring(config.full_interval));
            info!("Armed full sweep every {:?}", config.full_interval);
        }
    }

    fn is_armed(&self) -> bool {
        self.installed.is_some() && self.full.is_some()
    }

    fn disarm(&mut self) {
        let was_armed = self.installed.take().is_some() | self.full.take().is_some();
        if was_armed {
            info!("Recurring sweeps deregistered");
        }
    }

    async fn tick(timer: &mut Option<Interval>) {
        match timer {
            Some(interval) => {
                interval.tick().await;
            }
            None => pending().await,
        }
    }
}

fn recurring(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Drives the startup, installed and full sweeps
pub struct ReconciliationScheduler {
    ctx: SyncContext,
    services: Services,
    runner: TaskRunner,
    guard: CriticalRepositoryGuard,
    enforcer: BlacklistEnforcer,
    config: SchedulerConfig,
    timers: TimerSet,
    sender: mpsc::Sender<SchedulerCommand>,
    commands: Option<mpsc::Receiver<SchedulerCommand>>,
}

impl ReconciliationScheduler {
    pub fn new(ctx: SyncContext, services: Services, config: SchedulerConfig) -> Self {
        let (sender, commands) = mpsc::channel(16);
        Self {
            runner: TaskRunner::new(config.concurrency),
            guard: CriticalRepositoryGuard::new(services.clone(), config.restart_delay),
            enforcer: BlacklistEnforcer::new(Arc::clone(&services.store)),
            ctx,
            services,
            config,
            timers: TimerSet::default(),
            sender,
            commands: Some(commands),
        }
    }

    /// Build a scheduler around the registry found in the persistent store
    pub async fn restore(
        services: Services,
        common: CommonState,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let registry = RepositoryRegistry::restore(services.store.as_ref()).await?;
        let ctx = SyncContext::new(registry, common);
        ctx.status.set_new(ctx.registry.is_empty());
        Ok(Self::new(ctx, services, config))
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            sender: self.sender.clone(),
            status: Arc::clone(&self.ctx.status),
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn guard(&self) -> &CriticalRepositoryGuard {
        &self.guard
    }

    /// Run the startup sweep, then serve timers and commands until shutdown
    pub async fn run(mut self) -> Result<()> {
        let mut commands = self.commands.take().ok_or(SyncError::SchedulerStopped)?;

        if let Err(e) = self.startup_sweep().await {
            error!("Startup sweep failed: {}", e);
            self.ctx.status.finish_startup();
        }
        self.timers.arm(&self.config);
        let mut timers = std::mem::take(&mut self.timers);

        loop {
            tokio::select! {
                _ = TimerSet::tick(&mut timers.installed) => {
                    self.run_logged(SweepKind::Installed).await;
                }
                _ = TimerSet::tick(&mut timers.full) => {
                    self.run_logged(SweepKind::Full).await;
                }
                command = commands.recv() => match command {
                    Some(SchedulerCommand::RunNow { kind, reply }) => {
                        let result = self.run_sweep(kind).await;
                        let _ = reply.send(result);
                    }
                    Some(SchedulerCommand::Register { full_name, category, force, reply }) => {
                        let result = self.register_repository(&full_name, category, force).await;
                        let _ = reply.send(result);
                    }
                    Some(SchedulerCommand::Shutdown) | None => break,
                },
            }
        }

        timers.disarm();
        info!("Scheduler stopped");
        Ok(())
    }

    async fn run_logged(&mut self, kind: SweepKind) {
        match self.run_sweep(kind).await {
            Ok(()) => {}
            Err(e) if e.aborts_sweep() => error!("{} sweep failed: {}", kind, e),
            Err(e) => warn!("{} sweep ended early: {}", kind, e),
        }
    }

    pub async fn run_sweep(&mut self, kind: SweepKind) -> Result<()> {
        match kind {
            SweepKind::Startup => self.startup_sweep().await,
            SweepKind::Installed => self.installed_sweep().await,
            SweepKind::Full => self.full_sweep().await,
        }
    }

    /// One-time sweep run when the host starts
    pub async fn startup_sweep(&mut self) -> Result<()> {
        if !self.ctx.status.startup() {
            return Err(SyncError::StartupAlreadyRun);
        }

        {
            let _background = self.begin(SweepKind::Startup);
            self.log_rate_budget().await;

            if let Err(e) = self.guard.startup_alert_check().await {
                warn!("Could not check stored critical repositories: {}", e);
            }
            self.guard.reconcile(&mut self.ctx).await?;
            load_known_repositories(&mut self.ctx, &self.services, &self.runner).await;
            self.enforcer.enforce(&mut self.ctx).await?;

            self.timers.arm(&self.config);
            self.services
                .bus
                .publish(Topic::Reload, json!({ "force": true }));

            self.installed_steps().await?;
            self.ctx.status.finish_startup();
        }

        self.persist().await
    }

    /// Refresh installed repositories, then re-check critical advisories
    pub async fn installed_sweep(&mut self) -> Result<()> {
        {
            let _background = self.begin(SweepKind::Installed);
            self.log_rate_budget().await;
            self.installed_steps().await?;
        }
        self.persist().await
    }

    async fn installed_steps(&mut self) -> Result<()> {
        let mut batch = TaskBatch::new();
        for repository in self.ctx.registry.iter() {
            if !self.ctx.common.is_active(repository.category()) || !repository.is_installed().await
            {
                continue;
            }
            let operations = Arc::clone(&self.services.operations);
            let repository = Arc::clone(repository);
            batch.push(RepositoryTask::new(
                format!("update {}", repository.full_name()),
                async move { operations.update(&repository).await },
            ));
        }

        self.runner.submit(batch).await;
        self.guard.reconcile(&mut self.ctx).await?;
        Ok(())
    }

    /// Refresh every repository, then rediscover and enforce the blacklist
    pub async fn full_sweep(&mut self) -> Result<()> {
        {
            let _background = self.begin(SweepKind::Full);
            self.log_rate_budget().await;

            let batch: TaskBatch = self
                .ctx
                .registry
                .iter()
                .filter(|repository| self.ctx.common.is_active(repository.category()))
                .map(|repository| {
                    let operations = Arc::clone(&self.services.operations);
                    let repository = Arc::clone(repository);
                    RepositoryTask::new(
                        format!("refresh {}", repository.full_name()),
                        async move { operations.refresh_common(&repository).await },
                    )
                })
                .collect();

            self.runner.submit(batch).await;
            load_known_repositories(&mut self.ctx, &self.services, &self.runner).await;
            self.enforcer.enforce(&mut self.ctx).await?;
        }

        self.persist().await?;
        self.services
            .bus
            .publish(Topic::Repository, json!({ "action": "reload" }));
        Ok(())
    }

    /// Register a repository on explicit request and persist the registry.
    ///
    /// Returns whether the registry changed. A known repository is only
    /// replaced when `force` is set, and blacklisted repositories are refused.
    pub async fn register_repository(
        &mut self,
        full_name: &str,
        category: Category,
        force: bool,
    ) -> Result<bool> {
        validate_full_name(full_name)?;
        if self.ctx.common.blacklist.contains(full_name) {
            return Err(SyncError::operation_failed(full_name, "repository is blacklisted"));
        }
        if !force && self.ctx.registry.is_known(full_name) {
            debug!("Repository {} is already registered", full_name);
            return Ok(false);
        }

        let entry = self.services.operations.register(full_name, category).await?;
        // Replacing refreshes metadata, the local installation stays as it is
        if let Some(existing) = self.ctx.registry.get_by_name(full_name) {
            let previous = existing.state().await;
            let mut state = entry.state_mut().await;
            state.installed = previous.installed;
            state.installed_version = previous.installed_version.clone();
            state.local_path = previous.local_path.clone();
        }
        if !self.ctx.registry.register(entry, force).await {
            return Ok(false);
        }
        info!("Registered {} as {}", full_name, category);

        self.persist().await?;
        self.services.bus.publish(
            Topic::Repository,
            json!({ "action": "registration", "repository": full_name }),
        );
        Ok(true)
    }

    fn begin(&self, kind: SweepKind) -> BackgroundTask {
        BackgroundTask::begin(
            Arc::clone(&self.ctx.status),
            Arc::clone(&self.services.bus),
            kind,
        )
    }

    async fn persist(&self) -> Result<()> {
        self.ctx
            .registry
            .persist(self.services.store.as_ref())
            .await
    }

    async fn log_rate_budget(&self) {
        match self.services.remote.rate_budget().await {
            Ok(budget) => {
                debug!(
                    "Rate limit: {} calls remaining, resets at {}",
                    budget.remaining, budget.reset_at
                );
                if budget.is_exhausted() {
                    warn!(
                        "Rate limit exhausted until {}, remote calls will fail",
                        budget.reset_at
                    );
                }
            }
            Err(e) => debug!("Rate limit unavailable: {}", e),
        }
    }

    /// Whether the recurring sweeps have been registered
    pub fn timers_armed(&self) -> bool {
        self.timers.is_armed()
    }
}
