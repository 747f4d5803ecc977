//! Custodian Core - reconciliation engine for tracked add-on repositories
//!
//! This crate keeps a registry of third-party add-on repositories in sync with a
//! remote source of truth. It runs per-repository operations with bounded
//! concurrency, sweeps the registry on fixed intervals, enforces the remote
//! blacklist and force-removes repositories flagged as critical.
//!
//! # Components
//!
//! - **Registry**: known repositories with case-insensitive lookups
//! - **Task runner**: concurrent per-repository operations with failure isolation
//! - **Scheduler**: startup, installed-only and full sweeps
//! - **Critical guard**: forced uninstall and host restart for critical advisories
//! - **Blacklist enforcer**: drops blacklisted repositories that are not installed
//!
//! # Example
//!
//! ```rust,no_run
//! use custodian_core::{CommonState, ReconciliationScheduler, SchedulerConfig, Services};
//!
//! # async fn example(services: Services) -> custodian_core::Result<()> {
//! let scheduler =
//!     ReconciliationScheduler::restore(services, CommonState::default(), SchedulerConfig::default())
//!         .await?;
//! let handle = scheduler.handle();
//! tokio::spawn(scheduler.run());
//!
//! handle.run_now(custodian_core::SweepKind::Full).await?;
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```
pub mod blacklist;
pub mod context;
pub mod discovery;
pub mod error;
pub mod guard;
pub mod models;
pub mod notify;
pub mod persist;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod traits;

pub use blacklist::{BlacklistEnforcer, EnforcementReport};
pub use context::{
    BlacklistSet, CommonState, RemovalLedger, Services, StatusSnapshot, SyncContext, SystemStatus,
};
pub use discovery::{DiscoveryReport, load_known_repositories};
pub use error::{Result, SyncError};
pub use guard::{CriticalRepositoryGuard, GuardOutcome};
pub use models::{
    AdvisoryRecord, Category, CriticalAdvisory, RateBudget, Removal, RemovalType, RepositoryEntry,
    RepositoryRecord, RepositoryState, SweepKind,
};
pub use notify::{BroadcastBus, Notification, Topic};
pub use persist::{CRITICAL_KEY, JsonFileStore, REPOSITORIES_KEY};
pub use registry::RepositoryRegistry;
pub use runner::{BatchSummary, ConcurrencyLimit, RepositoryTask, TaskBatch, TaskRunner};
pub use scheduler::{ReconciliationScheduler, SchedulerConfig, SchedulerHandle};
pub use traits::{
    BLACKLIST_LIST, HostControl, NotificationBus, PersistentStore, RemoteSource,
    RepositoryOperations,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
