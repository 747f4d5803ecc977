//! Explicit state shared by the reconciliation components.
//!
//! One [`SyncContext`] is owned by the scheduler and lent to each component for
//! the duration of a step. Collaborators are bundled in [`Services`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::models::{Category, Removal};
use crate::registry::RepositoryRegistry;
use crate::traits::{
    HostControl, NotificationBus, PersistentStore, RemoteSource, RepositoryOperations,
};

/// Names of blacklisted repositories, in the order they were first seen.
///
/// Only grows during a session.
#[derive(Debug, Clone, Default)]
pub struct BlacklistSet {
    names: Vec<String>,
}

impl BlacklistSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a name, returning whether it was new
    pub fn insert(&mut self, full_name: &str) -> bool {
        if self.contains(full_name) {
            return false;
        }
        self.names.push(full_name.to_string());
        true
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.names
            .iter()
            .any(|name| name.eq_ignore_ascii_case(full_name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Removal metadata for every repository pulled from circulation, known or not
#[derive(Debug, Clone, Default)]
pub struct RemovalLedger {
    removals: HashMap<String, Removal>,
}

impl RemovalLedger {
    pub fn get(&self, full_name: &str) -> Option<&Removal> {
        self.removals.get(&full_name.to_lowercase())
    }

    pub fn record(&mut self, full_name: &str, removal: Removal) {
        self.removals.insert(full_name.to_lowercase(), removal);
    }

    pub fn len(&self) -> usize {
        self.removals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty()
    }
}

/// Process-wide flags observed by front-ends
#[derive(Debug)]
pub struct SystemStatus {
    startup: AtomicBool,
    new: AtomicBool,
    background_task: AtomicBool,
    reloading_data: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub startup: bool,
    pub new: bool,
    pub background_task: bool,
    pub reloading_data: bool,
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self {
            startup: AtomicBool::new(true),
            new: AtomicBool::new(false),
            background_task: AtomicBool::new(false),
            reloading_data: AtomicBool::new(false),
        }
    }
}

impl SystemStatus {
    pub fn background_task(&self) -> bool {
        self.background_task.load(Ordering::SeqCst)
    }

    pub(crate) fn set_background_task(&self, value: bool) {
        self.background_task.store(value, Ordering::SeqCst);
    }

    pub fn startup(&self) -> bool {
        self.startup.load(Ordering::SeqCst)
    }

    pub fn is_new(&self) -> bool {
        self.new.load(Ordering::SeqCst)
    }

    pub fn set_new(&self, value: bool) {
        self.new.store(value, Ordering::SeqCst);
    }

    pub fn reloading_data(&self) -> bool {
        self.reloading_data.load(Ordering::SeqCst)
    }

    pub(crate) fn set_reloading_data(&self, value: bool) {
        self.reloading_data.store(value, Ordering::SeqCst);
    }

    pub(crate) fn finish_startup(&self) {
        self.startup.store(false, Ordering::SeqCst);
        self.new.store(false, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            startup: self.startup.load(Ordering::SeqCst),
            new: self.new.load(Ordering::SeqCst),
            background_task: self.background_task.load(Ordering::SeqCst),
            reloading_data: self.reloading_data.load(Ordering::SeqCst),
        }
    }
}

/// Lists shared by every repository
#[derive(Debug, Clone)]
pub struct CommonState {
    /// Categories that sweeps act on
    pub categories: Vec<Category>,
    pub blacklist: BlacklistSet,
    /// Every name seen in the default lists
    pub default: Vec<String>,
    pub removed: RemovalLedger,
}

impl CommonState {
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories,
            blacklist: BlacklistSet::new(),
            default: Vec::new(),
            removed: RemovalLedger::default(),
        }
    }

    pub fn is_active(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

impl Default for CommonState {
    fn default() -> Self {
        Self::new(Category::ALL.to_vec())
    }
}

/// Everything the reconciliation components mutate
#[derive(Debug)]
pub struct SyncContext {
    pub registry: RepositoryRegistry,
    pub common: CommonState,
    pub status: Arc<SystemStatus>,
}

impl SyncContext {
    pub fn new(registry: RepositoryRegistry, common: CommonState) -> Self {
        Self {
            registry,
            common,
            status: Arc::new(SystemStatus::default()),
        }
    }
}

/// Collaborators injected into the reconciliation components
#[derive(Clone)]
pub struct Services {
    pub remote: Arc<dyn RemoteSource>,
    pub store: Arc<dyn PersistentStore>,
    pub bus: Arc<dyn NotificationBus>,
    pub host: Arc<dyn HostControl>,
    pub operations: Arc<dyn RepositoryOperations>,
}
