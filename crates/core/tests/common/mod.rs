//! In-memory collaborators shared by the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use custodian_core::{
    AdvisoryRecord, CRITICAL_KEY, Category, CommonState, CriticalAdvisory, HostControl,
    NotificationBus, PersistentStore, RateBudget, RemoteSource, RepositoryEntry,
    RepositoryOperations, RepositoryRegistry, RepositoryState, Result, Services, SyncContext,
    SyncError, SystemStatus, Topic,
};

/// Calls made to the fakes, in the order they happened
pub type Journal = Arc<Mutex<Vec<String>>>;

fn note(journal: &Journal, call: impl Into<String>) {
    journal.lock().unwrap().push(call.into());
}

#[derive(Default)]
pub struct FakeRemote {
    lists: Mutex<HashMap<String, Vec<String>>>,
    orgs: Mutex<HashMap<Category, Vec<String>>>,
    advisories: Mutex<Vec<CriticalAdvisory>>,
    journal: Journal,
    pub fail: AtomicBool,
    /// Report a spent API quota
    pub exhausted: AtomicBool,
    pub advisory_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub rate_calls: AtomicUsize,
}

impl FakeRemote {
    pub fn set_list(&self, list: &str, names: &[&str]) {
        self.lists.lock().unwrap().insert(
            list.to_string(),
            names.iter().map(|name| name.to_string()).collect(),
        );
    }

    pub fn set_org(&self, category: Category, names: &[&str]) {
        self.orgs.lock().unwrap().insert(
            category,
            names.iter().map(|name| name.to_string()).collect(),
        );
    }

    pub fn set_advisories(&self, advisories: Vec<CriticalAdvisory>) {
        *self.advisories.lock().unwrap() = advisories;
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn get_default_lists(&self, list: &str) -> Result<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        note(&self.journal, format!("list {}", list));
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::RemoteUnavailable("offline".to_string()));
        }
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(list)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_org_repositories(&self, category: Category) -> Result<Vec<String>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::RemoteUnavailable("offline".to_string()));
        }
        Ok(self
            .orgs
            .lock()
            .unwrap()
            .get(&category)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_critical_advisories(&self) -> Result<Vec<CriticalAdvisory>> {
        self.advisory_calls.fetch_add(1, Ordering::SeqCst);
        note(&self.journal, "critical");
        if self.fail.load(Ordering::SeqCst) {
            return Err(SyncError::RemoteUnavailable("offline".to_string()));
        }
        Ok(self.advisories.lock().unwrap().clone())
    }

    async fn rate_budget(&self) -> Result<RateBudget> {
        self.rate_calls.fetch_add(1, Ordering::SeqCst);
        note(&self.journal, "rate");
        let remaining = if self.exhausted.load(Ordering::SeqCst) {
            0
        } else {
            4999
        };
        Ok(RateBudget {
            remaining,
            reset_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    saves: Mutex<HashMap<String, usize>>,
    journal: Journal,
    pub fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn saves(&self, key: &str) -> usize {
        self.saves.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.values.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn advisories(&self) -> Vec<AdvisoryRecord> {
        self.value(CRITICAL_KEY)
            .map(|value| serde_json::from_value(value).unwrap())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Value>> {
        note(&self.journal, format!("load {}", key));
        Ok(self.value(key))
    }

    async fn save(&self, key: &str, value: Value) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SyncError::persistence(key, "disk full"));
        }
        *self.saves.lock().unwrap().entry(key.to_string()).or_default() += 1;
        self.insert(key, value);
        Ok(())
    }
}

/// Records every event together with the background flag at publish time
#[derive(Default)]
pub struct RecordingBus {
    pub events: Mutex<Vec<(Topic, Value)>>,
    pub alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingBus {
    pub fn topics(&self) -> Vec<Topic> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, _)| *topic)
            .collect()
    }

    pub fn background_flags(&self) -> Vec<bool> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(topic, _)| *topic == Topic::Status)
            .map(|(_, payload)| payload["background_task"].as_bool().unwrap())
            .collect()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

impl NotificationBus for RecordingBus {
    fn publish(&self, topic: Topic, payload: Value) {
        self.events.lock().unwrap().push((topic, payload));
    }

    fn urgent_alert(&self, title: &str, message: &str) {
        self.alerts
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

#[derive(Default)]
pub struct FakeHost {
    pub restarts: Mutex<Vec<Duration>>,
}

impl FakeHost {
    pub fn restart_count(&self) -> usize {
        self.restarts.lock().unwrap().len()
    }
}

impl HostControl for FakeHost {
    fn request_restart(&self, delay: Duration) {
        self.restarts.lock().unwrap().push(delay);
    }
}

/// Operations that only touch the entry they are given
#[derive(Default)]
pub struct FakeOperations {
    pub updated: Mutex<Vec<String>>,
    pub refreshed: Mutex<Vec<String>>,
    pub registered: Mutex<Vec<String>>,
    pub uninstalled: Mutex<Vec<String>>,
    pub failing: Mutex<Vec<String>>,
    pub panicking: Mutex<Vec<String>>,
    /// Background flag seen by the last operation
    pub status: Mutex<Option<Arc<SystemStatus>>>,
    pub saw_background_task: AtomicBool,
    journal: Journal,
}

impl FakeOperations {
    pub fn fail_on(&self, full_name: &str) {
        self.failing.lock().unwrap().push(full_name.to_string());
    }

    pub fn panic_on(&self, full_name: &str) {
        self.panicking.lock().unwrap().push(full_name.to_string());
    }

    pub fn watch(&self, status: Arc<SystemStatus>) {
        *self.status.lock().unwrap() = Some(status);
    }

    pub fn updated(&self) -> Vec<String> {
        let mut updated = self.updated.lock().unwrap().clone();
        updated.sort();
        updated
    }

    pub fn uninstalled(&self) -> Vec<String> {
        self.uninstalled.lock().unwrap().clone()
    }

    fn check(&self, full_name: &str) -> Result<()> {
        if let Some(status) = self.status.lock().unwrap().as_ref() {
            if status.background_task() {
                self.saw_background_task.store(true, Ordering::SeqCst);
            }
        }
        if self.panicking.lock().unwrap().iter().any(|n| n == full_name) {
            panic!("operation on {} panicked", full_name);
        }
        if self.failing.lock().unwrap().iter().any(|n| n == full_name) {
            return Err(SyncError::operation_failed(full_name, "not found"));
        }
        Ok(())
    }
}

#[async_trait]
impl RepositoryOperations for FakeOperations {
    async fn update(&self, repository: &RepositoryEntry) -> Result<()> {
        note(&self.journal, format!("update {}", repository.full_name()));
        self.check(repository.full_name())?;
        repository.state_mut().await.available_version = Some("2.0.0".to_string());
        self.updated
            .lock()
            .unwrap()
            .push(repository.full_name().to_string());
        Ok(())
    }

    async fn refresh_common(&self, repository: &RepositoryEntry) -> Result<()> {
        self.check(repository.full_name())?;
        self.refreshed
            .lock()
            .unwrap()
            .push(repository.full_name().to_string());
        Ok(())
    }

    async fn register(&self, full_name: &str, category: Category) -> Result<RepositoryEntry> {
        note(&self.journal, format!("register {}", full_name));
        self.check(full_name)?;
        self.registered.lock().unwrap().push(full_name.to_string());
        RepositoryEntry::new(full_name, category)
    }

    async fn uninstall(&self, repository: &RepositoryEntry) -> Result<()> {
        self.check(repository.full_name())?;
        let mut state = repository.state_mut().await;
        state.installed = false;
        state.installed_version = None;
        self.uninstalled
            .lock()
            .unwrap()
            .push(repository.full_name().to_string());
        Ok(())
    }
}

/// Fakes plus the [`Services`] bundle built from them
pub struct Harness {
    pub remote: Arc<FakeRemote>,
    pub store: Arc<MemoryStore>,
    pub bus: Arc<RecordingBus>,
    pub host: Arc<FakeHost>,
    pub operations: Arc<FakeOperations>,
    pub journal: Journal,
}

impl Harness {
    pub fn new() -> Self {
        let journal = Journal::default();
        Self {
            remote: Arc::new(FakeRemote {
                journal: Arc::clone(&journal),
                ..Default::default()
            }),
            store: Arc::new(MemoryStore {
                journal: Arc::clone(&journal),
                ..Default::default()
            }),
            bus: Arc::new(RecordingBus::default()),
            host: Arc::new(FakeHost::default()),
            operations: Arc::new(FakeOperations {
                journal: Arc::clone(&journal),
                ..Default::default()
            }),
            journal,
        }
    }

    /// Journal entries reduced to the kind of call, with repeats collapsed
    pub fn call_phases(&self) -> Vec<String> {
        let mut phases: Vec<String> = Vec::new();
        for call in self.journal.lock().unwrap().iter() {
            let phase = match call.split_once(' ') {
                Some(("list", "blacklist")) => "blacklist".to_string(),
                Some(("list", _)) => "lists".to_string(),
                Some(("load", _)) => call.clone(),
                Some((kind, _)) => kind.to_string(),
                None => call.clone(),
            };
            if phases.last() != Some(&phase) {
                phases.push(phase);
            }
        }
        phases
    }

    pub fn services(&self) -> Services {
        self.services_with_store(self.store.clone())
    }

    /// Services that persist through `store` instead of the in-memory fake
    pub fn services_with_store(&self, store: Arc<dyn PersistentStore>) -> Services {
        Services {
            remote: self.remote.clone(),
            store,
            bus: self.bus.clone(),
            host: self.host.clone(),
            operations: self.operations.clone(),
        }
    }
}

pub fn advisory(repository: &str, reason: &str) -> CriticalAdvisory {
    CriticalAdvisory {
        repository: repository.to_string(),
        reason: reason.to_string(),
        link: format!("https://example.com/advisories/{}", repository),
    }
}

pub fn installed(full_name: &str, category: Category) -> RepositoryEntry {
    RepositoryEntry::with_state(
        full_name,
        category,
        RepositoryState {
            installed: true,
            installed_version: Some("1.0.0".to_string()),
            ..Default::default()
        },
    )
    .unwrap()
}

pub fn available(full_name: &str, category: Category) -> RepositoryEntry {
    RepositoryEntry::new(full_name, category).unwrap()
}

/// Context holding the given entries, with every category active
pub async fn context_with(entries: Vec<RepositoryEntry>) -> SyncContext {
    let mut registry = RepositoryRegistry::new();
    for entry in entries {
        assert!(registry.register(entry, false).await);
    }
    SyncContext::new(registry, CommonState::default())
}
