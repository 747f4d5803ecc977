use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote source unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Operation on repository '{repository}' failed: {reason}")]
    RepositoryOperationFailed { repository: String, reason: String },

    #[error("Failed to persist '{key}': {reason}")]
    PersistenceFailure { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid repository name: {0}")]
    InvalidRepositoryName(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Scheduler is not running")]
    SchedulerStopped,

    #[error("Startup sweep has already run")]
    StartupAlreadyRun,
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn operation_failed(repository: impl Into<String>, reason: impl ToString) -> Self {
        SyncError::RepositoryOperationFailed {
            repository: repository.into(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(key: impl Into<String>, reason: impl ToString) -> Self {
        SyncError::PersistenceFailure {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Failures that degrade to an empty result instead of failing the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteUnavailable(_) | SyncError::RepositoryOperationFailed { .. }
        )
    }

    /// Failures that are allowed to end a sweep early.
    pub fn aborts_sweep(&self) -> bool {
        matches!(self, SyncError::PersistenceFailure { .. })
    }
}
