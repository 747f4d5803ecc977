//! GitHub-backed collaborators for the custodian reconciliation engine
//!
//! [`GitHubRemote`] reads the default lists, the blacklist and the critical
//! advisories from a data repository. [`GitHubOperations`] refreshes tracked
//! repositories from the GitHub API and removes installed files.

pub mod api;
pub mod error;
pub mod operations;
pub mod remote;

pub use api::{DEFAULT_API_URL, GitHubClient};
pub use error::{GitHubError, Result};
pub use operations::{GitHubOperations, RepositoryInfo};
pub use remote::{DEFAULT_DATA_REPOSITORY, GitHubRemote};
