//! Access to the upstream history.
//!
//! [`CommitHistory`] is the seam between the comparison pipeline and git:
//! [`GitHistory`] backs it with a real repository, tests substitute their
//! own implementations.

mod repo;

pub use repo::GitHistory;

use crate::config::DiffSection;
use crate::error::GitError;
use crate::types::CommitRef;

/// Read-only queries against an upstream repository.
pub trait CommitHistory {
    /// Looks up a full 40-hex commit id.
    ///
    /// Returns [`GitError::CommitNotFound`] when no such commit exists.
    fn resolve(&self, id: &str) -> Result<CommitRef, GitError>;

    /// Unified diff of `id` against its first parent.
    fn diff_against_parent(&self, id: &str, options: DiffSection) -> Result<String, GitError>;

    /// Commits reachable from `until` but not from `since` that touch any of
    /// `paths`, newest first.
    fn commits_since(&self, since: &str, until: &str, paths: &[String]) -> Result<Vec<String>, GitError>;

    /// Full commit message of `id`.
    fn message(&self, id: &str) -> Result<String, GitError>;
}
