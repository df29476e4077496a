use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A commit resolved in the upstream history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef {
    /// Full 40-character hex object id.
    pub id: String,
    /// First line of the commit message.
    pub summary: String,
    /// Paths touched relative to the first parent (both sides of renames).
    pub files: Vec<String>,
}

impl CommitRef {
    pub fn new(id: impl Into<String>, message: &str, files: Vec<String>) -> Self {
        Self {
            id: id.into(),
            summary: summary_of(message).to_string(),
            files,
        }
    }
}

/// First line of a commit message.
pub fn summary_of(message: &str) -> &str {
    message.lines().next().unwrap_or("").trim_end()
}

/// Commit ids already attributed to a patch during one comparison run.
///
/// Earlier patches claim commits first: once an id is in the set, neither
/// the resolver nor the fix finder reports it again for a later patch.
#[derive(Debug, Clone, Default)]
pub struct SeenCommits {
    ids: HashSet<String>,
}

impl SeenCommits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Records `id`; returns false if it was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A later upstream commit touching the same files as a backported one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixCandidate {
    pub id: String,
    pub summary: String,
}

/// A stable-tree back-reference whose target is missing from the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    /// Commit carrying the back-reference.
    pub commit: String,
    /// Id the back-reference points to.
    pub referenced: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_first_line() {
        assert_eq!(summary_of("net: fix foo\n\nLonger text\n"), "net: fix foo");
        assert_eq!(summary_of(""), "");
        let commit = CommitRef::new("a".repeat(40), "subject  \nbody", vec![]);
        assert_eq!(commit.summary, "subject");
    }

    #[test]
    fn seen_commits_insert_reports_novelty() {
        let mut seen = SeenCommits::new();
        assert!(seen.is_empty());
        assert!(seen.insert("abc"));
        assert!(!seen.insert("abc"));
        assert!(seen.contains("abc"));
        assert_eq!(seen.len(), 1);
    }
}
