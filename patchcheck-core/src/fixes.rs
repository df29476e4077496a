//! Follow-up fix search.
//!
//! After a commit lands upstream, later commits touching the same files are
//! often fixes for it. Those are candidates for backporting together with
//! the patch under review.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{GitError, Result};
use crate::git::CommitHistory;
use crate::types::{CommitRef, FixCandidate, SeenCommits, UnresolvedReference, summary_of};
use crate::upstream::stable_backref;

/// Candidates found after one upstream commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FixSearch {
    /// Oldest first.
    pub fixes: Vec<FixCandidate>,
    pub unresolved: Vec<UnresolvedReference>,
}

impl FixSearch {
    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty() && self.unresolved.is_empty()
    }
}

/// Walks `commit..until` restricted to the files `commit` touched.
///
/// Seen commits and merges are skipped; every candidate examined is marked
/// seen. A candidate that is itself a stable backport is replaced by the
/// upstream commit it references, which is subject to the same seen check.
pub fn find_fixes(
    history: &dyn CommitHistory,
    commit: &CommitRef,
    until: &str,
    seen: &mut SeenCommits,
) -> Result<FixSearch> {
    let mut search = FixSearch::default();
    let candidates = history.commits_since(&commit.id, until, &commit.files)?;
    debug!(id = %commit.id, until, candidates = candidates.len(), "Searching follow-up fixes");

    for id in candidates {
        if seen.contains(&id) {
            continue;
        }
        let message = history.message(&id)?;
        if message.starts_with("Merge") {
            continue;
        }
        seen.insert(&id);

        let fix = match stable_backref(&message) {
            None => FixCandidate {
                summary: summary_of(&message).to_string(),
                id,
            },
            Some(referenced) => {
                if seen.contains(&referenced) {
                    continue;
                }
                match history.resolve(&referenced) {
                    Ok(target) => {
                        seen.insert(&target.id);
                        FixCandidate {
                            id: target.id,
                            summary: target.summary,
                        }
                    }
                    Err(GitError::CommitNotFound(_)) => {
                        warn!(commit = %id, referenced = %referenced, "Stable back-reference does not resolve");
                        search.unresolved.push(UnresolvedReference { commit: id, referenced });
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };
        search.fixes.insert(0, fix);
    }
    Ok(search)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::DiffSection;

    fn id(n: u8) -> String {
        format!("{n:02x}").repeat(20)
    }

    /// History where every commit is listed after `since`, newest first.
    #[derive(Default)]
    struct FakeHistory {
        log: Vec<String>,
        messages: HashMap<String, String>,
    }

    impl FakeHistory {
        fn commit(mut self, id: String, message: &str) -> Self {
            self.messages.insert(id.clone(), message.to_string());
            self.log.push(id);
            self
        }

        fn object(mut self, id: String, message: &str) -> Self {
            self.messages.insert(id, message.to_string());
            self
        }
    }

    impl CommitHistory for FakeHistory {
        fn resolve(&self, id: &str) -> std::result::Result<CommitRef, GitError> {
            let message = self
                .messages
                .get(id)
                .ok_or_else(|| GitError::CommitNotFound(id.to_string()))?;
            Ok(CommitRef::new(id, message, vec!["f.c".into()]))
        }

        fn diff_against_parent(&self, _: &str, _: DiffSection) -> std::result::Result<String, GitError> {
            Ok(String::new())
        }

        fn commits_since(&self, _: &str, _: &str, _: &[String]) -> std::result::Result<Vec<String>, GitError> {
            Ok(self.log.clone())
        }

        fn message(&self, id: &str) -> std::result::Result<String, GitError> {
            self.resolve(id)?;
            Ok(self.messages[id].clone())
        }
    }

    fn base() -> CommitRef {
        CommitRef::new(id(0), "base change", vec!["f.c".into()])
    }

    #[test]
    fn candidates_come_back_oldest_first() {
        let history = FakeHistory::default()
            .commit(id(3), "third\n")
            .commit(id(2), "second\n")
            .commit(id(1), "first\n");
        let mut seen = SeenCommits::new();
        let search = find_fixes(&history, &base(), "HEAD", &mut seen).unwrap();

        let ids: Vec<_> = search.fixes.iter().map(|f| f.id.clone()).collect();
        assert_eq!(ids, [id(1), id(2), id(3)]);
        assert_eq!(search.fixes[0].summary, "first");
        assert!(seen.contains(&id(2)));
    }

    #[test]
    fn merges_and_seen_commits_are_skipped() {
        let history = FakeHistory::default()
            .commit(id(3), "Merge branch 'net'\n")
            .commit(id(2), "already reported\n")
            .commit(id(1), "fix\n");
        let mut seen = SeenCommits::new();
        seen.insert(&id(2));
        let search = find_fixes(&history, &base(), "HEAD", &mut seen).unwrap();

        assert_eq!(search.fixes, [FixCandidate { id: id(1), summary: "fix".into() }]);
        assert!(!seen.contains(&id(3)));
    }

    #[test]
    fn second_search_does_not_repeat_candidates() {
        let history = FakeHistory::default().commit(id(1), "fix\n");
        let mut seen = SeenCommits::new();
        assert_eq!(find_fixes(&history, &base(), "HEAD", &mut seen).unwrap().fixes.len(), 1);
        assert!(find_fixes(&history, &base(), "HEAD", &mut seen).unwrap().is_empty());
    }

    #[test]
    fn backport_is_replaced_by_its_upstream_commit() {
        let message = format!("net: fix\n\ncommit {} upstream.\n", id(9));
        let history = FakeHistory::default()
            .commit(id(1), &message)
            .object(id(9), "net: fix (upstream)\n");
        let mut seen = SeenCommits::new();
        let search = find_fixes(&history, &base(), "HEAD", &mut seen).unwrap();

        assert_eq!(search.fixes, [FixCandidate { id: id(9), summary: "net: fix (upstream)".into() }]);
        assert!(seen.contains(&id(1)));
        assert!(seen.contains(&id(9)));
    }

    #[test]
    fn backport_of_seen_commit_is_skipped() {
        let message = format!("net: fix\n\n[ Upstream commit {} ]\n", id(9));
        let history = FakeHistory::default()
            .commit(id(1), &message)
            .object(id(9), "net: fix\n");
        let mut seen = SeenCommits::new();
        seen.insert(&id(9));
        assert!(find_fixes(&history, &base(), "HEAD", &mut seen).unwrap().is_empty());
    }

    #[test]
    fn dangling_backref_is_recorded_as_unresolved() {
        let message = format!("net: fix\n\ncommit {} upstream.\n", id(9));
        let history = FakeHistory::default()
            .commit(id(2), "plain fix\n")
            .commit(id(1), &message);
        let mut seen = SeenCommits::new();
        let search = find_fixes(&history, &base(), "HEAD", &mut seen).unwrap();

        assert_eq!(search.fixes.len(), 1);
        assert_eq!(search.fixes[0].id, id(2));
        assert_eq!(
            search.unresolved,
            [UnresolvedReference { commit: id(1), referenced: id(9) }]
        );
    }
}
