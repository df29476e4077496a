//! Locating and resolving the upstream commit a backport claims.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::DiffSection;
use crate::diff::PatchSet;
use crate::error::{DiffError, GitError, Result};
use crate::git::CommitHistory;
use crate::types::{CommitRef, SeenCommits};

/// `commit <40 hex>` at the start of a line, as stable backports cite
/// their origin.
static UPSTREAM_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^commit ([0-9a-f]{40})").unwrap());

/// Stable-tree back-reference inside an upstream-looking commit message.
static STABLE_BACKREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)upstream commit ([0-9a-f]{40})|([0-9a-f]{40}) upstream").unwrap()
});

/// The upstream commit a patch body names, with the text preceding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamClaim {
    pub id: String,
    /// Body text before the `commit` line.
    pub commit_prefix: String,
}

/// Finds the first `commit <id>` line in a patch body.
pub fn find_claim(body: &str) -> Option<UpstreamClaim> {
    let captures = UPSTREAM_LINE.captures(body)?;
    let whole = captures.get(0)?;
    Some(UpstreamClaim {
        id: captures.get(1)?.as_str().to_string(),
        commit_prefix: body[..whole.start()].to_string(),
    })
}

/// Id named by a stable-tree back-reference in `message`, lowercased.
pub fn stable_backref(message: &str) -> Option<String> {
    let captures = STABLE_BACKREF.captures(message)?;
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Outcome of resolving a claim against the upstream history.
#[derive(Debug)]
pub enum Resolution {
    Resolved { commit: CommitRef, diff: PatchSet },
    NotFound { id: String },
    MalformedDiff { commit: CommitRef, error: DiffError },
}

/// Looks up the claimed commit and parses its diff against the first parent.
///
/// A found commit is recorded in `seen`, so a later patch's fix search does
/// not report it. Errors other than a missing commit are propagated.
pub fn resolve(
    history: &dyn CommitHistory,
    claim: &UpstreamClaim,
    options: DiffSection,
    seen: &mut SeenCommits,
) -> Result<Resolution> {
    let commit = match history.resolve(&claim.id) {
        Ok(commit) => commit,
        Err(GitError::CommitNotFound(_)) => {
            debug!(id = %claim.id, "Upstream commit not found");
            return Ok(Resolution::NotFound {
                id: claim.id.clone(),
            });
        }
        Err(e) => return Err(e.into()),
    };
    seen.insert(&commit.id);

    let text = history.diff_against_parent(&commit.id, options)?;
    match PatchSet::parse(&text) {
        Ok(diff) => {
            debug!(id = %commit.id, files = diff.len(), "Resolved upstream commit");
            Ok(Resolution::Resolved { commit, diff })
        }
        Err(error) => Ok(Resolution::MalformedDiff { commit, error }),
    }
}
