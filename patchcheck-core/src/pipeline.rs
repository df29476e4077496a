//! Per-patch comparison driver.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, instrument, warn};

use crate::compare::compare;
use crate::config::{DiffSection, PatchcheckConfig};
use crate::error::Result;
use crate::fixes::{FixSearch, find_fixes};
use crate::git::CommitHistory;
use crate::report::{Outcome, PatchReport};
use crate::series::{PatchMessage, PatchSeries};
use crate::types::SeenCommits;
use crate::upstream::{self, Resolution};

/// Knobs for one comparison run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareOptions {
    pub diff: DiffSection,
    /// End boundary of the follow-up fix search.
    pub fixes_until: String,
    pub find_fixes: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self::from(&PatchcheckConfig::default())
    }
}

impl From<&PatchcheckConfig> for CompareOptions {
    fn from(config: &PatchcheckConfig) -> Self {
        Self {
            diff: config.diff,
            fixes_until: config.upstream.fixes_until.clone(),
            find_fixes: config.upstream.find_fixes,
        }
    }
}

/// How a run over a series ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Interrupted,
}

/// Checks the patches of a series one after another against upstream.
///
/// The pipeline owns the run's [`SeenCommits`]; patches must be processed in
/// series order for the fix attribution to come out right.
pub struct ComparePipeline<'h> {
    history: &'h dyn CommitHistory,
    options: CompareOptions,
    seen: SeenCommits,
}

impl std::fmt::Debug for ComparePipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparePipeline")
            .field("options", &self.options)
            .field("seen", &self.seen.len())
            .finish_non_exhaustive()
    }
}

impl<'h> ComparePipeline<'h> {
    pub fn new(history: &'h dyn CommitHistory, options: CompareOptions) -> Self {
        Self {
            history,
            options,
            seen: SeenCommits::new(),
        }
    }

    pub fn seen(&self) -> &SeenCommits {
        &self.seen
    }

    /// Resolves, compares and searches fixes for one patch.
    ///
    /// Missing references, missing commits and unparseable diffs become
    /// report outcomes; only collaborator failures are errors.
    #[instrument(skip_all, fields(subject = %patch.display_subject()))]
    pub fn process(&mut self, patch: &PatchMessage) -> Result<PatchReport> {
        let subject = patch.display_subject();
        let Some(claim) = upstream::find_claim(patch.body()) else {
            return Ok(PatchReport::new(subject, Outcome::NoUpstreamReference));
        };

        let (commit, upstream_diff) =
            match upstream::resolve(self.history, &claim, self.options.diff, &mut self.seen)? {
                Resolution::Resolved { commit, diff } => (commit, diff),
                Resolution::NotFound { id } => {
                    return Ok(PatchReport::new(subject, Outcome::UpstreamNotFound { upstream: id }));
                }
                Resolution::MalformedDiff { commit, error } => {
                    warn!(upstream = %commit.id, error = %error, "Upstream diff does not parse");
                    let outcome = Outcome::MalformedDiff {
                        upstream: commit.id,
                        reason: error.to_string(),
                    };
                    return Ok(PatchReport::new(subject, outcome));
                }
            };

        // The claimed commit is already in `seen` here, whether or not the
        // patch's own diff parses.
        let downstream = match patch.diff() {
            Ok(diff) => diff,
            Err(e) => {
                warn!(upstream = %commit.id, error = %e, "Patch diff does not parse");
                let outcome = Outcome::MalformedDiff {
                    upstream: commit.id,
                    reason: e.to_string(),
                };
                return Ok(PatchReport::new(subject, outcome));
            }
        };

        let drift = compare(&downstream, &upstream_diff);
        let search = if self.options.find_fixes {
            find_fixes(self.history, &commit, &self.options.fixes_until, &mut self.seen)?
        } else {
            FixSearch::default()
        };
        info!(
            upstream = %commit.id,
            drift = drift.len(),
            fixes = search.fixes.len(),
            "Compared patch"
        );

        Ok(PatchReport::new(
            subject,
            Outcome::Compared {
                upstream: commit.id,
                commit_prefix: claim.commit_prefix,
                drift,
                fixes: search.fixes,
                unresolved: search.unresolved,
            },
        ))
    }

    /// Processes `series` in order, handing each report to `emit`.
    ///
    /// `interrupted` is checked before each patch. A collaborator failure
    /// raised while the flag is set counts as an interruption, since an
    /// interactive Ctrl-C also kills the `git` child.
    pub fn run<F>(&mut self, series: &PatchSeries, interrupted: &AtomicBool, mut emit: F) -> Result<RunStatus>
    where
        F: FnMut(&PatchReport) -> std::io::Result<()>,
    {
        for patch in series {
            if interrupted.load(Ordering::SeqCst) {
                return Ok(RunStatus::Interrupted);
            }
            let report = match self.process(patch) {
                Ok(report) => report,
                Err(_) if interrupted.load(Ordering::SeqCst) => return Ok(RunStatus::Interrupted),
                Err(e) => return Err(e),
            };
            emit(&report)?;
        }
        Ok(RunStatus::Completed)
    }
}
