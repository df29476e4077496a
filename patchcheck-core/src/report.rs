use std::fmt;

use serde::Serialize;

use crate::types::{FixCandidate, UnresolvedReference};

/// Result of checking one patch of a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    /// Subject with whitespace normalized.
    pub subject: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The body names no upstream commit.
    NoUpstreamReference,
    /// The named commit is absent from the upstream repository.
    UpstreamNotFound { upstream: String },
    /// The patch or the upstream diff could not be parsed.
    MalformedDiff { upstream: String, reason: String },
    Compared {
        upstream: String,
        commit_prefix: String,
        drift: Vec<String>,
        fixes: Vec<FixCandidate>,
        unresolved: Vec<UnresolvedReference>,
    },
}

impl PatchReport {
    pub fn new(subject: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            subject: subject.into(),
            outcome,
        }
    }

    /// True when the text rendering is empty: a clean backport with nothing
    /// to follow up.
    pub fn is_clean(&self) -> bool {
        match &self.outcome {
            Outcome::Compared {
                drift,
                fixes,
                unresolved,
                ..
            } => drift.is_empty() && fixes.is_empty() && unresolved.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for PatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = &self.subject;
        match &self.outcome {
            Outcome::NoUpstreamReference => {
                writeln!(f, "{subject}:")?;
                writeln!(f, "  No upstream commit ID in message")
            }
            Outcome::UpstreamNotFound { upstream } => {
                writeln!(f, "{subject}:")?;
                writeln!(f, "  Couldn't find upstream commit {upstream}")
            }
            Outcome::MalformedDiff { upstream, reason } => {
                writeln!(f, "{subject} (upstream {upstream}):")?;
                writeln!(f, "  Couldn't parse diff: {reason}")
            }
            Outcome::Compared { .. } if self.is_clean() => Ok(()),
            Outcome::Compared {
                upstream,
                commit_prefix,
                drift,
                fixes,
                unresolved,
            } => {
                writeln!(f, "{subject} (upstream {upstream}):")?;
                if !drift.is_empty() {
                    writeln!(f, "  {}", drift.join("\n  "))?;
                }
                writeln!(f, "  {}", commit_prefix.replace('\n', "\n  "))?;
                if !fixes.is_empty() {
                    writeln!(f)?;
                    writeln!(f, "  Possible fixes on top of this:")?;
                    for fix in fixes {
                        writeln!(f, "  {} {}", fix.id, fix.summary)?;
                    }
                }
                if !unresolved.is_empty() {
                    writeln!(f)?;
                    writeln!(f, "  Unresolved stable references:")?;
                    for reference in unresolved {
                        writeln!(f, "  {} -> {}", reference.commit, reference.referenced)?;
                    }
                }
                writeln!(f)?;
                writeln!(f)
            }
        }
    }
}
