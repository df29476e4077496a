use std::path::{Path, PathBuf};
use std::process::Command;

use gix::bstr::ByteSlice;
use tracing::{debug, instrument};

use super::CommitHistory;
use crate::config::DiffSection;
use crate::error::GitError;
use crate::types::CommitRef;

/// [`CommitHistory`] over an on-disk repository.
///
/// Object lookups and tree diffs go through gix. Textual diffs and
/// path-limited revision lists come from the `git` binary.
pub struct GitHistory {
    repo: gix::Repository,
    path: PathBuf,
}

impl std::fmt::Debug for GitHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHistory").field("path", &self.path).finish_non_exhaustive()
    }
}

impl GitHistory {
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = gix::open(path).map_err(|e| GitError::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "Opened upstream repository");
        Ok(Self {
            repo,
            path: path.to_path_buf(),
        })
    }

    fn find_commit(&self, id: &str) -> Result<gix::Commit<'_>, GitError> {
        let oid = gix::ObjectId::from_hex(id.as_bytes())
            .map_err(|_| GitError::InvalidId(id.to_string()))?;
        let object = self
            .repo
            .try_find_object(oid)
            .map_err(|e| GitError::Backend(e.to_string()))?
            .ok_or_else(|| GitError::CommitNotFound(id.to_string()))?;
        object
            .try_into_commit()
            .map_err(|_| GitError::CommitNotFound(id.to_string()))
    }

    /// File paths changed by `commit` relative to its first parent. Both sides of
    /// a rename are included.
    fn touched_files(&self, commit: &gix::Commit<'_>) -> Result<Vec<String>, GitError> {
        let tree = commit.tree().map_err(|e| GitError::Backend(e.to_string()))?;
        let parent_tree = commit
            .parent_ids()
            .next()
            .and_then(|parent_id| parent_id.object().ok()?.try_into_commit().ok()?.tree().ok());
        let base = match parent_tree {
            Some(ref parent) => parent,
            None => &self.repo.empty_tree(),
        };

        let mut files: Vec<String> = Vec::new();
        let mut push = |path: &gix::bstr::BStr| {
            let path = path.to_str_lossy().into_owned();
            if !files.contains(&path) {
                files.push(path);
            }
        };

        let mut platform = base.changes().map_err(|e| GitError::Backend(e.to_string()))?;
        platform
            .for_each_to_obtain_tree(&tree, |change| {
                use gix::object::tree::diff::Change;
                match change {
                    Change::Addition { location, entry_mode, .. }
                    | Change::Deletion { location, entry_mode, .. }
                    | Change::Modification { location, entry_mode, .. } => {
                        if !entry_mode.is_tree() {
                            push(location);
                        }
                    }
                    Change::Rewrite {
                        source_location,
                        location,
                        entry_mode,
                        ..
                    } => {
                        if !entry_mode.is_tree() {
                            push(source_location);
                            push(location);
                        }
                    }
                }
                Ok::<_, std::convert::Infallible>(std::ops::ControlFlow::Continue(()))
            })
            .map_err(|e| GitError::Backend(format!("tree diff: {e}")))?;

        Ok(files)
    }

    fn git(&self, args: &[&str]) -> Result<String, GitError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()?;
        if !output.status.success() {
            return Err(GitError::Command {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl CommitHistory for GitHistory {
    #[instrument(skip(self), level = "debug")]
    fn resolve(&self, id: &str) -> Result<CommitRef, GitError> {
        let commit = self.find_commit(id)?;
        let message = commit.message_raw_sloppy().to_string();
        let files = self.touched_files(&commit)?;
        Ok(CommitRef::new(commit.id().to_string(), &message, files))
    }

    fn diff_against_parent(&self, id: &str, options: DiffSection) -> Result<String, GitError> {
        let parent = format!("{id}~1");
        let mut args = vec!["diff", "--no-color", "--no-ext-diff"];
        if options.ignore_blank_lines {
            args.push("--ignore-blank-lines");
        }
        if options.ignore_space_at_eol {
            args.push("--ignore-space-at-eol");
        }
        args.extend([parent.as_str(), id]);
        self.git(&args)
    }

    fn commits_since(&self, since: &str, until: &str, paths: &[String]) -> Result<Vec<String>, GitError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let range = format!("{since}..{until}");
        let mut args = vec!["rev-list", range.as_str(), "--"];
        args.extend(paths.iter().map(String::as_str));
        let stdout = self.git(&args)?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn message(&self, id: &str) -> Result<String, GitError> {
        let commit = self.find_commit(id)?;
        Ok(commit.message_raw_sloppy().to_string())
    }
}
