/// Top-level patchcheck error type.
///
/// All fallible operations in `patchcheck-core` return [`Result<T, PatchcheckError>`](Result).
/// Each variant wraps a domain-specific error enum, allowing callers to
/// match on the error source without losing type information.
#[derive(thiserror::Error, Debug)]
pub enum PatchcheckError {
    /// Error from the mail index collaborator (notmuch invocation, mbox parsing).
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    /// Error from the version-control collaborator (object lookup, diff, log).
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// A patch body or a computed commit diff is not a valid unified diff.
    #[error("Diff error: {0}")]
    Diff(#[from] DiffError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Writing a report or mailbox to its destination failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the mail index and mailbox handling.
#[derive(thiserror::Error, Debug)]
pub enum MailError {
    /// The mail index binary could not be started.
    #[error("Cannot run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The mail index binary exited with a failure status.
    #[error("{program} exited with {status}: {stderr}")]
    Command {
        /// Program that failed.
        program: String,
        /// Exit status as reported by the OS.
        status: String,
        /// Captured standard error output.
        stderr: String,
    },

    /// Filesystem or pipe I/O failed while staging or writing a mailbox.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be parsed as RFC 822.
    #[error("Cannot parse message: {0}")]
    Parse(String),
}

/// Errors from the git history collaborator.
#[derive(thiserror::Error, Debug)]
pub enum GitError {
    /// The repository could not be opened.
    #[error("Cannot open repository {path}: {message}")]
    Open {
        /// Repository path that was tried.
        path: String,
        /// Description of the failure.
        message: String,
    },

    /// The id does not name any object in the repository.
    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    /// The id is not a valid hexadecimal object name.
    #[error("Invalid object id: {0}")]
    InvalidId(String),

    /// A `git` subprocess failed.
    #[error("git {args} failed: {stderr}")]
    Command {
        /// Arguments passed to git.
        args: String,
        /// Captured standard error output.
        stderr: String,
    },

    /// Object database or traversal failure inside gix.
    #[error("{0}")]
    Backend(String),

    /// Filesystem I/O error while talking to git.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by the unified-diff parser.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    /// The input violates the unified diff grammar.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number of the offending input line.
        line: usize,
        /// Description of the failure.
        message: String,
    },
}

/// Errors in patchcheck configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience alias for `Result<T, PatchcheckError>`.
pub type Result<T> = std::result::Result<T, PatchcheckError>;
