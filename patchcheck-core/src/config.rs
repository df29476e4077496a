use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV: &str = "PATCHCHECK_CONFIG";

/// Top-level patchcheck configuration, matching `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchcheckConfig {
    #[serde(default)]
    pub upstream: UpstreamSection,
    #[serde(default)]
    pub diff: DiffSection,
    #[serde(default)]
    pub mail: MailSection,
}

impl PatchcheckConfig {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.repo_path.trim().is_empty() {
            return Err(ConfigError::Invalid("upstream.repo_path is empty".into()));
        }
        if self.upstream.fixes_until.trim().is_empty() {
            return Err(ConfigError::Invalid("upstream.fixes_until is empty".into()));
        }
        if self.mail.notmuch_args.is_empty() {
            return Err(ConfigError::Invalid("mail.notmuch_args is empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamSection {
    /// Repository holding the upstream commits; `~` is expanded.
    pub repo_path: String,
    /// End boundary (commit, tag or branch) for the follow-up fix search.
    pub fixes_until: String,
    pub find_fixes: bool,
}

impl UpstreamSection {
    pub fn expanded_repo_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.repo_path).into_owned())
    }
}

impl Default for UpstreamSection {
    fn default() -> Self {
        Self {
            repo_path: "~/build/linux".to_string(),
            fixes_until: "HEAD".to_string(),
            find_fixes: true,
        }
    }
}

/// Whitespace options handed to `git diff` when computing upstream diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffSection {
    pub ignore_blank_lines: bool,
    pub ignore_space_at_eol: bool,
}

impl Default for DiffSection {
    fn default() -> Self {
        Self {
            ignore_blank_lines: true,
            ignore_space_at_eol: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSection {
    /// Arguments placed between the notmuch binary and the query terms.
    pub notmuch_args: Vec<String>,
}

impl Default for MailSection {
    fn default() -> Self {
        Self {
            notmuch_args: vec!["show".into(), "--format=mbox".into()],
        }
    }
}
