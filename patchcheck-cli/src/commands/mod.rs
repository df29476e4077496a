pub mod compare;
pub mod extract;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use tracing::info;

use patchcheck_core::config::{CONFIG_ENV, PatchcheckConfig};
use patchcheck_core::mail::MailSource;
use patchcheck_core::mail::notmuch::NotmuchMailSource;
use patchcheck_core::series::PatchSeries;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compare each patch of a series with the upstream commit it names
    Compare(compare::CompareArgs),
    /// Write the newest revision of a series as an mbox for `git am`
    Extract(extract::ExtractArgs),
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Compare(args) => compare::run(args),
        Command::Extract(args) => extract::run(args),
    }
}

/// Mail index arguments shared by every subcommand.
#[derive(Args, Debug)]
pub struct MailArgs {
    /// Path to the notmuch binary
    pub notmuch: PathBuf,
    /// notmuch query terms selecting the series
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,
    /// Configuration file
    #[arg(long, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,
}

impl MailArgs {
    pub fn load_config(&self) -> anyhow::Result<PatchcheckConfig> {
        load_config(self.config.as_deref())
    }

    /// Runs the query and reduces the result to one series.
    pub fn select_series(&self, config: &PatchcheckConfig) -> anyhow::Result<PatchSeries> {
        let source = NotmuchMailSource::new(&self.notmuch, config.mail.notmuch_args.clone());
        let messages = source
            .query(&self.query)
            .with_context(|| format!("Cannot query mail index with {}", self.notmuch.display()))?;
        let total = messages.len();
        let series = PatchSeries::select(messages);
        info!(messages = total, patches = series.len(), "Series selected");
        Ok(series)
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PatchcheckConfig> {
    match path {
        Some(path) => PatchcheckConfig::load(path)
            .with_context(|| format!("Cannot load config {}", path.display())),
        None => Ok(PatchcheckConfig::default()),
    }
}
