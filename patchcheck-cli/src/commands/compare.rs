use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Context;
use clap::Args;
use signal_hook::consts::SIGINT;
use tracing::info;

use patchcheck_core::git::GitHistory;
use patchcheck_core::pipeline::{CompareOptions, ComparePipeline, RunStatus};

use super::MailArgs;

#[derive(Args, Debug)]
pub struct CompareArgs {
    #[command(flatten)]
    pub mail: MailArgs,
    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
    /// Upstream repository (overrides `upstream.repo_path`)
    #[arg(long)]
    pub repo: Option<PathBuf>,
    /// End of the follow-up fix search (overrides `upstream.fixes_until`)
    #[arg(long)]
    pub until: Option<String>,
    /// Skip the follow-up fix search
    #[arg(long)]
    pub no_fixes: bool,
}

pub fn run(args: CompareArgs) -> anyhow::Result<()> {
    let mut config = args.mail.load_config()?;
    if let Some(until) = args.until {
        config.upstream.fixes_until = until;
    }
    if args.no_fixes {
        config.upstream.find_fixes = false;
    }

    let repo_path = args
        .repo
        .unwrap_or_else(|| config.upstream.expanded_repo_path());
    let history = GitHistory::open(&repo_path)
        .with_context(|| format!("Cannot open upstream repository {}", repo_path.display()))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&interrupted))
        .context("Cannot install interrupt handler")?;

    let series = args.mail.select_series(&config)?;
    let mut pipeline = ComparePipeline::new(&history, CompareOptions::from(&config));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let status = if args.format == "json" {
        let mut reports = Vec::with_capacity(series.len());
        let status = pipeline.run(&series, &interrupted, |report| {
            reports.push(report.clone());
            Ok(())
        })?;
        serde_json::to_writer_pretty(&mut out, &reports).context("Cannot write JSON report")?;
        writeln!(out)?;
        status
    } else {
        pipeline.run(&series, &interrupted, |report| {
            write!(out, "{report}")?;
            out.flush()
        })?
    };

    if status == RunStatus::Interrupted {
        info!("Interrupted");
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
