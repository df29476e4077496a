use std::io::{self, Write};

use anyhow::Context;
use clap::Args;
use tracing::info;

use patchcheck_core::extract::stage_series;

use super::MailArgs;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub mail: MailArgs,
}

pub fn run(args: ExtractArgs) -> anyhow::Result<()> {
    let config = args.mail.load_config()?;
    let series = args.mail.select_series(&config)?;
    if series.is_empty() {
        info!("No patches matched the query");
        return Ok(());
    }

    let mut staged = stage_series(&series, &mut io::stderr().lock()).context("Cannot stage mbox")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    io::copy(&mut staged, &mut out).context("Cannot write mbox")?;
    out.flush()?;
    Ok(())
}
