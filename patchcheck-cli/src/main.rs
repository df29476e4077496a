use clap::Parser;
use patchcheck_core::error::{ConfigError, GitError, MailError, PatchcheckError};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "patchcheck",
    version,
    about = "Check stable backports against the upstream commits they claim"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Classify an error into a process exit code.
///
///   0: success
///   1: general error or bad usage
///   2: configuration error
///   3: upstream repository error
///   4: mail index error
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(err) = cause.downcast_ref::<PatchcheckError>() {
            return match err {
                PatchcheckError::Config(_) => 2,
                PatchcheckError::Git(_) => 3,
                PatchcheckError::Mail(_) => 4,
                PatchcheckError::Diff(_) | PatchcheckError::Io(_) => 1,
            };
        }
        if cause.is::<ConfigError>() {
            return 2;
        }
        if cause.is::<GitError>() {
            return 3;
        }
        if cause.is::<MailError>() {
            return 4;
        }
    }
    1
}

fn main() {
    // Usage errors exit 1 rather than clap's default 2, which is reserved
    // for configuration errors.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = i32::from(e.use_stderr());
            if let Err(io) = e.print() {
                eprintln!("Error: {io}");
            }
            std::process::exit(code);
        }
    };

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    match commands::run(cli.command) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}
