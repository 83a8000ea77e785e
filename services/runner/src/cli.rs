use crate::commands::{run_once, show_status, update_credentials};
use auto_apply::config::AppConfig;
use auto_apply::error::AppError;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "auto-apply",
    about = "Apply to newly posted jobs from a recruiting platform feed, one run per invocation",
    version
)]
struct Cli {
    #[command(flatten)]
    paths: PathOverrides,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay deferred postings, scan the feed and apply (default command)
    Run(RunArgs),
    /// Show stored run state without contacting the platform
    Status,
    /// Install a fresh cookie export and mark the credentials valid again
    Credentials(CredentialsArgs),
}

/// Overrides for the state file locations taken from the environment.
#[derive(Args, Debug, Default)]
pub(crate) struct PathOverrides {
    /// Run configuration (auth flag, watermark, documents, cookies, feed URL)
    #[arg(long, global = true)]
    pub(crate) config_file: Option<PathBuf>,
    /// Postings deferred until their application window opens
    #[arg(long, global = true)]
    pub(crate) waitlist_file: Option<PathBuf>,
    /// Append-only CSV of submitted applications
    #[arg(long, global = true)]
    pub(crate) audit_file: Option<PathBuf>,
}

impl PathOverrides {
    pub(crate) fn apply(self, config: &mut AppConfig) {
        if let Some(path) = self.config_file {
            config.storage.config_file = path;
        }
        if let Some(path) = self.waitlist_file {
            config.storage.waitlist_file = path;
        }
        if let Some(path) = self.audit_file {
            config.storage.audit_file = path;
        }
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Print the run report as JSON instead of a summary line
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct CredentialsArgs {
    /// JSON object of cookie names to values exported from a signed-in browser
    #[arg(long)]
    pub(crate) cookies: PathBuf,
}

pub(crate) fn run() -> Result<ExitCode, AppError> {
    let cli = Cli::parse();
    dispatch(cli)
}

fn dispatch(cli: Cli) -> Result<ExitCode, AppError> {
    let mut config = AppConfig::load()?;
    cli.paths.apply(&mut config);

    match cli.command.unwrap_or_else(|| Command::Run(RunArgs::default())) {
        Command::Run(args) => run_once(&config, args),
        Command::Status => show_status(&config).map(|_| ExitCode::SUCCESS),
        Command::Credentials(args) => {
            update_credentials(&config, args).map(|_| ExitCode::SUCCESS)
        }
    }
}
