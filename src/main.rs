mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::instrument::WithSubscriber;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "icalcombine")]
#[command(about = "Export CryptPad calendars and merge them into a single calendar.ics")]
struct Cli {
    /// Location of the config file
    #[arg(short, long, default_value = commands::DEFAULT_CONFIG_PATH)]
    configfile: PathBuf,

    /// Logging level (TRACE, DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[arg(short, long, default_value = "INFO")]
    loglevel: String,

    /// Disable colored log output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every configured calendar, then merge them (default)
    Run,
    /// Only download calendars into the download directory
    Download,
    /// Only merge the files already in the download directory
    Merge,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let dispatch = logging::build(&cli.loglevel, !cli.no_color)?;

    let result = run(cli).with_subscriber(dispatch.clone()).await;

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::dispatcher::with_default(&dispatch, || error!("{e:#}"));
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting icalcombine");

    let ctx = commands::RunContext::load(&cli.configfile)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run::run(&ctx).await,
        Commands::Download => commands::download::run(&ctx).await.map(|_| ()),
        Commands::Merge => commands::merge::run(&ctx),
    }
}
