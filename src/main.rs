use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mariusz::daemon::build_checks;
use mariusz::reactions::{self, BuildInfo};
use mariusz::{Config, Daemon};

/// Mariusz - hackerspace chat bot
#[derive(Parser)]
#[command(name = "mariusz", version, about)]
struct Cli {
    /// Path to a TOML config file (default: ~/.config/mariusz/config.toml)
    #[arg(short, long, env = "MARIUSZ_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every notification source once and print what would be announced
    Check,
    /// Print the reaction table
    Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,mariusz=info",
        1 => "info,mariusz=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let build = BuildInfo::detect();

    if let Some(Command::Commands) = cli.command {
        print!("{}", reactions::default_router(build)?.help_text());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(Command::Check) = cli.command {
        return check_sources(&config).await;
    }

    tracing::info!(version = %build.describe(), "starting mariusz");

    let daemon = Daemon::from_config(&config, build)?;
    daemon.run().await?;

    Ok(())
}

/// Preview every enabled notification without sending anything
async fn check_sources(config: &Config) -> anyhow::Result<()> {
    for check in build_checks(config)? {
        match check.preview().await {
            Ok(Some(text)) => println!("[{}]\n{text}\n", check.name()),
            Ok(None) => println!("[{}]\n(nothing to report)\n", check.name()),
            Err(e) => println!("[{}]\nerror: {e}\n", check.name()),
        }
    }
    Ok(())
}
