use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tokenomics::core::log::init_logging;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for tokenomics::AppCommand {
    fn from(cmd: Commands) -> tokenomics::AppCommand {
        match cmd {
            Commands::Fetch { address, json } => tokenomics::AppCommand::Fetch { address, json },
            Commands::Serve => tokenomics::AppCommand::Serve,
            Commands::ClearCache => tokenomics::AppCommand::ClearCache,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display aggregated tokenomics for the configured asset
    Fetch {
        /// Asset address to query instead of the configured one
        #[arg(short, long)]
        address: Option<String>,

        /// Print the JSON envelope instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Serve the tokenomics HTTP API
    Serve,
    /// Remove all cached tokenomics records
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.command {
        Some(Commands::Serve) => LevelFilter::INFO,
        _ => LevelFilter::WARN,
    };
    init_logging(cli.verbose, default_level);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => tokenomics::cli::setup::setup_at_path(path),
            None => tokenomics::cli::setup::setup(),
        },
        Some(cmd) => tokenomics::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
