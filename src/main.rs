use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use leadflow::config::LeadflowConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "leadflow")]
#[command(version, about = "Sales pipeline board for the terminal")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to leadflow.toml (default: ./leadflow.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// CRM server base URL (overrides config and env)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Disable the persistence cache for this run
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the pipeline board
    Show {
        /// Filter leads by name, phone, or email
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show derived pipeline statistics
    Stats,
    /// Move a lead to another stage
    Move {
        /// Lead id
        id: i64,
        /// Target stage (new, contacted, interested, quoted, converted, lost)
        stage: String,
    },
    /// Follow the board live, refreshing in the background
    Watch,
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Initialize a default leadflow.toml file
    Init,
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "leadflow=debug"
    } else {
        "leadflow=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = LeadflowConfig::with_cli_args(
        cli.config.clone(),
        cli.base_url.clone(),
        cli.no_cache,
    )?;

    match &cli.command {
        Commands::Show { search } => cmd::cmd_show(&config, search.as_deref()).await?,
        Commands::Stats => cmd::cmd_stats(&config).await?,
        Commands::Move { id, stage } => cmd::cmd_move(&config, *id, stage).await?,
        Commands::Watch => cmd::cmd_watch(&config).await?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
