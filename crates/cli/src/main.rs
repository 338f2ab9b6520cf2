use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use calendar_core::{AppConfig, ConfigLoader};
use calendar_manager::PositionManager;
use clap::{Parser, Subcommand};

mod commands;
mod wiring;

use commands::{AddArgs, AdjustArgs};

#[derive(Parser)]
#[command(name = "calendar-monitor")]
#[command(about = "Monitor double calendar option spreads and alert on profit targets", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config/Config.toml")]
    config: PathBuf,

    /// Profile overlay (loads Config.<profile>.toml next to the config file)
    #[arg(long, global = true, env = "CALMON_PROFILE")]
    profile: Option<String>,

    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitoring loop until Ctrl+C
    Run {
        /// Reload the config file on change (applies a new poll interval)
        #[arg(long)]
        watch_config: bool,
    },
    /// Run a single monitoring cycle and print the dashboard
    Once,
    /// List registered positions
    List,
    /// Register a double calendar (replaces an existing ticker)
    Add(AddArgs),
    /// Add an adjustment calendar to a position
    Adjust(AdjustArgs),
    /// Remove a position and its history
    Remove {
        /// Ticker to remove
        ticker: String,
    },
}

fn init_logging(log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let config = match &cli.profile {
        Some(profile) => ConfigLoader::load_with_profile(&cli.config, profile),
        None => ConfigLoader::load_from(&cli.config),
    }
    .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    tracing::debug!(
        path = %cli.config.display(),
        profile = ?cli.profile,
        backend = ?config.storage.backend,
        poll_secs = config.monitor.poll_interval_secs,
        "Configuration loaded"
    );
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run { watch_config } => {
            commands::run_monitor(config, cli.config, cli.profile, watch_config).await?;
        }
        Commands::Once => {
            commands::run_once(config).await?;
        }
        Commands::List => {
            let manager = PositionManager::new(wiring::build_store(&config).await?);
            commands::run_list(&manager).await?;
        }
        Commands::Add(args) => {
            let manager = PositionManager::new(wiring::build_store(&config).await?);
            commands::run_add(&manager, args).await?;
        }
        Commands::Adjust(args) => {
            let manager = PositionManager::new(wiring::build_store(&config).await?);
            commands::run_adjust(&manager, args).await?;
        }
        Commands::Remove { ticker } => {
            let manager = PositionManager::new(wiring::build_store(&config).await?);
            commands::run_remove(&manager, &ticker).await?;
        }
    }

    Ok(())
}
