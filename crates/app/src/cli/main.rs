//! Switchboard CLI Application

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use switchboard_core::domain::{
    ControlSession, DefaultsContext, DeviceDirectory, SwitchboardConfig, SyncDriver,
};
use switchboard_infra::{CpalHost, ObsWebSocket};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(about = "Point OBS audio sources at the right host devices", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report current assignments, then apply the configured routes
    Sync,
    /// Report what each special source currently uses
    Report {
        /// Also print the raw device id stored on each source
        #[arg(long)]
        with_ids: bool,
    },
    /// List host audio devices
    Devices {
        /// Include native ids
        #[arg(long)]
        with_ids: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let directory = DeviceDirectory::new(Arc::new(CpalHost::new()));

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Devices { with_ids } => {
            tracing::info!("\n{}", directory.device_listing(with_ids)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Report { with_ids } => {
            let config = load_config(cli.config).await?;
            let mut driver = driver(&config, directory)?;
            let result = driver.report().await;
            let mut session = driver.into_session();
            let states = match (&result, with_ids) {
                (Ok(_), true) => Some(session.source_states().await),
                _ => None,
            };
            session.disconnect().await?;
            result?;

            if let Some(states) = states {
                for (role, state) in states? {
                    tracing::info!(role = %role, "{} is set to '{}'", state.source_name, state.device_id);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sync => {
            let config = load_config(cli.config).await?;
            tracing::info!("\n{}", directory.device_listing(false)?);

            let mut driver = driver(&config, directory)?;
            let summary = driver.run(&config.routes()).await?;
            if summary.skipped() > 0 {
                tracing::warn!(skipped = summary.skipped(), "Some routes were not applied");
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn load_config(path: Option<PathBuf>) -> anyhow::Result<SwitchboardConfig> {
    match path {
        Some(path) => SwitchboardConfig::load_from_file(&path)
            .await
            .with_context(|| format!("loading {}", path.display())),
        None => {
            let path = SwitchboardConfig::default_path()?;
            if !path.exists() {
                tracing::info!(path = %path.display(), "Config file not found, using defaults");
                return Ok(SwitchboardConfig::default());
            }
            SwitchboardConfig::load_from_file(&path)
                .await
                .with_context(|| format!("loading {}", path.display()))
        }
    }
}

fn driver(
    config: &SwitchboardConfig,
    directory: DeviceDirectory,
) -> anyhow::Result<SyncDriver<ObsWebSocket>> {
    let defaults: DefaultsContext = directory
        .defaults_from_host(config.defaults.input.as_deref(), config.defaults.output.as_deref())
        .context("determining default devices")?;
    let session = ControlSession::new(ObsWebSocket::from_config(&config.controller));
    Ok(SyncDriver::new(directory, session, defaults))
}
