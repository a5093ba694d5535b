use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use baton_trainer::config::ScoringStrategy;
use baton_trainer::{AppConfig, ReferenceBeatTimeline, ServerHandle};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "baton_server",
    about = "Motion-to-beat alignment server for handheld accelerometer devices"
)]
struct Cli {
    /// JSON configuration file (defaults apply when absent)
    #[arg(long, default_value = "baton_config.json")]
    config: PathBuf,

    /// JSON array of reference beat timestamps in seconds
    #[arg(long)]
    beats: PathBuf,

    /// Override the calibration port
    #[arg(long)]
    calibration_port: Option<u16>,

    /// Override the motion ingestion port
    #[arg(long)]
    motion_port: Option<u16>,

    /// Override the playback trigger port
    #[arg(long)]
    playback_port: Option<u16>,

    /// Override the scoring strategy
    #[arg(long, value_enum)]
    scoring: Option<ScoringStrategy>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = AppConfig::load_from_file(&cli.config);
    if let Some(port) = cli.calibration_port {
        config.network.calibration_port = port;
    }
    if let Some(port) = cli.motion_port {
        config.network.motion_port = port;
    }
    if let Some(port) = cli.playback_port {
        config.network.playback_port = port;
    }
    if let Some(strategy) = cli.scoring {
        config.scoring.strategy = strategy;
    }

    let timeline = ReferenceBeatTimeline::load_from_file(&cli.beats)
        .with_context(|| format!("loading reference beats from {}", cli.beats.display()))?;

    let handle = ServerHandle::new(config, timeline)?;
    handle.serve().await
}

fn init_logging() {
    let env_filter = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
