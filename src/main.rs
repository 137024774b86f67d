mod config;
mod replay;

use anyhow::{Context, Result};
use clap::Parser;
use config::{ServerConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use replay::ReplayScript;
use std::path::PathBuf;
use tracing::info;
use voxelhost_server::Server;
use voxelhost_world::World;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless voxelhost container server", long_about = None)]
struct Args {
    /// Server configuration (TOML)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Packet script to replay against a fresh world
    #[arg(long)]
    script: Option<PathBuf>,
    /// Ticks to keep simulating after the last scripted step
    #[arg(long, default_value_t = 0)]
    settle_ticks: u64,
    /// Write the effective configuration to --config and exit
    #[arg(long)]
    write_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The configured filter applies unless RUST_LOG overrides it.
    let filter = ServerConfig::read(&args.config)
        .map(|config| config.log_filter)
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    info!("Starting voxelhost v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_from_path(&args.config);

    if args.write_config {
        config.save_to_path(&args.config)?;
        info!("Wrote configuration to {}", args.config.display());
        return Ok(());
    }

    let Some(script_path) = args.script else {
        anyhow::bail!("nothing to do: pass --script <file> or --write-config");
    };
    let script = ReplayScript::from_path(&script_path)?;

    let registry = config.load_registry()?;
    let mut server = Server::new(World::new(config.seed, registry), config.settings());
    let report = replay::run(&mut server, script, args.settle_ticks, config.tick_rate)
        .with_context(|| format!("replay of {} failed", script_path.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
