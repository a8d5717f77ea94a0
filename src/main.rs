//! VoiceFX CLI
//!
//! Command-line interface for the voice effect engine.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use voicefx::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("VoiceFX v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Some(cmd) => handle_command(cmd, config),
        None => {
            println!("VoiceFX v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands, config: voicefx::EngineConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Process {
            input,
            filter,
            seed,
        } => commands::process(config, &input, &filter, seed)
            .with_context(|| format!("processing {}", input.display()))?,
        Commands::Filters => commands::list_filters(&config)?,
        Commands::Cleanup { path } => commands::cleanup(config, &path)?,
        Commands::Sweep { max_age_secs } => commands::sweep(config, max_age_secs)?,
        Commands::Checksum { path } => commands::checksum(&path)
            .with_context(|| format!("hashing {}", path.display()))?,
    }
    Ok(())
}
