//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::time::Duration;

use log::{info, warn};

use crate::config::EngineConfig;
use crate::dsp::{FilterKind, FILTER_NAMES};
use crate::engine::file_checksum;
use crate::error::Result;
use crate::pipeline::VoiceEngine;

/// Load the config file if one was given, defaults otherwise
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            info!("Loading config: {}", path.display());
            EngineConfig::from_file(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

/// Run one job and report where the output went.
pub fn process(mut config: EngineConfig, input: &Path, filter: &str, seed: Option<u64>) -> Result<()> {
    if seed.is_some() {
        config.noise_seed = seed;
    }
    let engine = VoiceEngine::new(config)?;

    let result = engine.process(input, filter);

    println!("Output:   {}", result.output_path.display());
    println!("Filter:   {} (requested '{}')", result.applied, result.requested);
    println!("Stage:    {}", result.stage);
    println!("Elapsed:  {:.1?}", result.elapsed);

    if let Some(failure) = &result.failure {
        warn!(
            "{} at {} ({}): {}",
            failure.category.as_str(),
            failure.stage,
            failure.code,
            failure.message
        );
        println!("Failure:  {} ({})", failure.code, failure.message);
    }

    if result.is_fallback() {
        println!("Processing unavailable, original audio returned.");
    } else {
        println!("SHA-256:  {}", file_checksum(&result.output_path)?);
    }

    Ok(())
}

/// Print every filter with its configured parameters.
pub fn list_filters(config: &EngineConfig) -> Result<()> {
    for name in FILTER_NAMES {
        let spec = config.filters.spec_for(FilterKind::from_name(name));
        println!("{}", serde_json::to_string_pretty(&spec)?);
    }
    println!("Any other name runs as {}.", FilterKind::PassThrough);
    Ok(())
}

/// Remove a delivered artifact.
pub fn cleanup(config: EngineConfig, path: &Path) -> Result<()> {
    let engine = VoiceEngine::new(config)?;

    if engine.cleanup(path) {
        println!("Released: {}", path.display());
    } else {
        println!("Not an engine artifact, left in place: {}", path.display());
    }

    Ok(())
}

/// Reclaim stale job workspaces.
pub fn sweep(config: EngineConfig, max_age_secs: Option<u64>) -> Result<()> {
    let max_age = Duration::from_secs(max_age_secs.unwrap_or(config.stale_after_secs));
    let engine = VoiceEngine::new(config)?;

    let removed = engine.sweep_stale(max_age);
    println!("Removed {} stale entries", removed);

    Ok(())
}

/// Print the SHA-256 of a file.
pub fn checksum(path: &Path) -> Result<()> {
    println!("{}  {}", file_checksum(path)?, path.display());
    Ok(())
}
