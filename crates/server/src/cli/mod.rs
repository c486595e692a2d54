pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};
use konsul_domain::config::Config;

/// konsul — a lightweight service-discovery and configuration registry.
#[derive(Debug, Parser)]
#[command(name = "konsul", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the server (default when no subcommand is given).
    Serve,
    /// Run diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load the configuration from the path named by `KONSUL_CONFIG` (or
/// `config.toml` by default), applying `KONSUL_*` environment overrides.
/// Missing file is not an error — defaults apply.
///
/// Shared by `serve`, `doctor`, and `config` so the loading logic lives
/// in one place.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("KONSUL_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = Config::load(Some(std::path::Path::new(&config_path)))
        .map_err(|e| anyhow::anyhow!("loading {config_path}: {e}"))?;
    Ok((config, config_path))
}
