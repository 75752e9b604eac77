use anyhow::{Context, Result};
use seekpage::config::Config;
use seekpage::observability::init_tracing;

pub mod check;
pub mod entities;
pub mod token;

/// Load configuration from `path`, or from the standard search path
pub fn load_config(path: Option<&str>, verbose: bool) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {path}"))?,
        None => Config::load().context("failed to load configuration")?,
    };

    if verbose {
        config.service.log_level = "debug".to_string();
        init_tracing(&config)?;
    }

    Ok(config)
}
