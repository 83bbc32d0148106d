// src/config.rs

//! Configuration loading utilities.
//!
//! The TOML file is read with [`Config::load_or_default`], then a few
//! deployment settings can be overridden from the environment.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Overrides `[server] port`
pub const PORT_VAR: &str = "PORT";
/// Overrides `[cache] ttl_secs`
pub const CACHE_TTL_VAR: &str = "CACHE_TTL_SECS";

/// Load configuration from a TOML file and the process environment.
///
/// Falls back to defaults if the file cannot be loaded; malformed
/// environment values are errors.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_or_default(path);
    apply_env_overrides(config, |name| std::env::var(name).ok())
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(
    mut config: Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    if let Some(port) = lookup(PORT_VAR) {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("{PORT_VAR}={port:?}: {e}")))?;
        log::debug!("server port set to {} from {PORT_VAR}", config.server.port);
    }

    if let Some(ttl) = lookup(CACHE_TTL_VAR) {
        config.cache.ttl_secs = ttl
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("{CACHE_TTL_VAR}={ttl:?}: {e}")))?;
        log::debug!("cache TTL set to {}s from {CACHE_TTL_VAR}", config.cache.ttl_secs);
    }

    Ok(config)
}
