//! CLI command implementations

pub mod auth;
pub mod completions;
pub mod config;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tracing::debug;

use cdsync_core::config::Config;

/// Load the configuration file, or the defaults if it does not exist
///
/// A file that exists but cannot be parsed is an error.
pub(crate) fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "No configuration file, using defaults");
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Expand a leading `~` to the home directory
pub(crate) fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
