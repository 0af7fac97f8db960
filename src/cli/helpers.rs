//! Shared helper functions for CLI commands
//!
//! Repository argument parsing, date validation and configuration loading
//! with command-line overrides.

use deeprelease_core::collector::url::parse_date;
use deeprelease_core::config::validate_order;
use deeprelease_core::{DeepReleaseConfig, DeepReleaseError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "deeprelease.toml";

/// Split an `owner/name` repository argument
pub fn split_owner_repo(repo: &str) -> Result<(String, String)> {
    let trimmed = repo.trim().trim_end_matches('/');
    match trimmed.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => Err(DeepReleaseError::Config(format!(
            "repository must be given as owner/name, got '{}'",
            repo
        ))),
    }
}

/// Whether an optional `--until` value is absent or a valid `YYYYMMDDHHMM` date
pub fn validate_date_format(date: Option<&str>) -> bool {
    date.map_or(true, |d| parse_date(d).is_ok())
}

/// Resolve the config file: explicit path, then `deeprelease.toml` in the working directory
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    cli_path.map(Path::to_path_buf).or_else(|| {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    })
}

/// Load layered configuration for a command
pub fn load_config(cli_path: Option<&Path>) -> Result<DeepReleaseConfig> {
    let path = resolve_config_path(cli_path);
    match &path {
        Some(p) => debug!("Using config file {}", p.display()),
        None => debug!("No config file found, using defaults"),
    }
    let mut config = DeepReleaseConfig::load(path.as_deref())?;
    config.artifacts = config.artifacts.or_data_dir();
    Ok(config)
}

/// Output overrides accepted by `run`
#[derive(Debug, Default)]
pub struct OutputOverrides {
    pub token: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub name: Option<String>,
    pub order: Option<String>,
}

impl OutputOverrides {
    /// Apply overrides on top of a loaded configuration
    pub fn apply(self, config: &mut DeepReleaseConfig) -> Result<()> {
        if let Some(token) = self.token {
            config.github.token = Some(token);
        }
        if let Some(dir) = self.output_dir {
            config.output.save_dir = dir;
        }
        if let Some(name) = self.name {
            config.output.save_name = name;
        }
        if let Some(order) = self.order {
            let order = order.to_uppercase();
            validate_order(&order)?;
            config.output.order = order;
        }
        Ok(())
    }
}
