//! Generate release notes for a repository

use super::helpers::{load_config, split_owner_repo, validate_date_format, OutputOverrides};
use deeprelease_core::{DeepRelease, DeepReleaseError, GithubClient, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Handle run command
pub async fn handle(
    config_path: Option<&Path>,
    repo: &str,
    until: Option<&str>,
    overrides: OutputOverrides,
) -> Result<()> {
    if !validate_date_format(until) {
        return Err(DeepReleaseError::InvalidDate(
            until.unwrap_or_default().to_string(),
        ));
    }
    let (owner, name) = split_owner_repo(repo)?;

    let mut config = load_config(config_path)?;
    overrides.apply(&mut config)?;

    let client = Arc::new(GithubClient::new(config.github.clone())?);
    let release = DeepRelease::new(config, client).await?;

    info!("Generating release notes for {}/{}", owner, name);
    let path = release.run(&owner, &name, until).await?;
    println!("Release notes written to {}", path.display());
    Ok(())
}
