//! Validate configuration and report artifact availability

use super::helpers::load_config;
use deeprelease_core::{DeepReleaseError, Result};
use std::path::Path;

/// Handle check-config command
pub async fn handle(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;

    let rendered = toml::to_string_pretty(&config)
        .map_err(|e| DeepReleaseError::Config(format!("cannot render config: {}", e)))?;
    println!("{}", rendered);

    let artifacts = [
        ("vocabulary", &config.artifacts.vocab_path),
        ("summarizer weights", &config.artifacts.model_path),
        ("classifier weights", &config.artifacts.classifier_path),
    ];

    let mut missing = Vec::new();
    for (what, path) in artifacts {
        if path.exists() {
            println!(" {} found at {}", what, path.display());
        } else {
            println!(" {} missing at {}", what, path.display());
            missing.push(what);
        }
    }

    if config.github.token().is_none() {
        println!(" no GitHub token configured (set github.token or GITHUB_TOKEN)");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DeepReleaseError::Config(format!(
            "missing artifacts: {}",
            missing.join(", ")
        )))
    }
}
