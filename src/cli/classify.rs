//! Classify a single pull request title

use super::helpers::load_config;
use deeprelease_core::preprocess::preprocess_title;
use deeprelease_core::{CategoryClassifier, Result};
use std::path::Path;

/// Handle classify command
pub async fn handle(config_path: Option<&Path>, title: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let classifier = CategoryClassifier::load(&config).await?;

    let category = classifier.predict(&preprocess_title(title).join(" "))?;
    println!("{} ({})", category, category.code());
    Ok(())
}
