//! Summarize a single change description into one release note entry

use super::helpers::load_config;
use deeprelease_core::{EntrySummarizer, PullRequestInfo, Result};
use std::path::Path;
use tracing::debug;

/// Handle summarize command
pub async fn handle(
    config_path: Option<&Path>,
    title: String,
    description: String,
    commits: Vec<String>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let summarizer = EntrySummarizer::load(&config).await?;

    let article = PullRequestInfo {
        title,
        body_text: description,
        commit_messages: commits,
    }
    .article();
    debug!("Summarizing article: {}", article);

    let summary = tokio::task::spawn_blocking(move || summarizer.summarize_article(&article))
        .await
        .map_err(|e| anyhow::anyhow!("summarizer task failed: {}", e))??;
    println!("{}", summary);
    Ok(())
}
