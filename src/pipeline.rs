//! End-to-end release note generation
//!
//! collect pull requests → summarize each into an entry → classify each title
//! → check that entries and categories align → render Markdown.

use crate::classifier::CategoryClassifier;
use crate::collector::{HostingClient, PullRequestsCollector};
use crate::config::DeepReleaseConfig;
use crate::error::{DeepReleaseError, Result};
use crate::generator::MarkdownGenerator;
use crate::summarizer::EntrySummarizer;
use crate::types::{Entry, EntryCategory};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Release note generator bound to one hosting client and loaded models
pub struct DeepRelease {
    config: DeepReleaseConfig,
    client: Arc<dyn HostingClient>,
    summarizer: Arc<EntrySummarizer>,
    classifier: CategoryClassifier,
    generator: MarkdownGenerator,
}

impl DeepRelease {
    /// Load every model artifact; any failure after retries aborts
    pub async fn new(config: DeepReleaseConfig, client: Arc<dyn HostingClient>) -> Result<Self> {
        let summarizer = EntrySummarizer::load(&config).await?;
        let classifier = CategoryClassifier::load(&config).await?;
        Ok(Self::with_components(
            config,
            client,
            Arc::new(summarizer),
            classifier,
        ))
    }

    /// Assemble from already-loaded parts
    pub fn with_components(
        config: DeepReleaseConfig,
        client: Arc<dyn HostingClient>,
        summarizer: Arc<EntrySummarizer>,
        classifier: CategoryClassifier,
    ) -> Self {
        Self {
            config,
            client,
            summarizer,
            classifier,
            generator: MarkdownGenerator::new(),
        }
    }

    pub fn config(&self) -> &DeepReleaseConfig {
        &self.config
    }

    /// Generate release notes for `owner/repo` and return the written file
    ///
    /// `until` is a `YYYYMMDDHHMM` date; absent means now.
    pub async fn run(&self, owner: &str, repo: &str, until: Option<&str>) -> Result<PathBuf> {
        info!("Generating release notes for {}/{}", owner, repo);

        let collector = PullRequestsCollector::new(Arc::clone(&self.client), owner, repo);
        let pull_requests = collector.get_all_since_last_release(until).await?;
        if pull_requests.is_empty() {
            warn!("No pull requests merged since the last release of {}/{}", owner, repo);
        }

        let categories = self.classifier.classify(&pull_requests);
        let entries = self.summarizer.summarize_blocking(pull_requests).await?;

        check_alignment(&entries, &categories)?;

        let output = &self.config.output;
        self.generator.generate(
            &entries,
            &categories,
            &output.order,
            &output.save_dir,
            &output.save_name,
        )
    }
}

/// Entries and categories must carry the same identifiers, one each
pub fn check_alignment(entries: &[Entry], categories: &[EntryCategory]) -> Result<()> {
    if entries.len() != categories.len() {
        return Err(DeepReleaseError::Alignment(format!(
            "{} entries but {} categories",
            entries.len(),
            categories.len()
        )));
    }

    let entry_ids: HashSet<_> = entries.iter().map(|e| e.id).collect();
    let category_ids: HashSet<_> = categories.iter().map(|c| c.entry_id).collect();
    if entry_ids.len() != entries.len() || category_ids.len() != categories.len() {
        return Err(DeepReleaseError::Alignment(
            "duplicate identifiers among entries or categories".to_string(),
        ));
    }
    if entry_ids != category_ids {
        let mut missing: Vec<_> = entry_ids.symmetric_difference(&category_ids).collect();
        missing.sort();
        return Err(DeepReleaseError::Alignment(format!(
            "identifiers without a counterpart: {:?}",
            missing
        )));
    }
    Ok(())
}
