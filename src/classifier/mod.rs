//! Category classification of pull request titles

pub mod fasttext;

pub use fasttext::{FastTextModel, FastTextWeights};

use crate::config::DeepReleaseConfig;
use crate::error::{DeepReleaseError, Result};
use crate::loader::load_with_retry;
use crate::types::{Category, EntryCategory, PullRequest};
use std::sync::Arc;
use tracing::{debug, warn};

/// Length of the `__label__` marker fastText puts in front of every label
pub const LABEL_PREFIX_LEN: usize = 9;

/// Map a raw classifier label to a category
pub fn convert_label_to_category(label: &str) -> Result<Category> {
    let stripped = label
        .get(LABEL_PREFIX_LEN..)
        .ok_or_else(|| DeepReleaseError::Classification(format!("label too short: '{}'", label)))?;
    Category::from_label(stripped)
        .ok_or_else(|| DeepReleaseError::Classification(format!("unknown category '{}'", stripped)))
}

/// Assigns a category to each pull request title
pub struct CategoryClassifier {
    model: Arc<FastTextModel>,
}

impl CategoryClassifier {
    pub fn new(model: Arc<FastTextModel>) -> Self {
        Self { model }
    }

    /// Load the classifier artifact, retrying per the configured policy
    pub async fn load(config: &DeepReleaseConfig) -> Result<Self> {
        let path = config.artifacts.classifier_path.clone();
        let model = load_with_retry("classifier", &config.retry, || FastTextModel::load(&path)).await?;
        Ok(Self::new(Arc::new(model)))
    }

    /// Category of one preprocessed title
    pub fn predict(&self, title: &str) -> Result<Category> {
        let (label, prob) = self.model.predict(title)?;
        debug!("'{}' -> {} ({:.3})", title, label, prob);
        convert_label_to_category(&label)
    }

    /// Categories in input order; items that fail are logged and skipped
    pub fn classify(&self, pull_requests: &[PullRequest]) -> Vec<EntryCategory> {
        pull_requests
            .iter()
            .filter_map(|pr| {
                let title = pr.title_text();
                match self.predict(&title) {
                    Ok(category) => Some(EntryCategory::new(pr.id(), category)),
                    Err(e) => {
                        warn!("Error when classifying '{}': {}", title, e);
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_convert_label() {
        assert_eq!(convert_label_to_category("__label__B").unwrap(), Category::BugFixes);
        assert_eq!(convert_label_to_category("__label__F").unwrap(), Category::Features);
        assert!(convert_label_to_category("__label__X").is_err());
        assert!(convert_label_to_category("B").is_err());
    }

    #[test]
    fn test_classify_skips_failures() {
        let model = FastTextModel::new(FastTextWeights {
            words: vec!["fix".into(), "docs".into(), "weird".into()],
            labels: vec!["__label__B".into(), "__label__D".into(), "__label__Z".into()],
            input: Array2::eye(3),
            output: Array2::eye(3),
            word_ngrams: 1,
            bucket: 0,
        })
        .unwrap();
        let classifier = CategoryClassifier::new(Arc::new(model));

        let mut prs = Vec::new();
        for (n, title) in [(1, "fix crash"), (2, "weird thing"), (3, "update docs"), (4, "unseen")] {
            let mut pr =
                PullRequest::new(&format!("https://github.com/foo/bar/pull/{}", n), "c").unwrap();
            pr.title = title.split_whitespace().map(String::from).collect();
            prs.push(pr);
        }

        let categories = classifier.classify(&prs);
        assert_eq!(
            categories,
            vec![
                EntryCategory::new(1, Category::BugFixes),
                EntryCategory::new(3, Category::Documentation),
            ]
        );
    }
}
