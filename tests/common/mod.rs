//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use deeprelease_core::classifier::FastTextWeights;
use deeprelease_core::collector::MergedPullRequestRef;
use deeprelease_core::config::{ArtifactPaths, OutputConfig};
use deeprelease_core::summarizer::network::NetworkWeights;
use deeprelease_core::{
    DeepReleaseConfig, DeepReleaseError, HostingClient, ModelParams, PullRequestInfo, Result,
    RetryPolicy, Vocab,
};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use tempfile::TempDir;

/// Words of the test vocabulary, after the reserved tokens
pub const VOCAB_WORDS: &[&str] = &[
    ".", "fix", "crash", "in", "parser", "add", "beam", "search", "docs", "for", "config",
    "update", "dependencies", "handle", "empty", "input",
];

/// Labels of the test classifier, in output row order
pub const LABELS: &[&str] = &["__label__F", "__label__B", "__label__D", "__label__N"];

/// Small model dimensions that keep tests fast
pub fn tiny_params() -> ModelParams {
    ModelParams {
        hidden_dim: 4,
        embed_dim: 3,
        vocab_size: 50,
        max_enc_steps: 20,
        max_dec_steps: 6,
        min_dec_steps: 0,
        beam_size: 2,
        ..Default::default()
    }
}

/// Vocabulary over [`VOCAB_WORDS`]
pub fn tiny_vocab() -> Vocab {
    Vocab::from_words(VOCAB_WORDS.iter().copied(), 0).expect("test vocabulary")
}

/// Seeded random network matching [`tiny_params`] and [`tiny_vocab`]
pub fn seeded_weights(seed: u64) -> NetworkWeights {
    let mut rng = StdRng::seed_from_u64(seed);
    NetworkWeights::initialize(&tiny_params(), tiny_vocab().size(), &mut rng)
}

/// Classifier whose words each vote for exactly one label
///
/// `fix`/`crash` vote B, `add`/`beam`/`search` vote F, `docs` votes D and
/// `update`/`dependencies` vote N.
pub fn one_hot_classifier() -> FastTextWeights {
    let votes: &[(&str, Option<usize>)] = &[
        ("fix", Some(1)),
        ("crash", Some(1)),
        ("add", Some(0)),
        ("beam", Some(0)),
        ("search", Some(0)),
        ("docs", Some(2)),
        ("update", Some(3)),
        ("dependencies", Some(3)),
        ("</s>", None),
    ];

    let dim = LABELS.len();
    let mut input = Array2::<f32>::zeros((votes.len(), dim));
    for (row, (_, label)) in votes.iter().enumerate() {
        if let Some(label) = label {
            input[[row, *label]] = 1.0;
        }
    }

    FastTextWeights {
        words: votes.iter().map(|(w, _)| w.to_string()).collect(),
        labels: LABELS.iter().map(|l| l.to_string()).collect(),
        input,
        output: Array2::eye(dim),
        word_ngrams: 1,
        bucket: 0,
    }
}

/// Write vocabulary, network and classifier artifacts into `dir`
pub fn write_artifacts(dir: &Path) -> ArtifactPaths {
    let paths = ArtifactPaths {
        vocab_path: dir.join("vocab.txt"),
        model_path: dir.join("pg_network.bin"),
        classifier_path: dir.join("fasttext.bin"),
    };

    let vocab_file: String = VOCAB_WORDS
        .iter()
        .enumerate()
        .map(|(i, w)| format!("{} {}\n", w, 1000 - i))
        .collect();
    std::fs::write(&paths.vocab_path, vocab_file).expect("write vocabulary");
    seeded_weights(7).save(&paths.model_path).expect("write network");
    one_hot_classifier()
        .save(&paths.classifier_path)
        .expect("write classifier");
    paths
}

/// Config pointing at freshly written artifacts, writing output into the same temp dir
pub fn test_config(dir: &TempDir) -> DeepReleaseConfig {
    DeepReleaseConfig {
        model: tiny_params(),
        artifacts: write_artifacts(dir.path()),
        retry: RetryPolicy::none(),
        output: OutputConfig {
            save_dir: dir.path().join("notes"),
            save_name: "release".to_string(),
            order: "FBDN".to_string(),
        },
        ..Default::default()
    }
}

/// Hosting client serving a fixed list of merged pull requests for `foo/bar`
pub struct MockHostingClient {
    pub pull_requests: Vec<(u64, PullRequestInfo)>,
    pub template: String,
    /// Extra history entries pointing at pull requests of other repositories
    pub foreign_urls: Vec<String>,
}

impl MockHostingClient {
    pub fn new(pull_requests: Vec<(u64, PullRequestInfo)>) -> Self {
        Self {
            pull_requests,
            template: String::new(),
            foreign_urls: Vec::new(),
        }
    }
}

/// Raw pull request fields with a single commit message
pub fn info(title: &str, body: &str, commit: &str) -> PullRequestInfo {
    PullRequestInfo {
        title: title.to_string(),
        body_text: body.to_string(),
        commit_messages: vec![commit.to_string()],
    }
}

#[async_trait]
impl HostingClient for MockHostingClient {
    async fn get_last_release(&self, _owner: &str, _name: &str) -> Result<(String, String)> {
        Ok(("v0.1.0".to_string(), "202201010000".to_string()))
    }

    async fn get_pull_requests_during(
        &self,
        owner: &str,
        name: &str,
        _since: &str,
        _until: Option<&str>,
    ) -> Result<Vec<MergedPullRequestRef>> {
        Ok(self
            .pull_requests
            .iter()
            .map(|(number, _)| MergedPullRequestRef {
                oid: format!("{:040x}", number),
                url: format!("https://github.com/{}/{}/pull/{}", owner, name, number),
            })
            .chain(self.foreign_urls.iter().map(|url| MergedPullRequestRef {
                oid: "f".repeat(40),
                url: url.clone(),
            }))
            .collect())
    }

    async fn get_pull_request_info(
        &self,
        _owner: &str,
        _name: &str,
        number: u64,
    ) -> Result<PullRequestInfo> {
        self.pull_requests
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, info)| info.clone())
            .ok_or_else(|| DeepReleaseError::HostingApi(format!("pull request {} not found", number)))
    }

    async fn get_template_content(&self, _owner: &str, _name: &str) -> Result<String> {
        Ok(self.template.clone())
    }
}
