//! Configuration for DeepRelease
//!
//! A single validated struct populated once at startup. Every section rejects
//! unknown keys, so a typo in a config file fails at load time instead of
//! deep inside decoding.
//!
//! Sources, in increasing priority:
//! 1. Built-in defaults
//! 2. TOML file (`deeprelease.toml` or `--config`)
//! 3. Environment variables `DEEPRELEASE__<SECTION>__<KEY>`

use crate::error::{DeepReleaseError, Result};
use crate::types::Category;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix for layered configuration
const ENV_PREFIX: &str = "DEEPRELEASE";

/// Main DeepRelease configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeepReleaseConfig {
    /// Network hyperparameters and decode limits
    pub model: ModelParams,

    /// Beam search tuning
    pub decode: DecodeParams,

    /// Model artifact locations
    pub artifacts: ArtifactPaths,

    /// Retry policy for artifact loading
    pub retry: RetryPolicy,

    /// Hosting API settings
    pub github: GithubConfig,

    /// Release note output
    pub output: OutputConfig,
}

/// Pointer-generator hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelParams {
    pub hidden_dim: usize,
    pub embed_dim: usize,
    /// Upper bound on vocabulary entries read from the vocab file (reserved tokens included)
    pub vocab_size: usize,
    pub max_enc_steps: usize,
    pub max_dec_steps: usize,
    pub min_dec_steps: usize,
    pub beam_size: usize,
    /// Blend a copy distribution over input positions into the output
    pub pointer_gen: bool,
    /// Track a running sum of attention and feed it back into attention scores
    pub is_coverage: bool,
    pub cov_loss_wt: f32,
    pub eps: f32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            hidden_dim: 256,
            embed_dim: 128,
            vocab_size: 30000,
            max_enc_steps: 400,
            max_dec_steps: 100,
            min_dec_steps: 3,
            beam_size: 4,
            pointer_gen: true,
            is_coverage: false,
            cov_loss_wt: 1.0,
            eps: 1e-12,
        }
    }
}

/// How summaries are decoded from the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeStrategy {
    /// Beam search with `model.beam_size` hypotheses
    #[default]
    Beam,
    /// Argmax at every step
    Greedy,
}

/// Beam search tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeParams {
    pub strategy: DecodeStrategy,
    /// Suppress continuations that repeat a 3-gram already emitted by the beam
    pub ngram_filter: bool,
    /// Candidates per beam = multiplier × beam size, without the n-gram filter
    pub candidate_multiplier: usize,
    /// Candidates per beam = multiplier × beam size, with the n-gram filter
    pub filtered_candidate_multiplier: usize,
    /// Fewer pooled candidates than this in one step is logged as beam starvation
    pub starvation_threshold: Option<usize>,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            strategy: DecodeStrategy::Beam,
            ngram_filter: false,
            candidate_multiplier: 2,
            filtered_candidate_multiplier: 5,
            starvation_threshold: None,
        }
    }
}

impl DecodeParams {
    /// Number of top continuations considered per live beam
    pub fn candidate_beam_size(&self, beam_size: usize) -> usize {
        if self.ngram_filter {
            beam_size * self.filtered_candidate_multiplier
        } else {
            beam_size * self.candidate_multiplier
        }
    }

    /// Minimum pooled candidate count before a starvation error is logged
    pub fn starvation_threshold(&self, beam_size: usize) -> usize {
        self.starvation_threshold.unwrap_or(beam_size)
    }
}

/// Model artifact locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactPaths {
    pub vocab_path: PathBuf,
    pub model_path: PathBuf,
    pub classifier_path: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        let base = PathBuf::from("models");
        Self {
            vocab_path: base.join("vocab.txt"),
            model_path: base.join("pg_network.bin"),
            classifier_path: base.join("fasttext.bin"),
        }
    }
}

impl ArtifactPaths {
    /// Fall back to the data directory when the default relative paths hold no artifacts
    ///
    /// Paths set through a config file or the environment are kept as given.
    pub fn or_data_dir(self) -> Self {
        if self == Self::default() && !self.vocab_path.exists() {
            let fallback = Self::in_data_dir();
            debug!(
                "No artifacts under ./models, using {}",
                fallback.vocab_path.parent().unwrap_or(&fallback.vocab_path).display()
            );
            fallback
        } else {
            self
        }
    }

    /// Artifact paths rooted at the per-user data directory
    pub fn in_data_dir() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("deeprelease")
            .join("models");
        Self {
            vocab_path: base.join("vocab.txt"),
            model_path: base.join("pg_network.bin"),
            classifier_path: base.join("fasttext.bin"),
        }
    }
}

/// Bounded retry policy: at most `max_attempts` tries with a fixed delay between them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_secs: 30,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay_secs: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// Hosting API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GithubConfig {
    pub graphql_url: String,
    pub rest_url: String,
    /// Personal access token (falls back to GITHUB_TOKEN)
    pub token: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            graphql_url: "https://api.github.com/graphql".to_string(),
            rest_url: "https://api.github.com".to_string(),
            token: None,
        }
    }
}

impl GithubConfig {
    /// Resolve the access token from config, then environment
    pub fn token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()))
    }
}

/// Release note output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub save_dir: PathBuf,
    pub save_name: String,
    /// Category rendering order as code letters, e.g. "FBDN"
    pub order: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("."),
            save_name: "release-notes".to_string(),
            order: "FBDN".to_string(),
        }
    }
}

impl DeepReleaseConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: DeepReleaseConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults, then an optional TOML file, then `DEEPRELEASE__*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&DeepReleaseConfig::default())?);

        if let Some(path) = path {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let layered = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: DeepReleaseConfig = layered.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let m = &self.model;
        for (name, value) in [
            ("model.hidden_dim", m.hidden_dim),
            ("model.embed_dim", m.embed_dim),
            ("model.max_enc_steps", m.max_enc_steps),
            ("model.max_dec_steps", m.max_dec_steps),
            ("model.beam_size", m.beam_size),
        ] {
            if value == 0 {
                return Err(DeepReleaseError::Config(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        // 4 reserved ids plus at least one real word
        if m.vocab_size < 5 {
            return Err(DeepReleaseError::Config(
                "model.vocab_size must be at least 5".to_string(),
            ));
        }

        if m.min_dec_steps > m.max_dec_steps {
            return Err(DeepReleaseError::Config(format!(
                "model.min_dec_steps ({}) exceeds model.max_dec_steps ({})",
                m.min_dec_steps, m.max_dec_steps
            )));
        }

        if !(m.eps > 0.0 && m.eps.is_finite()) {
            return Err(DeepReleaseError::Config(
                "model.eps must be a positive finite number".to_string(),
            ));
        }

        if self.decode.candidate_multiplier == 0 || self.decode.filtered_candidate_multiplier == 0
        {
            return Err(DeepReleaseError::Config(
                "decode candidate multipliers must be at least 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(DeepReleaseError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        validate_order(&self.output.order)?;

        Ok(())
    }
}

/// Check that an order string lists distinct category code letters
pub fn validate_order(order: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for c in order.chars() {
        if Category::from_code(c).is_none() {
            return Err(DeepReleaseError::Config(format!(
                "output.order contains unknown category code '{}'",
                c
            )));
        }
        if !seen.insert(c) {
            return Err(DeepReleaseError::Config(format!(
                "output.order repeats category code '{}'",
                c
            )));
        }
    }
    Ok(())
}
