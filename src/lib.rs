//! DeepRelease - release notes from merged pull requests
//!
//! Collects the pull requests merged since a repository's last release,
//! summarizes each one into a single change entry with a pointer-generator
//! network, assigns a category with a fastText classifier, and renders the
//! result as Markdown grouped by category.
//!
//! # Architecture
//!
//! - **Collector**: hosting API client and pull request gathering
//! - **Preprocess**: deterministic cleaning of titles, descriptions and commits
//! - **Summarizer**: vocabulary, batching, network, beam and greedy decoding
//! - **Classifier**: fastText-compatible title classification
//! - **Generator**: category grouping and Markdown rendering
//! - **Pipeline**: the end-to-end [`DeepRelease`] run
//!
//! # Example
//!
//! ```ignore
//! use deeprelease_core::{DeepRelease, DeepReleaseConfig, GithubClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> deeprelease_core::Result<()> {
//!     let config = DeepReleaseConfig::load(None)?;
//!     let client = Arc::new(GithubClient::new(config.github.clone())?);
//!     let release = DeepRelease::new(config, client).await?;
//!     let path = release.run("apache", "skywalking-python", None).await?;
//!     println!("{}", path.display());
//!     Ok(())
//! }
//! ```

pub mod classifier;
pub mod collector;
pub mod config;
pub mod error;
pub mod generator;
pub mod loader;
pub mod pipeline;
pub mod preprocess;
pub mod summarizer;
pub mod types;

// Re-export commonly used types
pub use classifier::{CategoryClassifier, FastTextModel};
pub use collector::{GithubClient, HostingClient, PullRequestsCollector};
pub use config::{DecodeParams, DecodeStrategy, DeepReleaseConfig, ModelParams, RetryPolicy};
pub use error::{DeepReleaseError, Result};
pub use generator::MarkdownGenerator;
pub use pipeline::DeepRelease;
pub use summarizer::{BeamSearch, EntrySummarizer, PointerGeneratorNetwork, Seq2SeqModel, Vocab};
pub use types::{Category, Entry, EntryCategory, Group, PullRequest, PullRequestInfo};
