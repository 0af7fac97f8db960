//! Pull request summarization with a pointer-generator network
//!
//! - `vocab`: fixed vocabulary and article OOV bookkeeping
//! - `batch`: padded numeric batches
//! - `layers` / `network`: the encoder-decoder and its weights
//! - `beam`: beam search with optional 3-gram blocking
//! - `decode`: output extraction and greedy decoding
//! - `loss`: teacher-forced evaluation

pub mod batch;
pub mod beam;
pub mod decode;
pub mod layers;
pub mod loss;
pub mod network;
pub mod vocab;

pub use batch::{Batch, Example};
pub use beam::{BeamSearch, Hypothesis, NgramSet};
pub use network::{NetworkWeights, PointerGeneratorNetwork, Seq2SeqModel};
pub use vocab::Vocab;

use crate::config::{DecodeParams, DecodeStrategy, DeepReleaseConfig, ModelParams};
use crate::error::{DeepReleaseError, Result};
use crate::loader::load_with_retry;
use crate::types::{Entry, PullRequest};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns pull requests into one-line change entries
pub struct EntrySummarizer {
    vocab: Arc<Vocab>,
    model: Arc<dyn Seq2SeqModel>,
    params: ModelParams,
    decode: DecodeParams,
}

impl EntrySummarizer {
    pub fn new(
        vocab: Arc<Vocab>,
        model: Arc<dyn Seq2SeqModel>,
        params: ModelParams,
        decode: DecodeParams,
    ) -> Result<Self> {
        if model.vocab_size() != vocab.size() {
            return Err(DeepReleaseError::Model(format!(
                "model expects {} vocabulary entries, vocabulary has {}",
                model.vocab_size(),
                vocab.size()
            )));
        }
        Ok(Self {
            vocab,
            model,
            params,
            decode,
        })
    }

    /// Load vocabulary and network artifacts, retrying per the configured policy
    pub async fn load(config: &DeepReleaseConfig) -> Result<Self> {
        let params = config.model.clone();
        let vocab_path = config.artifacts.vocab_path.clone();
        let model_path = config.artifacts.model_path.clone();

        let vocab = load_with_retry("vocabulary", &config.retry, || {
            Vocab::from_file(&vocab_path, params.vocab_size)
        })
        .await?;

        let network = load_with_retry("pointer-generator network", &config.retry, || {
            PointerGeneratorNetwork::load(&model_path, &params, vocab.size())
        })
        .await?;

        info!(
            "Summarizer ready: {} vocabulary entries, beam size {}",
            vocab.size(),
            params.beam_size
        );
        Self::new(
            Arc::new(vocab),
            Arc::new(network),
            params,
            config.decode.clone(),
        )
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Summarize one whitespace-tokenized article
    pub fn summarize_article(&self, article: &str) -> Result<String> {
        let words = match self.decode.strategy {
            DecodeStrategy::Beam => {
                let batch = Batch::for_decode(article, &self.vocab, &self.params);
                let search = BeamSearch::new(self.model.as_ref(), &self.params, &self.decode);
                let best = search.search(&batch)?;
                decode::decoded_words(&best.tokens, &self.vocab, &batch.art_oovs[0])?
            }
            DecodeStrategy::Greedy => {
                let batch = Batch::from_articles(&[article], &self.vocab, &self.params);
                let ids = decode::greedy_decode(self.model.as_ref(), &batch, self.params.max_dec_steps)?;
                decode::decoded_words(&ids[0], &self.vocab, &batch.art_oovs[0])?
            }
        };
        Ok(words.join(" "))
    }

    /// One entry per pull request, in input order
    ///
    /// An id-space inconsistency aborts the whole call.
    pub fn summarize(&self, pull_requests: &[PullRequest]) -> Result<Vec<Entry>> {
        pull_requests
            .iter()
            .map(|pr| {
                let body = self.summarize_article(&pr.article())?;
                debug!("#{}: {}", pr.id(), body);
                Ok(Entry::new(pr.id(), body))
            })
            .collect()
    }

    /// Run [`summarize`](Self::summarize) on the blocking thread pool
    pub async fn summarize_blocking(
        self: &Arc<Self>,
        pull_requests: Vec<PullRequest>,
    ) -> Result<Vec<Entry>> {
        let summarizer = Arc::clone(self);
        tokio::task::spawn_blocking(move || summarizer.summarize(&pull_requests))
            .await
            .map_err(|e| DeepReleaseError::Other(format!("Summarization task panicked: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn summarizer(strategy: DecodeStrategy) -> EntrySummarizer {
        let vocab = Vocab::from_words(["fix", "crash", "in", "parser", "add"], 0).unwrap();
        let params = ModelParams {
            hidden_dim: 6,
            embed_dim: 4,
            max_dec_steps: 5,
            min_dec_steps: 0,
            beam_size: 2,
            ..ModelParams::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        let weights = NetworkWeights::initialize(&params, vocab.size(), &mut rng);
        let network = PointerGeneratorNetwork::new(weights, &params, vocab.size()).unwrap();
        let decode = DecodeParams {
            strategy,
            ..DecodeParams::default()
        };
        EntrySummarizer::new(Arc::new(vocab), Arc::new(network), params, decode).unwrap()
    }

    fn pull_request(number: u64, title: &[&str]) -> PullRequest {
        let mut pr =
            PullRequest::new(&format!("https://github.com/foo/bar/pull/{}", number), "c").unwrap();
        pr.title = title.iter().map(|w| w.to_string()).collect();
        pr
    }

    #[test]
    fn test_summarize_preserves_order_and_ids() {
        let s = summarizer(DecodeStrategy::Beam);
        let prs = vec![
            pull_request(3, &["fix", "crash", "in", "lexer"]),
            pull_request(1, &["add", "parser"]),
        ];
        let entries = s.summarize(&prs).unwrap();
        assert_eq!(entries.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3, 1]);
        for entry in &entries {
            assert!(!entry.body.contains("[STOP]"));
            assert!(!entry.body.contains("[START]"));
        }
    }

    #[test]
    fn test_greedy_strategy_produces_text_from_article() {
        let s = summarizer(DecodeStrategy::Greedy);
        let body = s.summarize_article("fix crash in lexer").unwrap();
        assert!(body.split_whitespace().count() <= 5);
    }

    #[test]
    fn test_empty_article() {
        let s = summarizer(DecodeStrategy::Beam);
        assert_eq!(s.summarize_article("").unwrap(), "");
    }

    #[test]
    fn test_vocab_model_mismatch_rejected() {
        let vocab = Vocab::from_words(["fix"], 0).unwrap();
        let params = ModelParams {
            hidden_dim: 2,
            embed_dim: 2,
            ..ModelParams::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let weights = NetworkWeights::initialize(&params, 9, &mut rng);
        let network = PointerGeneratorNetwork::new(weights, &params, 9).unwrap();
        let result = EntrySummarizer::new(
            Arc::new(vocab),
            Arc::new(network),
            params,
            DecodeParams::default(),
        );
        assert!(matches!(result, Err(DeepReleaseError::Model(_))));
    }

    #[tokio::test]
    async fn test_load_missing_artifacts_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DeepReleaseConfig::default();
        config.artifacts.vocab_path = dir.path().join("missing.txt");
        config.retry = crate::config::RetryPolicy::none();

        let result = EntrySummarizer::load(&config).await;
        assert!(matches!(result, Err(DeepReleaseError::ModelLoad { .. })));
    }
}
