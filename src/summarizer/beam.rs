//! Beam search over a [`Seq2SeqModel`]
//!
//! Keeps `beam_size` live hypotheses, expands all of them in one batched
//! decoder step, ranks the pooled candidates by average log-probability and
//! retires hypotheses that emit STOP. An optional filter rejects candidates
//! that would repeat a 3-gram their ancestor already produced.

use crate::config::{DecodeParams, ModelParams};
use crate::error::{DeepReleaseError, Result};
use crate::summarizer::batch::Batch;
use crate::summarizer::network::{DecodeStepInput, DecoderState, Seq2SeqModel};
use crate::summarizer::vocab::{START_ID, STOP_ID, UNK_ID};
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Immutable set of emitted n-grams with structural sharing
///
/// Inserting returns a new set whose tail is the original one, so a parent and
/// all of its extensions share storage and none of them is ever mutated.
#[derive(Debug, Clone, Default)]
pub struct NgramSet {
    head: Option<Arc<NgramNode>>,
    len: usize,
}

#[derive(Debug)]
struct NgramNode {
    gram: Vec<usize>,
    next: Option<Arc<NgramNode>>,
}

impl NgramSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, gram: &[usize]) -> bool {
        let mut node = self.head.as_deref();
        while let Some(n) = node {
            if n.gram == gram {
                return true;
            }
            node = n.next.as_deref();
        }
        false
    }

    /// Set with one more element; `self` is left untouched
    pub fn with(&self, gram: Vec<usize>) -> Self {
        if self.contains(&gram) {
            return self.clone();
        }
        Self {
            head: Some(Arc::new(NgramNode {
                gram,
                next: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One partial decode
#[derive(Debug, Clone)]
pub struct Hypothesis {
    pub tokens: Vec<usize>,
    pub log_probs: Vec<f32>,
    pub h: Array1<f32>,
    pub c: Array1<f32>,
    pub context: Array1<f32>,
    pub coverage: Option<Array1<f32>>,
    /// Emitted 3-grams, present only when filtering is on
    pub ngrams: Option<NgramSet>,
}

impl Hypothesis {
    /// Fresh hypothesis holding only START
    pub fn start(
        h: Array1<f32>,
        c: Array1<f32>,
        context: Array1<f32>,
        coverage: Option<Array1<f32>>,
        ngram_filter: bool,
    ) -> Self {
        Self {
            tokens: vec![START_ID],
            log_probs: vec![0.0],
            h,
            c,
            context,
            coverage,
            ngrams: ngram_filter.then(NgramSet::new),
        }
    }

    /// Trailing 3-gram formed by appending `token`
    pub fn new_3gram(&self, token: usize) -> Vec<usize> {
        let keep = self.tokens.len().min(2);
        let mut gram = self.tokens[self.tokens.len() - keep..].to_vec();
        gram.push(token);
        gram
    }

    pub fn is_dup_3gram(&self, gram: &[usize]) -> bool {
        self.ngrams.as_ref().map_or(false, |set| set.contains(gram))
    }

    /// New hypothesis one token longer; `self` is not modified
    pub fn extend(
        &self,
        token: usize,
        log_prob: f32,
        h: Array1<f32>,
        c: Array1<f32>,
        context: Array1<f32>,
        coverage: Option<Array1<f32>>,
        new_3gram: Option<Vec<usize>>,
    ) -> Self {
        let ngrams = match (&self.ngrams, new_3gram) {
            (Some(set), Some(gram)) => Some(set.with(gram)),
            (set, _) => set.clone(),
        };
        let mut tokens = self.tokens.clone();
        tokens.push(token);
        let mut log_probs = self.log_probs.clone();
        log_probs.push(log_prob);
        Self {
            tokens,
            log_probs,
            h,
            c,
            context,
            coverage,
            ngrams,
        }
    }

    pub fn latest_token(&self) -> usize {
        self.tokens.last().copied().unwrap_or(START_ID)
    }

    /// Sum of log-probabilities over the token count, START included
    pub fn avg_log_prob(&self) -> f32 {
        self.log_probs.iter().sum::<f32>() / self.tokens.len() as f32
    }
}

/// NaN ranks below every real score
pub(crate) fn rank_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Stable sort, best average log-probability first
pub fn sort_hypotheses(mut hyps: Vec<Hypothesis>) -> Vec<Hypothesis> {
    hyps.sort_by(|a, b| rank_key(b.avg_log_prob()).total_cmp(&rank_key(a.avg_log_prob())));
    hyps
}

/// Indices and values of the `k` largest entries, descending
///
/// NaN entries come back as `-inf` so they never carry into a hypothesis score.
fn top_k(row: ArrayView1<f32>, k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = row.iter().map(|&v| rank_key(v)).enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k);
    indexed
}

fn stack_rows<'a>(rows: impl Iterator<Item = &'a Array1<f32>>, n: usize, width: usize) -> Array2<f32> {
    let mut out = Array2::zeros((n, width));
    for (i, row) in rows.enumerate() {
        out.row_mut(i).assign(row);
    }
    out
}

/// Beam search decoder bound to one model and parameter set
pub struct BeamSearch<'a, M: Seq2SeqModel + ?Sized> {
    model: &'a M,
    params: &'a ModelParams,
    decode: &'a DecodeParams,
}

impl<'a, M: Seq2SeqModel + ?Sized> BeamSearch<'a, M> {
    pub fn new(model: &'a M, params: &'a ModelParams, decode: &'a DecodeParams) -> Self {
        Self {
            model,
            params,
            decode,
        }
    }

    /// Best hypothesis for a batch holding one article replicated per beam
    pub fn search(&self, batch: &Batch) -> Result<Hypothesis> {
        self.search_all(batch)?
            .into_iter()
            .next()
            .ok_or_else(|| DeepReleaseError::Model("beam search produced no hypothesis".to_string()))
    }

    /// Finished hypotheses (or the live beams if none finished), best first
    pub fn search_all(&self, batch: &Batch) -> Result<Vec<Hypothesis>> {
        let beam_size = self.params.beam_size;
        if batch.batch_size() < beam_size {
            return Err(DeepReleaseError::Shape(format!(
                "beam search needs {} replicated rows, batch has {}",
                beam_size,
                batch.batch_size()
            )));
        }

        let vocab_size = self.model.vocab_size();
        let two_h = 2 * self.model.hidden_dim();
        let cand_beam_size = self.decode.candidate_beam_size(beam_size);
        let starvation = self.decode.starvation_threshold(beam_size);
        let max_enc_len = batch.max_enc_len();

        let encoded = self.model.encode(batch.enc_batch.view(), &batch.enc_lens)?;
        let t_len = encoded.max_len();
        let coverage_0 = self
            .model
            .uses_coverage()
            .then(|| Array1::<f32>::zeros(t_len));

        let mut beams: Vec<Hypothesis> = (0..beam_size)
            .map(|_| {
                Hypothesis::start(
                    encoded.state.h.row(0).to_owned(),
                    encoded.state.c.row(0).to_owned(),
                    Array1::zeros(two_h),
                    coverage_0.clone(),
                    self.decode.ngram_filter,
                )
            })
            .collect();
        let mut results: Vec<Hypothesis> = Vec::new();
        let mut steps = 0;

        while steps < self.params.max_dec_steps && results.len() < beam_size && steps < max_enc_len {
            let n = beams.len();
            let latest: Vec<usize> = beams
                .iter()
                .map(|b| {
                    let t = b.latest_token();
                    if t < vocab_size {
                        t
                    } else {
                        UNK_ID
                    }
                })
                .collect();

            let state = DecoderState {
                h: stack_rows(beams.iter().map(|b| &b.h), n, self.model.hidden_dim()),
                c: stack_rows(beams.iter().map(|b| &b.c), n, self.model.hidden_dim()),
            };
            let context = stack_rows(beams.iter().map(|b| &b.context), n, two_h);
            let coverage = match coverage_0 {
                Some(_) => Some(stack_rows(
                    beams.iter().filter_map(|b| b.coverage.as_ref()),
                    n,
                    t_len,
                )),
                None => None,
            };

            let out = self.model.decode_step(DecodeStepInput {
                prev_tokens: &latest,
                state: &state,
                context: &context,
                encoder_outputs: encoded.outputs.slice(s![..n, .., ..]),
                encoder_features: encoded.features.slice(s![..n, .., ..]),
                enc_padding_mask: batch.enc_padding_mask.slice(s![..n, ..]),
                enc_batch_extend_vocab: batch.enc_batch_extend_vocab.slice(s![..n, ..]),
                extra_zeros: batch.max_art_oovs,
                coverage: coverage.as_ref(),
            })?;

            let log_probs = out.final_dist.mapv(f32::ln);
            if log_probs.iter().any(|v| v.is_nan()) {
                warn!("Log probabilities contain NaN at decode step {}", steps);
            }

            let num_orig_beams = if steps == 0 { 1 } else { n };
            let mut all_beams = Vec::new();
            for (i, hyp) in beams.iter().enumerate().take(num_orig_beams) {
                let mut accepted = 0;
                for (token, log_prob) in top_k(log_probs.index_axis(Axis(0), i), cand_beam_size) {
                    let new_3gram = if self.decode.ngram_filter {
                        let gram = hyp.new_3gram(token);
                        if hyp.is_dup_3gram(&gram) {
                            continue;
                        }
                        Some(gram)
                    } else {
                        None
                    };

                    all_beams.push(hyp.extend(
                        token,
                        log_prob,
                        out.state.h.row(i).to_owned(),
                        out.state.c.row(i).to_owned(),
                        out.context.row(i).to_owned(),
                        out.coverage.as_ref().map(|cov| cov.row(i).to_owned()),
                        new_3gram,
                    ));
                    accepted += 1;
                    if accepted == beam_size {
                        break;
                    }
                }
            }

            if all_beams.len() < starvation {
                error!(
                    "Only found {} candidate beams at decode step {}",
                    all_beams.len(),
                    steps
                );
            }

            let mut next_beams = Vec::new();
            for hyp in sort_hypotheses(all_beams) {
                if hyp.latest_token() == STOP_ID {
                    if steps >= self.params.min_dec_steps {
                        results.push(hyp);
                    }
                } else {
                    next_beams.push(hyp);
                }
                if next_beams.len() == beam_size || results.len() == beam_size {
                    break;
                }
            }

            steps += 1;
            // The previous live set stays as the fallback when every candidate retired.
            if next_beams.is_empty() {
                debug!("No live beams remain after step {}", steps);
                break;
            }
            beams = next_beams;
        }

        debug!(
            "Beam search finished after {} steps with {} results",
            steps,
            results.len()
        );

        if results.is_empty() {
            results = beams;
        }
        Ok(sort_hypotheses(results))
    }
}
