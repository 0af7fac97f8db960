//! Beam search behaviour against scripted and randomly initialised models

mod common;

use common::{seeded_weights, tiny_params, tiny_vocab};
use deeprelease_core::summarizer::batch::Batch;
use deeprelease_core::summarizer::decode::{decoded_words, greedy_decode};
use deeprelease_core::summarizer::network::{
    DecodeStepInput, DecodeStepOutput, DecoderState, EncoderOutput,
};
use deeprelease_core::summarizer::vocab::{START_ID, STOP_ID};
use deeprelease_core::{
    BeamSearch, DecodeParams, ModelParams, PointerGeneratorNetwork, Result, Seq2SeqModel, Vocab,
};
use ndarray::{Array2, Array3, ArrayView2};
use proptest::prelude::*;
use std::collections::HashSet;

const HIDDEN: usize = 2;

/// Model whose next-token distribution depends only on the previous token
struct ScriptedModel {
    vocab_size: usize,
    /// Probability mass per token id, given the previous token
    next: fn(usize, usize) -> Vec<f32>,
}

impl Seq2SeqModel for ScriptedModel {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn hidden_dim(&self) -> usize {
        HIDDEN
    }

    fn uses_coverage(&self) -> bool {
        false
    }

    fn encode(&self, enc_batch: ArrayView2<usize>, _enc_lens: &[usize]) -> Result<EncoderOutput> {
        let (b, t) = enc_batch.dim();
        Ok(EncoderOutput {
            outputs: Array3::zeros((b, t, 2 * HIDDEN)),
            features: Array3::zeros((b, t, 2 * HIDDEN)),
            state: DecoderState::zeros(b, HIDDEN),
        })
    }

    fn decode_step(&self, input: DecodeStepInput<'_>) -> Result<DecodeStepOutput> {
        let n = input.prev_tokens.len();
        let t = input.encoder_outputs.dim().1;
        let width = self.vocab_size + input.extra_zeros;

        let mut final_dist = Array2::<f32>::zeros((n, width));
        for (row, &prev) in input.prev_tokens.iter().enumerate() {
            for (id, p) in (self.next)(prev, self.vocab_size).into_iter().enumerate() {
                final_dist[[row, id]] = p;
            }
        }

        Ok(DecodeStepOutput {
            final_dist,
            state: input.state.clone(),
            context: input.context.clone(),
            attn_dist: Array2::from_elem((n, t), 1.0 / t.max(1) as f32),
            p_gen: None,
            coverage: None,
        })
    }
}

/// Spread `rest` evenly over every id, then add the given peaks
fn peaked(vocab_size: usize, peaks: &[(usize, f32)]) -> Vec<f32> {
    let peak_mass: f32 = peaks.iter().map(|(_, p)| p).sum();
    let floor = (1.0 - peak_mass) / vocab_size as f32;
    let mut dist = vec![floor; vocab_size];
    for &(id, p) in peaks {
        dist[id] += p;
    }
    dist
}

fn always_stop(_prev: usize, v: usize) -> Vec<f32> {
    peaked(v, &[(STOP_ID, 0.9)])
}

fn stop_then_word(_prev: usize, v: usize) -> Vec<f32> {
    peaked(v, &[(STOP_ID, 0.6), (5, 0.3)])
}

/// Strongly prefers repeating word 5, with word 6 as runner-up
fn looping(_prev: usize, v: usize) -> Vec<f32> {
    peaked(v, &[(5, 0.6), (6, 0.3)])
}

/// Every third id carries NaN mass
fn nan_every_third(_prev: usize, v: usize) -> Vec<f32> {
    let mut dist = peaked(v, &[(4, 0.5), (5, 0.2)]);
    for (id, p) in dist.iter_mut().enumerate() {
        if id % 3 == 0 {
            *p = f32::NAN;
        }
    }
    dist
}

fn params(beam_size: usize, min_dec_steps: usize, max_dec_steps: usize) -> ModelParams {
    ModelParams {
        beam_size,
        min_dec_steps,
        max_dec_steps,
        ..tiny_params()
    }
}

const ARTICLE: &str = "fix crash in parser add beam search docs for config";

fn decode(model: &ScriptedModel, vocab: &Vocab, params: &ModelParams, decode: &DecodeParams) -> Vec<usize> {
    let batch = Batch::for_decode(ARTICLE, vocab, params);
    BeamSearch::new(model, params, decode)
        .search(&batch)
        .unwrap()
        .tokens
}

fn has_repeated_trigram(tokens: &[usize]) -> bool {
    let mut seen = HashSet::new();
    tokens.windows(3).any(|w| !seen.insert(w.to_vec()))
}

#[test]
fn test_single_beam_stops_immediately() {
    let vocab = tiny_vocab();
    let model = ScriptedModel {
        vocab_size: vocab.size(),
        next: always_stop,
    };
    let params = params(1, 0, 6);
    let batch = Batch::for_decode(ARTICLE, &vocab, &params);

    let best = BeamSearch::new(&model, &params, &DecodeParams::default())
        .search(&batch)
        .unwrap();

    assert_eq!(best.tokens, vec![START_ID, STOP_ID]);
    assert_eq!(best.log_probs.len(), 2);
    assert!(decoded_words(&best.tokens, &vocab, &batch.art_oovs[0])
        .unwrap()
        .is_empty());
}

#[test]
fn test_early_stop_discarded_before_min_steps() {
    let vocab = tiny_vocab();
    let model = ScriptedModel {
        vocab_size: vocab.size(),
        next: stop_then_word,
    };
    let params = params(2, 3, 8);

    let tokens = decode(&model, &vocab, &params, &DecodeParams::default());
    let stop_at = tokens.iter().position(|&t| t == STOP_ID).unwrap();
    // Step k emits tokens[k + 1]
    assert!(stop_at >= params.min_dec_steps + 1, "tokens {:?}", tokens);
    assert!(tokens[1..stop_at].iter().all(|&t| t == 5));
}

#[test]
fn test_ngram_filter_blocks_repeated_trigrams() {
    let vocab = tiny_vocab();
    let model = ScriptedModel {
        vocab_size: vocab.size(),
        next: looping,
    };
    let params = params(1, 0, 8);

    let unfiltered = decode(&model, &vocab, &params, &DecodeParams::default());
    assert!(has_repeated_trigram(&unfiltered), "tokens {:?}", unfiltered);

    let filtered_params = DecodeParams {
        ngram_filter: true,
        ..Default::default()
    };
    let filtered = decode(&model, &vocab, &params, &filtered_params);
    assert!(!has_repeated_trigram(&filtered), "tokens {:?}", filtered);
    assert_eq!(filtered[0], START_ID);
    assert!(filtered.contains(&6));
}

#[test]
fn test_nan_distribution_keeps_decoding() {
    let vocab = tiny_vocab();
    let model = ScriptedModel {
        vocab_size: vocab.size(),
        next: nan_every_third,
    };
    let params = params(4, 0, 8);
    let article = format!("{} update dependencies", ARTICLE);
    let batch = Batch::for_decode(&article, &vocab, &params);

    let results = BeamSearch::new(&model, &params, &DecodeParams::default())
        .search_all(&batch)
        .unwrap();

    assert!(!results.is_empty());
    for hyp in &results {
        assert!(hyp.log_probs.iter().all(|lp| !lp.is_nan()), "{:?}", hyp.log_probs);
        assert!(hyp.tokens[1..].iter().all(|t| t % 3 != 0), "{:?}", hyp.tokens);
    }
    assert_eq!(results[0].tokens[1], 4);
}

#[test]
fn test_starved_beam_falls_back_to_live_hypothesis() {
    let vocab = tiny_vocab();
    let model = ScriptedModel {
        vocab_size: vocab.size(),
        next: looping,
    };
    let params = params(1, 0, 8);
    // Only the single best continuation is considered, so the repeated
    // 3-gram at step 3 leaves no candidate at all
    let decode = DecodeParams {
        ngram_filter: true,
        filtered_candidate_multiplier: 1,
        ..Default::default()
    };

    let tokens = self::decode(&model, &vocab, &params, &decode);
    assert_eq!(tokens, vec![START_ID, 5, 5, 5]);
}

#[test]
fn test_starvation_threshold_is_not_fatal() {
    let vocab = tiny_vocab();
    let model = ScriptedModel {
        vocab_size: vocab.size(),
        next: looping,
    };
    let params = params(2, 0, 8);
    let decode = DecodeParams {
        ngram_filter: true,
        starvation_threshold: Some(100),
        ..Default::default()
    };
    let batch = Batch::for_decode(ARTICLE, &vocab, &params);

    let results = BeamSearch::new(&model, &params, &decode)
        .search_all(&batch)
        .unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|h| !has_repeated_trigram(&h.tokens)));
}

#[test]
fn test_steps_bounded_by_article_length() {
    let vocab = tiny_vocab();
    let model = ScriptedModel {
        vocab_size: vocab.size(),
        next: looping,
    };
    let params = params(2, 0, 50);
    let batch = Batch::for_decode("fix crash", &vocab, &params);

    let best = BeamSearch::new(&model, &params, &DecodeParams::default())
        .search(&batch)
        .unwrap();
    // START plus one token per step, at most one step per input token
    assert!(best.tokens.len() <= 3, "tokens {:?}", best.tokens);
}

#[test]
fn test_empty_article_yields_start_only() {
    let vocab = tiny_vocab();
    let model = ScriptedModel {
        vocab_size: vocab.size(),
        next: looping,
    };
    let params = params(2, 0, 6);
    let batch = Batch::for_decode("", &vocab, &params);

    let best = BeamSearch::new(&model, &params, &DecodeParams::default())
        .search(&batch)
        .unwrap();
    assert_eq!(best.tokens, vec![START_ID]);
}

#[test]
fn test_greedy_follows_argmax() {
    let vocab = tiny_vocab();
    let model = ScriptedModel {
        vocab_size: vocab.size(),
        next: looping,
    };
    let params = tiny_params();
    let batch = Batch::from_articles(&[ARTICLE, "fix crash"], &vocab, &params);

    let sequences = greedy_decode(&model, &batch, 4).unwrap();
    assert_eq!(sequences.len(), 2);
    for seq in sequences {
        assert_eq!(seq, vec![START_ID, 5, 5, 5, 5]);
    }

    let stop_model = ScriptedModel {
        vocab_size: vocab.size(),
        next: always_stop,
    };
    let sequences = greedy_decode(&stop_model, &batch, 4).unwrap();
    assert!(sequences.iter().all(|s| s == &vec![START_ID]));
}

#[test]
fn test_batch_smaller_than_beam_rejected() {
    let vocab = tiny_vocab();
    let model = ScriptedModel {
        vocab_size: vocab.size(),
        next: looping,
    };
    let params = params(3, 0, 6);
    let batch = Batch::from_articles(&[ARTICLE], &vocab, &params);

    let result = BeamSearch::new(&model, &params, &DecodeParams::default()).search(&batch);
    assert!(result.is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_results_are_well_formed(
        words in prop::collection::vec(
            prop::sample::select(vec!["fix", "crash", "parser", "unseen", "words", "add"]),
            0..12,
        ),
        beam_size in 1usize..4,
        max_dec_steps in 1usize..6,
        ngram_filter in any::<bool>(),
        seed in 0u64..8,
    ) {
        let vocab = tiny_vocab();
        let params = ModelParams {
            beam_size,
            max_dec_steps,
            min_dec_steps: 0,
            ..tiny_params()
        };
        let network = PointerGeneratorNetwork::new(seeded_weights(seed), &params, vocab.size()).unwrap();
        let decode = DecodeParams { ngram_filter, ..Default::default() };

        let article = words.join(" ");
        let batch = Batch::for_decode(&article, &vocab, &params);
        let results = BeamSearch::new(&network, &params, &decode).search_all(&batch).unwrap();

        prop_assert!(!results.is_empty());
        let step_bound = max_dec_steps.min(words.len().min(params.max_enc_steps));
        for hyp in &results {
            prop_assert_eq!(hyp.tokens[0], START_ID);
            prop_assert_eq!(hyp.tokens.len(), hyp.log_probs.len());
            prop_assert!(hyp.tokens.len() <= step_bound + 1);
            prop_assert!(hyp.tokens.iter().all(|&t| t < vocab.size() + batch.max_art_oovs));
            if ngram_filter {
                prop_assert!(!has_repeated_trigram(&hyp.tokens));
            }
            prop_assert!(decoded_words(&hyp.tokens, &vocab, &batch.art_oovs[0]).is_ok());
        }
        for pair in results.windows(2) {
            prop_assert!(pair[0].avg_log_prob() >= pair[1].avg_log_prob());
        }
    }
}
