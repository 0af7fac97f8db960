//! Teacher-forced loss evaluation
//!
//! Runs the decoder over reference abstracts and reports the masked negative
//! log-likelihood, plus the coverage penalty when coverage is enabled. Used to
//! score a checkpoint against held-out pull requests; no gradients are kept.

use crate::config::ModelParams;
use crate::error::{DeepReleaseError, Result};
use crate::summarizer::batch::Batch;
use crate::summarizer::network::{DecodeStepInput, Seq2SeqModel};
use ndarray::{Array2, Axis};

/// Mean per-example loss over a batch with decoder targets
pub fn evaluate_loss<M: Seq2SeqModel + ?Sized>(
    model: &M,
    batch: &Batch,
    params: &ModelParams,
) -> Result<f32> {
    let (dec_batch, target_batch, dec_mask) =
        match (&batch.dec_batch, &batch.target_batch, &batch.dec_padding_mask) {
            (Some(d), Some(t), Some(m)) => (d, t, m),
            _ => {
                return Err(DeepReleaseError::Model(
                    "loss evaluation needs a batch with reference abstracts".to_string(),
                ))
            }
        };

    let b = batch.batch_size();
    let encoded = model.encode(batch.enc_batch.view(), &batch.enc_lens)?;
    let mut state = encoded.state.clone();
    let mut context = Array2::<f32>::zeros((b, 2 * model.hidden_dim()));
    let mut coverage = model
        .uses_coverage()
        .then(|| Array2::<f32>::zeros((b, encoded.max_len())));

    let max_dec_len = dec_batch.ncols();
    let mut step_losses = Array2::<f32>::zeros((b, max_dec_len));

    for di in 0..max_dec_len {
        let prev: Vec<usize> = dec_batch.column(di).to_vec();
        let out = model.decode_step(DecodeStepInput {
            prev_tokens: &prev,
            state: &state,
            context: &context,
            encoder_outputs: encoded.outputs.view(),
            encoder_features: encoded.features.view(),
            enc_padding_mask: batch.enc_padding_mask.view(),
            enc_batch_extend_vocab: batch.enc_batch_extend_vocab.view(),
            extra_zeros: batch.max_art_oovs,
            coverage: coverage.as_ref(),
        })?;

        for row in 0..b {
            let gold = target_batch[[row, di]];
            let gold_prob = *out.final_dist.get((row, gold)).ok_or_else(|| {
                DeepReleaseError::Shape(format!(
                    "target id {} outside output distribution of width {}",
                    gold,
                    out.final_dist.ncols()
                ))
            })?;
            let mut loss = -(gold_prob + params.eps).ln();
            if let Some(cov) = &coverage {
                let coverage_loss: f32 = out
                    .attn_dist
                    .row(row)
                    .iter()
                    .zip(cov.row(row).iter())
                    .map(|(a, c)| a.min(*c))
                    .sum();
                loss += params.cov_loss_wt * coverage_loss;
            }
            step_losses[[row, di]] = loss * dec_mask[[row, di]];
        }

        state = out.state;
        context = out.context;
        coverage = out.coverage;
    }

    let sum_losses = step_losses.sum_axis(Axis(1));
    let batch_avg: f32 = sum_losses
        .iter()
        .zip(batch.dec_lens.iter())
        .map(|(sum, &len)| sum / len.max(1) as f32)
        .sum::<f32>()
        / b.max(1) as f32;
    Ok(batch_avg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::batch::Example;
    use crate::summarizer::network::{NetworkWeights, PointerGeneratorNetwork};
    use crate::summarizer::vocab::Vocab;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup(is_coverage: bool) -> (PointerGeneratorNetwork, Vocab, ModelParams) {
        let vocab = Vocab::from_words(["fix", "crash", "parser"], 0).unwrap();
        let params = ModelParams {
            hidden_dim: 4,
            embed_dim: 3,
            max_dec_steps: 6,
            is_coverage,
            ..ModelParams::default()
        };
        let mut rng = StdRng::seed_from_u64(11);
        let weights = NetworkWeights::initialize(&params, vocab.size(), &mut rng);
        let net = PointerGeneratorNetwork::new(weights, &params, vocab.size()).unwrap();
        (net, vocab, params)
    }

    #[test]
    fn test_loss_is_positive_and_finite() {
        let (net, vocab, params) = setup(false);
        let examples = vec![
            Example::new("fix crash in lexer", Some("fix crash"), &vocab, &params),
            Example::new("parser fix", Some("fix parser lexer"), &vocab, &params),
        ];
        let batch = Batch::from_examples(&examples);

        let loss = evaluate_loss(&net, &batch, &params).unwrap();
        assert!(loss.is_finite());
        assert!(loss > 0.0);
    }

    #[test]
    fn test_coverage_adds_penalty() {
        let (net, vocab, params) = setup(true);
        let examples = vec![Example::new("fix crash parser", Some("fix crash"), &vocab, &params)];
        let batch = Batch::from_examples(&examples);

        let with_coverage = evaluate_loss(&net, &batch, &params).unwrap();
        let without = evaluate_loss(
            &net,
            &batch,
            &ModelParams {
                cov_loss_wt: 0.0,
                ..params.clone()
            },
        )
        .unwrap();
        assert!(with_coverage >= without);
    }

    #[test]
    fn test_requires_targets() {
        let (net, vocab, params) = setup(false);
        let batch = Batch::from_articles(&["fix crash"], &vocab, &params);
        assert!(matches!(
            evaluate_loss(&net, &batch, &params),
            Err(DeepReleaseError::Model(_))
        ));
    }
}
