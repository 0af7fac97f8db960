//! Output extraction and greedy decoding

use crate::error::Result;
use crate::summarizer::batch::Batch;
use crate::summarizer::beam::{rank_key, Hypothesis};
use crate::summarizer::network::{DecodeStepInput, Seq2SeqModel};
use crate::summarizer::vocab::{outputids2words, Vocab, START_ID, STOP_DECODING, STOP_ID, UNK_ID};
use ndarray::Array2;

/// Words of a decoded id sequence whose first element is START
///
/// Ids `>= V` resolve through the article OOVs; output stops at the first STOP.
pub fn decoded_words(tokens: &[usize], vocab: &Vocab, article_oovs: &[String]) -> Result<Vec<String>> {
    let output_ids = tokens.get(1..).unwrap_or_default();
    let mut words = outputids2words(output_ids, vocab, article_oovs)?;
    if let Some(stop) = words.iter().position(|w| w == STOP_DECODING) {
        words.truncate(stop);
    }
    Ok(words)
}

/// Summary text of a finished hypothesis
pub fn hypothesis_text(hyp: &Hypothesis, vocab: &Vocab, article_oovs: &[String]) -> Result<String> {
    Ok(decoded_words(&hyp.tokens, vocab, article_oovs)?.join(" "))
}

/// Argmax decoding for every row of a batch
///
/// Each returned sequence starts with START and ends before the first STOP, or
/// after `max_dec_steps` tokens.
pub fn greedy_decode<M: Seq2SeqModel + ?Sized>(
    model: &M,
    batch: &Batch,
    max_dec_steps: usize,
) -> Result<Vec<Vec<usize>>> {
    let b = batch.batch_size();
    if b == 0 {
        return Ok(Vec::new());
    }

    let encoded = model.encode(batch.enc_batch.view(), &batch.enc_lens)?;
    let mut state = encoded.state.clone();
    let mut context = Array2::<f32>::zeros((b, 2 * model.hidden_dim()));
    let mut coverage = model
        .uses_coverage()
        .then(|| Array2::<f32>::zeros((b, encoded.max_len())));

    let mut sequences: Vec<Vec<usize>> = vec![vec![START_ID]; b];
    let mut finished = vec![false; b];
    let mut inputs = vec![START_ID; b];

    for _ in 0..max_dec_steps {
        if finished.iter().all(|&f| f) {
            break;
        }
        let out = model.decode_step(DecodeStepInput {
            prev_tokens: &inputs,
            state: &state,
            context: &context,
            encoder_outputs: encoded.outputs.view(),
            encoder_features: encoded.features.view(),
            enc_padding_mask: batch.enc_padding_mask.view(),
            enc_batch_extend_vocab: batch.enc_batch_extend_vocab.view(),
            extra_zeros: batch.max_art_oovs,
            coverage: coverage.as_ref(),
        })?;

        for (row, dist) in out.final_dist.rows().into_iter().enumerate() {
            let token = argmax(dist.iter().copied());
            if !finished[row] {
                if token == STOP_ID {
                    finished[row] = true;
                } else {
                    sequences[row].push(token);
                }
            }
            inputs[row] = if token < model.vocab_size() { token } else { UNK_ID };
        }

        state = out.state;
        context = out.context;
        coverage = out.coverage;
    }
    Ok(sequences)
}

fn argmax(values: impl Iterator<Item = f32>) -> usize {
    values
        .enumerate()
        .max_by(|a, b| rank_key(a.1).total_cmp(&rank_key(b.1)))
        .map(|(i, _)| i)
        .unwrap_or(UNK_ID)
}
