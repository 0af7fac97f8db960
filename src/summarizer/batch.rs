//! Padded numeric batches for the encoder and decoder
//!
//! A [`Batch`] holds `B` articles as rectangular arrays. Encoder rows are
//! padded to the longest true length in the batch, capped at `max_enc_steps`.
//! Decoder inputs and targets are only present when abstracts are supplied.

use crate::config::ModelParams;
use crate::summarizer::vocab::{abstract2ids, article2ids, Vocab, PAD_ID, START_ID, STOP_ID};
use ndarray::{s, Array2};

/// One article (and optional reference abstract) mapped to ids
#[derive(Debug, Clone)]
pub struct Example {
    pub enc_input: Vec<usize>,
    pub enc_input_extend_vocab: Vec<usize>,
    pub article_oovs: Vec<String>,
    pub dec_input: Vec<usize>,
    pub target: Vec<usize>,
    pub original_article: String,
}

impl Example {
    pub fn new(article: &str, abstract_text: Option<&str>, vocab: &Vocab, params: &ModelParams) -> Self {
        let article_words: Vec<&str> = article
            .split_whitespace()
            .take(params.max_enc_steps)
            .collect();
        let (enc_input, enc_input_extend_vocab, article_oovs) = article2ids(&article_words, vocab);

        let (dec_input, target) = match abstract_text {
            Some(text) => {
                let abstract_words: Vec<&str> = text.split_whitespace().collect();
                let ids: Vec<usize> = abstract_words.iter().map(|w| vocab.word2id(w)).collect();
                let (dec_input, _) = dec_inp_targ_seqs(&ids, params.max_dec_steps);
                let target_ids = if params.pointer_gen {
                    abstract2ids(&abstract_words, vocab, &article_oovs)
                } else {
                    ids
                };
                let (_, target) = dec_inp_targ_seqs(&target_ids, params.max_dec_steps);
                (dec_input, target)
            }
            None => (Vec::new(), Vec::new()),
        };

        Self {
            enc_input,
            enc_input_extend_vocab,
            article_oovs,
            dec_input,
            target,
            original_article: article.to_string(),
        }
    }

    /// True (unpadded) encoder length
    pub fn enc_len(&self) -> usize {
        self.enc_input.len()
    }

    pub fn dec_len(&self) -> usize {
        self.dec_input.len()
    }
}

/// Decoder input `[START] + seq` and target `seq + [STOP]`, both truncated to `max_len`
///
/// A truncated target carries no STOP token.
pub fn dec_inp_targ_seqs(sequence: &[usize], max_len: usize) -> (Vec<usize>, Vec<usize>) {
    let mut inp = Vec::with_capacity(sequence.len() + 1);
    inp.push(START_ID);
    inp.extend_from_slice(sequence);
    let mut target = sequence.to_vec();

    if inp.len() > max_len {
        inp.truncate(max_len);
        target.truncate(max_len);
    } else {
        target.push(STOP_ID);
    }
    (inp, target)
}

/// Rectangular encoding of a group of examples
#[derive(Debug, Clone)]
pub struct Batch {
    pub enc_batch: Array2<usize>,
    pub enc_padding_mask: Array2<f32>,
    pub enc_lens: Vec<usize>,
    pub enc_batch_extend_vocab: Array2<usize>,
    /// Largest per-article OOV count in the batch
    pub max_art_oovs: usize,
    pub art_oovs: Vec<Vec<String>>,
    pub original_articles: Vec<String>,
    pub dec_batch: Option<Array2<usize>>,
    pub target_batch: Option<Array2<usize>>,
    pub dec_padding_mask: Option<Array2<f32>>,
    pub dec_lens: Vec<usize>,
}

impl Batch {
    pub fn from_examples(examples: &[Example]) -> Self {
        let batch_size = examples.len();
        let max_enc_len = examples.iter().map(Example::enc_len).max().unwrap_or(0);

        let mut enc_batch = Array2::from_elem((batch_size, max_enc_len), PAD_ID);
        let mut enc_batch_extend_vocab = Array2::from_elem((batch_size, max_enc_len), PAD_ID);
        let mut enc_padding_mask = Array2::<f32>::zeros((batch_size, max_enc_len));

        for (i, ex) in examples.iter().enumerate() {
            let len = ex.enc_len();
            for j in 0..len {
                enc_batch[[i, j]] = ex.enc_input[j];
                enc_batch_extend_vocab[[i, j]] = ex.enc_input_extend_vocab[j];
            }
            enc_padding_mask.slice_mut(s![i, ..len]).fill(1.0);
        }

        let has_targets = !examples.is_empty() && examples.iter().all(|ex| !ex.dec_input.is_empty());
        let (dec_batch, target_batch, dec_padding_mask) = if has_targets {
            let max_dec_len = examples.iter().map(Example::dec_len).max().unwrap_or(0);
            let mut dec = Array2::from_elem((batch_size, max_dec_len), PAD_ID);
            let mut target = Array2::from_elem((batch_size, max_dec_len), PAD_ID);
            let mut mask = Array2::<f32>::zeros((batch_size, max_dec_len));
            for (i, ex) in examples.iter().enumerate() {
                for (j, &id) in ex.dec_input.iter().enumerate() {
                    dec[[i, j]] = id;
                }
                for (j, &id) in ex.target.iter().enumerate() {
                    target[[i, j]] = id;
                }
                mask.slice_mut(s![i, ..ex.dec_len()]).fill(1.0);
            }
            (Some(dec), Some(target), Some(mask))
        } else {
            (None, None, None)
        };

        Self {
            enc_batch,
            enc_padding_mask,
            enc_lens: examples.iter().map(Example::enc_len).collect(),
            enc_batch_extend_vocab,
            max_art_oovs: examples
                .iter()
                .map(|ex| ex.article_oovs.len())
                .max()
                .unwrap_or(0),
            art_oovs: examples.iter().map(|ex| ex.article_oovs.clone()).collect(),
            original_articles: examples.iter().map(|ex| ex.original_article.clone()).collect(),
            dec_lens: examples.iter().map(Example::dec_len).collect(),
            dec_batch,
            target_batch,
            dec_padding_mask,
        }
    }

    /// Encode articles without reference abstracts
    pub fn from_articles<S: AsRef<str>>(articles: &[S], vocab: &Vocab, params: &ModelParams) -> Self {
        let examples: Vec<Example> = articles
            .iter()
            .map(|a| Example::new(a.as_ref(), None, vocab, params))
            .collect();
        Self::from_examples(&examples)
    }

    /// One article replicated `beam_size` times for beam search
    pub fn for_decode(article: &str, vocab: &Vocab, params: &ModelParams) -> Self {
        let example = Example::new(article, None, vocab, params);
        Self::from_examples(&vec![example; params.beam_size])
    }

    pub fn batch_size(&self) -> usize {
        self.enc_batch.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch_size() == 0
    }

    /// Longest true encoder length in the batch
    pub fn max_enc_len(&self) -> usize {
        self.enc_lens.iter().copied().max().unwrap_or(0)
    }
}
