//! Pointer-generator encoder-decoder network
//!
//! A bidirectional LSTM encoder feeds an attentional LSTM decoder. The output
//! distribution blends a generative softmax over the vocabulary with a copy
//! distribution over input positions, weighted by a learned gate `p_gen`.
//! Optionally a coverage vector (running sum of attention) is fed back into
//! the attention scores.
//!
//! The [`Seq2SeqModel`] trait is the seam consumed by beam search, greedy
//! decoding and loss evaluation, so those can run against any model that
//! honours the same contract.

use crate::config::ModelParams;
use crate::error::{DeepReleaseError, Result};
use crate::summarizer::layers::{concat_cols, relu, sigmoid, softmax_rows, Linear, LstmCell};
use crate::summarizer::vocab::UNK_ID;
use ndarray::{s, Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

/// Decoder recurrent state, one row per example
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderState {
    pub h: Array2<f32>,
    pub c: Array2<f32>,
}

impl DecoderState {
    pub fn zeros(batch_size: usize, hidden_dim: usize) -> Self {
        Self {
            h: Array2::zeros((batch_size, hidden_dim)),
            c: Array2::zeros((batch_size, hidden_dim)),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.h.nrows()
    }
}

/// Encoder outputs for a batch
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    /// Per-token bidirectional outputs, `B × T × 2H`, zero at padded positions
    pub outputs: Array3<f32>,
    /// Per-token attention features, `B × T × 2H`
    pub features: Array3<f32>,
    /// Reduced final state used to initialise the decoder
    pub state: DecoderState,
}

impl EncoderOutput {
    pub fn batch_size(&self) -> usize {
        self.outputs.len_of(Axis(0))
    }

    pub fn max_len(&self) -> usize {
        self.outputs.len_of(Axis(1))
    }
}

/// Inputs of one batched decoder step
pub struct DecodeStepInput<'a> {
    /// Previous token per row, all `< V`
    pub prev_tokens: &'a [usize],
    pub state: &'a DecoderState,
    /// Previous attention context, `B × 2H`
    pub context: &'a Array2<f32>,
    pub encoder_outputs: ArrayView3<'a, f32>,
    pub encoder_features: ArrayView3<'a, f32>,
    pub enc_padding_mask: ArrayView2<'a, f32>,
    pub enc_batch_extend_vocab: ArrayView2<'a, usize>,
    /// Width of the zero padding appended for article OOV ids
    pub extra_zeros: usize,
    pub coverage: Option<&'a Array2<f32>>,
}

/// Outputs of one batched decoder step
#[derive(Debug, Clone)]
pub struct DecodeStepOutput {
    /// Distribution over `[0, V + extra_zeros)`, one row per example
    pub final_dist: Array2<f32>,
    pub state: DecoderState,
    pub context: Array2<f32>,
    /// Attention over encoder positions, `B × T`
    pub attn_dist: Array2<f32>,
    pub p_gen: Option<Array1<f32>>,
    pub coverage: Option<Array2<f32>>,
}

/// Encoder-decoder contract used by the decoding strategies
pub trait Seq2SeqModel: Send + Sync {
    /// Fixed vocabulary size `V`
    fn vocab_size(&self) -> usize;

    /// Decoder hidden size `H`; contexts are `2H` wide
    fn hidden_dim(&self) -> usize;

    /// Whether the model keeps a coverage vector
    fn uses_coverage(&self) -> bool;

    /// Encode a padded batch of ids (`< V`) with per-row true lengths
    fn encode(&self, enc_batch: ArrayView2<usize>, enc_lens: &[usize]) -> Result<EncoderOutput>;

    /// Run one decoder step for every row
    fn decode_step(&self, input: DecodeStepInput<'_>) -> Result<DecodeStepOutput>;
}

/// Serialized weights of the pointer-generator network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkWeights {
    /// Shared encoder/decoder embedding, `V × E`
    pub embedding: Array2<f32>,
    pub encoder_fw: LstmCell,
    pub encoder_bw: LstmCell,
    pub encoder_feature: Linear,
    pub reduce_h: Linear,
    pub reduce_c: Linear,
    pub decode_proj: Linear,
    pub w_c: Linear,
    pub v: Linear,
    pub x_context: Linear,
    pub decoder_lstm: LstmCell,
    pub p_gen_linear: Linear,
    pub out1: Linear,
    pub out2: Linear,
}

impl NetworkWeights {
    /// Randomly initialised weights for the given dimensions
    pub fn initialize<R: Rng>(params: &ModelParams, vocab_size: usize, rng: &mut R) -> Self {
        let h = params.hidden_dim;
        let e = params.embed_dim;
        Self {
            embedding: Array2::from_shape_fn((vocab_size, e), |_| rng.gen_range(-0.1..0.1)),
            encoder_fw: LstmCell::init(e, h, rng),
            encoder_bw: LstmCell::init(e, h, rng),
            encoder_feature: Linear::init(2 * h, 2 * h, false, rng),
            reduce_h: Linear::init(2 * h, h, true, rng),
            reduce_c: Linear::init(2 * h, h, true, rng),
            decode_proj: Linear::init(2 * h, 2 * h, true, rng),
            w_c: Linear::init(1, 2 * h, false, rng),
            v: Linear::init(2 * h, 1, false, rng),
            x_context: Linear::init(2 * h + e, e, true, rng),
            decoder_lstm: LstmCell::init(e, h, rng),
            p_gen_linear: Linear::init(4 * h + e, 1, true, rng),
            out1: Linear::init(3 * h, h, true, rng),
            out2: Linear::init(h, vocab_size, true, rng),
        }
    }

    /// Check every tensor against the parameters and the vocabulary size
    pub fn validate(&self, params: &ModelParams, vocab_size: usize) -> Result<()> {
        let h = params.hidden_dim;
        let e = params.embed_dim;
        if self.embedding.dim() != (vocab_size, e) {
            return Err(DeepReleaseError::Shape(format!(
                "embedding: expected {}x{}, found {:?}; vocabulary and model do not match",
                vocab_size,
                e,
                self.embedding.dim()
            )));
        }
        self.encoder_fw.check("encoder_fw", e, h)?;
        self.encoder_bw.check("encoder_bw", e, h)?;
        self.encoder_feature.check("encoder_feature", 2 * h, 2 * h)?;
        self.reduce_h.check("reduce_h", 2 * h, h)?;
        self.reduce_c.check("reduce_c", 2 * h, h)?;
        self.decode_proj.check("decode_proj", 2 * h, 2 * h)?;
        self.w_c.check("w_c", 1, 2 * h)?;
        self.v.check("v", 2 * h, 1)?;
        self.x_context.check("x_context", 2 * h + e, e)?;
        self.decoder_lstm.check("decoder_lstm", e, h)?;
        self.p_gen_linear.check("p_gen_linear", 4 * h + e, 1)?;
        self.out1.check("out1", 3 * h, h)?;
        self.out2.check("out2", h, vocab_size)?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        debug!("Saved network weights to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            DeepReleaseError::Model(format!("cannot open {}: {}", path.display(), e))
        })?;
        Ok(bincode::deserialize_from(BufReader::new(file))?)
    }
}

/// Pointer-generator network with validated weights
pub struct PointerGeneratorNetwork {
    weights: NetworkWeights,
    hidden_dim: usize,
    vocab_size: usize,
    pointer_gen: bool,
    is_coverage: bool,
}

impl PointerGeneratorNetwork {
    pub fn new(weights: NetworkWeights, params: &ModelParams, vocab_size: usize) -> Result<Self> {
        weights.validate(params, vocab_size)?;
        Ok(Self {
            weights,
            hidden_dim: params.hidden_dim,
            vocab_size,
            pointer_gen: params.pointer_gen,
            is_coverage: params.is_coverage,
        })
    }

    /// Load and validate weights from a bincode artifact
    pub fn load(path: &Path, params: &ModelParams, vocab_size: usize) -> Result<Self> {
        let network = Self::new(NetworkWeights::load(path)?, params, vocab_size)?;
        info!(
            "Loaded pointer-generator network from {} (hidden {}, vocab {})",
            path.display(),
            params.hidden_dim,
            vocab_size
        );
        Ok(network)
    }

    pub fn weights(&self) -> &NetworkWeights {
        &self.weights
    }

    fn embed(&self, ids: impl Iterator<Item = usize>, rows: usize) -> Array2<f32> {
        let e = self.weights.embedding.ncols();
        let mut out = Array2::zeros((rows, e));
        for (i, id) in ids.enumerate() {
            let id = if id < self.vocab_size { id } else { UNK_ID };
            out.row_mut(i).assign(&self.weights.embedding.row(id));
        }
        out
    }

    /// Run one LSTM direction over the batch honouring per-row lengths
    ///
    /// Rows only update while `t < len`, so padded steps never touch state and
    /// the reverse direction starts at each row's last real token.
    fn run_direction(
        &self,
        cell: &LstmCell,
        embedded: &[Array2<f32>],
        enc_lens: &[usize],
        reverse: bool,
        outputs: &mut Array3<f32>,
        offset: usize,
    ) -> DecoderState {
        let b = enc_lens.len();
        let hd = self.hidden_dim;
        let mut state = DecoderState::zeros(b, hd);
        let steps: Vec<usize> = if reverse {
            (0..embedded.len()).rev().collect()
        } else {
            (0..embedded.len()).collect()
        };

        for t in steps {
            let (h_new, c_new) = cell.step(&embedded[t].view(), &state.h.view(), &state.c.view());
            for row in 0..b {
                if t < enc_lens[row] {
                    state.h.row_mut(row).assign(&h_new.row(row));
                    state.c.row_mut(row).assign(&c_new.row(row));
                    outputs
                        .slice_mut(s![row, t, offset..offset + hd])
                        .assign(&h_new.row(row));
                }
            }
        }
        state
    }

    /// Attention over encoder positions
    ///
    /// Returns `(context, attn_dist, coverage')`.
    fn attention(
        &self,
        s_t_hat: &Array2<f32>,
        input: &DecodeStepInput<'_>,
        coverage: Option<&Array2<f32>>,
    ) -> (Array2<f32>, Array2<f32>, Option<Array2<f32>>) {
        let b = s_t_hat.nrows();
        let t_len = input.encoder_features.len_of(Axis(1));
        let two_h = 2 * self.hidden_dim;

        let dec_fea = self.weights.decode_proj.forward(&s_t_hat.view());
        let w_c = self.weights.w_c.weight.column(0);
        let v = self.weights.v.weight.row(0);

        let mut attn = Array2::<f32>::zeros((b, t_len));
        let mut context = Array2::<f32>::zeros((b, two_h));

        for row in 0..b {
            let mut att_features = input.encoder_features.slice(s![row, .., ..]).to_owned();
            att_features += &dec_fea.row(row);
            if let (true, Some(cov)) = (self.is_coverage, coverage) {
                for (mut pos, &c) in att_features.rows_mut().into_iter().zip(cov.row(row).iter()) {
                    pos.scaled_add(c, &w_c);
                }
            }
            let scores = att_features.mapv(f32::tanh).dot(&v);

            let max = scores.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
            let mut dist = scores.mapv(|x| (x - max).exp());
            let sum = dist.sum();
            if sum > 0.0 {
                dist /= sum;
            }
            dist *= &input.enc_padding_mask.row(row);
            let normalization = dist.sum();
            if normalization > 0.0 {
                dist /= normalization;
            }

            context
                .row_mut(row)
                .assign(&dist.dot(&input.encoder_outputs.slice(s![row, .., ..])));
            attn.row_mut(row).assign(&dist);
        }

        let coverage_next = match (self.is_coverage, coverage) {
            (true, Some(cov)) => Some(cov + &attn),
            _ => None,
        };
        (context, attn, coverage_next)
    }
}

impl Seq2SeqModel for PointerGeneratorNetwork {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn hidden_dim(&self) -> usize {
        self.hidden_dim
    }

    fn uses_coverage(&self) -> bool {
        self.is_coverage
    }

    fn encode(&self, enc_batch: ArrayView2<usize>, enc_lens: &[usize]) -> Result<EncoderOutput> {
        let (b, t_len) = enc_batch.dim();
        if enc_lens.len() != b || enc_lens.iter().any(|&len| len > t_len) {
            return Err(DeepReleaseError::Shape(format!(
                "encoder batch {}x{} does not match lengths {:?}",
                b, t_len, enc_lens
            )));
        }
        let hd = self.hidden_dim;

        let embedded: Vec<Array2<f32>> = (0..t_len)
            .map(|t| self.embed(enc_batch.column(t).iter().copied(), b))
            .collect();

        let mut outputs = Array3::<f32>::zeros((b, t_len, 2 * hd));
        let fw = self.run_direction(&self.weights.encoder_fw, &embedded, enc_lens, false, &mut outputs, 0);
        let bw = self.run_direction(&self.weights.encoder_bw, &embedded, enc_lens, true, &mut outputs, hd);

        let flat = outputs
            .view()
            .into_shape((b * t_len, 2 * hd))
            .map_err(|e| DeepReleaseError::Shape(e.to_string()))?;
        let features = self
            .weights
            .encoder_feature
            .forward(&flat)
            .into_shape((b, t_len, 2 * hd))
            .map_err(|e| DeepReleaseError::Shape(e.to_string()))?;

        let h_in = concat_cols(&[fw.h.view(), bw.h.view()])?;
        let c_in = concat_cols(&[fw.c.view(), bw.c.view()])?;
        let state = DecoderState {
            h: self.weights.reduce_h.forward(&h_in.view()).mapv(relu),
            c: self.weights.reduce_c.forward(&c_in.view()).mapv(relu),
        };

        Ok(EncoderOutput {
            outputs,
            features,
            state,
        })
    }

    fn decode_step(&self, input: DecodeStepInput<'_>) -> Result<DecodeStepOutput> {
        let b = input.prev_tokens.len();
        if input.state.batch_size() != b
            || input.context.nrows() != b
            || input.encoder_outputs.len_of(Axis(0)) != b
            || input.enc_padding_mask.nrows() != b
        {
            return Err(DeepReleaseError::Shape(format!(
                "decode step inputs disagree on batch size {}",
                b
            )));
        }

        let y_embd = self.embed(input.prev_tokens.iter().copied(), b);
        let x = self
            .weights
            .x_context
            .forward(&concat_cols(&[input.context.view(), y_embd.view()])?.view());
        let (h, c) = self
            .weights
            .decoder_lstm
            .step(&x.view(), &input.state.h.view(), &input.state.c.view());

        let s_t_hat = concat_cols(&[h.view(), c.view()])?;
        let (c_t, attn_dist, coverage) = self.attention(&s_t_hat, &input, input.coverage);

        let p_gen = if self.pointer_gen {
            let p_gen_input = concat_cols(&[c_t.view(), s_t_hat.view(), x.view()])?;
            Some(
                self.weights
                    .p_gen_linear
                    .forward(&p_gen_input.view())
                    .column(0)
                    .mapv(sigmoid),
            )
        } else {
            None
        };

        let out = concat_cols(&[h.view(), c_t.view()])?;
        let hidden = self.weights.out1.forward(&out.view());
        let vocab_dist = softmax_rows(&self.weights.out2.forward(&hidden.view()));

        let final_dist = match &p_gen {
            Some(p) => {
                let v = self.vocab_size;
                let mut dist = Array2::<f32>::zeros((b, v + input.extra_zeros));
                for row in 0..b {
                    let p_row = p[row];
                    dist.slice_mut(s![row, ..v])
                        .assign(&(&vocab_dist.row(row) * p_row));
                    for (j, &id) in input.enc_batch_extend_vocab.row(row).iter().enumerate() {
                        if j >= attn_dist.ncols() {
                            break;
                        }
                        if id >= dist.ncols() {
                            return Err(DeepReleaseError::Shape(format!(
                                "extended id {} exceeds distribution width {}",
                                id,
                                dist.ncols()
                            )));
                        }
                        dist[[row, id]] += (1.0 - p_row) * attn_dist[[row, j]];
                    }
                }
                dist
            }
            None => vocab_dist,
        };

        Ok(DecodeStepOutput {
            final_dist,
            state: DecoderState { h, c },
            context: c_t,
            attn_dist,
            p_gen,
            coverage,
        })
    }
}
