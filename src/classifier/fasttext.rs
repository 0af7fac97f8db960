//! fastText-compatible supervised text classifier (inference only)
//!
//! Input rows are looked up for every known word and for hashed word n-grams,
//! averaged into a hidden vector, projected onto the label matrix and passed
//! through a softmax. Hashing matches fastText so bucket rows trained there
//! line up.

use crate::error::{DeepReleaseError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// End-of-sentence token appended to every line
pub const EOS: &str = "</s>";

const FNV_OFFSET: u32 = 2166136261;
const FNV_PRIME: u32 = 16777619;
const NGRAM_MULTIPLIER: u64 = 116049371;

/// fastText's FNV-1a variant, hashing bytes as signed chars
pub fn fasttext_hash(token: &str) -> u32 {
    token.bytes().fold(FNV_OFFSET, |h, b| {
        (h ^ (b as i8 as i32 as u32)).wrapping_mul(FNV_PRIME)
    })
}

/// Serialized classifier parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastTextWeights {
    /// Word dictionary in row order
    pub words: Vec<String>,
    /// Labels in output row order, e.g. `__label__F`
    pub labels: Vec<String>,
    /// `(words + bucket) × dim`
    pub input: Array2<f32>,
    /// `labels × dim`
    pub output: Array2<f32>,
    pub word_ngrams: usize,
    pub bucket: usize,
}

impl FastTextWeights {
    pub fn save(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }
}

/// Classifier ready for prediction
#[derive(Debug)]
pub struct FastTextModel {
    weights: FastTextWeights,
    word_index: HashMap<String, usize>,
}

impl FastTextModel {
    pub fn new(weights: FastTextWeights) -> Result<Self> {
        let dim = weights.input.ncols();
        if weights.input.nrows() != weights.words.len() + weights.bucket {
            return Err(DeepReleaseError::Shape(format!(
                "classifier input matrix has {} rows, expected {} words + {} buckets",
                weights.input.nrows(),
                weights.words.len(),
                weights.bucket
            )));
        }
        if weights.output.dim() != (weights.labels.len(), dim) {
            return Err(DeepReleaseError::Shape(format!(
                "classifier output matrix is {:?}, expected ({}, {})",
                weights.output.dim(),
                weights.labels.len(),
                dim
            )));
        }
        if weights.labels.is_empty() {
            return Err(DeepReleaseError::Model("classifier has no labels".to_string()));
        }

        let word_index = weights
            .words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        Ok(Self {
            weights,
            word_index,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            DeepReleaseError::Model(format!("cannot open {}: {}", path.display(), e))
        })?;
        let weights: FastTextWeights = bincode::deserialize_from(BufReader::new(file))?;
        let model = Self::new(weights)?;
        info!(
            "Loaded classifier from {} ({} words, {} labels)",
            path.display(),
            model.weights.words.len(),
            model.weights.labels.len()
        );
        Ok(model)
    }

    /// Input rows for a line: known words, then word n-gram buckets
    fn line_rows(&self, text: &str) -> (Vec<usize>, usize) {
        let tokens: Vec<&str> = text.split_whitespace().chain(std::iter::once(EOS)).collect();
        let nwords = self.weights.words.len();

        let mut rows = Vec::new();
        let mut known_words = 0;
        let mut hashes: Vec<i32> = Vec::with_capacity(tokens.len());
        for token in &tokens {
            hashes.push(fasttext_hash(token) as i32);
            if let Some(&id) = self.word_index.get(*token) {
                rows.push(id);
                if *token != EOS {
                    known_words += 1;
                }
            }
        }

        if self.weights.word_ngrams > 1 && self.weights.bucket > 0 {
            for i in 0..hashes.len() {
                let mut h = hashes[i] as i64 as u64;
                for &next in hashes.iter().skip(i + 1).take(self.weights.word_ngrams - 1) {
                    h = h
                        .wrapping_mul(NGRAM_MULTIPLIER)
                        .wrapping_add(next as i64 as u64);
                    rows.push(nwords + (h % self.weights.bucket as u64) as usize);
                }
            }
        }
        (rows, known_words)
    }

    /// Most probable label and its probability
    pub fn predict(&self, text: &str) -> Result<(String, f32)> {
        let (rows, known_words) = self.line_rows(text);
        if known_words == 0 {
            return Err(DeepReleaseError::Classification(format!(
                "no known token in '{}'",
                text
            )));
        }

        let hidden: Array1<f32> = self
            .weights
            .input
            .select(Axis(0), &rows)
            .mean_axis(Axis(0))
            .ok_or_else(|| DeepReleaseError::Classification("empty input".to_string()))?;
        let logits = self.weights.output.dot(&hidden);

        let max = logits.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        let exp = logits.mapv(|v| (v - max).exp());
        let total = exp.sum();

        let mut best = 0;
        for (i, &v) in exp.iter().enumerate() {
            if v > exp[best] {
                best = i;
            }
        }

        Ok((self.weights.labels[best].clone(), exp[best] / total))
    }
}
