//! Dense and recurrent building blocks over `ndarray`
//!
//! All layers operate on row-major batches: one row per example.

use crate::error::{DeepReleaseError, Result};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Affine map `y = x Wᵀ + b` with `W: out × in`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linear {
    pub weight: Array2<f32>,
    pub bias: Option<Array1<f32>>,
}

impl Linear {
    /// Uniform init in `±1/sqrt(in)`
    pub fn init<R: Rng>(in_dim: usize, out_dim: usize, bias: bool, rng: &mut R) -> Self {
        let bound = 1.0 / (in_dim.max(1) as f32).sqrt();
        Self {
            weight: uniform((out_dim, in_dim), bound, rng),
            bias: bias.then(|| Array1::from_shape_fn(out_dim, |_| rng.gen_range(-bound..bound))),
        }
    }

    pub fn in_dim(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_dim(&self) -> usize {
        self.weight.nrows()
    }

    pub fn forward(&self, x: &ArrayView2<f32>) -> Array2<f32> {
        let mut y = x.dot(&self.weight.t());
        if let Some(bias) = &self.bias {
            y += bias;
        }
        y
    }

    /// Check `out × in` and bias length
    pub fn check(&self, name: &str, in_dim: usize, out_dim: usize) -> Result<()> {
        if self.weight.dim() != (out_dim, in_dim) {
            return Err(DeepReleaseError::Shape(format!(
                "{}: expected weight {}x{}, found {}x{}",
                name,
                out_dim,
                in_dim,
                self.out_dim(),
                self.in_dim()
            )));
        }
        if let Some(bias) = &self.bias {
            if bias.len() != out_dim {
                return Err(DeepReleaseError::Shape(format!(
                    "{}: expected bias of {}, found {}",
                    name,
                    out_dim,
                    bias.len()
                )));
            }
        }
        Ok(())
    }
}

/// Single LSTM cell with gate order input, forget, cell, output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmCell {
    pub w_ih: Array2<f32>,
    pub w_hh: Array2<f32>,
    pub b_ih: Array1<f32>,
    pub b_hh: Array1<f32>,
}

impl LstmCell {
    pub fn init<R: Rng>(input_dim: usize, hidden_dim: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (hidden_dim.max(1) as f32).sqrt();
        Self {
            w_ih: uniform((4 * hidden_dim, input_dim), bound, rng),
            w_hh: uniform((4 * hidden_dim, hidden_dim), bound, rng),
            b_ih: Array1::from_shape_fn(4 * hidden_dim, |_| rng.gen_range(-bound..bound)),
            b_hh: Array1::from_shape_fn(4 * hidden_dim, |_| rng.gen_range(-bound..bound)),
        }
    }

    pub fn hidden_dim(&self) -> usize {
        self.w_hh.ncols()
    }

    /// One step: returns `(h', c')`
    pub fn step(
        &self,
        x: &ArrayView2<f32>,
        h: &ArrayView2<f32>,
        c: &ArrayView2<f32>,
    ) -> (Array2<f32>, Array2<f32>) {
        let hd = self.hidden_dim();
        let mut gates = x.dot(&self.w_ih.t()) + h.dot(&self.w_hh.t());
        gates += &self.b_ih;
        gates += &self.b_hh;

        let i = gates.slice(s![.., 0..hd]).mapv(sigmoid);
        let f = gates.slice(s![.., hd..2 * hd]).mapv(sigmoid);
        let g = gates.slice(s![.., 2 * hd..3 * hd]).mapv(f32::tanh);
        let o = gates.slice(s![.., 3 * hd..4 * hd]).mapv(sigmoid);

        let c_next = &f * c + &i * &g;
        let h_next = &o * &c_next.mapv(f32::tanh);
        (h_next, c_next)
    }

    pub fn check(&self, name: &str, input_dim: usize, hidden_dim: usize) -> Result<()> {
        let ok = self.w_ih.dim() == (4 * hidden_dim, input_dim)
            && self.w_hh.dim() == (4 * hidden_dim, hidden_dim)
            && self.b_ih.len() == 4 * hidden_dim
            && self.b_hh.len() == 4 * hidden_dim;
        if ok {
            Ok(())
        } else {
            Err(DeepReleaseError::Shape(format!(
                "{}: expected LSTM({} -> {}), found w_ih {:?}, w_hh {:?}",
                name,
                input_dim,
                hidden_dim,
                self.w_ih.dim(),
                self.w_hh.dim()
            )))
        }
    }
}

pub fn uniform<R: Rng>(shape: (usize, usize), bound: f32, rng: &mut R) -> Array2<f32> {
    if bound <= 0.0 {
        return Array2::zeros(shape);
    }
    Array2::from_shape_fn(shape, |_| rng.gen_range(-bound..bound))
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

pub fn relu(x: f32) -> f32 {
    x.max(0.0)
}

/// Row-wise softmax with max subtraction
pub fn softmax_rows(x: &Array2<f32>) -> Array2<f32> {
    let mut out = x.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        if !max.is_finite() {
            continue;
        }
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row /= sum;
        }
    }
    out
}

/// Concatenate row batches along the feature axis
pub fn concat_cols(parts: &[ArrayView2<f32>]) -> Result<Array2<f32>> {
    ndarray::concatenate(Axis(1), parts).map_err(|e| DeepReleaseError::Shape(e.to_string()))
}
