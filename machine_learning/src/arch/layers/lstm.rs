//! Long short-term memory layer.
//!
//! The four gate pre-activations are sliced contiguously from a single
//! `x · Wx + h · Wh + b` product, `H` columns each, in the order input,
//! forget, output, candidate.

use ml_core::Float;
use ndarray::prelude::*;

use super::rnn::SequenceGrads;
use crate::arch::activations::{Sigmoid, Tanh};

/// Gradients of a single LSTM step.
#[derive(Debug, Clone)]
pub struct LstmStepGrads {
    pub dx: Array2<Float>,
    pub dprev_h: Array2<Float>,
    pub dprev_c: Array2<Float>,
    pub dwx: Array2<Float>,
    pub dwh: Array2<Float>,
    pub db: Array1<Float>,
}

#[derive(Debug, Clone)]
struct StepState {
    x: Array2<Float>,
    prev_h: Array2<Float>,
    prev_c: Array2<Float>,
    i: Array2<Float>,
    f: Array2<Float>,
    o: Array2<Float>,
    g: Array2<Float>,
    tanh_c: Array2<Float>,
}

#[derive(Debug, Clone)]
pub struct LstmStepCache {
    state: StepState,
    wx: Array2<Float>,
    wh: Array2<Float>,
}

#[derive(Debug, Clone)]
pub struct LstmCache {
    steps: Vec<StepState>,
    wx: Array2<Float>,
    wh: Array2<Float>,
}

/// Runs one timestep.
///
/// # Arguments
/// * `x` - Input of shape `(N, D)`.
/// * `prev_h` - Hidden state of shape `(N, H)`.
/// * `prev_c` - Cell state of shape `(N, H)`.
/// * `wx` - Input-to-gates weights of shape `(D, 4H)`.
/// * `wh` - Hidden-to-gates weights of shape `(H, 4H)`.
/// * `b` - Biases of shape `(4H,)`.
///
/// # Returns
/// The next hidden state, the next cell state and the cache.
pub fn step_forward(
    x: ArrayView2<Float>,
    prev_h: ArrayView2<Float>,
    prev_c: ArrayView2<Float>,
    wx: ArrayView2<Float>,
    wh: ArrayView2<Float>,
    b: ArrayView1<Float>,
) -> (Array2<Float>, Array2<Float>, LstmStepCache) {
    let (next_h, next_c, state) = step(x, prev_h, prev_c, wx, wh, b);
    let cache = LstmStepCache {
        state,
        wx: wx.to_owned(),
        wh: wh.to_owned(),
    };

    (next_h, next_c, cache)
}

/// Backpropagates the gradients of the next hidden and cell states through one timestep.
pub fn step_backward(
    dnext_h: ArrayView2<Float>,
    dnext_c: ArrayView2<Float>,
    cache: LstmStepCache,
) -> LstmStepGrads {
    let LstmStepCache { state, wx, wh } = cache;
    step_grads(dnext_h, dnext_c, &state, wx.view(), wh.view())
}

/// Unrolls the LSTM over a whole sequence, starting from `h0` and a zero cell state.
///
/// # Returns
/// The hidden states of every timestep, shaped `(N, T, H)`, and the cache.
pub fn forward(
    x: ArrayView3<Float>,
    h0: ArrayView2<Float>,
    wx: ArrayView2<Float>,
    wh: ArrayView2<Float>,
    b: ArrayView1<Float>,
) -> (Array3<Float>, LstmCache) {
    let (n, t, _) = x.dim();
    let mut h = Array3::zeros((n, t, h0.ncols()));
    let mut steps = Vec::with_capacity(t);
    let mut prev_h = h0.to_owned();
    let mut prev_c = Array2::<Float>::zeros(h0.raw_dim());

    for (x_t, mut h_t) in x.axis_iter(Axis(1)).zip(h.axis_iter_mut(Axis(1))) {
        let (next_h, next_c, state) = step(x_t, prev_h.view(), prev_c.view(), wx, wh, b);
        h_t.assign(&next_h);
        steps.push(state);
        prev_h = next_h;
        prev_c = next_c;
    }

    let cache = LstmCache {
        steps,
        wx: wx.to_owned(),
        wh: wh.to_owned(),
    };

    (h, cache)
}

/// Backpropagates `dh` of shape `(N, T, H)` through the whole sequence,
/// carrying both the hidden and the cell gradient across timesteps.
pub fn backward(dh: ArrayView3<Float>, cache: LstmCache) -> SequenceGrads {
    let LstmCache { steps, wx, wh } = cache;
    let (n, t, hd) = dh.dim();
    let d = wx.nrows();

    let mut grads = SequenceGrads {
        dx: Array3::zeros((n, t, d)),
        dh0: Array2::zeros((n, hd)),
        dwx: Array2::zeros(wx.raw_dim()),
        dwh: Array2::zeros(wh.raw_dim()),
        db: Array1::zeros(4 * hd),
    };
    let mut dprev_c = Array2::<Float>::zeros((n, hd));

    for (i, state) in steps.iter().enumerate().rev() {
        let dnext_h = &dh.index_axis(Axis(1), i) + &grads.dh0;
        let step = step_grads(dnext_h.view(), dprev_c.view(), state, wx.view(), wh.view());

        grads.dx.index_axis_mut(Axis(1), i).assign(&step.dx);
        grads.dwx += &step.dwx;
        grads.dwh += &step.dwh;
        grads.db += &step.db;
        grads.dh0 = step.dprev_h;
        dprev_c = step.dprev_c;
    }

    grads
}

fn step(
    x: ArrayView2<Float>,
    prev_h: ArrayView2<Float>,
    prev_c: ArrayView2<Float>,
    wx: ArrayView2<Float>,
    wh: ArrayView2<Float>,
    b: ArrayView1<Float>,
) -> (Array2<Float>, Array2<Float>, StepState) {
    let hd = prev_h.ncols();
    let a = x.dot(&wx) + prev_h.dot(&wh) + &b;

    let i = a.slice(s![.., ..hd]).mapv(Sigmoid::f);
    let f = a.slice(s![.., hd..2 * hd]).mapv(Sigmoid::f);
    let o = a.slice(s![.., 2 * hd..3 * hd]).mapv(Sigmoid::f);
    let g = a.slice(s![.., 3 * hd..]).mapv(Tanh::f);

    let next_c = &f * &prev_c + &i * &g;
    let tanh_c = next_c.mapv(Tanh::f);
    let next_h = &o * &tanh_c;

    let state = StepState {
        x: x.to_owned(),
        prev_h: prev_h.to_owned(),
        prev_c: prev_c.to_owned(),
        i,
        f,
        o,
        g,
        tanh_c,
    };

    (next_h, next_c, state)
}

fn step_grads(
    dnext_h: ArrayView2<Float>,
    dnext_c: ArrayView2<Float>,
    state: &StepState,
    wx: ArrayView2<Float>,
    wh: ArrayView2<Float>,
) -> LstmStepGrads {
    let StepState {
        x,
        prev_h,
        prev_c,
        i,
        f,
        o,
        g,
        tanh_c,
    } = state;
    let hd = prev_h.ncols();

    let dc = &dnext_c + &(&dnext_h * o * tanh_c.mapv(|t| 1. - t * t));
    let dprev_c = &dc * f;

    let mut da = Array2::<Float>::zeros((x.nrows(), 4 * hd));
    da.slice_mut(s![.., ..hd])
        .assign(&(&dc * g * i.mapv(|s| s * (1. - s))));
    da.slice_mut(s![.., hd..2 * hd])
        .assign(&(&dc * prev_c * f.mapv(|s| s * (1. - s))));
    da.slice_mut(s![.., 2 * hd..3 * hd])
        .assign(&(&dnext_h * tanh_c * o.mapv(|s| s * (1. - s))));
    da.slice_mut(s![.., 3 * hd..])
        .assign(&(&dc * i * g.mapv(|t| 1. - t * t)));

    LstmStepGrads {
        dx: da.dot(&wx.t()),
        dprev_h: da.dot(&wh.t()),
        dprev_c,
        dwx: x.t().dot(&da),
        dwh: prev_h.t().dot(&da),
        db: da.sum_axis(Axis(0)),
    }
}
