//! Vanilla recurrent layer: `h_t = tanh(x_t · Wx + h_{t-1} · Wh + b)`.

use ml_core::Float;
use ndarray::prelude::*;

use crate::arch::activations::Tanh;

/// Gradients of a single recurrent step.
#[derive(Debug, Clone)]
pub struct StepGrads {
    pub dx: Array2<Float>,
    pub dprev_h: Array2<Float>,
    pub dwx: Array2<Float>,
    pub dwh: Array2<Float>,
    pub db: Array1<Float>,
}

/// Gradients of a whole recurrent sequence.
#[derive(Debug, Clone)]
pub struct SequenceGrads {
    /// Shaped `(N, T, D)` like the input sequence.
    pub dx: Array3<Float>,
    pub dh0: Array2<Float>,
    pub dwx: Array2<Float>,
    pub dwh: Array2<Float>,
    pub db: Array1<Float>,
}

/// What a single step keeps for its backward pass, without the shared weights.
#[derive(Debug, Clone)]
struct StepState {
    x: Array2<Float>,
    prev_h: Array2<Float>,
    /// Pre-activation `x · Wx + prev_h · Wh + b`.
    a: Array2<Float>,
}

#[derive(Debug, Clone)]
pub struct RnnStepCache {
    state: StepState,
    wx: Array2<Float>,
    wh: Array2<Float>,
}

#[derive(Debug, Clone)]
pub struct RnnCache {
    steps: Vec<StepState>,
    wx: Array2<Float>,
    wh: Array2<Float>,
}

/// Runs one timestep.
///
/// # Arguments
/// * `x` - Input of shape `(N, D)`.
/// * `prev_h` - Hidden state of shape `(N, H)`.
/// * `wx` - Input-to-hidden weights of shape `(D, H)`.
/// * `wh` - Hidden-to-hidden weights of shape `(H, H)`.
/// * `b` - Biases of shape `(H,)`.
pub fn step_forward(
    x: ArrayView2<Float>,
    prev_h: ArrayView2<Float>,
    wx: ArrayView2<Float>,
    wh: ArrayView2<Float>,
    b: ArrayView1<Float>,
) -> (Array2<Float>, RnnStepCache) {
    let (next_h, state) = step(x, prev_h, wx, wh, b);
    let cache = RnnStepCache {
        state,
        wx: wx.to_owned(),
        wh: wh.to_owned(),
    };

    (next_h, cache)
}

/// Backpropagates `dnext_h` through one timestep.
pub fn step_backward(dnext_h: ArrayView2<Float>, cache: RnnStepCache) -> StepGrads {
    let RnnStepCache { state, wx, wh } = cache;
    step_grads(dnext_h, &state, wx.view(), wh.view())
}

/// Unrolls the recurrence over a whole sequence.
///
/// # Arguments
/// * `x` - Input sequence of shape `(N, T, D)`.
/// * `h0` - Initial hidden state of shape `(N, H)`.
///
/// # Returns
/// The hidden states of every timestep, shaped `(N, T, H)`, and the cache.
pub fn forward(
    x: ArrayView3<Float>,
    h0: ArrayView2<Float>,
    wx: ArrayView2<Float>,
    wh: ArrayView2<Float>,
    b: ArrayView1<Float>,
) -> (Array3<Float>, RnnCache) {
    let (n, t, _) = x.dim();
    let mut h = Array3::zeros((n, t, h0.ncols()));
    let mut steps = Vec::with_capacity(t);
    let mut prev_h = h0.to_owned();

    for (x_t, mut h_t) in x.axis_iter(Axis(1)).zip(h.axis_iter_mut(Axis(1))) {
        let (next_h, state) = step(x_t, prev_h.view(), wx, wh, b);
        h_t.assign(&next_h);
        steps.push(state);
        prev_h = next_h;
    }

    let cache = RnnCache {
        steps,
        wx: wx.to_owned(),
        wh: wh.to_owned(),
    };

    (h, cache)
}

/// Backpropagates the upstream gradients of every hidden state, `dh` of
/// shape `(N, T, H)`, through the whole sequence.
pub fn backward(dh: ArrayView3<Float>, cache: RnnCache) -> SequenceGrads {
    let RnnCache { steps, wx, wh } = cache;
    let (n, t, hd) = dh.dim();
    let d = wx.nrows();

    let mut grads = SequenceGrads {
        dx: Array3::zeros((n, t, d)),
        dh0: Array2::zeros((n, hd)),
        dwx: Array2::zeros(wx.raw_dim()),
        dwh: Array2::zeros(wh.raw_dim()),
        db: Array1::zeros(hd),
    };

    for (i, state) in steps.iter().enumerate().rev() {
        let dnext_h = &dh.index_axis(Axis(1), i) + &grads.dh0;
        let step = step_grads(dnext_h.view(), state, wx.view(), wh.view());

        grads.dx.index_axis_mut(Axis(1), i).assign(&step.dx);
        grads.dwx += &step.dwx;
        grads.dwh += &step.dwh;
        grads.db += &step.db;
        grads.dh0 = step.dprev_h;
    }

    grads
}

fn step(
    x: ArrayView2<Float>,
    prev_h: ArrayView2<Float>,
    wx: ArrayView2<Float>,
    wh: ArrayView2<Float>,
    b: ArrayView1<Float>,
) -> (Array2<Float>, StepState) {
    let a = x.dot(&wx) + prev_h.dot(&wh) + &b;
    let next_h = a.mapv(Tanh::f);

    let state = StepState {
        x: x.to_owned(),
        prev_h: prev_h.to_owned(),
        a,
    };

    (next_h, state)
}

fn step_grads(
    dnext_h: ArrayView2<Float>,
    state: &StepState,
    wx: ArrayView2<Float>,
    wh: ArrayView2<Float>,
) -> StepGrads {
    let da = &dnext_h * &state.a.mapv(Tanh::df);

    StepGrads {
        dx: da.dot(&wx.t()),
        dprev_h: da.dot(&wh.t()),
        dwx: state.x.t().dot(&da),
        dwh: state.prev_h.t().dot(&da),
        db: da.sum_axis(Axis(0)),
    }
}
