use ml_core::{Float, MlError, Result};
use ndarray::prelude::*;

/// Geometry of a max-pooling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolParam {
    pub height: usize,
    pub width: usize,
    pub stride: usize,
}

impl Default for PoolParam {
    fn default() -> Self {
        Self {
            height: 2,
            width: 2,
            stride: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaxPoolCache {
    x_dim: (usize, usize, usize, usize),
    /// Row-major offset of the maximum inside each window.
    argmax: Array4<usize>,
    param: PoolParam,
}

/// Max pooling of `x` of shape `(N, C, H, W)`.
///
/// # Returns
/// The output of shape `(N, C, H', W')` with `H' = 1 + (H - height) / stride`,
/// and the cache for the backward pass.
///
/// # Errors
/// Returns `MlError::InvalidInput` if the windows do not tile the input.
pub fn forward(x: ArrayView4<Float>, param: PoolParam) -> Result<(Array4<Float>, MaxPoolCache)> {
    let (n, c, h, w) = x.dim();
    let PoolParam {
        height: ph,
        width: pw,
        stride,
    } = param;

    let tiles = |input: usize, window: usize| {
        stride > 0 && window > 0 && window <= input && (input - window) % stride == 0
    };
    if !tiles(h, ph) || !tiles(w, pw) {
        return Err(MlError::InvalidInput("pooling window does not tile the input"));
    }

    let h_out = 1 + (h - ph) / stride;
    let w_out = 1 + (w - pw) / stride;

    let mut out = Array4::zeros((n, c, h_out, w_out));
    let mut argmax = Array4::zeros((n, c, h_out, w_out));

    for ((ni, ci, i, j), o) in out.indexed_iter_mut() {
        let (hs, ws) = (i * stride, j * stride);
        let window = x.slice(s![ni, ci, hs..hs + ph, ws..ws + pw]);

        let (best, max) = window
            .iter()
            .enumerate()
            .fold((0, Float::NEG_INFINITY), |(best, max), (k, &v)| {
                if v > max { (k, v) } else { (best, max) }
            });

        *o = max;
        argmax[[ni, ci, i, j]] = best;
    }

    let cache = MaxPoolCache {
        x_dim: (n, c, h, w),
        argmax,
        param,
    };

    Ok((out, cache))
}

/// Routes every entry of `dout` to the position of its window's maximum.
pub fn backward(dout: ArrayView4<Float>, cache: MaxPoolCache) -> Array4<Float> {
    let MaxPoolCache {
        x_dim,
        argmax,
        param,
    } = cache;
    let mut dx = Array4::zeros(x_dim);

    for ((ni, ci, i, j), &k) in argmax.indexed_iter() {
        let row = i * param.stride + k / param.width;
        let col = j * param.stride + k % param.width;
        dx[[ni, ci, row, col]] += dout[[ni, ci, i, j]];
    }

    dx
}
