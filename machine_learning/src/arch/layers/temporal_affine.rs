use ml_core::{Float, Result};
use ndarray::prelude::*;

use super::affine::{self, AffineCache};

#[derive(Debug, Clone)]
pub struct TemporalAffineCache {
    affine: AffineCache,
    n: usize,
    t: usize,
}

/// Applies the same affine transform at every timestep of `x` of shape
/// `(N, T, D)` by flattening it to `(N·T, D)`.
///
/// # Returns
/// The output of shape `(N, T, M)` and the cache.
pub fn forward(
    x: ArrayView3<Float>,
    w: ArrayView2<Float>,
    b: ArrayView1<Float>,
) -> Result<(Array3<Float>, TemporalAffineCache)> {
    let (n, t, d) = x.dim();
    let flat = x.to_shape((n * t, d))?;

    let (out, affine) = affine::forward(flat.view(), w, b);
    let out = out.into_shape_with_order((n, t, w.ncols()))?;

    Ok((out, TemporalAffineCache { affine, n, t }))
}

/// Backpropagates `dout` of shape `(N, T, M)`.
///
/// # Returns
/// The gradients `(dx, dw, db)` with the shapes of `x`, `w` and `b`.
pub fn backward(
    dout: ArrayView3<Float>,
    cache: TemporalAffineCache,
) -> Result<(Array3<Float>, Array2<Float>, Array1<Float>)> {
    let TemporalAffineCache { affine, n, t } = cache;
    let flat = dout.to_shape((n * t, dout.dim().2))?;

    let (dx, dw, db) = affine::backward(flat.view(), affine);
    let d = dx.ncols();
    let dx = dx.into_shape_with_order((n, t, d))?;

    Ok((dx, dw, db))
}
