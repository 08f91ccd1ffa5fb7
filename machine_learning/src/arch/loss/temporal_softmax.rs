use ml_core::{Float, MlError, Result};
use ndarray::prelude::*;

use super::softmax::log_softmax;

/// Softmax cross-entropy over every `(example, timestep)` of a sequence.
///
/// # Arguments
/// * `x` - Scores of shape `(N, T, V)`.
/// * `y` - Target indices of shape `(N, T)`.
/// * `mask` - Which positions count towards the loss, shaped `(N, T)`.
///
/// # Returns
/// The summed loss of the unmasked positions divided by `N` and its gradient
/// with respect to `x`. Masked positions contribute neither loss nor gradient,
/// whatever their scores and targets.
///
/// # Errors
/// Returns `MlError::SizeMismatch` when `y` or `mask` is not shaped `(N, T)`
/// and `MlError::IndexOutOfRange` when an unmasked target is not in `0..V`.
pub fn temporal_softmax_loss(
    x: ArrayView3<Float>,
    y: ArrayView2<usize>,
    mask: ArrayView2<bool>,
) -> Result<(Float, Array3<Float>)> {
    let (n, t, v) = x.dim();

    for (what, dim) in [("targets", y.dim()), ("mask", mask.dim())] {
        if dim != (n, t) {
            return Err(MlError::SizeMismatch {
                what,
                got: dim.0 * dim.1,
                expected: n * t,
            });
        }
    }
    if n == 0 {
        return Err(MlError::InvalidInput("temporal softmax loss of an empty batch"));
    }

    let flat = x.to_shape((n * t, v))?;
    let log_probs = log_softmax(flat.view());
    let mut dx = Array2::zeros((n * t, v));
    let mut loss = 0.;

    let targets = y.iter().zip(mask.iter());
    for (i, (&target, &keep)) in targets.enumerate() {
        if !keep {
            continue;
        }
        if target >= v {
            return Err(MlError::IndexOutOfRange {
                what: "target",
                index: target,
                len: v,
            });
        }

        loss -= log_probs[[i, target]];

        let mut row = dx.row_mut(i);
        row.assign(&log_probs.row(i).mapv(Float::exp));
        row[target] -= 1.;
    }

    let n = n as Float;
    dx /= n;
    let dx = dx.into_shape_with_order(x.raw_dim())?;

    Ok((loss / n, dx))
}
