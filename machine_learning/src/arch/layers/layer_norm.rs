use ml_core::{Float, MlError, Result};
use ndarray::prelude::*;

/// Default numerical-stability constant added to the variance.
pub const EPS: Float = 1e-5;

#[derive(Debug, Clone)]
pub struct LayerNormCache {
    xhat: Array2<Float>,
    gamma: Array1<Float>,
    /// One entry per example, kept as a column to broadcast over features.
    inv_std: Array2<Float>,
}

/// Normalizes every example of `x` of shape `(N, D)` over its features, then
/// scales by `gamma` and shifts by `beta`.
///
/// Layer normalization keeps no running state, so training and inference
/// behave identically.
///
/// # Errors
/// Returns `MlError::InvalidInput` if `x` has no features.
pub fn forward(
    x: ArrayView2<Float>,
    gamma: ArrayView1<Float>,
    beta: ArrayView1<Float>,
    eps: Float,
) -> Result<(Array2<Float>, LayerNormCache)> {
    let mean = x
        .mean_axis(Axis(1))
        .ok_or(MlError::InvalidInput("layer normalization without features"))?
        .insert_axis(Axis(1));
    let var = x.var_axis(Axis(1), 0.).insert_axis(Axis(1));

    let inv_std = var.mapv(|v| 1. / (v + eps).sqrt());
    let xhat = (&x - &mean) * &inv_std;
    let out = &xhat * &gamma + &beta;

    let cache = LayerNormCache {
        xhat,
        gamma: gamma.to_owned(),
        inv_std,
    };

    Ok((out, cache))
}

/// Backpropagates through layer normalization.
///
/// # Returns
/// The gradients `(dx, dgamma, dbeta)`.
pub fn backward(
    dout: ArrayView2<Float>,
    cache: LayerNormCache,
) -> (Array2<Float>, Array1<Float>, Array1<Float>) {
    let LayerNormCache {
        xhat,
        gamma,
        inv_std,
    } = cache;

    let dbeta = dout.sum_axis(Axis(0));
    let dgamma = (&dout * &xhat).sum_axis(Axis(0));
    let dxhat = &dout * &gamma;

    let d = dout.ncols() as Float;
    let sum_dxhat = dxhat.sum_axis(Axis(1)).insert_axis(Axis(1));
    let sum_dxhat_xhat = (&dxhat * &xhat).sum_axis(Axis(1)).insert_axis(Axis(1));
    let dx = (dxhat * d - &sum_dxhat - &xhat * &sum_dxhat_xhat) * &inv_std / d;

    (dx, dgamma, dbeta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arch::scaled_normal,
        gradient_check::{assert_gradients_close, eval_numerical_gradient_array},
    };
    use ml_core::generate_rng;

    #[test]
    fn forward_normalizes_rows() {
        let mut rng = generate_rng(Some(231));
        let x: Array2<Float> = scaled_normal((4, 50), 3., &mut rng) - 7.;
        let gamma = Array1::ones(50);
        let beta = Array1::zeros(50);

        let (out, _) = forward(x.view(), gamma.view(), beta.view(), EPS).unwrap();

        for row in out.rows() {
            assert!(row.mean().unwrap().abs() < 1e-9);
            assert!((row.std(0.) - 1.).abs() < 1e-4);
        }
    }

    #[test]
    fn backward_matches_numerical_gradient() {
        let mut rng = generate_rng(Some(231));
        let x: Array2<Float> = scaled_normal((4, 5), 5., &mut rng) + 12.;
        let gamma: Array1<Float> = scaled_normal(5, 1., &mut rng);
        let beta: Array1<Float> = scaled_normal(5, 1., &mut rng);
        let dout: Array2<Float> = scaled_normal((4, 5), 1., &mut rng);

        let fwd = |x: &Array2<Float>, gamma: &Array1<Float>, beta: &Array1<Float>| {
            forward(x.view(), gamma.view(), beta.view(), EPS).unwrap().0
        };

        let dx_num = eval_numerical_gradient_array(|x| fwd(x, &gamma, &beta), &x, &dout, 1e-5);
        let dg_num = eval_numerical_gradient_array(|g| fwd(&x, g, &beta), &gamma, &dout, 1e-5);
        let db_num = eval_numerical_gradient_array(|b| fwd(&x, &gamma, b), &beta, &dout, 1e-5);

        let (_, cache) = forward(x.view(), gamma.view(), beta.view(), EPS).unwrap();
        let (dx, dgamma, dbeta) = backward(dout.view(), cache);

        assert_gradients_close(dx.view(), dx_num.view(), 1e-6);
        assert_gradients_close(dgamma.view(), dg_num.view(), 1e-7);
        assert_gradients_close(dbeta.view(), db_num.view(), 1e-7);
    }
}
