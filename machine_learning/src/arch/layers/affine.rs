use ml_core::Float;
use ndarray::{linalg, prelude::*};

/// What `affine::backward` needs from the forward pass.
#[derive(Debug, Clone)]
pub struct AffineCache {
    x: Array2<Float>,
    w: Array2<Float>,
}

/// Computes `x · w + b`.
///
/// # Arguments
/// * `x` - Input of shape `(N, D)`.
/// * `w` - Weights of shape `(D, M)`.
/// * `b` - Biases of shape `(M,)`.
///
/// # Returns
/// The output of shape `(N, M)` and the cache for the backward pass.
pub fn forward(
    x: ArrayView2<Float>,
    w: ArrayView2<Float>,
    b: ArrayView1<Float>,
) -> (Array2<Float>, AffineCache) {
    let mut out = Array2::zeros((x.nrows(), w.ncols()));
    linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut out);
    out += &b;

    let cache = AffineCache {
        x: x.to_owned(),
        w: w.to_owned(),
    };

    (out, cache)
}

/// Backpropagates `dout` through the affine transform.
///
/// # Returns
/// The gradients `(dx, dw, db)` with the shapes of `x`, `w` and `b`.
pub fn backward(
    dout: ArrayView2<Float>,
    cache: AffineCache,
) -> (Array2<Float>, Array2<Float>, Array1<Float>) {
    let AffineCache { x, w } = cache;

    let mut dx = Array2::zeros(x.raw_dim());
    linalg::general_mat_mul(1.0, &dout, &w.t(), 0.0, &mut dx);

    let mut dw = Array2::zeros(w.raw_dim());
    linalg::general_mat_mul(1.0, &x.t(), &dout, 0.0, &mut dw);

    let db = dout.sum_axis(Axis(0));

    (dx, dw, db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        arch::scaled_normal,
        gradient_check::{eval_numerical_gradient_array, rel_error},
    };
    use ml_core::generate_rng;

    #[test]
    fn forward_matches_hand_computation() {
        let x = array![[1., 2.], [3., 4.]];
        let w = array![[1., 0., -1.], [0.5, 1., 2.]];
        let b = array![0.1, 0.2, 0.3];

        let (out, _) = forward(x.view(), w.view(), b.view());
        let expected = array![[2.1, 2.2, 3.3], [5.1, 4.2, 5.3]];

        assert!(rel_error(out.view(), expected.view()) < 1e-9);
    }

    #[test]
    fn backward_matches_numerical_gradient() {
        let mut rng = generate_rng(Some(231));
        let x: Array2<Float> = scaled_normal((10, 6), 1., &mut rng);
        let w: Array2<Float> = scaled_normal((6, 5), 1., &mut rng);
        let b: Array1<Float> = scaled_normal(5, 1., &mut rng);
        let dout: Array2<Float> = scaled_normal((10, 5), 1., &mut rng);

        let dx_num = eval_numerical_gradient_array(
            |x| forward(x.view(), w.view(), b.view()).0,
            &x,
            &dout,
            1e-5,
        );
        let dw_num = eval_numerical_gradient_array(
            |w| forward(x.view(), w.view(), b.view()).0,
            &w,
            &dout,
            1e-5,
        );
        let db_num = eval_numerical_gradient_array(
            |b| forward(x.view(), w.view(), b.view()).0,
            &b,
            &dout,
            1e-5,
        );

        let (_, cache) = forward(x.view(), w.view(), b.view());
        let (dx, dw, db) = backward(dout.view(), cache);

        assert!(rel_error(dx.view(), dx_num.view()) < 1e-7);
        assert!(rel_error(dw.view(), dw_num.view()) < 1e-7);
        assert!(rel_error(db.view(), db_num.view()) < 1e-7);
    }
}
