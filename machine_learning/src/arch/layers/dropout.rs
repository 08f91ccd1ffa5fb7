use ml_core::{Float, MlError, Mode, Result};
use ndarray::prelude::*;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct DropoutCache {
    /// Scaled keep mask, `None` when the forward pass was the identity.
    mask: Option<Array2<Float>>,
}

/// Inverted dropout.
///
/// In training mode every unit is kept with probability `keep_prob` and the
/// kept units are scaled by `1 / keep_prob`, so inference is the identity.
///
/// # Errors
/// Returns `MlError::InvalidInput` if `keep_prob` is not in `(0, 1]`.
pub fn forward<R: Rng>(
    x: ArrayView2<Float>,
    keep_prob: Float,
    mode: Mode,
    rng: &mut R,
) -> Result<(Array2<Float>, DropoutCache)> {
    if !(keep_prob > 0. && keep_prob <= 1.) {
        return Err(MlError::InvalidInput("dropout keep probability must be in (0, 1]"));
    }

    if mode == Mode::Test || keep_prob == 1. {
        return Ok((x.to_owned(), DropoutCache { mask: None }));
    }

    let mask = Array2::from_shape_simple_fn(x.raw_dim(), || {
        if rng.random::<Float>() < keep_prob {
            1. / keep_prob
        } else {
            0.
        }
    });
    let out = &x * &mask;

    Ok((out, DropoutCache { mask: Some(mask) }))
}

/// Routes `dout` through the units kept by the forward pass.
pub fn backward(dout: ArrayView2<Float>, cache: DropoutCache) -> Array2<Float> {
    match cache.mask {
        Some(mask) => mask * &dout,
        None => dout.to_owned(),
    }
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
    fn keep_all_is_identity() {
        let mut rng = generate_rng(Some(1));
        let x: Array2<Float> = scaled_normal((5, 7), 1., &mut rng);
        let dout: Array2<Float> = scaled_normal((5, 7), 1., &mut rng);

        for mode in [Mode::Train, Mode::Test] {
            let (out, cache) = forward(x.view(), 1., mode, &mut rng).unwrap();
            assert_eq!(out, x);
            assert_eq!(backward(dout.view(), cache), dout);
        }
    }

    #[test]
    fn train_mode_preserves_expectation() {
        let mut rng = generate_rng(Some(231));
        let x = Array2::from_elem((500, 500), 10.);

        for p in [0.25, 0.4, 0.7] {
            let (out, _) = forward(x.view(), p, Mode::Train, &mut rng).unwrap();
            let kept = out.iter().filter(|&&v| v != 0.).count() as Float / out.len() as Float;

            assert!((out.mean().unwrap() - 10.).abs() < 0.2);
            assert!((kept - p).abs() < 0.01);
        }
    }

    #[test]
    fn test_mode_is_identity() {
        let mut rng = generate_rng(Some(3));
        let x: Array2<Float> = scaled_normal((4, 4), 1., &mut rng);
        let (out, _) = forward(x.view(), 0.3, Mode::Test, &mut rng).unwrap();
        assert_eq!(out, x);
    }

    #[test]
    fn invalid_keep_prob_is_rejected() {
        let x = Array2::zeros((2, 2));
        let mut rng = generate_rng(Some(0));
        assert!(forward(x.view(), 0., Mode::Train, &mut rng).is_err());
        assert!(forward(x.view(), 1.5, Mode::Train, &mut rng).is_err());
    }

    #[test]
    fn backward_matches_numerical_gradient() {
        let mut rng = generate_rng(Some(231));
        let x: Array2<Float> = scaled_normal((10, 10), 1., &mut rng) + 10.;
        let dout: Array2<Float> = scaled_normal((10, 10), 1., &mut rng);

        let fwd = |x: &Array2<Float>| {
            forward(x.view(), 0.2, Mode::Train, &mut generate_rng(Some(123)))
                .unwrap()
                .0
        };
        let dx_num = eval_numerical_gradient_array(fwd, &x, &dout, 1e-5);

        let (_, cache) = forward(x.view(), 0.2, Mode::Train, &mut generate_rng(Some(123))).unwrap();
        let dx = backward(dout.view(), cache);

        assert_gradients_close(dx.view(), dx_num.view(), 1e-8);
    }
}
