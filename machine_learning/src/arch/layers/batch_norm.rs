use ml_core::{Float, MlError, Mode, Result};
use ndarray::prelude::*;

/// Default numerical-stability constant added to the variance.
pub const EPS: Float = 1e-5;

/// Default decay of the running statistics.
pub const MOMENTUM: Float = 0.9;

/// Running statistics of one batch-normalized layer.
///
/// Training passes normalize with the batch statistics and fold them into
/// exponentially decaying running estimates; inference passes normalize with
/// the running estimates alone.
#[derive(Debug, Clone)]
pub struct BatchNorm {
    eps: Float,
    momentum: Float,
    running_mean: Array1<Float>,
    running_var: Array1<Float>,
}

#[derive(Debug, Clone)]
pub struct BatchNormCache {
    xhat: Array2<Float>,
    gamma: Array1<Float>,
    inv_std: Array1<Float>,
    mode: Mode,
}

impl BatchNorm {
    /// Returns a new `BatchNorm` for `dim` features with zeroed running statistics.
    pub fn new(dim: usize) -> Self {
        Self {
            eps: EPS,
            momentum: MOMENTUM,
            running_mean: Array1::zeros(dim),
            running_var: Array1::zeros(dim),
        }
    }

    pub fn running_mean(&self) -> ArrayView1<'_, Float> {
        self.running_mean.view()
    }

    pub fn running_var(&self) -> ArrayView1<'_, Float> {
        self.running_var.view()
    }

    /// Normalizes every feature of `x` of shape `(N, D)` over the batch axis,
    /// then scales by `gamma` and shifts by `beta`.
    ///
    /// # Errors
    /// Returns `MlError::InvalidInput` on an empty batch in training mode.
    pub fn forward(
        &mut self,
        x: ArrayView2<Float>,
        gamma: ArrayView1<Float>,
        beta: ArrayView1<Float>,
        mode: Mode,
    ) -> Result<(Array2<Float>, BatchNormCache)> {
        let (mean, var) = match mode {
            Mode::Train => {
                let mean = x
                    .mean_axis(Axis(0))
                    .ok_or(MlError::InvalidInput("batch normalization of an empty batch"))?;
                let var = x.var_axis(Axis(0), 0.);

                let m = self.momentum;
                self.running_mean = &self.running_mean * m + &mean * (1. - m);
                self.running_var = &self.running_var * m + &var * (1. - m);

                (mean, var)
            }
            Mode::Test => (self.running_mean.clone(), self.running_var.clone()),
        };

        let inv_std = var.mapv(|v| 1. / (v + self.eps).sqrt());
        let xhat = (&x - &mean) * &inv_std;
        let out = &xhat * &gamma + &beta;

        let cache = BatchNormCache {
            xhat,
            gamma: gamma.to_owned(),
            inv_std,
            mode,
        };

        Ok((out, cache))
    }
}

/// Backpropagates through batch normalization.
///
/// # Returns
/// The gradients `(dx, dgamma, dbeta)`.
pub fn backward(
    dout: ArrayView2<Float>,
    cache: BatchNormCache,
) -> (Array2<Float>, Array1<Float>, Array1<Float>) {
    let BatchNormCache {
        xhat,
        gamma,
        inv_std,
        mode,
    } = cache;

    let dbeta = dout.sum_axis(Axis(0));
    let dgamma = (&dout * &xhat).sum_axis(Axis(0));
    let dxhat = &dout * &gamma;

    let dx = match mode {
        // Running statistics are constants with respect to the input.
        Mode::Test => dxhat * &inv_std,
        Mode::Train => {
            let n = dout.nrows() as Float;
            let sum_dxhat = dxhat.sum_axis(Axis(0));
            let sum_dxhat_xhat = (&dxhat * &xhat).sum_axis(Axis(0));
            (dxhat * n - &sum_dxhat - &xhat * &sum_dxhat_xhat) * &inv_std / n
        }
    };

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
    fn train_forward_normalizes_columns() {
        let mut rng = generate_rng(Some(231));
        let x: Array2<Float> = scaled_normal((200, 3), 10., &mut rng) + 5.;
        let gamma = array![1., 2., 3.];
        let beta = array![0., -1., 4.];

        let mut bn = BatchNorm::new(3);
        let (out, _) = bn.forward(x.view(), gamma.view(), beta.view(), Mode::Train).unwrap();

        let mean = out.mean_axis(Axis(0)).unwrap();
        let std = out.std_axis(Axis(0), 0.);
        for j in 0..3 {
            assert!((mean[j] - beta[j]).abs() < 1e-6);
            assert!((std[j] - gamma[j]).abs() < 1e-3);
        }
    }

    #[test]
    fn running_statistics_follow_momentum() {
        let x = array![[1., 2.], [3., 6.]];
        let ones = Array1::ones(2);
        let zeros = Array1::zeros(2);

        let mut bn = BatchNorm::new(2);
        bn.forward(x.view(), ones.view(), zeros.view(), Mode::Train).unwrap();

        // mean [2, 4], var [1, 4]
        assert!((bn.running_mean()[0] - 0.2).abs() < 1e-12);
        assert!((bn.running_mean()[1] - 0.4).abs() < 1e-12);
        assert!((bn.running_var()[0] - 0.1).abs() < 1e-12);
        assert!((bn.running_var()[1] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_mode_uses_running_statistics() {
        let mut rng = generate_rng(Some(0));
        let gamma = Array1::ones(4);
        let beta = Array1::zeros(4);
        let mut bn = BatchNorm::new(4);

        for _ in 0..50 {
            let x: Array2<Float> = scaled_normal((100, 4), 2., &mut rng) + 3.;
            bn.forward(x.view(), gamma.view(), beta.view(), Mode::Train).unwrap();
        }

        let x: Array2<Float> = scaled_normal((500, 4), 2., &mut rng) + 3.;
        let (out, _) = bn.forward(x.view(), gamma.view(), beta.view(), Mode::Test).unwrap();
        let mean = out.mean_axis(Axis(0)).unwrap();
        let std = out.std_axis(Axis(0), 0.);

        for j in 0..4 {
            assert!(mean[j].abs() < 0.2);
            assert!((std[j] - 1.).abs() < 0.2);
        }
    }

    #[test]
    fn empty_batch_is_rejected() {
        let x = Array2::zeros((0, 2));
        let p = Array1::ones(2);
        let mut bn = BatchNorm::new(2);
        assert!(bn.forward(x.view(), p.view(), p.view(), Mode::Train).is_err());
    }

    #[test]
    fn backward_matches_numerical_gradient() {
        let mut rng = generate_rng(Some(231));
        let x: Array2<Float> = scaled_normal((4, 5), 5., &mut rng) + 12.;
        let gamma: Array1<Float> = scaled_normal(5, 1., &mut rng);
        let beta: Array1<Float> = scaled_normal(5, 1., &mut rng);
        let dout: Array2<Float> = scaled_normal((4, 5), 1., &mut rng);

        let fwd = |x: &Array2<Float>, gamma: &Array1<Float>, beta: &Array1<Float>| {
            let mut bn = BatchNorm::new(5);
            bn.forward(x.view(), gamma.view(), beta.view(), Mode::Train)
                .unwrap()
                .0
        };

        let dx_num = eval_numerical_gradient_array(|x| fwd(x, &gamma, &beta), &x, &dout, 1e-5);
        let dg_num = eval_numerical_gradient_array(|g| fwd(&x, g, &beta), &gamma, &dout, 1e-5);
        let db_num = eval_numerical_gradient_array(|b| fwd(&x, &gamma, b), &beta, &dout, 1e-5);

        let mut bn = BatchNorm::new(5);
        let (_, cache) = bn
            .forward(x.view(), gamma.view(), beta.view(), Mode::Train)
            .unwrap();
        let (dx, dgamma, dbeta) = backward(dout.view(), cache);

        assert_gradients_close(dx.view(), dx_num.view(), 1e-6);
        assert_gradients_close(dgamma.view(), dg_num.view(), 1e-7);
        assert_gradients_close(dbeta.view(), db_num.view(), 1e-7);
    }

    #[test]
    fn test_mode_backward_is_an_affine_gradient() {
        let mut rng = generate_rng(Some(5));
        let x: Array2<Float> = scaled_normal((3, 2), 1., &mut rng);
        let gamma = array![2., -1.];
        let beta = array![0.5, 0.5];
        let dout: Array2<Float> = scaled_normal((3, 2), 1., &mut rng);

        let mut bn = BatchNorm::new(2);
        bn.forward(x.view(), gamma.view(), beta.view(), Mode::Train).unwrap();

        let frozen = bn.clone();
        let dx_num = eval_numerical_gradient_array(
            |x| {
                let mut bn = frozen.clone();
                bn.forward(x.view(), gamma.view(), beta.view(), Mode::Test)
                    .unwrap()
                    .0
            },
            &x,
            &dout,
            1e-5,
        );

        let (_, cache) = bn
            .forward(x.view(), gamma.view(), beta.view(), Mode::Test)
            .unwrap();
        let (dx, _, _) = backward(dout.view(), cache);

        assert_gradients_close(dx.view(), dx_num.view(), 1e-7);
    }
}
